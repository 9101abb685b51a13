use super::{be_u16, be_u32, le_i32, le_u16, put, u8_at, Metadata};

pub(super) fn extract(data: &[u8], extension: &str, meta: &mut Metadata) {
    match extension {
        "png" => png(data, meta),
        "jpg" | "jpeg" => jpeg(data, meta),
        "gif" => gif(data, meta),
        "bmp" => bmp(data, meta),
        _ => None,
    };
}

fn png(data: &[u8], meta: &mut Metadata) -> Option<()> {
    if data.get(12..16)? != b"IHDR" {
        return None;
    }
    put(meta, "width", be_u32(data, 16)?);
    put(meta, "height", be_u32(data, 20)?);
    put(meta, "bit_depth", u8_at(data, 24)?);
    put(meta, "color_type", u8_at(data, 25)?);
    put(meta, "interlaced", u8_at(data, 28)? == 1);
    Some(())
}

const SOF0: u8 = 0xC0;
const SOF2: u8 = 0xC2;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

fn jpeg(data: &[u8], meta: &mut Metadata) -> Option<()> {
    let mut pos = 2;

    loop {
        if u8_at(data, pos)? != 0xFF {
            return None;
        }
        let marker = u8_at(data, pos + 1)?;

        match marker {
            SOF0 | SOF2 => {
                put(meta, "progressive", marker == SOF2);
                put(meta, "precision", u8_at(data, pos + 4)?);
                put(meta, "height", be_u16(data, pos + 5)?);
                put(meta, "width", be_u16(data, pos + 7)?);
                put(meta, "components", u8_at(data, pos + 9)?);
                return Some(());
            }
            // Fill bytes before a marker.
            0xFF => pos += 1,
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD7 => pos += 2,
            SOS | EOI => return None,
            _ => {
                let length = be_u16(data, pos + 2)? as usize;
                if length < 2 {
                    return None;
                }
                pos += 2 + length;
            }
        }
    }
}

fn gif(data: &[u8], meta: &mut Metadata) -> Option<()> {
    put(meta, "version", String::from_utf8_lossy(data.get(3..6)?).into_owned());
    put(meta, "width", le_u16(data, 6)?);
    put(meta, "height", le_u16(data, 8)?);
    Some(())
}

fn bmp(data: &[u8], meta: &mut Metadata) -> Option<()> {
    put(meta, "width", le_i32(data, 18)?.unsigned_abs());
    // Negative heights mark top-down bitmaps.
    let height = le_i32(data, 22)?;
    put(meta, "height", height.unsigned_abs());
    put(meta, "top_down", height < 0);
    put(meta, "bits_per_pixel", le_u16(data, 28)?);
    Some(())
}
