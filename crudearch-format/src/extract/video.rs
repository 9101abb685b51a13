use super::{be_u32, be_u64, fourcc, le_u32, put, slice, u8_at, Metadata};

pub(super) fn extract(data: &[u8], extension: &str, meta: &mut Metadata) {
    match extension {
        "mp4" | "m4v" | "mov" => mp4(data, meta),
        "avi" => avi(data, meta),
        _ => None,
    };
}

// ============================================================================
// ISO BASE MEDIA (MP4 / MOV)
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Atom<'a> {
    kind: &'a [u8],
    /// Payload after the size/type header.
    body: &'a [u8],
}

/// Iterates sibling atoms. Stops at the first atom whose declared size is unusable, so a
/// corrupt size can never stall the walk.
struct Atoms<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Atoms<'a> {
    fn new(data: &'a [u8]) -> Atoms<'a> {
        Atoms { data, pos: 0 }
    }
}

impl<'a> Iterator for Atoms<'a> {
    type Item = Atom<'a>;

    fn next(&mut self) -> Option<Atom<'a>> {
        let data = self.data;
        let start = self.pos;

        let size32 = be_u32(data, start)?;
        let kind = slice(data, start + 4, 4)?;
        let (size, header_len) = match size32 {
            1 => (be_u64(data, start + 8)?, 16u64),
            size => (size as u64, 8u64),
        };

        if size < header_len {
            tracing::debug!(offset = start, size, "terminating atom walk on bad size");
            self.pos = data.len();
            return None;
        }

        let end = start.checked_add(usize::try_from(size).ok()?)?;
        let body = data.get(start + header_len as usize..end.min(data.len()))?;
        self.pos = end;

        Some(Atom { kind, body })
    }
}

fn mp4(data: &[u8], meta: &mut Metadata) -> Option<()> {
    for atom in Atoms::new(data) {
        match atom.kind {
            b"ftyp" => {
                put(meta, "codec", fourcc(slice(atom.body, 0, 4)?));
                put(meta, "minor_version", be_u32(atom.body, 4)?);
            }
            b"moov" => moov(atom.body, meta),
            _ => {}
        }
    }
    Some(())
}

fn moov(body: &[u8], meta: &mut Metadata) {
    for atom in Atoms::new(body) {
        match atom.kind {
            b"mvhd" => {
                mvhd(atom.body, meta);
            }
            b"trak" => {
                for child in Atoms::new(atom.body) {
                    if child.kind == b"tkhd" {
                        tkhd(child.body, meta);
                    }
                }
            }
            _ => {}
        }
    }
}

fn mvhd(body: &[u8], meta: &mut Metadata) -> Option<()> {
    let (timescale, duration) = match u8_at(body, 0)? {
        1 => (be_u32(body, 20)?, be_u64(body, 24)?),
        _ => (be_u32(body, 12)?, be_u32(body, 16)? as u64),
    };
    put(meta, "timescale", timescale);
    if timescale > 0 {
        let seconds = duration as f64 / timescale as f64;
        put(meta, "duration", (seconds * 1000.0).round() / 1000.0);
    }
    Some(())
}

/// Keeps the first track that reports a visual size.
fn tkhd(body: &[u8], meta: &mut Metadata) -> Option<()> {
    if meta.contains_key("width") {
        return Some(());
    }

    let (duration, dims) = match u8_at(body, 0)? {
        1 => (be_u64(body, 28)?, 88),
        _ => (be_u32(body, 20)? as u64, 76),
    };

    if !meta.contains_key("duration") {
        put(meta, "track_duration", duration);
    }

    // 16.16 fixed point
    let width = be_u32(body, dims)? >> 16;
    let height = be_u32(body, dims + 4)? >> 16;
    if width > 0 && height > 0 {
        put(meta, "width", width);
        put(meta, "height", height);
    }
    Some(())
}

// ============================================================================
// AVI
// ============================================================================

const AVI_TOTAL_FRAMES: usize = 48;
const AVI_STREAMS: usize = 56;
const AVI_WIDTH: usize = 64;
const AVI_HEIGHT: usize = 68;
const AVI_CODEC: usize = 112;
const AVI_SCALE: usize = 128;
const AVI_RATE: usize = 132;

fn avi(data: &[u8], meta: &mut Metadata) -> Option<()> {
    if slice(data, 0, 4)? != b"RIFF" || slice(data, 8, 4)? != b"AVI " {
        return None;
    }

    let frames = le_u32(data, AVI_TOTAL_FRAMES)?;
    put(meta, "frame_count", frames);
    put(meta, "streams", le_u32(data, AVI_STREAMS)?);
    put(meta, "width", le_u32(data, AVI_WIDTH)?);
    put(meta, "height", le_u32(data, AVI_HEIGHT)?);
    put(meta, "codec", fourcc(slice(data, AVI_CODEC, 4)?));

    let scale = le_u32(data, AVI_SCALE)?;
    let rate = le_u32(data, AVI_RATE)?;
    if scale > 0 {
        let fps = rate as f64 / scale as f64;
        put(meta, "fps", (fps * 1000.0).round() / 1000.0);
        if fps > 0.0 {
            put(meta, "duration", (frames as f64 / fps * 1000.0).round() / 1000.0);
        }
    }

    Some(())
}
