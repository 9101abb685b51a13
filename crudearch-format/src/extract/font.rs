use super::{be_u16, be_u32, fourcc, put, slice, Metadata};

pub(super) fn extract(data: &[u8], extension: &str, meta: &mut Metadata) {
    match extension {
        "ttf" | "otf" => sfnt(data, meta),
        "woff" | "woff2" => woff(data, meta),
        _ => None,
    };
}

const TABLE_DIRECTORY: usize = 12;
const TABLE_RECORD_LEN: usize = 16;
const NAME_RECORD_LEN: usize = 12;
const NAME_ID_FAMILY: u16 = 1;

fn sfnt(data: &[u8], meta: &mut Metadata) -> Option<()> {
    let version = slice(data, 0, 4)?;
    put(
        meta,
        "sfnt_version",
        if version == b"OTTO" { "OTTO" } else { "TrueType" },
    );

    let num_tables = be_u16(data, 4)?;
    put(meta, "num_tables", num_tables);

    let name_offset = (0..num_tables as usize)
        .map(|i| TABLE_DIRECTORY + i * TABLE_RECORD_LEN)
        .find(|&record| slice(data, record, 4) == Some(b"name".as_slice()))
        .and_then(|record| be_u32(data, record + 8))? as usize;

    let name_table = data.get(name_offset..)?;
    let count = be_u16(name_table, 2)?;
    put(meta, "name_records", count);

    if let Some(family) = family_name(name_table, count) {
        put(meta, "font_family", family);
    }

    Some(())
}

/// Finds name ID 1, preferring the Windows Unicode record.
fn family_name(table: &[u8], count: u16) -> Option<String> {
    let storage = be_u16(table, 4)? as usize;
    let mut fallback = None;

    for i in 0..count as usize {
        let record = 6 + i * NAME_RECORD_LEN;
        let platform = be_u16(table, record)?;
        let name_id = be_u16(table, record + 6)?;
        if name_id != NAME_ID_FAMILY {
            continue;
        }
        let length = be_u16(table, record + 8)? as usize;
        let offset = be_u16(table, record + 10)? as usize;
        let Some(raw) = slice(table, storage + offset, length) else {
            continue;
        };

        match platform {
            // Unicode and Windows records are UTF-16BE
            0 | 3 => {
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                if let Ok(name) = String::from_utf16(&units) {
                    return Some(name);
                }
            }
            1 if fallback.is_none() => {
                fallback = Some(raw.iter().map(|&b| b as char).collect());
            }
            _ => {}
        }
    }

    fallback
}

/// `flavor` is the tag stored at offset 8 of the header; `sfnt_flavor` is the wrapped
/// font's version tag from offset 4. The same word at offset 8 is the total file length.
fn woff(data: &[u8], meta: &mut Metadata) -> Option<()> {
    put(meta, "sfnt_flavor", fourcc(slice(data, 4, 4)?));
    put(meta, "flavor", fourcc(slice(data, 8, 4)?));
    put(meta, "length", be_u32(data, 8)?);
    put(meta, "num_tables", be_u16(data, 12)?);
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(data: &[u8], ext: &str) -> Metadata {
        let mut meta = Metadata::new();
        extract(data, ext, &mut meta);
        meta
    }

    /// An sfnt with a dummy `head` table and a `name` table holding one family record.
    fn ttf_bytes(family: &str) -> Vec<u8> {
        let encoded: Vec<u8> = family.encode_utf16().flat_map(|u| u.to_be_bytes()).collect();

        let mut name = Vec::new();
        name.extend_from_slice(&0u16.to_be_bytes()); // format
        name.extend_from_slice(&2u16.to_be_bytes()); // count
        name.extend_from_slice(&30u16.to_be_bytes()); // storage offset
        // copyright record, platform 3
        for v in [3u16, 1, 0x409, 0, 0, 0] {
            name.extend_from_slice(&v.to_be_bytes());
        }
        // family record, platform 3
        for v in [3u16, 1, 0x409, 1, encoded.len() as u16, 0] {
            name.extend_from_slice(&v.to_be_bytes());
        }
        name.extend_from_slice(&encoded);

        let name_offset = 12 + 2 * 16;
        let mut out = vec![0x00, 0x01, 0x00, 0x00];
        out.extend_from_slice(&2u16.to_be_bytes());
        out.extend_from_slice(&[0u8; 6]);
        out.extend_from_slice(b"head");
        out.extend_from_slice(&[0u8; 12]);
        out.extend_from_slice(b"name");
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&(name_offset as u32).to_be_bytes());
        out.extend_from_slice(&(name.len() as u32).to_be_bytes());
        out.extend_from_slice(&name);
        out
    }

    #[test]
    fn ttf_table_directory() {
        let meta = run(&ttf_bytes("Crude Sans"), "ttf");
        assert_eq!(meta["sfnt_version"], "TrueType");
        assert_eq!(meta["num_tables"], 2);
        assert_eq!(meta["name_records"], 2);
        assert_eq!(meta["font_family"], "Crude Sans");
    }

    #[test]
    fn missing_name_table_keeps_count() {
        let mut data = ttf_bytes("X");
        data[28..32].copy_from_slice(b"post");
        let meta = run(&data, "ttf");
        assert_eq!(meta["num_tables"], 2);
        assert!(meta.get("name_records").is_none());
    }

    #[test]
    fn woff_header() {
        let mut data = b"wOFFOTTOtrue".to_vec();
        data.extend_from_slice(&9u16.to_be_bytes());
        let meta = run(&data, "woff");
        assert_eq!(meta["sfnt_flavor"], "OTTO");
        assert_eq!(meta["flavor"], "true");
        assert_eq!(meta["num_tables"], 9);

        let mut data = b"wOF2\x00\x01\x00\x00".to_vec();
        data.extend_from_slice(&[0x00, 0x00, 0x10, 0x00]);
        let meta = run(&data, "woff2");
        assert_eq!(meta["sfnt_flavor"], "0x00010000");
        assert_eq!(meta["flavor"], "0x00001000");
        assert_eq!(meta["length"], 4096);
        assert!(meta.get("num_tables").is_none());
    }
}
