use serde_json::Value;

use super::{le_u16, le_u32, put, u8_at, Metadata};

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

pub(super) fn extract(data: &[u8], extension: &str, meta: &mut Metadata) {
    match extension {
        "npy" => npy(data, meta),
        "npz" => {
            put(meta, "zip", data.starts_with(b"PK\x03\x04"));
            Some(())
        }
        _ => None,
    };
}

/// Reads the header dictionary of an NPY file, e.g.
/// `{'descr': '<f8', 'fortran_order': False, 'shape': (3, 4), }`.
fn npy(data: &[u8], meta: &mut Metadata) -> Option<()> {
    if !data.starts_with(NPY_MAGIC) {
        return None;
    }
    let major = u8_at(data, 6)?;
    put(meta, "npy_version", format!("{}.{}", major, u8_at(data, 7)?));

    let (header_len, header_start) = match major {
        1 => (le_u16(data, 8)? as usize, 10usize),
        _ => (le_u32(data, 8)? as usize, 12usize),
    };
    let header = data.get(header_start..header_start.checked_add(header_len)?)?;
    let header = std::str::from_utf8(header).ok()?;

    if let Some(descr) = dict_value(header, "descr") {
        put(meta, "dtype", descr.trim_matches(|c| c == '\'' || c == '"'));
    }
    if let Some(order) = dict_value(header, "fortran_order") {
        put(meta, "fortran_order", order == "True");
    }
    if let Some(shape) = dict_value(header, "shape") {
        let dims: Option<Vec<Value>> = shape
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<u64>().ok().map(Value::from))
            .collect();
        put(meta, "shape", dims?);
    }

    Some(())
}

/// Returns the raw text of `key`'s value in a Python dict literal.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let start = header
        .find(&format!("'{}'", key))
        .or_else(|| header.find(&format!("\"{}\"", key)))?;
    let rest = header[start + key.len() + 2..].trim_start().strip_prefix(':')?;
    let rest = rest.trim_start();

    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find(',').unwrap_or(rest.len())
    };
    Some(rest[..end].trim())
}
