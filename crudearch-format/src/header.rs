use std::io::Write;

use crate::error::{Error, Result};

/// Fixed tag at the start of every container. The JSON body follows immediately with no
/// length prefix.
pub const MAGIC_HEADER: &[u8; 10] = b"CRUDARCHv1";

pub(crate) fn write_header<W: Write>(writer: &mut W) -> std::io::Result<()> {
    writer.write_all(MAGIC_HEADER)
}

/// Checks the magic tag and returns the body that follows it.
pub(crate) fn split_header(data: &[u8]) -> Result<&[u8]> {
    match data.strip_prefix(MAGIC_HEADER.as_slice()) {
        Some(body) => Ok(body),
        None if data.len() < MAGIC_HEADER.len() => Err(Error::invalid_format(format!(
            "header truncated to {} bytes",
            data.len()
        ))),
        None => Err(Error::invalid_format("magic header mismatch")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_follows_header() {
        let mut out = Vec::new();
        write_header(&mut out).unwrap();
        out.extend_from_slice(b"{}");
        assert_eq!(split_header(&out).unwrap(), b"{}");
    }

    #[test]
    fn short_or_wrong_header() {
        assert!(matches!(split_header(b"CRU"), Err(Error::InvalidFormat { .. })));
        assert!(matches!(
            split_header(b"CRUDARCHv2{}"),
            Err(Error::InvalidFormat { .. })
        ));
    }
}
