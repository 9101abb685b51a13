//! Lossless compression for level-of-detail blobs.
//!
//! Tagged blobs start with the algorithm's id byte, so a stored blob is never mistaken for
//! a compressed frame.

use std::collections::HashMap;
use std::fmt;
use std::io::Result;

pub mod constants {
    pub const COMPRESSION_STORED: u8 = 0x00;
    pub const COMPRESSION_ZSTD: u8 = 0x10;
    pub const COMPRESSION_XZ: u8 = 0x20;

    pub const DEFAULT_ZSTD_LEVEL: i32 = 3;
    pub const DEFAULT_XZ_LEVEL: u32 = 6;
}

use self::constants::*;

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Compression {
    Stored,
    Zstd,
    Xz,
    Unknown(u8),
}

/// The strongest algorithm compiled in.
impl Default for Compression {
    fn default() -> Self {
        if cfg!(feature = "zstd") {
            Compression::Zstd
        } else if cfg!(feature = "xz") {
            Compression::Xz
        } else {
            Compression::Stored
        }
    }
}

impl Compression {
    pub const fn available_variants() -> &'static [&'static str] {
        &["stored", "xz", "zstd"]
    }

    pub const fn id(self) -> u8 {
        match self {
            Compression::Stored => COMPRESSION_STORED,
            Compression::Zstd => COMPRESSION_ZSTD,
            Compression::Xz => COMPRESSION_XZ,
            Compression::Unknown(id) => id,
        }
    }

    pub const fn from_id(id: u8) -> Compression {
        match id {
            COMPRESSION_STORED => Compression::Stored,
            COMPRESSION_ZSTD => Compression::Zstd,
            COMPRESSION_XZ => Compression::Xz,
            id => Compression::Unknown(id),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Compression::Stored => "stored",
            Compression::Zstd => "Zstandard",
            Compression::Xz => "xz",
            Compression::Unknown(id) => return write!(f, "Unknown(id: {:x})", id),
        };

        write!(f, "{}", s)
    }
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::str::FromStr for Compression {
    type Err = std::io::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stored" | "none" => Ok(Compression::Stored),
            "zstd" | "zstandard" => Ok(Compression::Zstd),
            "xz" => Ok(Compression::Xz),
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "Unknown compression `{}`, expected one of {}",
                    other,
                    Compression::available_variants().join(", ")
                ),
            )),
        }
    }
}

/// An algorithm plus free-form options such as `level`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompressionConfig {
    pub compression: Compression,
    pub options: HashMap<String, String>,
}

impl CompressionConfig {
    pub fn new(compression: Compression) -> Self {
        CompressionConfig {
            compression,
            options: HashMap::new(),
        }
    }

    pub fn with_option<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.options.insert(key.into(), value.to_string());
        self
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.options.get(key).and_then(|v| v.parse().ok())
    }

    /// Level to use, shifted by `boost` steps and clamped to the algorithm's range.
    pub(crate) fn level(&self, boost: i32) -> i32 {
        match self.compression {
            Compression::Xz => {
                (self.get_i32("level").unwrap_or(DEFAULT_XZ_LEVEL as i32) + boost).clamp(0, 9)
            }
            _ => (self.get_i32("level").unwrap_or(DEFAULT_ZSTD_LEVEL) + boost).clamp(1, 19),
        }
    }
}

pub fn compress_bytes(data: &[u8], config: &CompressionConfig) -> Result<Vec<u8>> {
    compress_bytes_at(data, config.compression, config.level(0))
}

fn compress_bytes_at(data: &[u8], compression: Compression, level: i32) -> Result<Vec<u8>> {
    match compression {
        Compression::Stored => Ok(data.to_vec()),
        #[cfg(feature = "zstd")]
        Compression::Zstd => zstd::bulk::compress(data, level),
        #[cfg(feature = "xz")]
        Compression::Xz => {
            use std::io::Read;

            let mut out = Vec::new();
            xz2::read::XzEncoder::new(data, level as u32).read_to_end(&mut out)?;
            Ok(out)
        }
        Compression::Unknown(id) => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Cannot handle compression with id {}", id),
        )),
        #[allow(unreachable_patterns)]
        missing => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Compiled without support for {:?}", missing),
        )),
    }
}

/// Compresses `data` and prefixes the result with the algorithm id.
pub(crate) fn compress_tagged(data: &[u8], compression: Compression, level: i32) -> Result<Vec<u8>> {
    let packed = compress_bytes_at(data, compression, level)?;
    let mut out = Vec::with_capacity(packed.len() + 1);
    out.push(compression.id());
    out.extend_from_slice(&packed);
    Ok(out)
}

/// Reverses [`compress_tagged`].
pub fn decompress_tagged(blob: &[u8]) -> Result<Vec<u8>> {
    let (&id, payload) = blob.split_first().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "missing compression tag")
    })?;
    decompress_bytes(payload, Compression::from_id(id))
}

pub fn decompress_bytes(data: &[u8], compression: Compression) -> Result<Vec<u8>> {
    match compression {
        Compression::Stored => Ok(data.to_vec()),
        #[cfg(feature = "zstd")]
        Compression::Zstd => zstd::stream::decode_all(data),
        #[cfg(feature = "xz")]
        Compression::Xz => {
            use std::io::Read;

            let mut out = Vec::new();
            xz2::read::XzDecoder::new(data).read_to_end(&mut out)?;
            Ok(out)
        }
        Compression::Unknown(id) => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Cannot handle decompression with id {}", id),
        )),
        #[allow(unreachable_patterns)]
        missing => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Compiled without support for {:?}", missing),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    #[test]
    fn stored_is_identity() {
        let config = CompressionConfig::new(Compression::Stored);
        assert_eq!(compress_bytes(SAMPLE, &config).unwrap(), SAMPLE);

        let tagged = compress_tagged(SAMPLE, Compression::Stored, 0).unwrap();
        assert_eq!(tagged[0], COMPRESSION_STORED);
        assert_eq!(&tagged[1..], SAMPLE);
    }

    #[test]
    fn stored_payload_that_looks_like_xz() {
        let mut data = vec![0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
        data.extend_from_slice(b"solid scan\n");
        let tagged = compress_tagged(&data, Compression::Stored, 0).unwrap();
        assert_eq!(decompress_tagged(&tagged).unwrap(), data);
    }

    #[test]
    fn default_is_always_usable() {
        let config = CompressionConfig::default();
        let tagged = compress_tagged(SAMPLE, config.compression, config.level(0)).unwrap();
        assert_eq!(Compression::from_id(tagged[0]), Compression::default());
        assert_eq!(decompress_tagged(&tagged).unwrap(), SAMPLE);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn zstd_round_trip() {
        let config = CompressionConfig::new(Compression::Zstd).with_option("level", 5);
        let packed = compress_bytes(SAMPLE, &config).unwrap();
        assert_eq!(decompress_bytes(&packed, Compression::Zstd).unwrap(), SAMPLE);

        let tagged = compress_tagged(SAMPLE, Compression::Zstd, 5).unwrap();
        assert_eq!(tagged[0], COMPRESSION_ZSTD);
        assert_eq!(decompress_tagged(&tagged).unwrap(), SAMPLE);
    }

    #[cfg(feature = "xz")]
    #[test]
    fn xz_round_trip() {
        let tagged = compress_tagged(SAMPLE, Compression::Xz, 6).unwrap();
        assert_eq!(tagged[0], COMPRESSION_XZ);
        assert_eq!(decompress_tagged(&tagged).unwrap(), SAMPLE);
    }

    #[test]
    fn unknown_is_rejected() {
        assert!(decompress_bytes(SAMPLE, Compression::Unknown(0x99)).is_err());
        assert!(decompress_tagged(&[0x99, 1, 2]).is_err());
        assert!(decompress_tagged(&[]).is_err());
        assert_eq!(Compression::from_id(0x99), Compression::Unknown(0x99));
    }

    #[test]
    fn levels_are_clamped() {
        let config = CompressionConfig::new(Compression::Zstd).with_option("level", 18);
        assert_eq!(config.level(5), 19);
        let config = CompressionConfig::new(Compression::Xz);
        assert_eq!(config.level(10), 9);
        assert_eq!("ZSTD".parse::<Compression>().unwrap(), Compression::Zstd);

        let err = "brotli".parse::<Compression>().unwrap_err();
        assert!(err.to_string().contains("stored, xz, zstd"));
    }
}
