use std::fmt;
use std::str::FromStr;

/// Encodings understood by the text helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    Ascii,
    Latin1,
}

impl TextEncoding {
    pub const fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Ascii => "ascii",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    /// Returns `None` when the bytes are not valid in this encoding.
    pub fn decode(self, data: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => std::str::from_utf8(data).ok().map(str::to_string),
            TextEncoding::Utf16Le => decode_utf16(data, u16::from_le_bytes),
            TextEncoding::Utf16Be => decode_utf16(data, u16::from_be_bytes),
            TextEncoding::Ascii => data
                .is_ascii()
                .then(|| data.iter().map(|&b| b as char).collect()),
            TextEncoding::Latin1 => Some(data.iter().map(|&b| b as char).collect()),
        }
    }

    /// Returns `None` when the text has characters this encoding cannot represent.
    pub fn encode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Some(text.as_bytes().to_vec()),
            TextEncoding::Utf16Le => Some(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            TextEncoding::Utf16Be => Some(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            TextEncoding::Ascii => text.is_ascii().then(|| text.as_bytes().to_vec()),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).ok())
                .collect(),
        }
    }
}

fn decode_utf16(data: &[u8], read: fn([u8; 2]) -> u16) -> Option<String> {
    if data.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = data.chunks_exact(2).map(|c| read([c[0], c[1]])).collect();
    let text = String::from_utf16(&units).ok()?;
    Some(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TextEncoding {
    type Err = std::io::Error;

    fn from_str(s: &str) -> std::io::Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "utf-16le" | "utf-16-le" | "utf16le" => Ok(TextEncoding::Utf16Le),
            "utf-16be" | "utf-16-be" | "utf16be" => Ok(TextEncoding::Utf16Be),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Unknown text encoding `{}`", other),
            )),
        }
    }
}
