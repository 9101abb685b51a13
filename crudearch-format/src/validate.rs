//! Type, security, size and signature checks run before an entry is stored.

use tracing::warn;

use crate::error::ValidationError;
use crate::registry::{normalize_extension, TypeRegistry};

/// A predicate over the leading bytes of a payload.
#[derive(Debug, Clone, Copy)]
pub enum Signature {
    /// Bytes at offset 0.
    Prefix(&'static [u8]),
    /// Bytes at a fixed offset.
    At(usize, &'static [u8]),
    /// Needle found anywhere within the first `window` bytes.
    Within(usize, &'static [u8]),
    AnyOf(&'static [Signature]),
    AllOf(&'static [Signature]),
}

impl Signature {
    pub fn matches(&self, data: &[u8]) -> bool {
        match *self {
            Signature::Prefix(magic) => data.starts_with(magic),
            Signature::At(offset, magic) => data
                .get(offset..offset + magic.len())
                .map(|window| window == magic)
                .unwrap_or(false),
            Signature::Within(window, needle) => {
                let head = &data[..data.len().min(window)];
                head.windows(needle.len()).any(|w| w == needle)
            }
            Signature::AnyOf(signatures) => signatures.iter().any(|s| s.matches(data)),
            Signature::AllOf(signatures) => signatures.iter().all(|s| s.matches(data)),
        }
    }
}

const MP3: Signature = Signature::AnyOf(&[Signature::Prefix(b"ID3"), Signature::At(1, b"MP3")]);
const WAV: Signature = Signature::AllOf(&[Signature::Prefix(b"RIFF"), Signature::At(8, b"WAVE")]);

/// Signature registered for an extension, if any.
pub fn signature_for(extension: &str) -> Option<Signature> {
    use Signature::*;

    let signature = match normalize_extension(extension).as_str() {
        "png" => Prefix(b"\x89PNG"),
        "jpg" | "jpeg" => Prefix(b"\xFF\xD8"),
        "gif" => Prefix(b"GIF"),
        "bmp" => Prefix(b"BM"),
        "zip" => Prefix(b"PK\x03\x04"),
        "pdf" => Prefix(b"%PDF"),
        "mp3" => MP3,
        "wav" => WAV,
        "mp4" => At(4, b"ftyp"),
        "obj" => Within(100, b"v "),
        "fbx" => Within(100, b"Kaydara"),
        "glb" => Prefix(b"glTF"),
        "ttf" => Prefix(b"\x00\x01\x00\x00"),
        "otf" => Prefix(b"OTTO"),
        "woff" => Prefix(b"wOFF"),
        "woff2" => Prefix(b"wOF2"),
        _ => return None,
    };

    Some(signature)
}

pub struct FormatValidator<'a> {
    registry: &'a TypeRegistry,
}

impl<'a> FormatValidator<'a> {
    pub fn new(registry: &'a TypeRegistry) -> FormatValidator<'a> {
        FormatValidator { registry }
    }

    /// Runs every check in order and stops at the first failure.
    pub fn validate(&self, data: &[u8], extension: &str) -> Result<(), ValidationError> {
        let extension = normalize_extension(extension);

        let result = self
            .check_type(&extension)
            .and_then(|_| self.check_security(&extension))
            .and_then(|_| self.check_size(data, &extension))
            .and_then(|_| self.check_signature(data, &extension));

        if let Err(e) = &result {
            warn!(%extension, check = e.check(), size = data.len(), "validation rejected content");
        }

        result
    }

    fn check_type(&self, extension: &str) -> Result<(), ValidationError> {
        match self.registry.descriptor_for(extension) {
            Some(_) => Ok(()),
            None => Err(ValidationError::UnsupportedType {
                extension: extension.to_string(),
            }),
        }
    }

    fn check_security(&self, extension: &str) -> Result<(), ValidationError> {
        if self.registry.is_restricted(extension) {
            return Err(ValidationError::RestrictedType {
                extension: extension.to_string(),
            });
        }
        Ok(())
    }

    fn check_size(&self, data: &[u8], extension: &str) -> Result<(), ValidationError> {
        let limit = self.registry.size_limit(extension);
        let size = data.len() as u64;
        if size > limit {
            return Err(ValidationError::OversizeFile {
                extension: extension.to_string(),
                size,
                limit,
            });
        }
        Ok(())
    }

    fn check_signature(&self, data: &[u8], extension: &str) -> Result<(), ValidationError> {
        match signature_for(extension) {
            Some(signature) if !signature.matches(data) => {
                Err(ValidationError::SignatureMismatch {
                    extension: extension.to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(data: &[u8], ext: &str) -> Result<(), ValidationError> {
        let registry = TypeRegistry::default();
        FormatValidator::new(&registry).validate(data, ext)
    }

    #[test]
    fn restricted_regardless_of_content() {
        for ext in ["exe", "dll", "bat", "sh", "php"] {
            assert!(matches!(
                validate(b"MZ\x90\x00", ext),
                Err(ValidationError::RestrictedType { .. })
            ));
            assert!(matches!(
                validate(b"", ext),
                Err(ValidationError::RestrictedType { .. })
            ));
        }
    }

    #[test]
    fn unknown_type() {
        assert_eq!(
            validate(b"data", "qqq"),
            Err(ValidationError::UnsupportedType {
                extension: "qqq".into()
            })
        );
    }

    #[test]
    fn size_limit_is_inclusive() {
        let registry = TypeRegistry::builder().size_limit("txt", 4).build();
        let validator = FormatValidator::new(&registry);
        assert!(validator.validate(b"1234", "txt").is_ok());
        assert_eq!(
            validator.validate(b"12345", "txt"),
            Err(ValidationError::OversizeFile {
                extension: "txt".into(),
                size: 5,
                limit: 4
            })
        );
    }

    #[test]
    fn png_signature() {
        assert!(validate(b"\x89PNG\r\n\x1a\n", "png").is_ok());
        assert!(matches!(
            validate(b"not a png", "png"),
            Err(ValidationError::SignatureMismatch { .. })
        ));
        assert!(matches!(
            validate(b"", "png"),
            Err(ValidationError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn mp3_either_form() {
        assert!(validate(b"ID3\x04\x00", "mp3").is_ok());
        assert!(validate(b"xMP3....", "mp3").is_ok());
        assert!(validate(b"\xFF\xFB\x90\x00", "mp3").is_err());
    }

    #[test]
    fn wav_needs_both_markers() {
        assert!(validate(b"RIFF\0\0\0\0WAVEfmt ", "wav").is_ok());
        assert!(validate(b"RIFF\0\0\0\0AVI ", "wav").is_err());
    }

    #[test]
    fn mp4_ftyp_at_offset_four() {
        assert!(validate(b"\0\0\0\x18ftypisom", "mp4").is_ok());
        assert!(validate(b"ftypisom", "mp4").is_err());
    }

    #[test]
    fn obj_window() {
        assert!(validate(b"# cube\nv 0 0 0\n", "obj").is_ok());
        let mut late = vec![b'#'; 120];
        late.extend_from_slice(b"\nv 0 0 0\n");
        assert!(validate(&late, "obj").is_err());
    }

    #[test]
    fn fbx_and_fonts() {
        assert!(validate(b"Kaydara FBX Binary  \0", "fbx").is_ok());
        assert!(validate(b"\x00\x01\x00\x00\x00\x0a", "ttf").is_ok());
        assert!(validate(b"OTTO\x00\x0a", "otf").is_ok());
        assert!(validate(b"wOFF", "woff").is_ok());
        assert!(validate(b"wOFF", "woff2").is_err());
        assert!(validate(b"wOF2", "woff2").is_ok());
    }

    #[test]
    fn unregistered_signature_passes() {
        assert!(validate(b"\x00\x01\x02", "txt").is_ok());
        assert!(validate(b"", "bin").is_ok());
    }
}
