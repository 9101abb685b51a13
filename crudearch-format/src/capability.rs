//! Optional decoders that the archive uses through trait objects.
//!
//! Nothing here is implemented by the crate itself. Callers that link a numeric array
//! library or an image/audio decoder install it through [`Capabilities`].

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// An n-dimensional array decoded from a numeric entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedArray {
    pub dtype: String,
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

pub trait ArrayDecoder: Send + Sync {
    fn decode_array(&self, data: &[u8], extension: &str) -> Result<DecodedArray>;
}

/// Renders an image entry to a preview (for example a thumbnail PNG).
pub trait PreviewRenderer: Send + Sync {
    fn render_preview(&self, data: &[u8], extension: &str) -> Result<Vec<u8>>;
}

/// Pulls embedded cover art out of an audio entry.
pub trait CoverArtExtractor: Send + Sync {
    fn cover_art(&self, data: &[u8], extension: &str) -> Result<Option<Vec<u8>>>;
}

pub(crate) const ARRAY_DECODER: &str = "array-decoder";
pub(crate) const PREVIEW_RENDERER: &str = "preview-renderer";
pub(crate) const COVER_ART: &str = "cover-art";

#[derive(Clone, Default)]
pub struct Capabilities {
    arrays: Option<Arc<dyn ArrayDecoder>>,
    previews: Option<Arc<dyn PreviewRenderer>>,
    cover_art: Option<Arc<dyn CoverArtExtractor>>,
}

impl Capabilities {
    pub fn with_array_decoder<D: ArrayDecoder + 'static>(mut self, decoder: D) -> Self {
        self.arrays = Some(Arc::new(decoder));
        self
    }

    pub fn with_preview_renderer<R: PreviewRenderer + 'static>(mut self, renderer: R) -> Self {
        self.previews = Some(Arc::new(renderer));
        self
    }

    pub fn with_cover_art_extractor<C: CoverArtExtractor + 'static>(mut self, extractor: C) -> Self {
        self.cover_art = Some(Arc::new(extractor));
        self
    }

    pub(crate) fn arrays(&self) -> Result<&dyn ArrayDecoder> {
        self.arrays
            .as_deref()
            .ok_or(Error::MissingOptionalCapability(ARRAY_DECODER))
    }

    pub(crate) fn previews(&self) -> Result<&dyn PreviewRenderer> {
        self.previews
            .as_deref()
            .ok_or(Error::MissingOptionalCapability(PREVIEW_RENDERER))
    }

    pub(crate) fn cover_art(&self) -> Result<&dyn CoverArtExtractor> {
        self.cover_art
            .as_deref()
            .ok_or(Error::MissingOptionalCapability(COVER_ART))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("array_decoder", &self.arrays.is_some())
            .field("preview_renderer", &self.previews.is_some())
            .field("cover_art", &self.cover_art.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bytes;

    impl ArrayDecoder for Bytes {
        fn decode_array(&self, data: &[u8], _: &str) -> Result<DecodedArray> {
            Ok(DecodedArray {
                dtype: "u1".into(),
                shape: vec![data.len()],
                values: data.iter().map(|&b| b as f64).collect(),
            })
        }
    }

    #[test]
    fn missing_capabilities_are_reported() {
        let caps = Capabilities::default();
        assert!(matches!(
            caps.arrays(),
            Err(Error::MissingOptionalCapability(ARRAY_DECODER))
        ));
        assert!(caps.previews().is_err());
        assert!(caps.cover_art().is_err());
    }

    #[test]
    fn installed_decoder_is_used() {
        let caps = Capabilities::default().with_array_decoder(Bytes);
        let array = caps.arrays().unwrap().decode_array(&[1, 2], "npy").unwrap();
        assert_eq!(array.shape, vec![2]);
        assert_eq!(format!("{:?}", caps), "Capabilities { array_decoder: true, preview_renderer: false, cover_art: false }");
    }
}
