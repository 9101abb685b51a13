//! Header-level metadata sniffers.
//!
//! Every extractor is infallible: a truncated or malformed payload yields whatever fields were
//! decoded before the problem was hit, possibly none. Extraction never blocks storage.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde_json::{Map, Value};

use crate::registry::{normalize_extension, Category, TypeRegistry};

mod audio;
mod font;
pub(crate) mod image;
mod model;
mod numeric;
mod video;

pub type Metadata = Map<String, Value>;

/// Signature shared by every per-category extractor.
pub type Extractor = fn(&[u8], &str, &mut Metadata);

/// Category to extractor dispatch, built once per archive.
#[derive(Debug, Clone)]
pub struct Extractors {
    table: HashMap<Category, Extractor>,
}

impl Default for Extractors {
    fn default() -> Self {
        let mut table: HashMap<Category, Extractor> = HashMap::new();
        table.insert(Category::Image, image::extract);
        table.insert(Category::Audio, audio::extract);
        table.insert(Category::Video, video::extract);
        table.insert(Category::Font, font::extract);
        table.insert(Category::Numeric, numeric::extract);
        table.insert(Category::ModelStatic, model::extract);
        table.insert(Category::ModelAnimated, model::extract);
        Extractors { table }
    }
}

impl Extractors {
    /// Replaces the extractor for a category.
    pub fn with_extractor(mut self, category: Category, extractor: Extractor) -> Self {
        self.table.insert(category, extractor);
        self
    }

    pub fn extract(&self, registry: &TypeRegistry, data: &[u8], extension: &str) -> Metadata {
        let extension = normalize_extension(extension);
        let mut meta = Metadata::new();

        let Some(category) = registry.category_for(&extension) else {
            return meta;
        };

        if let Some(extractor) = self.table.get(&category) {
            extractor(data, &extension, &mut meta);
            tracing::trace!(%extension, %category, fields = meta.len(), "extracted metadata");
        }

        meta
    }
}

/// Extracts with the default table and registry.
pub fn extract(data: &[u8], extension: &str) -> Metadata {
    Extractors::default().extract(&TypeRegistry::default(), data, extension)
}

// Bounds-checked field readers. `None` ends the calling parser early.

#[inline]
pub(crate) fn slice(data: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    data.get(offset..offset.checked_add(len)?)
}

#[inline]
pub(crate) fn u8_at(data: &[u8], offset: usize) -> Option<u8> {
    data.get(offset).copied()
}

#[inline]
pub(crate) fn be_u16(data: &[u8], offset: usize) -> Option<u16> {
    slice(data, offset, 2).map(BigEndian::read_u16)
}

#[inline]
pub(crate) fn be_u32(data: &[u8], offset: usize) -> Option<u32> {
    slice(data, offset, 4).map(BigEndian::read_u32)
}

#[inline]
pub(crate) fn be_u64(data: &[u8], offset: usize) -> Option<u64> {
    slice(data, offset, 8).map(BigEndian::read_u64)
}

#[inline]
pub(crate) fn le_u16(data: &[u8], offset: usize) -> Option<u16> {
    slice(data, offset, 2).map(LittleEndian::read_u16)
}

#[inline]
pub(crate) fn le_u32(data: &[u8], offset: usize) -> Option<u32> {
    slice(data, offset, 4).map(LittleEndian::read_u32)
}

#[inline]
pub(crate) fn le_i32(data: &[u8], offset: usize) -> Option<i32> {
    slice(data, offset, 4).map(LittleEndian::read_i32)
}

/// Renders a four character code, falling back to hex when it is not printable.
pub(crate) fn fourcc(bytes: &[u8]) -> String {
    if !bytes.is_empty() && bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        String::from_utf8_lossy(bytes).trim_end().to_string()
    } else {
        let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        format!("0x{}", hex)
    }
}

pub(crate) fn put<V: Into<Value>>(meta: &mut Metadata, key: &str, value: V) {
    meta.insert(key.to_string(), value.into());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_is_empty() {
        assert!(extract(b"anything", "txt").is_empty());
        assert!(extract(b"anything", "nope").is_empty());
    }

    #[test]
    fn custom_extractor_replaces_builtin() {
        fn fixed(_: &[u8], ext: &str, meta: &mut Metadata) {
            put(meta, "seen", ext);
        }

        let extractors = Extractors::default().with_extractor(Category::Other, fixed);
        let meta = extractors.extract(&TypeRegistry::default(), b"", "TXT");
        assert_eq!(meta["seen"], "txt");
    }

    #[test]
    fn readers_are_bounds_checked() {
        let data = [0x12, 0x34, 0x56];
        assert_eq!(be_u16(&data, 1), Some(0x3456));
        assert_eq!(le_u16(&data, 0), Some(0x3412));
        assert_eq!(be_u32(&data, 0), None);
        assert_eq!(be_u16(&data, usize::MAX), None);
    }

    #[test]
    fn fourcc_rendering() {
        assert_eq!(fourcc(b"isom"), "isom");
        assert_eq!(fourcc(b"\x00\x01\x00\x00"), "0x00010000");
    }
}
