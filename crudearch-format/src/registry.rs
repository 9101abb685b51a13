//! The catalogue of file types an archive accepts.
//!
//! A [`TypeRegistry`] is built once (usually through [`TypeRegistry::default`]) and is
//! immutable afterwards. Restricted types are listed in the same table with their
//! `restricted` flag set, so that validation can tell "unknown" apart from "forbidden".

use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Fallback ceiling for types without a configured limit: 100 MiB.
pub const DEFAULT_SIZE_LIMIT: u64 = 100 * MIB;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Image,
    Audio,
    Video,
    ModelStatic,
    ModelAnimated,
    Numeric,
    Font,
    Script,
    Other,
}

impl Category {
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Image => "image",
            Category::Audio => "audio",
            Category::Video => "video",
            Category::ModelStatic => "model-static",
            Category::ModelAnimated => "model-animated",
            Category::Numeric => "numeric",
            Category::Font => "font",
            Category::Script => "script",
            Category::Other => "other",
        }
    }

    pub const fn is_model(self) -> bool {
        matches!(self, Category::ModelStatic | Category::ModelAnimated)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Lowercase, without a leading dot.
    pub extension: String,
    pub category: Category,
    pub mime: String,
    /// `None` falls back to the registry's default ceiling.
    pub max_size: Option<u64>,
    pub restricted: bool,
}

impl TypeDescriptor {
    pub fn new<E: AsRef<str>, M: Into<String>>(
        extension: E,
        category: Category,
        mime: M,
        max_size: Option<u64>,
    ) -> TypeDescriptor {
        TypeDescriptor {
            extension: normalize_extension(extension.as_ref()),
            category,
            mime: mime.into(),
            max_size,
            restricted: false,
        }
    }

    pub fn restricted<E: AsRef<str>, M: Into<String>>(extension: E, mime: M) -> TypeDescriptor {
        TypeDescriptor {
            extension: normalize_extension(extension.as_ref()),
            category: Category::Other,
            mime: mime.into(),
            max_size: None,
            restricted: true,
        }
    }
}

/// Lowercases an extension and strips any leading dots.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// Returns the extension of an entry name, if it has one.
pub fn extension_of(name: &str) -> Option<String> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            Some(normalize_extension(ext))
        }
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
    default_limit: u64,
}

#[rustfmt::skip]
const BUILTIN: &[(&str, Category, &str, u64)] = &[
    ("png",    Category::Image, "image/png", 50 * MIB),
    ("jpg",    Category::Image, "image/jpeg", 50 * MIB),
    ("jpeg",   Category::Image, "image/jpeg", 50 * MIB),
    ("gif",    Category::Image, "image/gif", 50 * MIB),
    ("bmp",    Category::Image, "image/bmp", 50 * MIB),
    ("webp",   Category::Image, "image/webp", 50 * MIB),
    ("tif",    Category::Image, "image/tiff", 50 * MIB),
    ("tiff",   Category::Image, "image/tiff", 50 * MIB),

    ("mp3",    Category::Audio, "audio/mpeg", 200 * MIB),
    ("wav",    Category::Audio, "audio/wav", 200 * MIB),
    ("ogg",    Category::Audio, "audio/ogg", 200 * MIB),
    ("flac",   Category::Audio, "audio/flac", 200 * MIB),

    ("mp4",    Category::Video, "video/mp4", GIB),
    ("m4v",    Category::Video, "video/mp4", GIB),
    ("mov",    Category::Video, "video/quicktime", GIB),
    ("avi",    Category::Video, "video/x-msvideo", GIB),
    ("mkv",    Category::Video, "video/x-matroska", GIB),
    ("webm",   Category::Video, "video/webm", GIB),

    ("obj",    Category::ModelStatic, "model/obj", 500 * MIB),
    ("stl",    Category::ModelStatic, "model/stl", 500 * MIB),
    ("ply",    Category::ModelStatic, "application/x-ply", 500 * MIB),
    ("glb",    Category::ModelAnimated, "model/gltf-binary", 500 * MIB),
    ("gltf",   Category::ModelAnimated, "model/gltf+json", 500 * MIB),
    ("fbx",    Category::ModelAnimated, "application/octet-stream", 500 * MIB),
    ("dae",    Category::ModelAnimated, "model/vnd.collada+xml", 500 * MIB),

    ("npy",    Category::Numeric, "application/x-npy", 500 * MIB),
    ("npz",    Category::Numeric, "application/x-npz", 500 * MIB),

    ("ttf",    Category::Font, "font/ttf", 10 * MIB),
    ("otf",    Category::Font, "font/otf", 10 * MIB),
    ("woff",   Category::Font, "font/woff", 10 * MIB),
    ("woff2",  Category::Font, "font/woff2", 10 * MIB),

    ("py",     Category::Script, "text/x-python", 10 * MIB),
    ("lua",    Category::Script, "text/x-lua", 10 * MIB),
    ("js",     Category::Script, "text/javascript", 10 * MIB),

    ("txt",    Category::Other, "text/plain", 10 * MIB),
    ("md",     Category::Other, "text/markdown", 10 * MIB),
    ("csv",    Category::Other, "text/csv", 100 * MIB),
    ("json",   Category::Other, "application/json", 100 * MIB),
    ("xml",    Category::Other, "application/xml", 100 * MIB),
    ("yaml",   Category::Other, "application/yaml", 10 * MIB),
    ("pdf",    Category::Other, "application/pdf", 100 * MIB),
    ("zip",    Category::Other, "application/zip", 500 * MIB),
    ("bin",    Category::Other, DEFAULT_MIME, DEFAULT_SIZE_LIMIT),
];

const RESTRICTED: &[(&str, &str)] = &[
    ("exe", "application/vnd.microsoft.portable-executable"),
    ("dll", "application/vnd.microsoft.portable-executable"),
    ("com", "application/x-msdownload"),
    ("scr", "application/x-msdownload"),
    ("msi", "application/x-msi"),
    ("bat", "application/x-bat"),
    ("cmd", "application/x-bat"),
    ("sh", "application/x-sh"),
    ("php", "application/x-httpd-php"),
    ("vbs", "text/vbscript"),
    ("ps1", "text/plain"),
    ("jar", "application/java-archive"),
];

impl Default for TypeRegistry {
    fn default() -> Self {
        TypeRegistry::builder().build()
    }
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        let mut types = HashMap::with_capacity(BUILTIN.len() + RESTRICTED.len());
        for &(ext, category, mime, limit) in BUILTIN {
            types.insert(
                ext.to_string(),
                TypeDescriptor::new(ext, category, mime, Some(limit)),
            );
        }
        for &(ext, mime) in RESTRICTED {
            types.insert(ext.to_string(), TypeDescriptor::restricted(ext, mime));
        }

        TypeRegistryBuilder {
            types,
            default_limit: DEFAULT_SIZE_LIMIT,
        }
    }

    /// Looks up a type, whether it is restricted or not.
    pub fn descriptor_for(&self, extension: &str) -> Option<&TypeDescriptor> {
        self.types.get(&normalize_extension(extension))
    }

    /// True for known types that may be stored.
    pub fn is_supported(&self, extension: &str) -> bool {
        self.descriptor_for(extension)
            .map(|d| !d.restricted)
            .unwrap_or(false)
    }

    pub fn is_restricted(&self, extension: &str) -> bool {
        self.descriptor_for(extension)
            .map(|d| d.restricted)
            .unwrap_or(false)
    }

    pub fn mime_for(&self, extension: &str) -> &str {
        self.descriptor_for(extension)
            .map(|d| d.mime.as_str())
            .unwrap_or(DEFAULT_MIME)
    }

    pub fn category_for(&self, extension: &str) -> Option<Category> {
        self.descriptor_for(extension).map(|d| d.category)
    }

    pub fn size_limit(&self, extension: &str) -> u64 {
        self.descriptor_for(extension)
            .and_then(|d| d.max_size)
            .unwrap_or(self.default_limit)
    }

    pub fn default_limit(&self) -> u64 {
        self.default_limit
    }

    /// Storable extensions, sorted.
    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut out = self
            .types
            .values()
            .filter(|d| !d.restricted)
            .map(|d| d.extension.as_str())
            .collect::<Vec<_>>();
        out.sort_unstable();
        out
    }
}

#[derive(Debug, Clone)]
pub struct TypeRegistryBuilder {
    types: HashMap<String, TypeDescriptor>,
    default_limit: u64,
}

impl TypeRegistryBuilder {
    pub fn default_limit(mut self, bytes: u64) -> Self {
        self.default_limit = bytes;
        self
    }

    /// Overrides the limit of a known type. Unknown extensions are ignored.
    pub fn size_limit(mut self, extension: &str, bytes: u64) -> Self {
        if let Some(d) = self.types.get_mut(&normalize_extension(extension)) {
            d.max_size = Some(bytes);
        }
        self
    }

    /// Adds or replaces a type.
    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.types.insert(descriptor.extension.clone(), descriptor);
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            types: self.types,
            default_limit: self.default_limit,
        }
    }
}
