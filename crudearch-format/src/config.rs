use crate::compression::CompressionConfig;
use crate::registry::TypeRegistry;

pub const DEFAULT_LOD_LEVELS: u32 = 3;

/// Settings fixed for the lifetime of an [`Archive`](crate::Archive).
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub registry: TypeRegistry,
    pub lod_compression: CompressionConfig,
    pub default_lod_levels: u32,
    pub include_textures: bool,
    /// Drop a model's LOD/animation/material record when its entry is removed.
    pub cascade_model_delete: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            registry: TypeRegistry::default(),
            lod_compression: CompressionConfig::default(),
            default_lod_levels: DEFAULT_LOD_LEVELS,
            include_textures: true,
            cascade_model_delete: true,
        }
    }
}

impl ArchiveConfig {
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_lod_compression(mut self, compression: CompressionConfig) -> Self {
        self.lod_compression = compression;
        self
    }

    pub fn with_default_lod_levels(mut self, levels: u32) -> Self {
        self.default_lod_levels = levels;
        self
    }

    pub fn with_include_textures(mut self, include: bool) -> Self {
        self.include_textures = include;
        self
    }

    pub fn with_cascade_model_delete(mut self, cascade: bool) -> Self {
        self.cascade_model_delete = cascade;
        self
    }
}
