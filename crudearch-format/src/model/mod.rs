//! Per-model LOD, animation and material records stored beside the file entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compression::{decompress_tagged, CompressionConfig};
use crate::error::{Error, NotFound, Result};

pub(crate) mod lod;
pub(crate) mod scan;

pub use self::scan::MaterialMap;

/// Derives the record key for an entry name: every `.` becomes `_`.
pub fn model_id(name: &str) -> String {
    name.replace('.', "_")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationDescriptor {
    pub name: String,
    #[serde(default)]
    pub frame_count: u32,
    #[serde(default)]
    pub tracks: Vec<String>,
}

impl AnimationDescriptor {
    pub fn new<S: Into<String>>(name: S, frame_count: u32) -> AnimationDescriptor {
        AnimationDescriptor {
            name: name.into(),
            frame_count,
            tracks: Vec::new(),
        }
    }

    pub fn with_track<S: Into<String>>(mut self, track: S) -> Self {
        self.tracks.push(track.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelRecord {
    /// Compressed blobs keyed by level.
    pub lod: BTreeMap<u32, Vec<u8>>,
    pub animations: Vec<AnimationDescriptor>,
    pub materials: MaterialMap,
}

impl ModelRecord {
    pub fn lod_levels(&self) -> impl Iterator<Item = u32> + '_ {
        self.lod.keys().copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelLayer {
    compression: CompressionConfig,
    records: BTreeMap<String, ModelRecord>,
}

impl ModelLayer {
    pub fn new(compression: CompressionConfig) -> ModelLayer {
        ModelLayer {
            compression,
            records: BTreeMap::new(),
        }
    }

    /// Generates `lod_levels` compressed levels and scans animations and materials,
    /// replacing any previous record for the same model id.
    pub fn add_model(
        &mut self,
        name: &str,
        data: &[u8],
        extension: &str,
        lod_levels: u32,
        include_textures: bool,
    ) -> Result<&ModelRecord> {
        let id = model_id(name);

        let lod = lod::generate(data, extension, lod_levels, include_textures, &self.compression)?
            .into_iter()
            .enumerate()
            .map(|(level, blob)| (level as u32, blob))
            .collect();

        let record = ModelRecord {
            lod,
            animations: scan::animations(data, extension),
            materials: scan::materials(data, extension, include_textures),
        };

        debug!(
            model_id = %id,
            levels = lod_levels,
            animations = record.animations.len(),
            materials = record.materials.len(),
            "stored model record"
        );

        self.records.insert(id.clone(), record);
        self.get(&id).ok_or_else(|| Error::NotFound(NotFound::Model(id)))
    }

    /// Returns the decompressed blob for `level`.
    pub fn get_model_lod(&self, name: &str, level: u32) -> Result<Vec<u8>> {
        let id = model_id(name);
        let record = self
            .records
            .get(&id)
            .ok_or_else(|| Error::NotFound(NotFound::Model(id.clone())))?;
        let blob = record.lod.get(&level).ok_or(Error::NotFound(NotFound::LodLevel {
            model_id: id.clone(),
            level,
        }))?;

        decompress_tagged(blob).map_err(|e| {
            Error::invalid_format(format!("LOD {} of `{}` is corrupt: {}", level, id, e))
        })
    }

    /// Appends an animation, creating an empty record for an unknown model.
    pub fn update_model_animation(&mut self, name: &str, descriptor: AnimationDescriptor) {
        let id = model_id(name);
        debug!(model_id = %id, animation = %descriptor.name, "appending animation");
        self.records.entry(id).or_default().animations.push(descriptor);
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelRecord> {
        self.records.get(model_id)
    }

    pub fn record_for(&self, name: &str) -> Option<&ModelRecord> {
        self.get(&model_id(name))
    }

    pub(crate) fn insert(&mut self, model_id: String, record: ModelRecord) {
        self.records.insert(model_id, record);
    }

    pub fn remove(&mut self, name: &str) -> Option<ModelRecord> {
        self.records.remove(&model_id(name))
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.records.contains_key(model_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn compression(&self) -> &CompressionConfig {
        &self.compression
    }
}
