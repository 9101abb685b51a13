use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::capability::{Capabilities, DecodedArray};
use crate::codec;
use crate::config::ArchiveConfig;
use crate::error::{Error, NotFound, Result, ValidationError};
use crate::extract::{Extractors, Metadata};
use crate::model::{model_id, AnimationDescriptor, MaterialMap, ModelLayer, ModelRecord};
use crate::registry::{extension_of, normalize_extension, TypeRegistry, DEFAULT_MIME};
use crate::text::TextEncoding;
use crate::validate::FormatValidator;

/// Type tag given to names without an extension.
pub const FALLBACK_TYPE: &str = "bin";

/// One named file held by an [`Archive`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub name: String,
    /// Normalised extension the entry was validated as.
    pub kind: String,
    pub data: Vec<u8>,
    /// Sniffed from `data`; rebuilt on load rather than stored.
    pub metadata: Metadata,
}

impl ArchiveEntry {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// An in-memory `.crudearch` container.
///
/// Every entry is held fully in memory. Mutation goes through `&mut self`, so an archive has a
/// single owner at a time; share it across threads behind a lock if needed.
#[derive(Debug)]
pub struct Archive {
    path: Option<PathBuf>,
    config: ArchiveConfig,
    extractors: Extractors,
    capabilities: Capabilities,
    entries: Vec<ArchiveEntry>,
    models: ModelLayer,
}

impl Default for Archive {
    fn default() -> Self {
        Archive::new(ArchiveConfig::default())
    }
}

impl Archive {
    pub fn new(config: ArchiveConfig) -> Archive {
        Archive {
            path: None,
            models: ModelLayer::new(config.lod_compression.clone()),
            config,
            extractors: Extractors::default(),
            capabilities: Capabilities::default(),
            entries: Vec::new(),
        }
    }

    /// Writes an empty archive to `path`, failing if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Archive> {
        Archive::create_with_config(path, ArchiveConfig::default())
    }

    pub fn create_with_config<P: AsRef<Path>>(path: P, config: ArchiveConfig) -> Result<Archive> {
        let path = path.as_ref();
        if path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("`{}` already exists", path.display()),
            )));
        }

        let mut archive = Archive::new(config);
        archive.save_as(path)?;
        Ok(archive)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Archive> {
        Archive::open_with_config(path, ArchiveConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: ArchiveConfig) -> Result<Archive> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let mut archive = Archive::from_bytes(&data, config)?;
        archive.path = Some(path.to_path_buf());
        Ok(archive)
    }

    /// Parses a container and re-validates every entry against the configured registry.
    pub fn from_bytes(data: &[u8], config: ArchiveConfig) -> Result<Archive> {
        let container = codec::decode(data)?;
        let mut archive = Archive::new(config);

        for file in container.files {
            archive.add_file(&file.name, file.data, Some(&file.kind))?;
        }
        for (id, record) in container.models {
            archive.models.insert(id, record);
        }

        debug!(
            entries = archive.entries.len(),
            models = archive.models.len(),
            "loaded archive"
        );
        Ok(archive)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        codec::encode(
            self.entries
                .iter()
                .map(|e| (e.name.as_str(), e.kind.as_str(), e.data.as_slice())),
            self.models.iter(),
        )
    }

    pub fn with_extractors(mut self, extractors: Extractors) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.config.registry
    }

    pub fn models(&self) -> &ModelLayer {
        &self.models
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path<P: Into<PathBuf>>(&mut self, path: P) {
        self.path = Some(path.into());
    }

    pub fn save(&self) -> Result<()> {
        let path = self.path.as_deref().ok_or(Error::NoPath)?;
        write_atomic(path, &self.to_bytes()?)
    }

    /// Saves to `path` and makes it the archive's path.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        write_atomic(path, &self.to_bytes()?)?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    // ========================================================================
    // Entries
    // ========================================================================

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    fn entry(&self, name: &str) -> Result<&ArchiveEntry> {
        self.get_file_info(name)
            .ok_or_else(|| Error::NotFound(NotFound::Entry(name.to_string())))
    }

    fn resolve_type(name: &str, kind: Option<&str>) -> String {
        kind.map(normalize_extension)
            .or_else(|| extension_of(name))
            .unwrap_or_else(|| FALLBACK_TYPE.to_string())
    }

    /// Validates and stores `data`, replacing an entry of the same name in place.
    ///
    /// The type is taken from `kind` when given, otherwise from the name's extension.
    /// Nothing is changed when validation fails.
    pub fn add_file<D: Into<Vec<u8>>>(
        &mut self,
        name: &str,
        data: D,
        kind: Option<&str>,
    ) -> Result<&ArchiveEntry> {
        let data = data.into();
        let kind = Archive::resolve_type(name, kind);

        FormatValidator::new(&self.config.registry).validate(&data, &kind)?;
        self.check_model_id(name, &kind)?;
        let metadata = self.extractors.extract(&self.config.registry, &data, &kind);

        let entry = ArchiveEntry {
            name: name.to_string(),
            kind,
            data,
            metadata,
        };
        Ok(self.insert_entry(entry))
    }

    fn is_model_kind(&self, kind: &str) -> bool {
        self.config
            .registry
            .category_for(kind)
            .is_some_and(|c| c.is_model())
    }

    /// Fails when another entry derives the same model id and either side is a model or a
    /// record already exists under that id.
    fn check_model_id(&self, name: &str, kind: &str) -> Result<()> {
        let id = model_id(name);
        let guarded = self.is_model_kind(kind) || self.models.contains(&id);

        let owner = self.entries.iter().find(|e| {
            e.name != name
                && model_id(&e.name) == id
                && (guarded || self.is_model_kind(&e.kind))
        });

        match owner {
            Some(owner) => Err(Error::ModelIdConflict {
                model_id: id,
                existing: owner.name.clone(),
                incoming: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn insert_entry(&mut self, entry: ArchiveEntry) -> &ArchiveEntry {
        let index = match self.position(&entry.name) {
            Some(index) => {
                debug!(name = %entry.name, kind = %entry.kind, size = entry.len(), "replaced entry");
                self.entries[index] = entry;
                index
            }
            None => {
                debug!(name = %entry.name, kind = %entry.kind, size = entry.len(), "added entry");
                self.entries.push(entry);
                self.entries.len() - 1
            }
        };
        &self.entries[index]
    }

    pub fn add_text_file(
        &mut self,
        name: &str,
        text: &str,
        encoding: TextEncoding,
    ) -> Result<&ArchiveEntry> {
        let data = encoding.encode(text).ok_or_else(|| Error::Decode {
            name: name.to_string(),
            encoding: encoding.label(),
        })?;
        self.add_file(name, data, None)
    }

    pub fn get_file(&self, name: &str) -> Option<&[u8]> {
        self.get_file_info(name).map(|e| e.data.as_slice())
    }

    pub fn get_file_info(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Removes an entry and, when cascading is enabled, the model record derived from it.
    /// A record still derived from a remaining entry is kept.
    pub fn remove_file(&mut self, name: &str) -> Result<ArchiveEntry> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::NotFound(NotFound::Entry(name.to_string())))?;
        let entry = self.entries.remove(index);

        let id = model_id(name);
        let still_owned = self.entries.iter().any(|e| model_id(&e.name) == id);
        let cascaded = self.config.cascade_model_delete
            && !still_owned
            && self.models.remove(name).is_some();
        debug!(name, cascaded, "removed entry");
        Ok(entry)
    }

    /// Entry names in insertion order.
    pub fn list_files(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get_file_as_text(&self, name: &str, encoding: TextEncoding) -> Result<String> {
        let entry = self.entry(name)?;
        encoding.decode(&entry.data).ok_or_else(|| Error::Decode {
            name: name.to_string(),
            encoding: encoding.label(),
        })
    }

    /// MIME type of a stored entry, or of the name's extension when it is not stored.
    pub fn mime_type_for(&self, name: &str) -> &str {
        let kind = match self.get_file_info(name) {
            Some(entry) => entry.kind.clone(),
            None => match extension_of(name) {
                Some(ext) => ext,
                None => return DEFAULT_MIME,
            },
        };
        self.config.registry.mime_for(&kind)
    }

    // ========================================================================
    // Text editing
    // ========================================================================

    /// Decodes an entry as UTF-8, applies `edit` to its characters and stores the result
    /// through the normal validation path.
    fn edit_text<T, F>(&mut self, name: &str, edit: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<char>) -> Result<T>,
    {
        let kind = self.entry(name)?.kind.clone();
        let mut chars: Vec<char> = self.get_file_as_text(name, TextEncoding::Utf8)?.chars().collect();

        let out = edit(&mut chars)?;

        let text: String = chars.into_iter().collect();
        self.add_file(name, text.into_bytes(), Some(&kind))?;
        Ok(out)
    }

    pub fn insert_text(&mut self, name: &str, position: usize, text: &str) -> Result<()> {
        self.edit_text(name, |chars| {
            check_range(name, position, position, chars.len())?;
            chars.splice(position..position, text.chars());
            Ok(())
        })
    }

    pub fn append_text(&mut self, name: &str, text: &str) -> Result<()> {
        self.edit_text(name, |chars| {
            chars.extend(text.chars());
            Ok(())
        })
    }

    pub fn prepend_text(&mut self, name: &str, text: &str) -> Result<()> {
        self.insert_text(name, 0, text)
    }

    /// Replaces up to `max_count` occurrences (all when `None`) and returns how many were
    /// replaced. An empty pattern replaces nothing.
    pub fn replace_text(
        &mut self,
        name: &str,
        from: &str,
        to: &str,
        max_count: Option<usize>,
    ) -> Result<usize> {
        self.edit_text(name, |chars| {
            if from.is_empty() {
                return Ok(0);
            }
            let text: String = chars.iter().collect();
            let limit = max_count.unwrap_or(usize::MAX);

            let mut out = String::with_capacity(text.len());
            let mut last = 0;
            let mut count = 0;
            for (index, matched) in text.match_indices(from).take(limit) {
                out.push_str(&text[last..index]);
                out.push_str(to);
                last = index + matched.len();
                count += 1;
            }
            out.push_str(&text[last..]);

            *chars = out.chars().collect();
            Ok(count)
        })
    }

    /// Inserts a copy of characters `start..end` at `dest`.
    pub fn copy_block(&mut self, name: &str, start: usize, end: usize, dest: usize) -> Result<()> {
        self.edit_text(name, |chars| {
            check_range(name, start, end, chars.len())?;
            check_range(name, dest, dest, chars.len())?;
            let block = chars[start..end].to_vec();
            chars.splice(dest..dest, block);
            Ok(())
        })
    }

    /// Moves characters `start..end` to `dest`, where `dest` is a position in the text
    /// before the move.
    pub fn move_block(&mut self, name: &str, start: usize, end: usize, dest: usize) -> Result<()> {
        self.edit_text(name, |chars| {
            check_range(name, start, end, chars.len())?;
            check_range(name, dest, dest, chars.len())?;
            let block: Vec<char> = chars.drain(start..end).collect();
            let dest = if dest >= end {
                dest - block.len()
            } else if dest > start {
                start
            } else {
                dest
            };
            chars.splice(dest..dest, block);
            Ok(())
        })
    }

    // ========================================================================
    // Models
    // ========================================================================

    /// Stores a model entry and generates its LOD, animation and material record.
    pub fn add_model<D: Into<Vec<u8>>>(
        &mut self,
        name: &str,
        data: D,
        lod_levels: u32,
        include_textures: bool,
    ) -> Result<&ModelRecord> {
        let data = data.into();
        let kind = Archive::resolve_type(name, None);

        FormatValidator::new(&self.config.registry).validate(&data, &kind)?;
        if !self.is_model_kind(&kind) {
            return Err(ValidationError::UnsupportedType { extension: kind }.into());
        }
        self.check_model_id(name, &kind)?;
        let id = model_id(name);

        self.models
            .add_model(name, &data, &kind, lod_levels, include_textures)?;

        let metadata = self.extractors.extract(&self.config.registry, &data, &kind);
        self.insert_entry(ArchiveEntry {
            name: name.to_string(),
            kind,
            data,
            metadata,
        });

        self.models
            .get(&id)
            .ok_or(Error::NotFound(NotFound::Model(id)))
    }

    /// Like [`Archive::add_model`] with the configured level count and texture setting.
    pub fn add_model_with_defaults<D: Into<Vec<u8>>>(
        &mut self,
        name: &str,
        data: D,
    ) -> Result<&ModelRecord> {
        let (levels, textures) = (self.config.default_lod_levels, self.config.include_textures);
        self.add_model(name, data, levels, textures)
    }

    pub fn get_model_lod(&self, name: &str, level: u32) -> Result<Vec<u8>> {
        self.models.get_model_lod(name, level)
    }

    /// Appends an animation to the record derived from `name`, creating it if needed.
    pub fn update_model_animation(
        &mut self,
        name: &str,
        descriptor: AnimationDescriptor,
    ) -> Result<()> {
        self.check_model_id(name, &Archive::resolve_type(name, None))?;
        self.models.update_model_animation(name, descriptor);
        Ok(())
    }

    fn model(&self, name: &str) -> Result<&ModelRecord> {
        self.models
            .record_for(name)
            .ok_or_else(|| Error::NotFound(NotFound::Model(model_id(name))))
    }

    pub fn model_animations(&self, name: &str) -> Result<&[AnimationDescriptor]> {
        Ok(&self.model(name)?.animations)
    }

    pub fn model_materials(&self, name: &str) -> Result<&MaterialMap> {
        Ok(&self.model(name)?.materials)
    }

    pub fn model_lod_levels(&self, name: &str) -> Result<Vec<u32>> {
        Ok(self.model(name)?.lod_levels().collect())
    }

    pub fn model_ids(&self) -> Vec<&str> {
        self.models.ids().collect()
    }

    // ========================================================================
    // Optional capabilities
    // ========================================================================

    pub fn decode_array(&self, name: &str) -> Result<DecodedArray> {
        let decoder = self.capabilities.arrays()?;
        let entry = self.entry(name)?;
        decoder.decode_array(&entry.data, &entry.kind)
    }

    pub fn render_preview(&self, name: &str) -> Result<Vec<u8>> {
        let renderer = self.capabilities.previews()?;
        let entry = self.entry(name)?;
        renderer.render_preview(&entry.data, &entry.kind)
    }

    pub fn cover_art(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let extractor = self.capabilities.cover_art()?;
        let entry = self.entry(name)?;
        extractor.cover_art(&entry.data, &entry.kind)
    }
}

fn check_range(name: &str, start: usize, end: usize, len: usize) -> Result<()> {
    if start > end || end > len {
        return Err(Error::InvalidRange {
            name: name.to_string(),
            start,
            end,
            len,
        });
    }
    Ok(())
}

/// Writes to a temporary file beside `path` and renames it into place.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    debug!(path = %path.display(), bytes = data.len(), "saved archive");
    Ok(())
}
