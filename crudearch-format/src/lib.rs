//! Reader and writer for `.crudearch` containers: a typed media archive that validates
//! every entry on the way in, sniffs header metadata, and keeps level-of-detail, animation
//! and material records for 3D models.

mod archive;
pub mod capability;
mod codec;
pub mod compression;
mod config;
mod error;
pub mod extract;
mod header;
pub mod model;
pub mod registry;
mod text;
pub mod validate;

pub use archive::{Archive, ArchiveEntry, FALLBACK_TYPE};
pub use capability::{ArrayDecoder, Capabilities, CoverArtExtractor, DecodedArray, PreviewRenderer};
pub use compression::{Compression, CompressionConfig};
pub use config::{ArchiveConfig, DEFAULT_LOD_LEVELS};
pub use error::{Error, NotFound, Result, ValidationError};
pub use extract::{Extractors, Metadata};
pub use header::MAGIC_HEADER;
pub use model::{model_id, AnimationDescriptor, MaterialMap, ModelLayer, ModelRecord};
pub use registry::{Category, TypeDescriptor, TypeRegistry, TypeRegistryBuilder};
pub use text::TextEncoding;
pub use validate::FormatValidator;
