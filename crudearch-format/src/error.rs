use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid archive format: {reason}")]
    InvalidFormat { reason: String },

    #[error("{0} not found")]
    NotFound(NotFound),

    #[error("Entry `{name}` is not valid {encoding} text")]
    Decode {
        name: String,
        encoding: &'static str,
    },

    #[error("Optional capability `{0}` is not installed")]
    MissingOptionalCapability(&'static str),

    #[error("Model id `{model_id}` is already owned by `{existing}`, cannot add `{incoming}`")]
    ModelIdConflict {
        model_id: String,
        existing: String,
        incoming: String,
    },

    #[error("Range {start}..{end} is out of bounds for `{name}` ({len} characters)")]
    InvalidRange {
        name: String,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("No archive path has been set")]
    NoPath,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_format<S: Into<String>>(reason: S) -> Error {
        Error::InvalidFormat {
            reason: reason.into(),
        }
    }
}

/// The thing that a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Entry(String),
    Model(String),
    LodLevel { model_id: String, level: u32 },
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFound::Entry(name) => write!(f, "Entry `{}`", name),
            NotFound::Model(id) => write!(f, "Model `{}`", id),
            NotFound::LodLevel { model_id, level } => {
                write!(f, "LOD level {} of model `{}`", level, model_id)
            }
        }
    }
}

/// A rejection raised by the validation pipeline before anything is stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unsupported file type: `{extension}`")]
    UnsupportedType { extension: String },

    #[error("File type `{extension}` is restricted")]
    RestrictedType { extension: String },

    #[error("File of {size} bytes exceeds the {limit} byte limit for `{extension}`")]
    OversizeFile {
        extension: String,
        size: u64,
        limit: u64,
    },

    #[error("Content does not match the `{extension}` signature")]
    SignatureMismatch { extension: String },
}

impl ValidationError {
    /// Short name of the validation step that failed.
    pub fn check(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedType { .. } => "type",
            ValidationError::RestrictedType { .. } => "security",
            ValidationError::OversizeFile { .. } => "size",
            ValidationError::SignatureMismatch { .. } => "signature",
        }
    }
}
