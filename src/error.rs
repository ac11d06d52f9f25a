use thiserror::Error;

use crate::domain::ActivityKey;
use crate::pipeline::fingerprint::Fingerprint;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Can't find external database {0}")]
    UnknownDatabase(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not all datasets in database to be linked have `database` and `code` attributes (candidate #{index} lacks `{missing}`)")]
    MissingIdentifier { index: usize, missing: &'static str },

    #[error("Not each object in database to be linked is unique with given fields: {first} and {second} share fingerprint {fingerprint}")]
    Ambiguous {
        fingerprint: Fingerprint,
        first: ActivityKey,
        second: ActivityKey,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse classification of [`ImportError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Schema,
    Ambiguity,
    Io,
    Serialization,
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::UnknownDatabase(_) | ImportError::Config(_) => ErrorKind::Configuration,
            ImportError::MissingIdentifier { .. } => ErrorKind::Schema,
            ImportError::Ambiguous { .. } => ErrorKind::Ambiguity,
            ImportError::Io(_) => ErrorKind::Io,
            ImportError::Json(_) | ImportError::Toml(_) => ErrorKind::Serialization,
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
