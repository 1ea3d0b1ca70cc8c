//! Error taxonomy. Every variant is fatal for a run.

use std::path::PathBuf;

use thiserror::Error;

use crate::keys::CanonicalKey;
use crate::model::Color;

#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Cannot canonicalize node at {location}: no name, scale, predicate or priority")]
    Identity { location: String },

    #[error("Palette of {slot_count} slots needs a {side}x{side} texture, maximum side is {max_side}")]
    Capacity {
        slot_count: usize,
        side: usize,
        max_side: usize,
    },

    #[error("Key collision on {key} in document {document}: expected {expected}, found {}", describe(.actual))]
    Collision {
        key: CanonicalKey,
        document: usize,
        expected: Color,
        actual: Option<Color>,
    },

    #[error("Duplicate structural key {key} in document {document}")]
    DuplicateKey { key: CanonicalKey, document: usize },

    #[error("Coordinates for {key} in document {document} have no extracted color")]
    Unmapped { key: CanonicalKey, document: usize },

    #[error("Output {} would be written twice: as {first} and as {second}", path.display())]
    OutputClash {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image codec error: {0}")]
    Image(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PaletteError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn describe(color: &Option<Color>) -> String {
    match color {
        Some(c) => c.to_string(),
        None => "nothing".to_string(),
    }
}

impl From<png::EncodingError> for PaletteError {
    fn from(e: png::EncodingError) -> Self {
        Self::Image(e.to_string())
    }
}

impl From<png::DecodingError> for PaletteError {
    fn from(e: png::DecodingError) -> Self {
        Self::Image(e.to_string())
    }
}
