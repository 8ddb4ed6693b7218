//! Entity documents: entity descriptors as a JSON array.

use std::fs;
use std::path::{Path, PathBuf};

use oxide_sync_core::entity::EntityDescriptor;

/// Errors loading an entity document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("Cannot read {path}: {source}")]
    Io {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not a valid entity document.
    #[error("Invalid entity document {path}: {source}")]
    Json {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Parses entity descriptors from JSON text.
///
/// # Errors
///
/// Fails when the text is not a JSON array of entity descriptors.
pub fn parse_entities(json: &str) -> Result<Vec<EntityDescriptor>, serde_json::Error> {
    serde_json::from_str(json)
}

/// Loads entity descriptors from a JSON file.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed.
pub fn load_entities(path: &Path) -> Result<Vec<EntityDescriptor>, DocumentError> {
    let text = fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_entities(&text).map_err(|source| DocumentError::Json {
        path: path.to_path_buf(),
        source,
    })
}
