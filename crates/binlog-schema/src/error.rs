//! Error types for schema loading.

use std::path::PathBuf;

/// Failure to load a schema source.
///
/// Only I/O problems are errors. DDL the extractor cannot match is skipped
/// and an empty or table-less source loads as an empty registry.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The schema file could not be opened
    #[error("Failed to open schema file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The schema source could not be read
    #[error("Failed to read schema source: {0}")]
    Read(#[from] std::io::Error),
}
