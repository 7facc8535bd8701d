use quill_core::Error as CoreError;
use serde_json::Error as JsonError;
use std::io;
use std::path::PathBuf;
use std::result::Result as StdResult;
use thiserror::Error;

/// Result type for composition-root operations.
pub type Result<T> = StdResult<T, RoutingError>;

/// Failures while assembling or persisting the generation pipeline.
///
/// Generation itself never fails; these errors only surface when loading
/// configuration, opening stores or persisting state.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Error raised by a core component.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Filesystem operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// State could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),

    /// The key-value store at this path is unusable.
    #[error("Store error ({path}): {message}")]
    Store {
        /// Backing file of the store
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RoutingError {
    /// Builds a store error for the given path.
    pub fn store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Store {
            path: path.into(),
            message: message.into(),
        }
    }
}
