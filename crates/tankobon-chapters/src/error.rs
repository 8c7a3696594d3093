//! Engine error types.
//!
//! Errors from suspension points (remote fetch, storage writes, file
//! deletion) are delivered once, to the completion channel of the operation
//! that caused them. They never end the long-lived storage or download
//! status streams.

use tankobon_model::{ChapterId, ConfigurationError, MangaId, SourceId};
use thiserror::Error;

/// Opaque error returned by a collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Engine operation error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChaptersError {
    /// The manga's display flags do not decode. A contract violation.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The remote source failed to return a chapter list.
    #[error("failed to fetch chapters of manga {manga} from source {source_id}")]
    Fetch {
        manga: MangaId,
        source_id: SourceId,
        #[source]
        source: BoxError,
    },

    /// Merging the remote list into storage failed.
    #[error("failed to reconcile chapters of manga {manga} with its source")]
    Reconcile {
        manga: MangaId,
        #[source]
        source: BoxError,
    },

    /// A storage write failed.
    #[error("failed to {operation}")]
    Persist {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// Some chapters of a bulk delete could not be removed.
    #[error("failed to delete {} of {total} chapters", .failures.len())]
    Delete {
        total: usize,
        failures: Vec<DeleteFailure>,
    },

    /// The download queue's status stream reported an incidental error.
    ///
    /// Logged by the engine, never handed to the UI.
    #[error("download status stream error")]
    StatusStream(#[source] BoxError),

    /// The session was opened outside a Tokio runtime.
    #[error("no async runtime available")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    /// A background operation panicked or was cancelled.
    #[error("background task failed")]
    Task(#[from] tokio::task::JoinError),
}

/// One chapter a bulk delete could not remove.
#[derive(Debug)]
pub struct DeleteFailure {
    pub chapter: ChapterId,
    pub error: BoxError,
}

impl ChaptersError {
    /// Whether the user can retry the operation that produced this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_) | Self::Runtime(_))
    }

    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Configuration(_) => {
                "The chapter display settings of this manga are corrupt.".to_string()
            }
            Self::Fetch { .. } => "Could not load the chapter list from the source.".to_string(),
            Self::Reconcile { .. } => {
                "The chapter list was loaded but could not be saved.".to_string()
            }
            Self::Persist { operation, .. } => format!("Could not {operation}."),
            Self::Delete { total, failures } => {
                format!("Could not delete {} of {} chapters.", failures.len(), total)
            }
            Self::StatusStream(_) => "The download queue stopped reporting progress.".to_string(),
            Self::Runtime(_) | Self::Task(_) => "An internal error occurred.".to_string(),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ChaptersError>;
