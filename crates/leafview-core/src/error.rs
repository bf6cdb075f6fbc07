//! Error type shared by every collaborator the engine talks to.

use thiserror::Error;

/// Failure reported by a page, text or narration collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("backend error ({code}): {message}")]
    Status { code: u16, message: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("narration backend is not ready")]
    NotReady,

    /// The user dismissed a save prompt. Not an error from the reader's point of view.
    #[error("save cancelled")]
    Cancelled,

    #[error("page index {index} out of range (total: {total})")]
    OutOfRange { index: usize, total: usize },
}

impl BackendError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackendError::Cancelled)
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
