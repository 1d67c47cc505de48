use thiserror::Error;

use crate::registry::OperationKind;
use crate::tracker::JobId;

/// Failure reported by the job service collaborator.
///
/// The tracker treats this as opaque and only carries it upward.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
    pub status_code: Option<u16>,
}

impl ServiceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Unknown operation kind: {0}")]
    UnknownOperationKind(String),

    #[error("Operation {0} targets a single job and needs a job id")]
    MissingJobId(OperationKind),

    #[error("Operation {0} targets the job collection and takes no job id")]
    UnexpectedJobId(OperationKind),

    #[error("Cannot {requested} job {job_id} while {blocking} is pending")]
    ConflictingOperation {
        job_id: JobId,
        requested: OperationKind,
        blocking: OperationKind,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] ServiceError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Optimistic apply is only allowed for idempotent operations, {0} is not")]
    NotIdempotent(OperationKind),

    #[error("Coordinator shut down before the operation settled")]
    Shutdown,
}

impl TrackerError {
    /// Conflicts are expected and the caller may retry once the blocking
    /// operation settles.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::ConflictingOperation { .. } | TrackerError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
