use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{FileId, FileStatus};

/// Recoverable failures of the lifecycle engine's mutating operations.
/// None of these are fatal; callers decide whether to retry or surface them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error("record {id} cannot begin processing from status '{status}'")]
    InvalidTransition { id: FileId, status: FileStatus },
    #[error("record {id} is mid-phase ('{status}') and cannot be deleted")]
    RecordBusy { id: FileId, status: FileStatus },
    #[error("no record with id {id}")]
    NotFound { id: FileId },
}
