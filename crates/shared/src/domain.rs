use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one tracked file. Assigned at intake, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle position of a file. `Error` is a defined terminal state that the
/// simulated engine never enters; a real ingestion backend reports through it.
///
/// `Ord` follows declaration order, which is also pipeline order. Status
/// sorting in the view relies on this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Uploading,
    Uploaded,
    Processing,
    Processed,
    Error,
}

impl FileStatus {
    /// True while a phase owns the record. In-flight records cannot be
    /// deleted and their progress field is live.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Uploading | Self::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a file picker hands to `intake`: metadata only, never content bytes.
/// Size is a `u64`, so the non-negative constraint holds by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFileInput {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

/// One file tracked by the lifecycle engine.
///
/// `progress` is an integer percentage in `[0, 100]`. It is only meaningful
/// while `status.is_in_flight()`; a completed phase leaves it at 100 and the
/// next phase resets it to 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: FileStatus,
    pub progress: u8,
}

impl FileRecord {
    pub fn new(input: RawFileInput) -> Self {
        Self {
            id: FileId::new(),
            name: input.name,
            size_bytes: input.size_bytes,
            mime_type: input.mime_type,
            uploaded_at: Utc::now(),
            status: FileStatus::Uploading,
            progress: 0,
        }
    }
}
