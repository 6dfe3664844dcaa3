use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of one transfer (a "file") or deletion entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// Inactive alternative of a multi-replica group.
    NotUsed,
    Submitted,
    Staging,
    /// Held by a WAIT ban; goes back to `Submitted` on unban.
    OnHold,
    /// Held by a WAIT ban while staging; goes back to `Staging` on unban.
    OnHoldStaging,
    Active,
    /// Entry state of a deletion record.
    Delete,
    Finished,
    Failed,
    Canceled,
}

impl FileState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileState::Finished | FileState::Failed | FileState::Canceled)
    }

    /// The state a WAIT ban moves this state into, if any.
    pub fn held(&self) -> Option<FileState> {
        match self {
            FileState::Submitted => Some(FileState::OnHold),
            FileState::Staging => Some(FileState::OnHoldStaging),
            _ => None,
        }
    }

    /// The state an unban releases this state back into, if any.
    pub fn released(&self) -> Option<FileState> {
        match self {
            FileState::OnHold => Some(FileState::Submitted),
            FileState::OnHoldStaging => Some(FileState::Staging),
            _ => None,
        }
    }
}

/// One transfer of one file between two storage endpoints.
///
/// `file_index` groups alternatives for the same logical transfer;
/// `hashed_id` is the balancing key shared by transfers that must be
/// dispatched together. Serialized field names are contractual with the
/// transfer-execution agents and must not be renamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub file_id: u64,
    pub job_id: String,
    pub file_index: i32,
    pub file_state: FileState,
    pub source_surl: String,
    pub dest_surl: String,
    pub source_se: String,
    pub dest_se: String,
    pub hashed_id: u16,
    pub checksum: Option<String>,
    pub user_filesize: i64,
    pub selection_strategy: Option<String>,
    pub activity: String,
    pub file_metadata: Option<Value>,
    pub wait_timestamp: Option<DateTime<Utc>>,
    pub wait_timeout: Option<i64>,
    pub finish_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// One namespace deletion. Source-only analogue of [`Transfer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deletion {
    pub file_id: u64,
    pub job_id: String,
    pub file_index: i32,
    pub file_state: FileState,
    pub source_surl: String,
    pub source_se: String,
    pub hashed_id: u16,
    pub file_metadata: Option<Value>,
    pub wait_timestamp: Option<DateTime<Utc>>,
    pub wait_timeout: Option<i64>,
    pub finish_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}
