use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a job. A job mirrors the aggregate of its transfers
/// (or deletions): it enters in `Submitted`, `Staging` or `Delete` and
/// only reaches `Canceled` once every entry under it is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Submitted,
    Staging,
    Delete,
    Active,
    Finished,
    Failed,
    Canceled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed | JobState::Canceled)
    }
}

/// How the transfers of a job are grouped for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Independent transfers, each dispatched on its own.
    Regular,
    /// All transfers run within one continuous worker session.
    Reuse,
    /// An ordered chain of hops from ultimate source to ultimate destination.
    Multihop,
    /// One logical file with several candidate sources, one active at a time.
    MultiReplica,
    /// Namespace deletions only, no transfers.
    Deletion,
}

/// Checksum verification mode of a job.
///
/// `Relaxed` is set when the caller did not ask for verification but at
/// least one file carries a checksum anyway; execution agents compare
/// against it opportunistically instead of ignoring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumMode {
    None,
    Relaxed,
    Strict,
}

/// A persisted job record. Serialized field names are contractual with
/// the transfer-execution agents and must not be renamed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub job_state: JobState,
    pub job_type: JobType,
    pub vo_name: String,
    pub user_dn: String,
    pub cred_id: String,
    pub priority: i32,
    pub source_se: Option<String>,
    pub dest_se: Option<String>,
    pub submit_time: DateTime<Utc>,
    pub finish_time: Option<DateTime<Utc>>,
    pub retry: i32,
    pub checksum_method: ChecksumMode,
    pub bring_online: i64,
    pub copy_pin_lifetime: i64,
    pub overwrite_flag: bool,
    pub job_metadata: Option<Value>,
    pub reason: Option<String>,
}
