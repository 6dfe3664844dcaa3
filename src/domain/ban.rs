use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a ban does to the work touching its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BanStatus {
    /// Cancel everything touching the target and reject new submissions.
    Cancel,
    /// Hold queued work; new submissions are stamped with a wait timeout.
    Wait,
    /// Like `Wait`, but new submissions are admitted directly on hold.
    WaitAs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanTargetKind {
    Storage,
    User,
}

/// An operator ban on a storage endpoint or a user DN, optionally
/// scoped to one VO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
    pub target: String,
    pub target_kind: BanTargetKind,
    pub vo: Option<String>,
    pub status: BanStatus,
    pub wait_timeout: Option<i64>,
    pub admin_dn: String,
    pub message: String,
    pub addition_time: DateTime<Utc>,
}

impl BanRecord {
    /// Whether this ban applies to work scoped under `vo`. A ban
    /// without a VO is global.
    pub fn applies_to_vo(&self, vo: &str) -> bool {
        match &self.vo {
            Some(scoped) => scoped == vo,
            None => true,
        }
    }
}
