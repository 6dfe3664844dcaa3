use chrono::{DateTime, Utc};

use crate::domain::ban::BanRecord;
use crate::domain::job::{Job, JobState};
use crate::domain::transfer::{Deletion, FileState, Transfer};
use crate::error::Result;

/// The persistence seam of the core. In production this is backed by
/// the relational store shared by every worker; the in-process
/// reference implementation is [`crate::persistence::memory::MemoryStore`].
///
/// `transaction` runs a closure against a transactional view: either
/// every mutation the closure performed lands, or none of it does.
/// The admission ban-filter check and every ban/unban cascade run as
/// exactly one such transaction.
pub trait JobStore {
    type Tx: StoreTx;

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T>;
}

/// The operations a transaction exposes. Queries return owned
/// snapshots; mutations address entities by id.
pub trait StoreTx {
    /// Persists a job with its transfers or deletions, assigning
    /// `file_id`s monotonically. Returns the assigned ids.
    fn insert_job(&mut self, job: Job, transfers: Vec<Transfer>, deletions: Vec<Deletion>) -> Result<Vec<u64>>;

    fn job(&self, job_id: &str) -> Result<Option<Job>>;

    fn non_terminal_jobs_owned_by(&self, user_dn: &str) -> Result<Vec<Job>>;

    fn update_job_state(&mut self, job_id: &str, state: JobState, reason: Option<String>, finish_time: Option<DateTime<Utc>>)
    -> Result<()>;

    /// Non-terminal transfers whose source or destination endpoint is
    /// `storage`, restricted to jobs of `vo` when scoped.
    fn non_terminal_transfers_touching(&self, storage: &str, vo: Option<&str>) -> Result<Vec<Transfer>>;

    /// Non-terminal deletions whose source endpoint is `storage`,
    /// restricted to jobs of `vo` when scoped.
    fn non_terminal_deletions_touching(&self, storage: &str, vo: Option<&str>) -> Result<Vec<Deletion>>;

    fn non_terminal_transfers_owned_by(&self, user_dn: &str) -> Result<Vec<Transfer>>;

    fn non_terminal_deletions_owned_by(&self, user_dn: &str) -> Result<Vec<Deletion>>;

    fn transfers_of_job(&self, job_id: &str) -> Result<Vec<Transfer>>;

    fn deletions_of_job(&self, job_id: &str) -> Result<Vec<Deletion>>;

    fn update_transfer_state(&mut self, file_id: u64, state: FileState, reason: Option<String>, finish_time: Option<DateTime<Utc>>)
    -> Result<()>;

    fn update_deletion_state(&mut self, file_id: u64, state: FileState, reason: Option<String>, finish_time: Option<DateTime<Utc>>)
    -> Result<()>;

    /// Stamps or clears the wait window of one transfer.
    fn set_transfer_wait(&mut self, file_id: u64, wait_timestamp: Option<DateTime<Utc>>, wait_timeout: Option<i64>) -> Result<()>;

    /// Inserts a ban record, replacing any existing record for the same
    /// (target, vo) pair.
    fn upsert_ban(&mut self, record: BanRecord) -> Result<()>;

    /// Removes the ban records for a target, all of them or only the
    /// VO-scoped one. Returns how many were removed.
    fn remove_ban(&mut self, target: &str, vo: Option<&str>) -> Result<usize>;

    /// Every ban record on a target (global and VO-scoped).
    fn bans_for(&self, target: &str) -> Result<Vec<BanRecord>>;
}
