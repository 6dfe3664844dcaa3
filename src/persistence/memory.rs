use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::domain::ban::BanRecord;
use crate::domain::job::{Job, JobState};
use crate::domain::transfer::{Deletion, FileState, Transfer};
use crate::error::{Error, Result};
use crate::persistence::store::{JobStore, StoreTx};

/// Everything the store holds. `BTreeMap` keys keep iteration order
/// deterministic, which the multi-replica promotion tie-break relies
/// on (lowest `file_id` first).
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    jobs: BTreeMap<String, Job>,
    transfers: BTreeMap<u64, Transfer>,
    deletions: BTreeMap<u64, Deletion>,
    bans: Vec<BanRecord>,
    next_file_id: u64,
}

/// In-memory [`JobStore`] with real transaction semantics: each
/// transaction runs against a copy of the state and only a successful
/// closure swaps the copy back in, so a failed cascade leaves nothing
/// behind.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

pub struct MemoryTx {
    state: StoreState,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryStore {
    type Tx = MemoryTx;

    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Tx) -> Result<T>,
    {
        let mut guard = self.state.lock().map_err(|_| Error::dependency("job store mutex poisoned"))?;
        let mut tx = MemoryTx { state: guard.clone() };
        match f(&mut tx) {
            Ok(value) => {
                *guard = tx.state;
                Ok(value)
            }
            Err(e) => {
                log::warn!("Transaction rolled back: {}", e);
                Err(e)
            }
        }
    }
}

impl MemoryTx {
    fn job_vo(&self, job_id: &str) -> Option<String> {
        self.state.jobs.get(job_id).map(|j| j.vo_name.clone())
    }

    fn vo_matches(&self, job_id: &str, vo: Option<&str>) -> bool {
        match vo {
            None => true,
            Some(scoped) => self.job_vo(job_id).as_deref() == Some(scoped),
        }
    }
}

impl StoreTx for MemoryTx {
    fn insert_job(&mut self, job: Job, transfers: Vec<Transfer>, deletions: Vec<Deletion>) -> Result<Vec<u64>> {
        if self.state.jobs.contains_key(&job.job_id) {
            return Err(Error::dependency(format!("Duplicate job id '{}'", job.job_id)));
        }

        let mut assigned = Vec::with_capacity(transfers.len() + deletions.len());
        let job_id = job.job_id.clone();
        self.state.jobs.insert(job_id, job);

        for mut transfer in transfers {
            transfer.file_id = self.state.next_file_id;
            self.state.next_file_id += 1;
            assigned.push(transfer.file_id);
            self.state.transfers.insert(transfer.file_id, transfer);
        }
        for mut deletion in deletions {
            deletion.file_id = self.state.next_file_id;
            self.state.next_file_id += 1;
            assigned.push(deletion.file_id);
            self.state.deletions.insert(deletion.file_id, deletion);
        }

        Ok(assigned)
    }

    fn job(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.state.jobs.get(job_id).cloned())
    }

    fn non_terminal_jobs_owned_by(&self, user_dn: &str) -> Result<Vec<Job>> {
        Ok(self.state.jobs.values().filter(|j| j.user_dn == user_dn && !j.job_state.is_terminal()).cloned().collect())
    }

    fn update_job_state(
        &mut self,
        job_id: &str,
        state: JobState,
        reason: Option<String>,
        finish_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let job = self.state.jobs.get_mut(job_id).ok_or_else(|| Error::dependency(format!("No such job '{}'", job_id)))?;
        job.job_state = state;
        if reason.is_some() {
            job.reason = reason;
        }
        if finish_time.is_some() {
            job.finish_time = finish_time;
        }
        Ok(())
    }

    fn non_terminal_transfers_touching(&self, storage: &str, vo: Option<&str>) -> Result<Vec<Transfer>> {
        Ok(self
            .state
            .transfers
            .values()
            .filter(|t| {
                !t.file_state.is_terminal()
                    && (t.source_se == storage || t.dest_se == storage)
                    && self.vo_matches(&t.job_id, vo)
            })
            .cloned()
            .collect())
    }

    fn non_terminal_deletions_touching(&self, storage: &str, vo: Option<&str>) -> Result<Vec<Deletion>> {
        Ok(self
            .state
            .deletions
            .values()
            .filter(|d| !d.file_state.is_terminal() && d.source_se == storage && self.vo_matches(&d.job_id, vo))
            .cloned()
            .collect())
    }

    fn non_terminal_transfers_owned_by(&self, user_dn: &str) -> Result<Vec<Transfer>> {
        let owned: Vec<String> =
            self.state.jobs.values().filter(|j| j.user_dn == user_dn).map(|j| j.job_id.clone()).collect();
        Ok(self
            .state
            .transfers
            .values()
            .filter(|t| !t.file_state.is_terminal() && owned.contains(&t.job_id))
            .cloned()
            .collect())
    }

    fn non_terminal_deletions_owned_by(&self, user_dn: &str) -> Result<Vec<Deletion>> {
        let owned: Vec<String> =
            self.state.jobs.values().filter(|j| j.user_dn == user_dn).map(|j| j.job_id.clone()).collect();
        Ok(self
            .state
            .deletions
            .values()
            .filter(|d| !d.file_state.is_terminal() && owned.contains(&d.job_id))
            .cloned()
            .collect())
    }

    fn transfers_of_job(&self, job_id: &str) -> Result<Vec<Transfer>> {
        Ok(self.state.transfers.values().filter(|t| t.job_id == job_id).cloned().collect())
    }

    fn deletions_of_job(&self, job_id: &str) -> Result<Vec<Deletion>> {
        Ok(self.state.deletions.values().filter(|d| d.job_id == job_id).cloned().collect())
    }

    fn update_transfer_state(
        &mut self,
        file_id: u64,
        state: FileState,
        reason: Option<String>,
        finish_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let transfer =
            self.state.transfers.get_mut(&file_id).ok_or_else(|| Error::dependency(format!("No such transfer {}", file_id)))?;
        transfer.file_state = state;
        if reason.is_some() {
            transfer.reason = reason;
        }
        if finish_time.is_some() {
            transfer.finish_time = finish_time;
        }
        Ok(())
    }

    fn update_deletion_state(
        &mut self,
        file_id: u64,
        state: FileState,
        reason: Option<String>,
        finish_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let deletion =
            self.state.deletions.get_mut(&file_id).ok_or_else(|| Error::dependency(format!("No such deletion {}", file_id)))?;
        deletion.file_state = state;
        if reason.is_some() {
            deletion.reason = reason;
        }
        if finish_time.is_some() {
            deletion.finish_time = finish_time;
        }
        Ok(())
    }

    fn set_transfer_wait(&mut self, file_id: u64, wait_timestamp: Option<DateTime<Utc>>, wait_timeout: Option<i64>) -> Result<()> {
        let transfer =
            self.state.transfers.get_mut(&file_id).ok_or_else(|| Error::dependency(format!("No such transfer {}", file_id)))?;
        transfer.wait_timestamp = wait_timestamp;
        transfer.wait_timeout = wait_timeout;
        Ok(())
    }

    fn upsert_ban(&mut self, record: BanRecord) -> Result<()> {
        self.state.bans.retain(|b| !(b.target == record.target && b.vo == record.vo));
        self.state.bans.push(record);
        Ok(())
    }

    fn remove_ban(&mut self, target: &str, vo: Option<&str>) -> Result<usize> {
        let before = self.state.bans.len();
        match vo {
            None => self.state.bans.retain(|b| b.target != target),
            Some(scoped) => self.state.bans.retain(|b| !(b.target == target && b.vo.as_deref() == Some(scoped))),
        }
        Ok(before - self.state.bans.len())
    }

    fn bans_for(&self, target: &str) -> Result<Vec<BanRecord>> {
        Ok(self.state.bans.iter().filter(|b| b.target == target).cloned().collect())
    }
}
