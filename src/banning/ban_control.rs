use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::api::ban_dto::{BanStorageDto, BanUserDto};
use crate::domain::ban::{BanRecord, BanStatus, BanTargetKind};
use crate::domain::identity::Identity;
use crate::domain::job::JobState;
use crate::domain::transfer::FileState;
use crate::error::{Error, Result};
use crate::persistence::store::{JobStore, StoreTx};

const STORAGE_BAN_REASON: &str = "Storage banned";
const USER_BAN_REASON: &str = "User banned";

/// Operator bans on storages and users, and the state cascades they
/// trigger on in-flight jobs.
///
/// Every cascade runs as one store transaction: a failure anywhere
/// rolls the whole ban or unban back. The Admission Builder consults
/// [`BanControl::current_ban`] to reject or hold new submissions.
pub struct BanControl<S> {
    store: Arc<S>,
}

impl<S> Clone for BanControl<S> {
    fn clone(&self) -> Self {
        BanControl { store: self.store.clone() }
    }
}

impl<S: JobStore> BanControl<S> {
    pub fn new(store: Arc<S>) -> Self {
        BanControl { store }
    }

    /// Bans a storage endpoint, cancelling or holding everything that
    /// touches it. Returns the ids of the affected jobs.
    pub fn ban_storage(&self, admin: &Identity, request: &BanStorageDto) -> Result<Vec<String>> {
        if !request.storage.contains("://") {
            return Err(Error::validation(format!("Not a storage endpoint: '{}'", request.storage)));
        }

        let now = Utc::now();
        let record = BanRecord {
            target: request.storage.clone(),
            target_kind: BanTargetKind::Storage,
            vo: request.vo.clone(),
            status: request.status,
            wait_timeout: request.timeout,
            admin_dn: admin.user_dn.clone(),
            message: request.message.clone().unwrap_or_default(),
            addition_time: now,
        };

        log::info!("Banning storage {} ({:?}, vo: {:?}) by {}", request.storage, request.status, request.vo, admin.user_dn);

        let affected = self
            .store
            .transaction(|tx| {
                tx.upsert_ban(record.clone())?;
                match request.status {
                    BanStatus::Cancel => cancel_storage_work(tx, &request.storage, request.vo.as_deref()),
                    BanStatus::Wait | BanStatus::WaitAs => hold_storage_work(tx, &request.storage, request.vo.as_deref(), request.timeout),
                }
            })
            .map_err(|e| Error::Transaction(format!("ban of {} failed: {}", request.storage, e)))?;

        Ok(affected.into_iter().collect())
    }

    /// Lifts a storage ban, releasing every held transfer back to its
    /// pre-ban state. Returns the ids of the affected jobs.
    pub fn unban_storage(&self, storage: &str, vo: Option<&str>) -> Result<Vec<String>> {
        log::info!("Unbanning storage {} (vo: {:?})", storage, vo);

        let affected = self
            .store
            .transaction(|tx| {
                tx.remove_ban(storage, vo)?;

                let mut jobs = BTreeSet::new();
                for transfer in tx.non_terminal_transfers_touching(storage, vo)? {
                    if let Some(released) = transfer.file_state.released() {
                        tx.update_transfer_state(transfer.file_id, released, None, None)?;
                        tx.set_transfer_wait(transfer.file_id, None, None)?;
                        jobs.insert(transfer.job_id);
                    }
                }
                Ok(jobs)
            })
            .map_err(|e| Error::Transaction(format!("unban of {} failed: {}", storage, e)))?;

        Ok(affected.into_iter().collect())
    }

    /// Bans a user DN, cancelling every job they own. An admin cannot
    /// ban themselves.
    pub fn ban_user(&self, admin: &Identity, request: &BanUserDto) -> Result<Vec<String>> {
        if request.user_dn == admin.user_dn {
            return Err(Error::Conflict(format!("Refusing self-ban of '{}'", admin.user_dn)));
        }

        let now = Utc::now();
        let record = BanRecord {
            target: request.user_dn.clone(),
            target_kind: BanTargetKind::User,
            vo: None,
            status: BanStatus::Cancel,
            wait_timeout: None,
            admin_dn: admin.user_dn.clone(),
            message: request.message.clone().unwrap_or_default(),
            addition_time: now,
        };

        log::info!("Banning user {} by {}", request.user_dn, admin.user_dn);

        let affected = self
            .store
            .transaction(|tx| {
                tx.upsert_ban(record.clone())?;

                for transfer in tx.non_terminal_transfers_owned_by(&request.user_dn)? {
                    tx.update_transfer_state(transfer.file_id, FileState::Canceled, Some(USER_BAN_REASON.to_string()), Some(now))?;
                }
                for deletion in tx.non_terminal_deletions_owned_by(&request.user_dn)? {
                    tx.update_deletion_state(deletion.file_id, FileState::Canceled, Some(USER_BAN_REASON.to_string()), Some(now))?;
                }

                let mut jobs = BTreeSet::new();
                for job in tx.non_terminal_jobs_owned_by(&request.user_dn)? {
                    tx.update_job_state(&job.job_id, JobState::Canceled, Some(USER_BAN_REASON.to_string()), Some(now))?;
                    jobs.insert(job.job_id);
                }
                Ok(jobs)
            })
            .map_err(|e| Error::Transaction(format!("ban of user {} failed: {}", request.user_dn, e)))?;

        Ok(affected.into_iter().collect())
    }

    /// Removes a user ban. Already-cancelled work is not resurrected.
    pub fn unban_user(&self, user_dn: &str) -> Result<()> {
        log::info!("Unbanning user {}", user_dn);
        self.store
            .transaction(|tx| tx.remove_ban(user_dn, None).map(|_| ()))
            .map_err(|e| Error::Transaction(format!("unban of user {} failed: {}", user_dn, e)))
    }

    /// The strongest ban currently applying to a storage endpoint or
    /// user DN under `vo`: a global record or one scoped to that VO,
    /// `Cancel` beating the hold statuses.
    pub fn current_ban(&self, target: &str, vo: &str) -> Result<Option<BanRecord>> {
        self.store.transaction(|tx| {
            let mut applicable: Vec<BanRecord> = tx.bans_for(target)?.into_iter().filter(|b| b.applies_to_vo(vo)).collect();
            applicable.sort_by_key(|b| severity(b.status));
            Ok(applicable.into_iter().next())
        })
    }
}

fn severity(status: BanStatus) -> u8 {
    match status {
        BanStatus::Cancel => 0,
        BanStatus::WaitAs => 1,
        BanStatus::Wait => 2,
    }
}

/// CANCEL cascade: cancel everything touching the storage, promote
/// multi-replica siblings, then mark fully-terminal jobs canceled.
fn cancel_storage_work<T: StoreTx>(tx: &mut T, storage: &str, vo: Option<&str>) -> Result<BTreeSet<String>> {
    let now = Utc::now();
    let mut jobs = BTreeSet::new();

    for transfer in tx.non_terminal_transfers_touching(storage, vo)? {
        tx.update_transfer_state(transfer.file_id, FileState::Canceled, Some(STORAGE_BAN_REASON.to_string()), Some(now))?;
        jobs.insert(transfer.job_id);
    }
    for deletion in tx.non_terminal_deletions_touching(storage, vo)? {
        tx.update_deletion_state(deletion.file_id, FileState::Canceled, Some(STORAGE_BAN_REASON.to_string()), Some(now))?;
        jobs.insert(deletion.job_id);
    }

    // A canceled active replica hands over to exactly one alternative
    for job_id in &jobs {
        promote_replica_sibling(tx, job_id)?;
    }

    for job_id in &jobs {
        let transfers = tx.transfers_of_job(job_id)?;
        let deletions = tx.deletions_of_job(job_id)?;
        let all_terminal =
            transfers.iter().all(|t| t.file_state.is_terminal()) && deletions.iter().all(|d| d.file_state.is_terminal());
        if all_terminal {
            tx.update_job_state(job_id, JobState::Canceled, Some(STORAGE_BAN_REASON.to_string()), Some(now))?;
        }
    }

    Ok(jobs)
}

/// Promotes the lowest-`file_id` NOT_USED sibling of a multi-replica
/// job whose active member just went terminal. No-op for other job
/// types or when an alternative is still running.
fn promote_replica_sibling<T: StoreTx>(tx: &mut T, job_id: &str) -> Result<()> {
    let Some(job) = tx.job(job_id)? else {
        return Ok(());
    };
    if job.job_type != crate::domain::job::JobType::MultiReplica {
        return Ok(());
    }

    let transfers = tx.transfers_of_job(job_id)?;
    let has_active = transfers.iter().any(|t| !t.file_state.is_terminal() && t.file_state != FileState::NotUsed);
    if has_active {
        return Ok(());
    }

    if let Some(sibling) = transfers.iter().filter(|t| t.file_state == FileState::NotUsed).min_by_key(|t| t.file_id) {
        log::info!("Promoting replica alternative {} of job {}", sibling.file_id, job_id);
        tx.update_transfer_state(sibling.file_id, FileState::Submitted, None, None)?;
    }
    Ok(())
}

/// WAIT / WAIT_AS cascade: queued work goes on hold with the wait
/// timeout stamped; job states stay untouched.
fn hold_storage_work<T: StoreTx>(tx: &mut T, storage: &str, vo: Option<&str>, timeout: Option<i64>) -> Result<BTreeSet<String>> {
    let now = Utc::now();
    let mut jobs = BTreeSet::new();

    for transfer in tx.non_terminal_transfers_touching(storage, vo)? {
        if let Some(held) = transfer.file_state.held() {
            tx.update_transfer_state(transfer.file_id, held, None, None)?;
            tx.set_transfer_wait(transfer.file_id, Some(now), timeout)?;
            jobs.insert(transfer.job_id);
        }
    }

    Ok(jobs)
}
