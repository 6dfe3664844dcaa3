use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::admission::defaults::JobParameters;
use crate::api::submission_dto::{DeletionSpecDto, JobSubmissionDto, TransferSpecDto};
use crate::banning::ban_control::BanControl;
use crate::domain::ban::BanStatus;
use crate::domain::identity::Identity;
use crate::domain::job::{ChecksumMode, Job, JobState, JobType};
use crate::domain::surl::{self, Surl, valid_third_party_pair};
use crate::domain::transfer::{Deletion, FileState, Transfer};
use crate::error::{Error, Result};
use crate::persistence::store::{JobStore, StoreTx};
use crate::scheduler::ranker::SourceRanker;
use crate::scheduler::strategy::RankingStrategy;
use crate::stats::repository::StatisticsRepository;

/// The entries of a built job: a job is transfer-only or
/// deletion-only, never both.
#[derive(Debug, Clone)]
pub enum BuiltFiles {
    Transfers(Vec<Transfer>),
    Deletions(Vec<Deletion>),
}

/// A fully-populated admission result, ready to persist.
#[derive(Debug, Clone)]
pub struct BuiltJob {
    pub job: Job,
    pub files: BuiltFiles,
}

impl BuiltJob {
    pub fn transfers(&self) -> &[Transfer] {
        match &self.files {
            BuiltFiles::Transfers(t) => t,
            BuiltFiles::Deletions(_) => &[],
        }
    }

    pub fn deletions(&self) -> &[Deletion] {
        match &self.files {
            BuiltFiles::Deletions(d) => d,
            BuiltFiles::Transfers(_) => &[],
        }
    }
}

/// One validated source/destination pair, still attached to the spec
/// it came from.
struct CandidatePair {
    source: Surl,
    dest: Surl,
    spec_index: i32,
}

/// Turns raw submissions into fully-populated job records: defaults
/// merge, SURL validation, multihop/reuse/multi-replica/staging
/// classification, replica winner selection and ban filtering. Either
/// the whole job builds, or an error comes back and nothing was
/// persisted.
pub struct JobBuilder<S, R> {
    store: Arc<S>,
    stats: R,
    bans: BanControl<S>,
    /// Ranking strategy used when a replica submission asks for (or
    /// defaults to) `auto` selection.
    auto_strategy: RankingStrategy,
}

impl<S: JobStore, R: StatisticsRepository> JobBuilder<S, R> {
    pub fn new(store: Arc<S>, stats: R) -> Self {
        let bans = BanControl::new(store.clone());
        JobBuilder { store, stats, bans, auto_strategy: RankingStrategy::Queue }
    }

    pub fn with_auto_strategy(mut self, strategy: RankingStrategy) -> Self {
        self.auto_strategy = strategy;
        self
    }

    /// Builds and persists a job in one go. The returned records carry
    /// their assigned `file_id`s.
    pub fn submit(&self, identity: &Identity, request: &JobSubmissionDto) -> Result<BuiltJob> {
        let mut built = self.build(identity, request)?;

        let job = built.job.clone();
        let (transfers, deletions) = match built.files.clone() {
            BuiltFiles::Transfers(t) => (t, vec![]),
            BuiltFiles::Deletions(d) => (vec![], d),
        };
        let ids = self.store.transaction(|tx| tx.insert_job(job, transfers, deletions))?;

        match &mut built.files {
            BuiltFiles::Transfers(transfers) => {
                for (transfer, id) in transfers.iter_mut().zip(&ids) {
                    transfer.file_id = *id;
                }
            }
            BuiltFiles::Deletions(deletions) => {
                for (deletion, id) in deletions.iter_mut().zip(&ids) {
                    deletion.file_id = *id;
                }
            }
        }

        log::info!("Job {} persisted with {} entr(ies)", built.job.job_id, ids.len());
        Ok(built)
    }

    /// Validates and classifies a submission without persisting it.
    pub fn build(&self, identity: &Identity, request: &JobSubmissionDto) -> Result<BuiltJob> {
        match (request.transfers.is_empty(), request.deletions.is_empty()) {
            (false, false) => {
                return Err(Error::validation("A job is either a transfer job or a deletion job, not both"));
            }
            (true, true) => {
                return Err(Error::validation("Nothing to do: no transfers and no deletions submitted"));
            }
            _ => {}
        }

        let vo = identity.vo_name();
        if let Some(ban) = self.bans.current_ban(&identity.user_dn, &vo)? {
            log::warn!("Rejecting submission from banned user {} ({})", identity.user_dn, ban.message);
            return Err(Error::forbidden(format!("User '{}' is banned", identity.user_dn)));
        }

        let params = JobParameters::merge(&request.params);

        if request.transfers.is_empty() {
            self.build_deletion_job(identity, &vo, &request.deletions, &params)
        } else {
            self.build_transfer_job(identity, &vo, &request.transfers, &params)
        }
    }

    fn build_transfer_job(
        &self,
        identity: &Identity,
        vo: &str,
        specs: &[TransferSpecDto],
        params: &JobParameters,
    ) -> Result<BuiltJob> {
        let multi_replica = specs.iter().any(|s| s.sources.len() > 1 && s.destinations.len() == 1) && !params.reuse && !params.multihop;

        if params.reuse && params.multihop {
            return Err(Error::validation("reuse and multihop are mutually exclusive"));
        }
        if params.reuse && specs.iter().any(|s| s.sources.len() > 1 && s.destinations.len() == 1) {
            return Err(Error::validation("reuse is incompatible with multi-replica submissions"));
        }
        if multi_replica && specs.len() > 1 {
            return Err(Error::validation("A multi-replica job carries exactly one logical file"));
        }

        let staging = params.wants_staging();
        if staging && multi_replica {
            return Err(Error::validation("Staging is incompatible with multi-replica submissions"));
        }

        let pairs = expand_specs(specs, params)?;

        if staging {
            if let Some(bad) = pairs.iter().find(|p| !p.source.is_srm()) {
                return Err(Error::validation(format!(
                    "Staging requested but source '{}' is not an SRM endpoint",
                    bad.source.raw
                )));
            }
        }

        let job_id = Uuid::new_v4().to_string();
        let entry_state = if staging { FileState::Staging } else { FileState::Submitted };

        // Grouped transfers ride one balancing key; independent ones
        // each hash their own
        let grouped = params.reuse || params.multihop || multi_replica || staging;
        let job_key = surl::hashed_id(&job_id);

        let mut transfers: Vec<Transfer> = Vec::with_capacity(pairs.len());
        for (seq, pair) in pairs.iter().enumerate() {
            let spec = &specs[pair.spec_index as usize];
            transfers.push(Transfer {
                file_id: 0,
                job_id: job_id.clone(),
                file_index: pair.spec_index,
                file_state: if multi_replica { FileState::NotUsed } else { entry_state },
                source_surl: pair.source.raw.clone(),
                dest_surl: pair.dest.raw.clone(),
                source_se: pair.source.se(),
                dest_se: pair.dest.se(),
                hashed_id: if grouped { job_key } else { surl::hashed_id(&format!("{}:{}", job_id, seq)) },
                checksum: spec.checksum.clone(),
                user_filesize: spec.filesize.unwrap_or(0),
                selection_strategy: spec.selection_strategy.clone().or_else(|| params.selection_strategy.clone()),
                activity: spec.activity.clone().unwrap_or_else(|| "default".to_string()),
                file_metadata: spec.metadata.clone(),
                wait_timestamp: None,
                wait_timeout: None,
                finish_time: None,
                reason: None,
            });
        }

        if multi_replica {
            let winner = self.pick_replica_winner(&transfers, vo)?;
            transfers[winner].file_state = entry_state;
        }

        let job_type = if params.multihop {
            JobType::Multihop
        } else if params.reuse {
            JobType::Reuse
        } else if multi_replica {
            JobType::MultiReplica
        } else {
            JobType::Regular
        };

        // The caller not asking for verification does not discard
        // checksums the files carry anyway
        let has_checksum = transfers.iter().any(|t| t.checksum.as_deref().is_some_and(|c| !c.is_empty()));
        let checksum_method = if params.verify_checksum {
            ChecksumMode::Strict
        } else if has_checksum {
            ChecksumMode::Relaxed
        } else {
            ChecksumMode::None
        };

        let (source_se, dest_se) = if params.multihop {
            (Some(transfers[0].source_se.clone()), Some(transfers[transfers.len() - 1].dest_se.clone()))
        } else {
            (common_value(transfers.iter().map(|t| t.source_se.as_str())), common_value(transfers.iter().map(|t| t.dest_se.as_str())))
        };

        let job = Job {
            job_id: job_id.clone(),
            job_state: if staging { JobState::Staging } else { JobState::Submitted },
            job_type,
            vo_name: vo.to_string(),
            user_dn: identity.user_dn.clone(),
            cred_id: identity.credential_id.clone(),
            priority: params.priority,
            source_se,
            dest_se,
            submit_time: Utc::now(),
            finish_time: None,
            retry: params.retry,
            checksum_method,
            bring_online: params.bring_online,
            copy_pin_lifetime: params.copy_pin_lifetime,
            overwrite_flag: params.overwrite,
            job_metadata: params.job_metadata.clone(),
            reason: None,
        };

        self.apply_storage_bans(&job, &mut transfers, vo)?;

        log::info!(
            "Built {:?} job {} for {} ({} transfer(s), state {:?})",
            job.job_type,
            job.job_id,
            identity.user_dn,
            transfers.len(),
            job.job_state
        );

        Ok(BuiltJob { job, files: BuiltFiles::Transfers(transfers) })
    }

    fn build_deletion_job(
        &self,
        identity: &Identity,
        vo: &str,
        specs: &[DeletionSpecDto],
        params: &JobParameters,
    ) -> Result<BuiltJob> {
        let job_id = Uuid::new_v4().to_string();

        let mut deletions = Vec::with_capacity(specs.len());
        for (seq, spec) in specs.iter().enumerate() {
            let source = Surl::parse(&spec.surl)?;
            deletions.push(Deletion {
                file_id: 0,
                job_id: job_id.clone(),
                file_index: seq as i32,
                file_state: FileState::Delete,
                source_surl: source.raw.clone(),
                source_se: source.se(),
                hashed_id: surl::hashed_id(&format!("{}:{}", job_id, seq)),
                file_metadata: spec.metadata.clone(),
                wait_timestamp: None,
                wait_timeout: None,
                finish_time: None,
                reason: None,
            });
        }

        let source_se = common_value(deletions.iter().map(|d| d.source_se.as_str()));

        let job = Job {
            job_id: job_id.clone(),
            job_state: JobState::Delete,
            job_type: JobType::Deletion,
            vo_name: vo.to_string(),
            user_dn: identity.user_dn.clone(),
            cred_id: identity.credential_id.clone(),
            priority: params.priority,
            source_se,
            dest_se: None,
            submit_time: Utc::now(),
            finish_time: None,
            retry: params.retry,
            checksum_method: ChecksumMode::None,
            bring_online: -1,
            copy_pin_lifetime: -1,
            overwrite_flag: false,
            job_metadata: params.job_metadata.clone(),
            reason: None,
        };

        self.apply_deletion_bans(&job, &mut deletions, vo)?;

        log::info!("Built deletion job {} for {} ({} entr(ies))", job.job_id, identity.user_dn, deletions.len());

        Ok(BuiltJob { job, files: BuiltFiles::Deletions(deletions) })
    }

    /// Picks the active alternative of a multi-replica group. `auto`
    /// (or no strategy at all) ranks the candidate sources; any other
    /// value keeps the first listed alternative, unrecognized names
    /// included (long-standing client-visible behavior).
    fn pick_replica_winner(&self, transfers: &[Transfer], vo: &str) -> Result<usize> {
        let first = &transfers[0];
        let strategy_name = first.selection_strategy.as_deref();

        match strategy_name {
            None | Some("auto") => {
                let candidates: Vec<String> = transfers.iter().map(|t| t.source_se.clone()).collect();
                let ranked = SourceRanker::new(&self.stats).rank(
                    self.auto_strategy,
                    &candidates,
                    &first.dest_se,
                    vo,
                    Some(&first.activity),
                    Some(first.user_filesize),
                )?;
                let winner = ranked
                    .first()
                    .and_then(|top| transfers.iter().position(|t| t.source_se == top.source_se))
                    .unwrap_or(0);
                log::debug!("Replica winner for job {}: {} (ranked)", first.job_id, transfers[winner].source_se);
                Ok(winner)
            }
            Some(other) => {
                if other != "orderly" {
                    log::debug!("Selection strategy '{}' not recognized, keeping submission order", other);
                }
                Ok(0)
            }
        }
    }

    /// Storage-ban filter, the last admission step. A CANCEL ban on any
    /// touched endpoint rejects the whole job; WAIT stamps the wait
    /// window; WAIT_AS additionally admits the affected entries on
    /// hold.
    fn apply_storage_bans(&self, job: &Job, transfers: &mut [Transfer], vo: &str) -> Result<()> {
        let endpoints: BTreeSet<String> =
            transfers.iter().flat_map(|t| [t.source_se.clone(), t.dest_se.clone()]).collect();

        let now = Utc::now();
        for endpoint in endpoints {
            let Some(ban) = self.bans.current_ban(&endpoint, vo)? else {
                continue;
            };
            match ban.status {
                BanStatus::Cancel => {
                    log::warn!("Rejecting job {}: storage {} is banned", job.job_id, endpoint);
                    return Err(Error::forbidden(format!("Storage '{}' is banned", endpoint)));
                }
                BanStatus::Wait | BanStatus::WaitAs => {
                    for transfer in transfers.iter_mut().filter(|t| t.source_se == endpoint || t.dest_se == endpoint) {
                        transfer.wait_timestamp = Some(now);
                        transfer.wait_timeout = ban.wait_timeout;
                        if ban.status == BanStatus::WaitAs {
                            if let Some(held) = transfer.file_state.held() {
                                transfer.file_state = held;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_deletion_bans(&self, job: &Job, deletions: &mut [Deletion], vo: &str) -> Result<()> {
        let endpoints: BTreeSet<String> = deletions.iter().map(|d| d.source_se.clone()).collect();

        let now = Utc::now();
        for endpoint in endpoints {
            let Some(ban) = self.bans.current_ban(&endpoint, vo)? else {
                continue;
            };
            match ban.status {
                BanStatus::Cancel => {
                    log::warn!("Rejecting deletion job {}: storage {} is banned", job.job_id, endpoint);
                    return Err(Error::forbidden(format!("Storage '{}' is banned", endpoint)));
                }
                BanStatus::Wait | BanStatus::WaitAs => {
                    for deletion in deletions.iter_mut().filter(|d| d.source_se == endpoint) {
                        deletion.wait_timestamp = Some(now);
                        deletion.wait_timeout = ban.wait_timeout;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Expands every spec into its validated source×destination cross
/// product, keeping only third-party-transferable pairs.
fn expand_specs(specs: &[TransferSpecDto], params: &JobParameters) -> Result<Vec<CandidatePair>> {
    let mut pairs = Vec::new();

    for (index, spec) in specs.iter().enumerate() {
        if spec.sources.is_empty() {
            return Err(Error::validation(format!("Transfer {} has no source", index)));
        }
        if spec.destinations.is_empty() {
            return Err(Error::validation(format!("Transfer {} has no destination", index)));
        }
        if params.multihop && (spec.sources.len() != 1 || spec.destinations.len() != 1) {
            return Err(Error::validation("A multihop job takes exactly one source and one destination per hop"));
        }

        let sources: Vec<Surl> = spec.sources.iter().map(|s| Surl::parse(s)).collect::<Result<_>>()?;
        let destinations: Vec<Surl> = spec.destinations.iter().map(|d| Surl::parse(d)).collect::<Result<_>>()?;

        let mut found = false;
        for source in &sources {
            for dest in &destinations {
                if valid_third_party_pair(source, dest) {
                    pairs.push(CandidatePair { source: source.clone(), dest: dest.clone(), spec_index: index as i32 });
                    found = true;
                } else {
                    log::debug!("Skipping pair {} -> {}: not third-party transferable", source.raw, dest.raw);
                }
            }
        }
        if !found {
            return Err(Error::validation(format!("Transfer {} has no transferable source/destination pair", index)));
        }
    }

    Ok(pairs)
}

/// The value shared by every element, or `None` as soon as they
/// differ.
fn common_value<'a, I: Iterator<Item = &'a str>>(mut values: I) -> Option<String> {
    let first = values.next()?;
    if values.all(|v| v == first) { Some(first.to_string()) } else { None }
}
