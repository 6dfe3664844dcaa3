use std::collections::{HashMap, HashSet};

use crate::domain::ban::BanRecord;
use crate::error::{Error, Result};

/// Read-only aggregates over historical and queued transfers, backed by
/// the relational store in production. All windowed aggregates cover a
/// fixed trailing 1-hour window.
///
/// Sample getters return `Ok(None)` when no samples exist for the pair;
/// the documented fallbacks (100% success, 0 throughput) apply only
/// then. A failed query is an error and must propagate.
pub trait StatisticsRepository {
    /// Number of currently-SUBMITTED transfers for (source, dest, vo).
    fn submitted_count(&self, source_se: &str, dest_se: &str, vo: &str) -> Result<i64>;

    /// Success percentage over the last hour for (source, dest).
    fn success_rate(&self, source_se: &str, dest_se: &str) -> Result<Option<f64>>;

    /// Mean aggregated throughput (MiB/s) over the last hour.
    fn throughput(&self, source_se: &str, dest_se: &str) -> Result<Option<f64>>;

    /// Mean per-file throughput (MiB/s) over the last hour.
    fn per_file_throughput(&self, source_se: &str, dest_se: &str) -> Result<Option<f64>>;

    /// Bytes queued for (source, dest, vo) under one activity.
    fn pending_bytes(&self, source_se: &str, dest_se: &str, vo: &str, activity: &str) -> Result<i64>;

    /// The VO's activity-share table: activity name to relative weight.
    /// `None` when the VO has no share configured.
    fn activity_share(&self, vo: &str) -> Result<Option<HashMap<String, f64>>>;

    /// The current ban record on a storage endpoint or user DN, if any.
    fn current_ban_for(&self, target: &str) -> Result<Option<BanRecord>>;

    /// The permitted concurrency bound for (source, dest), if one is
    /// configured (ActiveTransferState).
    fn active_limit(&self, source_se: &str, dest_se: &str) -> Result<Option<i64>>;
}

/// In-memory statistics used by the test suites, keyed the same way the
/// production queries are.
#[derive(Debug, Default)]
pub struct MockStatistics {
    pub submitted: HashMap<(String, String, String), i64>,
    pub success_rates: HashMap<(String, String), f64>,
    pub throughputs: HashMap<(String, String), f64>,
    pub per_file_throughputs: HashMap<(String, String), f64>,
    pub pending: HashMap<(String, String, String, String), i64>,
    pub activity_shares: HashMap<String, HashMap<String, f64>>,
    pub bans: HashMap<String, BanRecord>,
    pub active_limits: HashMap<(String, String), i64>,
    pub failing_pairs: HashSet<(String, String)>,
}

impl MockStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_submitted(&mut self, source: &str, dest: &str, vo: &str, count: i64) {
        self.submitted.insert((source.into(), dest.into(), vo.into()), count);
    }

    pub fn set_success_rate(&mut self, source: &str, dest: &str, rate: f64) {
        self.success_rates.insert((source.into(), dest.into()), rate);
    }

    pub fn set_throughput(&mut self, source: &str, dest: &str, mbs: f64) {
        self.throughputs.insert((source.into(), dest.into()), mbs);
    }

    pub fn set_per_file_throughput(&mut self, source: &str, dest: &str, mbs: f64) {
        self.per_file_throughputs.insert((source.into(), dest.into()), mbs);
    }

    pub fn set_pending(&mut self, source: &str, dest: &str, vo: &str, activity: &str, bytes: i64) {
        self.pending.insert((source.into(), dest.into(), vo.into(), activity.into()), bytes);
    }

    pub fn set_activity_share(&mut self, vo: &str, shares: HashMap<String, f64>) {
        self.activity_shares.insert(vo.into(), shares);
    }

    pub fn set_ban(&mut self, record: BanRecord) {
        self.bans.insert(record.target.clone(), record);
    }

    pub fn set_active_limit(&mut self, source: &str, dest: &str, limit: i64) {
        self.active_limits.insert((source.into(), dest.into()), limit);
    }

    /// Makes every query touching (source, dest) fail, simulating an
    /// unreachable statistics backend for that pair.
    pub fn fail_pair(&mut self, source: &str, dest: &str) {
        self.failing_pairs.insert((source.into(), dest.into()));
    }

    fn check_pair(&self, source_se: &str, dest_se: &str) -> Result<()> {
        if self.failing_pairs.contains(&(source_se.into(), dest_se.into())) {
            return Err(Error::dependency(format!("statistics query failed for {} -> {}", source_se, dest_se)));
        }
        Ok(())
    }
}

impl StatisticsRepository for MockStatistics {
    fn submitted_count(&self, source_se: &str, dest_se: &str, vo: &str) -> Result<i64> {
        self.check_pair(source_se, dest_se)?;
        Ok(*self.submitted.get(&(source_se.into(), dest_se.into(), vo.into())).unwrap_or(&0))
    }

    fn success_rate(&self, source_se: &str, dest_se: &str) -> Result<Option<f64>> {
        self.check_pair(source_se, dest_se)?;
        Ok(self.success_rates.get(&(source_se.into(), dest_se.into())).copied())
    }

    fn throughput(&self, source_se: &str, dest_se: &str) -> Result<Option<f64>> {
        self.check_pair(source_se, dest_se)?;
        Ok(self.throughputs.get(&(source_se.into(), dest_se.into())).copied())
    }

    fn per_file_throughput(&self, source_se: &str, dest_se: &str) -> Result<Option<f64>> {
        self.check_pair(source_se, dest_se)?;
        Ok(self.per_file_throughputs.get(&(source_se.into(), dest_se.into())).copied())
    }

    fn pending_bytes(&self, source_se: &str, dest_se: &str, vo: &str, activity: &str) -> Result<i64> {
        self.check_pair(source_se, dest_se)?;
        Ok(*self.pending.get(&(source_se.into(), dest_se.into(), vo.into(), activity.into())).unwrap_or(&0))
    }

    fn activity_share(&self, vo: &str) -> Result<Option<HashMap<String, f64>>> {
        Ok(self.activity_shares.get(vo).cloned())
    }

    fn current_ban_for(&self, target: &str) -> Result<Option<BanRecord>> {
        Ok(self.bans.get(target).cloned())
    }

    fn active_limit(&self, source_se: &str, dest_se: &str) -> Result<Option<i64>> {
        self.check_pair(source_se, dest_se)?;
        Ok(self.active_limits.get(&(source_se.into(), dest_se.into())).copied())
    }
}
