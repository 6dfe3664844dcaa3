use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::ban::BanRecord;
use crate::error::Result;
use crate::stats::repository::StatisticsRepository;

/// Injectable time source, so cache expiry is testable without
/// sleeping.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock the test suites move by hand.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock { now: Cell::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl<C: Clock> Clock for Rc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// One memoized query result. Covers every repository method so a
/// single entry map can hold them all.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Count(i64),
    Sample(Option<f64>),
    Shares(Option<HashMap<String, f64>>),
    Ban(Option<BanRecord>),
    Limit(Option<i64>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    inserted_at: DateTime<Utc>,
}

/// A worker-local memo over a [`StatisticsRepository`].
///
/// Each `(method, args)` query is remembered for `ttl` (5 minutes by
/// default); a full sweep removing expired entries runs every
/// `sweep_every` (30 minutes by default), piggybacked on lookups.
/// The cache is owned by one worker: no locking, no cross-worker
/// coherence, no write-back. Ranking inputs may therefore be observed
/// up to one TTL stale.
pub struct CachedStatistics<R, C = SystemClock> {
    inner: R,
    clock: C,
    ttl: Duration,
    sweep_every: Duration,
    entries: RefCell<HashMap<String, CacheEntry>>,
    last_sweep: Cell<DateTime<Utc>>,
}

impl<R: StatisticsRepository> CachedStatistics<R, SystemClock> {
    pub fn new(inner: R) -> Self {
        Self::with_clock(inner, SystemClock)
    }
}

impl<R: StatisticsRepository, C: Clock> CachedStatistics<R, C> {
    pub fn with_clock(inner: R, clock: C) -> Self {
        let now = clock.now();
        CachedStatistics {
            inner,
            clock,
            ttl: Duration::minutes(5),
            sweep_every: Duration::minutes(30),
            entries: RefCell::new(HashMap::new()),
            last_sweep: Cell::new(now),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration, sweep_every: Duration) -> Self {
        self.ttl = ttl;
        self.sweep_every = sweep_every;
        self
    }

    /// Looks up a fresh entry, sweeping first if the sweep interval has
    /// elapsed.
    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let now = self.clock.now();
        if now - self.last_sweep.get() >= self.sweep_every {
            self.sweep();
        }

        let entries = self.entries.borrow();
        match entries.get(key) {
            Some(entry) if now - entry.inserted_at < self.ttl => Some(entry.value.clone()),
            _ => None,
        }
    }

    pub fn put(&self, key: String, value: CachedValue) {
        self.entries.borrow_mut().insert(key, CacheEntry { value, inserted_at: self.clock.now() });
    }

    /// Removes every expired entry.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.inserted_at < self.ttl);
        self.last_sweep.set(now);
        log::debug!("Statistics cache sweep: {} -> {} entries", before, entries.len());
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn cached<F>(&self, key: String, query: F) -> Result<CachedValue>
    where
        F: FnOnce(&R) -> Result<CachedValue>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        // A failed query is never cached; only real samples are.
        let value = query(&self.inner)?;
        self.put(key, value.clone());
        Ok(value)
    }
}

fn key(method: &str, args: &[&str]) -> String {
    let mut out = String::from(method);
    for arg in args {
        out.push('\x1f');
        out.push_str(arg);
    }
    out
}

impl<R: StatisticsRepository, C: Clock> StatisticsRepository for CachedStatistics<R, C> {
    fn submitted_count(&self, source_se: &str, dest_se: &str, vo: &str) -> Result<i64> {
        match self.cached(key("submitted_count", &[source_se, dest_se, vo]), |r| {
            r.submitted_count(source_se, dest_se, vo).map(CachedValue::Count)
        })? {
            CachedValue::Count(n) => Ok(n),
            _ => unreachable!("cache key collision"),
        }
    }

    fn success_rate(&self, source_se: &str, dest_se: &str) -> Result<Option<f64>> {
        match self.cached(key("success_rate", &[source_se, dest_se]), |r| {
            r.success_rate(source_se, dest_se).map(CachedValue::Sample)
        })? {
            CachedValue::Sample(s) => Ok(s),
            _ => unreachable!("cache key collision"),
        }
    }

    fn throughput(&self, source_se: &str, dest_se: &str) -> Result<Option<f64>> {
        match self.cached(key("throughput", &[source_se, dest_se]), |r| {
            r.throughput(source_se, dest_se).map(CachedValue::Sample)
        })? {
            CachedValue::Sample(s) => Ok(s),
            _ => unreachable!("cache key collision"),
        }
    }

    fn per_file_throughput(&self, source_se: &str, dest_se: &str) -> Result<Option<f64>> {
        match self.cached(key("per_file_throughput", &[source_se, dest_se]), |r| {
            r.per_file_throughput(source_se, dest_se).map(CachedValue::Sample)
        })? {
            CachedValue::Sample(s) => Ok(s),
            _ => unreachable!("cache key collision"),
        }
    }

    fn pending_bytes(&self, source_se: &str, dest_se: &str, vo: &str, activity: &str) -> Result<i64> {
        match self.cached(key("pending_bytes", &[source_se, dest_se, vo, activity]), |r| {
            r.pending_bytes(source_se, dest_se, vo, activity).map(CachedValue::Count)
        })? {
            CachedValue::Count(n) => Ok(n),
            _ => unreachable!("cache key collision"),
        }
    }

    fn activity_share(&self, vo: &str) -> Result<Option<HashMap<String, f64>>> {
        match self.cached(key("activity_share", &[vo]), |r| r.activity_share(vo).map(CachedValue::Shares))? {
            CachedValue::Shares(s) => Ok(s),
            _ => unreachable!("cache key collision"),
        }
    }

    fn current_ban_for(&self, target: &str) -> Result<Option<BanRecord>> {
        match self.cached(key("current_ban_for", &[target]), |r| r.current_ban_for(target).map(CachedValue::Ban))? {
            CachedValue::Ban(b) => Ok(b),
            _ => unreachable!("cache key collision"),
        }
    }

    fn active_limit(&self, source_se: &str, dest_se: &str) -> Result<Option<i64>> {
        match self.cached(key("active_limit", &[source_se, dest_se]), |r| {
            r.active_limit(source_se, dest_se).map(CachedValue::Limit)
        })? {
            CachedValue::Limit(l) => Ok(l),
            _ => unreachable!("cache key collision"),
        }
    }
}
