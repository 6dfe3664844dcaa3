use crate::error::Result;
use crate::scheduler::strategy::RankingStrategy;
use crate::stats::repository::StatisticsRepository;

const MIB: f64 = 1024.0 * 1024.0;

/// One ranked candidate source for a logical file.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedSource {
    pub source_se: String,
    pub score: f64,
}

/// Orders candidate source replicas by a [`RankingStrategy`] over the
/// trailing-1h aggregates of a [`StatisticsRepository`].
///
/// Ranking is a pure read: nothing in the repository is mutated, so
/// concurrent calls are safe. Ties keep the input order (stable sort).
pub struct SourceRanker<'a, R> {
    stats: &'a R,
}

impl<'a, R: StatisticsRepository> SourceRanker<'a, R> {
    pub fn new(stats: &'a R) -> Self {
        SourceRanker { stats }
    }

    /// Ranks `candidates` for a transfer towards `dest_se`.
    ///
    /// `activity` feeds the pending-data weighting and `file_size`
    /// (bytes) the finish-time prediction; both default sensibly when
    /// absent. The throughput-family strategies short-circuit on a
    /// candidate measuring exactly zero throughput: that source has
    /// never been exercised on this link, so it is returned alone to
    /// be probed.
    pub fn rank(
        &self,
        strategy: RankingStrategy,
        candidates: &[String],
        dest_se: &str,
        vo: &str,
        activity: Option<&str>,
        file_size: Option<i64>,
    ) -> Result<Vec<RankedSource>> {
        log::debug!("Ranking {} candidate(s) towards {} with strategy '{}'", candidates.len(), dest_se, strategy);

        let ranked = match strategy {
            RankingStrategy::Default => candidates.iter().map(|se| RankedSource { source_se: se.clone(), score: 0.0 }).collect(),

            RankingStrategy::Queue => {
                let scored = self.score_all(candidates, |se| self.queue_saturation(se, dest_se, vo))?;
                sort_ascending(scored)
            }

            RankingStrategy::SuccessRate => {
                let scored = self.score_all(candidates, |se| Ok(self.stats.success_rate(se, dest_se)?.unwrap_or(100.0)))?;
                sort_descending(scored)
            }

            RankingStrategy::Throughput => {
                let scored = self.score_all(candidates, |se| Ok(self.stats.throughput(se, dest_se)?.unwrap_or(0.0)))?;
                match probe_candidate(&scored) {
                    Some(probe) => vec![probe],
                    None => sort_descending(scored),
                }
            }

            RankingStrategy::PerFileThroughput => {
                let scored = self.score_all(candidates, |se| Ok(self.stats.per_file_throughput(se, dest_se)?.unwrap_or(0.0)))?;
                match probe_candidate(&scored) {
                    Some(probe) => vec![probe],
                    None => sort_descending(scored),
                }
            }

            RankingStrategy::PendingData => {
                let scored = self.score_all(candidates, |se| self.pending_mib(se, dest_se, vo, activity))?;
                sort_ascending(scored)
            }

            RankingStrategy::WaitingTime | RankingStrategy::WaitingTimeWithError | RankingStrategy::FinishTime => {
                self.rank_by_predicted_time(strategy, candidates, dest_se, vo, activity, file_size)?
            }
        };

        Ok(ranked)
    }

    /// The waiting-time family. All three start from the predicted
    /// queue-drain time and inherit the zero-throughput probe rule.
    fn rank_by_predicted_time(
        &self,
        strategy: RankingStrategy,
        candidates: &[String],
        dest_se: &str,
        vo: &str,
        activity: Option<&str>,
        file_size: Option<i64>,
    ) -> Result<Vec<RankedSource>> {
        let throughputs = self.score_all(candidates, |se| Ok(self.stats.throughput(se, dest_se)?.unwrap_or(0.0)))?;
        if let Some(probe) = probe_candidate(&throughputs) {
            return Ok(vec![probe]);
        }

        let mut scored = Vec::with_capacity(candidates.len());
        for (candidate, throughput) in throughputs {
            let mut time = self.pending_mib(&candidate, dest_se, vo, activity)? / throughput;

            if strategy != RankingStrategy::WaitingTime {
                // Expected resend cost: the failed fraction has to be
                // waited for again
                let success = self.stats.success_rate(&candidate, dest_se)?.unwrap_or(100.0);
                time += (100.0 - success) / 100.0 * time;
            }

            if strategy == RankingStrategy::FinishTime {
                let per_file = self.stats.per_file_throughput(&candidate, dest_se)?.unwrap_or(0.0);
                if per_file > 0.0 {
                    time += file_size.unwrap_or(0) as f64 / MIB / per_file;
                } else {
                    log::debug!("No per-file throughput sample for {} -> {}, ignoring transfer-time term", candidate, dest_se);
                }
            }

            scored.push((candidate, time));
        }

        Ok(sort_ascending(scored))
    }

    fn score_all<F>(&self, candidates: &[String], mut score: F) -> Result<Vec<(String, f64)>>
    where
        F: FnMut(&str) -> Result<f64>,
    {
        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            scored.push((candidate.clone(), score(candidate)?));
        }
        Ok(scored)
    }

    /// Queue depth for (source, dest, vo), divided by the permitted
    /// concurrency bound when one is configured: a deep queue on a wide
    /// link outranks a shallow queue on a throttled one.
    fn queue_saturation(&self, source_se: &str, dest_se: &str, vo: &str) -> Result<f64> {
        let depth = self.stats.submitted_count(source_se, dest_se, vo)? as f64;
        match self.stats.active_limit(source_se, dest_se)? {
            Some(limit) if limit > 0 => Ok(depth / limit as f64),
            _ => Ok(depth),
        }
    }

    /// MiB queued ahead of the requester on (source, dest).
    ///
    /// With an activity-share table, every activity whose weight is at
    /// least the requester's counts; without one, only the requester's
    /// own activity does.
    fn pending_mib(&self, source_se: &str, dest_se: &str, vo: &str, activity: Option<&str>) -> Result<f64> {
        let requester = activity.unwrap_or("default");

        let bytes = match self.stats.activity_share(vo)? {
            Some(shares) => {
                let own_weight = shares.get(requester).or_else(|| shares.get("default")).copied().unwrap_or(0.0);
                let mut total = 0;
                for (name, weight) in &shares {
                    if *weight >= own_weight {
                        total += self.stats.pending_bytes(source_se, dest_se, vo, name)?;
                    }
                }
                total
            }
            None => self.stats.pending_bytes(source_se, dest_se, vo, requester)?,
        };

        Ok(bytes as f64 / MIB)
    }
}

/// The first candidate in input order measuring exactly zero, if any.
fn probe_candidate(scored: &[(String, f64)]) -> Option<RankedSource> {
    scored.iter().find(|(_, score)| *score == 0.0).map(|(se, score)| RankedSource { source_se: se.clone(), score: *score })
}

fn sort_ascending(mut scored: Vec<(String, f64)>) -> Vec<RankedSource> {
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    into_ranked(scored)
}

fn sort_descending(mut scored: Vec<(String, f64)>) -> Vec<RankedSource> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    into_ranked(scored)
}

fn into_ranked(scored: Vec<(String, f64)>) -> Vec<RankedSource> {
    scored.into_iter().map(|(source_se, score)| RankedSource { source_se, score }).collect()
}
