use std::fmt;

/// How candidate source replicas are ordered for one logical file.
///
/// The set is closed: every strategy a client can name is a variant
/// here, and anything unrecognized maps to [`RankingStrategy::Default`],
/// which keeps the input order. The silent fallback is long-standing
/// client-visible behavior and is kept on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingStrategy {
    /// Ascending queue depth for (source, dest, vo), relative to the
    /// permitted concurrency bound when one is configured.
    Queue,
    /// Descending success percentage over the last hour.
    SuccessRate,
    /// Descending mean throughput over the last hour.
    Throughput,
    /// Descending mean per-file throughput over the last hour.
    PerFileThroughput,
    /// Ascending bytes queued ahead of the requester's activity.
    PendingData,
    /// Ascending predicted queue-drain time (pending data / throughput).
    WaitingTime,
    /// Waiting time inflated by the predicted resend cost.
    WaitingTimeWithError,
    /// Waiting time with error plus the predicted transfer time of this
    /// file.
    FinishTime,
    /// Keep the candidates in the order the client listed them.
    Default,
}

impl RankingStrategy {
    pub fn from_name(name: &str) -> RankingStrategy {
        match name {
            "queue" => RankingStrategy::Queue,
            "success" | "success-rate" => RankingStrategy::SuccessRate,
            "throughput" => RankingStrategy::Throughput,
            "file-throughput" | "per-file-throughput" => RankingStrategy::PerFileThroughput,
            "pending-data" => RankingStrategy::PendingData,
            "waiting-time" => RankingStrategy::WaitingTime,
            "waiting-time-with-error" => RankingStrategy::WaitingTimeWithError,
            "duration" | "finish-time" => RankingStrategy::FinishTime,
            other => {
                log::debug!("Unknown ranking strategy '{}', falling back to input order", other);
                RankingStrategy::Default
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RankingStrategy::Queue => "queue",
            RankingStrategy::SuccessRate => "success-rate",
            RankingStrategy::Throughput => "throughput",
            RankingStrategy::PerFileThroughput => "per-file-throughput",
            RankingStrategy::PendingData => "pending-data",
            RankingStrategy::WaitingTime => "waiting-time",
            RankingStrategy::WaitingTimeWithError => "waiting-time-with-error",
            RankingStrategy::FinishTime => "finish-time",
            RankingStrategy::Default => "default",
        }
    }
}

impl fmt::Display for RankingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
