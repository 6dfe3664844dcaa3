use std::collections::HashMap;

use grid_transfer_core::error::Error;
use grid_transfer_core::scheduler::ranker::SourceRanker;
use grid_transfer_core::scheduler::strategy::RankingStrategy;
use grid_transfer_core::stats::repository::MockStatistics;

const DST: &str = "gsiftp://dst.cern.ch";
const VO: &str = "atlas";

fn candidates(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn order(ranked: &[grid_transfer_core::scheduler::ranker::RankedSource]) -> Vec<&str> {
    ranked.iter().map(|r| r.source_se.as_str()).collect()
}

#[test]
fn test_queue_ranks_shallowest_first() {
    let mut stats = MockStatistics::new();
    stats.set_submitted("a", DST, VO, 10);
    stats.set_submitted("b", DST, VO, 2);
    stats.set_submitted("c", DST, VO, 5);

    let ranked = SourceRanker::new(&stats).rank(RankingStrategy::Queue, &candidates(&["a", "b", "c"]), DST, VO, None, None).unwrap();
    assert_eq!(order(&ranked), vec!["b", "c", "a"]);
}

#[test]
fn test_queue_normalizes_by_active_limit() {
    let mut stats = MockStatistics::new();
    // a is deep but wide, b is shallow but throttled to 2 slots
    stats.set_submitted("a", DST, VO, 10);
    stats.set_active_limit("a", DST, 100);
    stats.set_submitted("b", DST, VO, 4);
    stats.set_active_limit("b", DST, 2);

    let ranked = SourceRanker::new(&stats).rank(RankingStrategy::Queue, &candidates(&["b", "a"]), DST, VO, None, None).unwrap();
    assert_eq!(order(&ranked), vec!["a", "b"]);
}

#[test]
fn test_success_rate_ranks_best_first_and_defaults_to_100() {
    let mut stats = MockStatistics::new();
    stats.set_success_rate("flaky", DST, 60.0);
    stats.set_success_rate("good", DST, 98.0);
    // "fresh" has no samples at all: it counts as 100%

    let ranked = SourceRanker::new(&stats)
        .rank(RankingStrategy::SuccessRate, &candidates(&["flaky", "good", "fresh"]), DST, VO, None, None)
        .unwrap();
    assert_eq!(order(&ranked), vec!["fresh", "good", "flaky"]);
    assert_eq!(ranked[0].score, 100.0);
}

#[test]
fn test_throughput_probe_short_circuit() {
    let mut stats = MockStatistics::new();
    stats.set_throughput("a", DST, 0.0);
    stats.set_throughput("b", DST, 50.0);

    // a has measured zero throughput: it is returned alone for probing
    let ranked =
        SourceRanker::new(&stats).rank(RankingStrategy::Throughput, &candidates(&["a", "b"]), DST, VO, None, None).unwrap();
    assert_eq!(order(&ranked), vec!["a"]);
}

#[test]
fn test_unmeasured_source_counts_as_zero_throughput() {
    let mut stats = MockStatistics::new();
    stats.set_throughput("known", DST, 25.0);

    let ranked = SourceRanker::new(&stats)
        .rank(RankingStrategy::Throughput, &candidates(&["known", "unknown"]), DST, VO, None, None)
        .unwrap();
    assert_eq!(order(&ranked), vec!["unknown"]);
}

#[test]
fn test_throughput_ranks_fastest_first() {
    let mut stats = MockStatistics::new();
    stats.set_throughput("slow", DST, 5.0);
    stats.set_throughput("fast", DST, 80.0);
    stats.set_throughput("mid", DST, 30.0);

    let ranked = SourceRanker::new(&stats)
        .rank(RankingStrategy::Throughput, &candidates(&["slow", "fast", "mid"]), DST, VO, None, None)
        .unwrap();
    assert_eq!(order(&ranked), vec!["fast", "mid", "slow"]);
}

#[test]
fn test_per_file_throughput_has_its_own_samples() {
    let mut stats = MockStatistics::new();
    stats.set_per_file_throughput("a", DST, 3.0);
    stats.set_per_file_throughput("b", DST, 9.0);

    let ranked = SourceRanker::new(&stats)
        .rank(RankingStrategy::PerFileThroughput, &candidates(&["a", "b"]), DST, VO, None, None)
        .unwrap();
    assert_eq!(order(&ranked), vec!["b", "a"]);
}

#[test]
fn test_pending_data_without_share_table_counts_own_activity() {
    let mut stats = MockStatistics::new();
    stats.set_pending("a", DST, VO, "analysis", 4_000_000);
    stats.set_pending("a", DST, VO, "production", 9_000_000_000);
    stats.set_pending("b", DST, VO, "analysis", 8_000_000);

    // no share table for the VO: only the requester's activity counts
    let ranked = SourceRanker::new(&stats)
        .rank(RankingStrategy::PendingData, &candidates(&["a", "b"]), DST, VO, Some("analysis"), None)
        .unwrap();
    assert_eq!(order(&ranked), vec!["a", "b"]);
}

#[test]
fn test_pending_data_sums_higher_priority_activities() {
    let mut stats = MockStatistics::new();
    let mut shares = HashMap::new();
    shares.insert("express".to_string(), 10.0);
    shares.insert("default".to_string(), 1.0);
    stats.set_activity_share(VO, shares);

    // a: little default traffic but a big express backlog ahead of it
    stats.set_pending("a", DST, VO, "default", 1_000_000);
    stats.set_pending("a", DST, VO, "express", 50_000_000);
    // b: more default traffic, no express backlog
    stats.set_pending("b", DST, VO, "default", 10_000_000);

    let ranked = SourceRanker::new(&stats)
        .rank(RankingStrategy::PendingData, &candidates(&["a", "b"]), DST, VO, Some("default"), None)
        .unwrap();
    assert_eq!(order(&ranked), vec!["b", "a"]);

    // express itself only queues behind express
    let ranked = SourceRanker::new(&stats)
        .rank(RankingStrategy::PendingData, &candidates(&["a", "b"]), DST, VO, Some("express"), None)
        .unwrap();
    assert_eq!(order(&ranked), vec!["b", "a"]);
    assert_eq!(ranked[0].score, 0.0);
}

#[test]
fn test_waiting_time_divides_pending_by_throughput() {
    let mut stats = MockStatistics::new();
    // a: 100 MiB pending at 10 MiB/s -> 10s; b: 40 MiB at 2 MiB/s -> 20s
    stats.set_pending("a", DST, VO, "default", 100 * 1024 * 1024);
    stats.set_throughput("a", DST, 10.0);
    stats.set_pending("b", DST, VO, "default", 40 * 1024 * 1024);
    stats.set_throughput("b", DST, 2.0);

    let ranked =
        SourceRanker::new(&stats).rank(RankingStrategy::WaitingTime, &candidates(&["b", "a"]), DST, VO, None, None).unwrap();
    assert_eq!(order(&ranked), vec!["a", "b"]);
    assert!((ranked[0].score - 10.0).abs() < 1e-9);
    assert!((ranked[1].score - 20.0).abs() < 1e-9);
}

#[test]
fn test_waiting_time_inherits_the_probe_rule() {
    let mut stats = MockStatistics::new();
    stats.set_throughput("a", DST, 0.0);
    stats.set_throughput("b", DST, 50.0);
    stats.set_pending("b", DST, VO, "default", 1024);

    let ranked =
        SourceRanker::new(&stats).rank(RankingStrategy::WaitingTime, &candidates(&["b", "a"]), DST, VO, None, None).unwrap();
    assert_eq!(order(&ranked), vec!["a"]);
}

#[test]
fn test_waiting_time_with_error_penalizes_failures() {
    let mut stats = MockStatistics::new();
    // same drain time, very different reliability
    for se in ["solid", "flaky"] {
        stats.set_pending(se, DST, VO, "default", 100 * 1024 * 1024);
        stats.set_throughput(se, DST, 10.0);
    }
    stats.set_success_rate("solid", DST, 100.0);
    stats.set_success_rate("flaky", DST, 50.0);

    let ranked = SourceRanker::new(&stats)
        .rank(RankingStrategy::WaitingTimeWithError, &candidates(&["flaky", "solid"]), DST, VO, None, None)
        .unwrap();
    assert_eq!(order(&ranked), vec!["solid", "flaky"]);
    // flaky waits 10s plus 50% predicted resend: 15s
    assert!((ranked[1].score - 15.0).abs() < 1e-9);
}

#[test]
fn test_finish_time_adds_the_transfer_itself() {
    let mut stats = MockStatistics::new();
    // identical queues; a moves single files twice as fast
    for se in ["a", "b"] {
        stats.set_pending(se, DST, VO, "default", 10 * 1024 * 1024);
        stats.set_throughput(se, DST, 10.0);
        stats.set_success_rate(se, DST, 100.0);
    }
    stats.set_per_file_throughput("a", DST, 20.0);
    stats.set_per_file_throughput("b", DST, 10.0);

    let file_size = Some(200 * 1024 * 1024_i64);
    let ranked = SourceRanker::new(&stats)
        .rank(RankingStrategy::FinishTime, &candidates(&["b", "a"]), DST, VO, None, file_size)
        .unwrap();
    assert_eq!(order(&ranked), vec!["a", "b"]);
    // a: 1s drain + 10s transfer; b: 1s drain + 20s transfer
    assert!((ranked[0].score - 11.0).abs() < 1e-9);
    assert!((ranked[1].score - 21.0).abs() < 1e-9);
}

#[test]
fn test_default_strategy_keeps_input_order() {
    let stats = MockStatistics::new();
    let ranked = SourceRanker::new(&stats)
        .rank(RankingStrategy::Default, &candidates(&["z", "m", "a"]), DST, VO, None, None)
        .unwrap();
    assert_eq!(order(&ranked), vec!["z", "m", "a"]);
}

#[test]
fn test_ties_keep_input_order() {
    let stats = MockStatistics::new();
    // nobody has queue samples: all scores are equal
    let ranked =
        SourceRanker::new(&stats).rank(RankingStrategy::Queue, &candidates(&["z", "m", "a"]), DST, VO, None, None).unwrap();
    assert_eq!(order(&ranked), vec!["z", "m", "a"]);
}

#[test]
fn test_failed_sample_query_propagates() {
    let mut stats = MockStatistics::new();
    stats.set_success_rate("a", DST, 90.0);
    stats.fail_pair("b", DST);

    // "b" has no samples, but the query error must not degrade into the
    // 100% missing-sample fallback
    let result = SourceRanker::new(&stats).rank(RankingStrategy::SuccessRate, &candidates(&["a", "b"]), DST, VO, None, None);
    assert!(matches!(result, Err(Error::Dependency(_))));
}

#[test]
fn test_failed_queue_query_propagates() {
    let mut stats = MockStatistics::new();
    stats.set_submitted("a", DST, VO, 3);
    stats.fail_pair("b", DST);

    let result = SourceRanker::new(&stats).rank(RankingStrategy::Queue, &candidates(&["a", "b"]), DST, VO, None, None);
    assert!(matches!(result, Err(Error::Dependency(_))));
}
