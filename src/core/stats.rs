use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    constants::LEADERBOARD_CAPACITY,
    core::domain::{LeaderboardEntry, StatsRecord, StatsSnapshot, Verdict},
};

/// Owner of per-question statistics and the shared leaderboard.
///
/// Both live behind one lock so a recorded verdict is visible either
/// entirely or not at all. The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    state: Mutex<StatsSnapshot>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(mut snapshot: StatsSnapshot) -> Self {
        rank(&mut snapshot.leaderboard);
        Self {
            state: Mutex::new(snapshot),
        }
    }

    #[tracing::instrument(skip(self, verdict), fields(correct = verdict.correct))]
    pub fn record(&self, question_id: &str, user: &str, verdict: &Verdict) {
        let mut state = self.lock();

        let record = state.stats.entry(question_id.to_string()).or_default();
        record.attempts += 1;
        if verdict.correct {
            record.successes += 1;
        }
        record.cumulative_time += verdict.elapsed;

        state.leaderboard.push(LeaderboardEntry {
            user: user.to_string(),
            question_id: question_id.to_string(),
            correct: verdict.correct,
            elapsed: verdict.elapsed,
        });
        rank(&mut state.leaderboard);

        tracing::debug!(leaderboard_len = state.leaderboard.len(), "Verdict recorded");
    }

    /// Zeroed record for a question nobody has submitted to yet.
    pub fn stats(&self, question_id: &str) -> StatsRecord {
        self.lock()
            .stats
            .get(question_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        self.lock().leaderboard.iter().take(limit).cloned().collect()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.lock().clone()
    }

    // Every mutation completes before its guard drops, so a poisoned lock
    // still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Correct entries first, then faster times. Stable, capped.
fn rank(leaderboard: &mut Vec<LeaderboardEntry>) {
    leaderboard.sort_by_key(|entry| (!entry.correct, entry.elapsed));
    leaderboard.truncate(LEADERBOARD_CAPACITY);
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn verdict(correct: bool, elapsed_ms: u64) -> Verdict {
        Verdict {
            results: vec![],
            passed_count: usize::from(correct),
            total: 1,
            correct,
            elapsed: Duration::from_millis(elapsed_ms),
        }
    }

    #[test]
    fn test_unknown_question_has_zeroed_stats() {
        let aggregator = StatsAggregator::new();
        let stats = aggregator.stats("nope");

        assert_eq!(stats, StatsRecord::default());
        assert_eq!(stats.average_time(), Duration::ZERO);
    }

    #[test]
    fn test_repeated_correct_submissions() {
        let aggregator = StatsAggregator::new();
        let times = [120, 80, 100, 40];

        for t in times {
            aggregator.record("q1", "alice", &verdict(true, t));
        }

        let stats = aggregator.stats("q1");
        assert_eq!(stats.attempts, 4);
        assert_eq!(stats.successes, 4);
        assert_eq!(stats.cumulative_time, Duration::from_millis(340));
        assert_eq!(stats.average_time(), Duration::from_millis(85));
    }

    #[test]
    fn test_failures_count_as_attempts_only() {
        let aggregator = StatsAggregator::new();
        aggregator.record("q1", "alice", &verdict(false, 10));
        aggregator.record("q1", "bob", &verdict(true, 30));
        aggregator.record("q2", "bob", &verdict(false, 5));

        assert_eq!(aggregator.stats("q1").attempts, 2);
        assert_eq!(aggregator.stats("q1").successes, 1);
        assert_eq!(aggregator.stats("q2").attempts, 1);
        assert_eq!(aggregator.stats("q2").successes, 0);
        assert_eq!(
            aggregator.snapshot().stats.keys().sorted().collect_vec(),
            vec!["q1", "q2"]
        );
    }

    #[test]
    fn test_leaderboard_ranking() {
        let aggregator = StatsAggregator::new();
        aggregator.record("q1", "slow_wrong", &verdict(false, 5));
        aggregator.record("q1", "slow_right", &verdict(true, 300));
        aggregator.record("q1", "fast_right", &verdict(true, 100));
        aggregator.record("q2", "fast_wrong", &verdict(false, 1));

        let users = aggregator
            .leaderboard(10)
            .into_iter()
            .map(|e| e.user)
            .collect_vec();
        assert_eq!(
            users,
            vec!["fast_right", "slow_right", "fast_wrong", "slow_wrong"]
        );
        assert_eq!(aggregator.leaderboard(2).len(), 2);
    }

    #[test]
    fn test_leaderboard_capacity() {
        let aggregator = StatsAggregator::new();
        for i in 0..250u64 {
            aggregator.record("q1", &format!("user{i}"), &verdict(i % 3 == 0, 1000 - i));
        }

        let board = aggregator.leaderboard(usize::MAX);
        assert_eq!(board.len(), LEADERBOARD_CAPACITY);
        assert_eq!(board.iter().filter(|e| e.correct).count(), 84);
        assert!(board[..84].iter().all(|e| e.correct));
        assert!(
            board
                .iter()
                .tuple_windows()
                .all(|(a, b)| (!a.correct, a.elapsed) <= (!b.correct, b.elapsed))
        );
        assert_eq!(aggregator.stats("q1").attempts, 250);
    }

    #[test]
    fn test_reads_are_idempotent() {
        let aggregator = StatsAggregator::new();
        aggregator.record("q1", "alice", &verdict(true, 42));

        assert_eq!(aggregator.stats("q1"), aggregator.stats("q1"));
        assert_eq!(aggregator.leaderboard(10), aggregator.leaderboard(10));
    }

    #[test]
    fn test_from_snapshot_reranks() {
        let snapshot = StatsSnapshot {
            stats: HashMap::new(),
            leaderboard: vec![
                LeaderboardEntry {
                    user: "b".to_string(),
                    question_id: "q1".to_string(),
                    correct: false,
                    elapsed: Duration::from_millis(1),
                },
                LeaderboardEntry {
                    user: "a".to_string(),
                    question_id: "q1".to_string(),
                    correct: true,
                    elapsed: Duration::from_millis(9),
                },
            ],
        };

        let aggregator = StatsAggregator::from_snapshot(snapshot);
        assert_eq!(aggregator.leaderboard(1)[0].user, "a");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_records_are_not_lost() {
        let aggregator = Arc::new(StatsAggregator::new());

        let handles = (0..200u64)
            .map(|i| {
                let aggregator = aggregator.clone();
                tokio::spawn(async move {
                    let question_id = if i % 2 == 0 { "q1" } else { "q2" };
                    aggregator.record(question_id, "user", &verdict(i % 4 == 0, i));
                })
            })
            .collect_vec();
        futures::future::join_all(handles).await;

        let q1 = aggregator.stats("q1");
        let q2 = aggregator.stats("q2");
        assert_eq!(q1.attempts + q2.attempts, 200);
        assert_eq!(q1.successes, 50);
        assert_eq!(q2.successes, 0);
        assert_eq!(aggregator.leaderboard(usize::MAX).len(), LEADERBOARD_CAPACITY);
    }
}
