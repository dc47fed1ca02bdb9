use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::{
    domain::{LeaderboardEntry, StatsRecord, StatsSnapshot},
    errors::JudgeError,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredState {
    #[serde(default)]
    stats: HashMap<String, StoredStats>,
    #[serde(default)]
    leaderboard: Vec<StoredEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredStats {
    attempts: u64,
    successes: u64,
    total_time_ms: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    user: String,
    q_id: String,
    correct: bool,
    time_ms: f64,
}

/// JSON file holding the aggregate statistics between restarts.
#[derive(Clone, Debug)]
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new<T: AsRef<Path>>(path: T) -> Self {
        Self {
            path: path.as_ref().into(),
        }
    }

    /// Empty snapshot when the file does not exist yet.
    pub async fn load(&self) -> Result<StatsSnapshot, JudgeError> {
        match fs::read(&self.path).await {
            Ok(raw) => Ok(serde_json::from_slice::<StoredState>(&raw)?.into()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StatsSnapshot::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a sibling temp file first so readers never see a partial file.
    pub async fn save(&self, snapshot: &StatsSnapshot) -> Result<(), JudgeError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(&StoredState::from(snapshot))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn to_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1e6
}

// Negative or non-finite values from a hand-edited file become zero.
fn from_ms(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_nanos((ms * 1e6).round() as u64)
    } else {
        Duration::ZERO
    }
}

impl From<&StatsSnapshot> for StoredState {
    fn from(snapshot: &StatsSnapshot) -> Self {
        Self {
            stats: snapshot
                .stats
                .iter()
                .map(|(id, record)| {
                    (
                        id.clone(),
                        StoredStats {
                            attempts: record.attempts,
                            successes: record.successes,
                            total_time_ms: to_ms(record.cumulative_time),
                        },
                    )
                })
                .collect(),
            leaderboard: snapshot
                .leaderboard
                .iter()
                .map(|entry| StoredEntry {
                    user: entry.user.clone(),
                    q_id: entry.question_id.clone(),
                    correct: entry.correct,
                    time_ms: to_ms(entry.elapsed),
                })
                .collect(),
        }
    }
}

impl From<StoredState> for StatsSnapshot {
    fn from(state: StoredState) -> Self {
        Self {
            stats: state
                .stats
                .into_iter()
                .map(|(id, stored)| {
                    (
                        id,
                        StatsRecord {
                            attempts: stored.attempts,
                            successes: stored.successes.min(stored.attempts),
                            cumulative_time: from_ms(stored.total_time_ms),
                        },
                    )
                })
                .collect(),
            leaderboard: state
                .leaderboard
                .into_iter()
                .map(|stored| LeaderboardEntry {
                    user: stored.user,
                    question_id: stored.q_id,
                    correct: stored.correct,
                    elapsed: from_ms(stored.time_ms),
                })
                .collect(),
        }
    }
}
