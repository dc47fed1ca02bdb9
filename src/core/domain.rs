use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::JudgeError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub title: String,
    pub difficulty: String,
    pub statement: String,
    #[serde(default)]
    pub sample_input: Option<String>,
    #[serde(default)]
    pub sample_output: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub expected_solution: Option<String>,
}

impl Question {
    /// Projection handed to clients. The reference solution is only
    /// included when `reveal` is set.
    pub fn view(&self, reveal: bool) -> QuestionView {
        QuestionView {
            id: self.id.clone(),
            title: self.title.clone(),
            difficulty: self.difficulty.clone(),
            statement: self.statement.clone(),
            sample_input: self.sample_input.clone(),
            sample_output: self.sample_output.clone(),
            test_cases: self.test_cases.clone(),
            hints: self.hints.clone(),
            expected_solution: if reveal {
                self.expected_solution.clone()
            } else {
                None
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub title: String,
    pub difficulty: String,
    pub statement: String,
    pub sample_input: Option<String>,
    pub sample_output: Option<String>,
    pub test_cases: Vec<TestCase>,
    pub hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_solution: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: Option<String>,
    pub expected_output: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionMode {
    LiteralOutput,
    SourceCode,
}

impl FromStr for SubmissionMode {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "output" => Ok(SubmissionMode::LiteralOutput),
            "python" => Ok(SubmissionMode::SourceCode),
            other => Err(JudgeError::InvalidRequest {
                msg: format!("Unsupported submission language/type: {other}"),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Submission {
    pub user: String,
    pub question_id: String,
    pub mode: SubmissionMode,
    pub payload: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestResult {
    pub index: usize,
    pub input: Option<String>,
    pub expected_output: String,
    pub actual_output: Option<String>,
    pub passed: bool,
    pub error: Option<String>,
}

impl TestResult {
    /// A non-passing result with no captured output.
    pub fn failed(index: usize, test_case: &TestCase, error: String) -> Self {
        Self {
            index,
            input: test_case.input.clone(),
            expected_output: test_case.expected_output.clone(),
            actual_output: None,
            passed: false,
            error: Some(error),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Verdict {
    pub results: Vec<TestResult>,
    pub passed_count: usize,
    pub total: usize,
    pub correct: bool,
    pub elapsed: Duration,
}

impl Verdict {
    pub fn new(results: Vec<TestResult>, elapsed: Duration) -> Self {
        let passed_count = results.iter().filter(|r| r.passed).count();
        let total = results.len();

        Self {
            results,
            passed_count,
            total,
            correct: passed_count == total,
            elapsed,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsRecord {
    pub attempts: u64,
    pub successes: u64,
    pub cumulative_time: Duration,
}

impl StatsRecord {
    pub fn average_time(&self) -> Duration {
        if self.attempts == 0 {
            return Duration::ZERO;
        }
        let nanos = self.cumulative_time.as_nanos() / u128::from(self.attempts);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LeaderboardEntry {
    pub user: String,
    pub question_id: String,
    pub correct: bool,
    pub elapsed: Duration,
}

/// Whole aggregate state, captured under a single lock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatsSnapshot {
    pub stats: HashMap<String, StatsRecord>,
    pub leaderboard: Vec<LeaderboardEntry>,
}
