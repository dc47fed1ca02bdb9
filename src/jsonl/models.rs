use serde::{Deserialize, Serialize};

use crate::core::domain::{Question, QuestionView};

fn default_language() -> String {
    "output".to_string()
}

fn default_top() -> usize {
    crate::constants::DEFAULT_LEADERBOARD_TOP
}

/// One request per input line, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Submit(SubmissionRequest),
    Question {
        q_id: String,
        #[serde(default)]
        reveal: bool,
    },
    Today {
        #[serde(default)]
        reveal: bool,
    },
    Hints {
        q_id: String,
    },
    Stats {
        q_id: String,
    },
    Leaderboard {
        #[serde(default = "default_top")]
        top: usize,
    },
    AddQuestion {
        question: Question,
    },
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubmissionRequest {
    pub user: String,
    pub q_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub answer: String,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct TestResultOut {
    pub input: Option<String>,
    pub expected_output: String,
    pub actual_output: Option<String>,
    pub passed: bool,
    pub error: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct SubmissionResponse {
    pub correct: bool,
    pub passed_count: usize,
    pub total: usize,
    pub results: Vec<TestResultOut>,
    pub time_ms: f64,
    pub message: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct StatsOut {
    pub attempts: u64,
    pub successes: u64,
    pub average_time_ms: f64,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct LeaderboardEntryOut {
    pub user: String,
    pub q_id: String,
    pub correct: bool,
    pub time_ms: f64,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ErrorOut {
    pub error: String,
    pub detail: String,
}

/// Everything that may be written as one output line.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response {
    Submission(SubmissionResponse),
    Question(QuestionView),
    Hints { hints: Vec<String> },
    Stats(StatsOut),
    Leaderboard(Vec<LeaderboardEntryOut>),
    Ok { ok: bool },
    Error(ErrorOut),
}
