use std::time::Duration;

use crate::core::{
    domain::{LeaderboardEntry, StatsRecord, Submission, TestResult, Verdict},
    errors::JudgeError,
};
use crate::jsonl::models::{
    ErrorOut, LeaderboardEntryOut, StatsOut, SubmissionRequest, SubmissionResponse, TestResultOut,
};

fn to_ms(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1e6
}

impl TryFrom<SubmissionRequest> for Submission {
    type Error = JudgeError;

    fn try_from(req: SubmissionRequest) -> Result<Self, JudgeError> {
        Ok(Self {
            mode: req.language.parse()?,
            user: req.user,
            question_id: req.q_id,
            payload: req.answer,
        })
    }
}

impl From<TestResult> for TestResultOut {
    fn from(result: TestResult) -> Self {
        Self {
            input: result.input,
            expected_output: result.expected_output,
            actual_output: result.actual_output,
            passed: result.passed,
            error: result.error,
        }
    }
}

impl From<Verdict> for SubmissionResponse {
    fn from(verdict: Verdict) -> Self {
        Self {
            correct: verdict.correct,
            passed_count: verdict.passed_count,
            total: verdict.total,
            time_ms: to_ms(verdict.elapsed),
            results: verdict.results.into_iter().map(Into::into).collect(),
            message: Some("Submission evaluated".to_string()),
        }
    }
}

impl From<StatsRecord> for StatsOut {
    fn from(record: StatsRecord) -> Self {
        Self {
            attempts: record.attempts,
            successes: record.successes,
            average_time_ms: to_ms(record.average_time()),
        }
    }
}

impl From<LeaderboardEntry> for LeaderboardEntryOut {
    fn from(entry: LeaderboardEntry) -> Self {
        Self {
            user: entry.user,
            q_id: entry.question_id,
            correct: entry.correct,
            time_ms: to_ms(entry.elapsed),
        }
    }
}

impl From<&JudgeError> for ErrorOut {
    fn from(error: &JudgeError) -> Self {
        Self {
            error: error.kind().to_string(),
            detail: error.to_string(),
        }
    }
}
