use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::{
    constants::{DEFAULT_TIMEOUT, ERROR_SENTINEL, TIMEOUT_ERROR},
    core::{
        comparator::compare,
        domain::{Question, Submission, SubmissionMode, TestCase, TestResult, Verdict},
        traits::sandbox::{RunOutcome, Sandbox},
    },
};

/// Grades a submission against every test case of a question.
#[derive(Clone, Debug)]
pub struct Evaluator {
    sandbox: Arc<dyn Sandbox>,
    timeout: Duration,
}

impl Evaluator {
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self {
            sandbox,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Test cases run one after another in declared order. The verdict
    /// always holds exactly one result per test case.
    #[tracing::instrument(skip_all, fields(question_id = %question.id, user = %submission.user))]
    pub async fn evaluate(&self, question: &Question, submission: &Submission) -> Verdict {
        let start = Instant::now();
        let mut results = Vec::with_capacity(question.test_cases.len());

        for (index, test_case) in question.test_cases.iter().enumerate() {
            let result = match submission.mode {
                SubmissionMode::LiteralOutput => {
                    check_literal(index, test_case, &submission.payload)
                }
                SubmissionMode::SourceCode => {
                    let input = test_case.input.as_deref().unwrap_or_default();
                    let outcome = self
                        .sandbox
                        .run(&submission.payload, input, self.timeout)
                        .await;
                    tracing::debug!("Test {} outcome: {:?}", index, outcome);
                    (index, test_case, outcome).into()
                }
            };
            results.push(result);
        }

        let verdict = Verdict::new(results, start.elapsed());
        tracing::info!(
            passed = verdict.passed_count,
            total = verdict.total,
            elapsed_ms = verdict.elapsed.as_millis() as u64,
            "Submission evaluated"
        );
        verdict
    }
}

fn check_literal(index: usize, test_case: &TestCase, answer: &str) -> TestResult {
    TestResult {
        index,
        input: test_case.input.clone(),
        expected_output: test_case.expected_output.clone(),
        actual_output: Some(answer.to_string()),
        passed: compare(&test_case.expected_output, Some(answer)),
        error: None,
    }
}

impl From<(usize, &TestCase, RunOutcome)> for TestResult {
    fn from((index, test_case, outcome): (usize, &TestCase, RunOutcome)) -> Self {
        match outcome {
            RunOutcome::Success { stdout, .. } if stdout.starts_with(ERROR_SENTINEL) => {
                TestResult::failed(index, test_case, stdout)
            }
            RunOutcome::Success { stdout, stderr } => TestResult {
                index,
                input: test_case.input.clone(),
                expected_output: test_case.expected_output.clone(),
                passed: compare(&test_case.expected_output, Some(&stdout)),
                actual_output: Some(stdout),
                error: (!stderr.is_empty()).then_some(stderr),
            },
            RunOutcome::Raised { message } => {
                TestResult::failed(index, test_case, format!("{ERROR_SENTINEL}{message}"))
            }
            RunOutcome::TimedOut => {
                tracing::warn!("Test {} timed out", index);
                TestResult::failed(index, test_case, TIMEOUT_ERROR.to_string())
            }
            RunOutcome::RuntimeError { message } => {
                tracing::error!("Execution context failed on test {}: {}", index, message);
                TestResult::failed(index, test_case, message)
            }
        }
    }
}
