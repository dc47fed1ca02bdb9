use std::time::Duration;

/// Result of running candidate code once against one input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Success { stdout: String, stderr: String },
    /// The candidate's `solve` raised. Reported out of band, never via stdout.
    Raised { message: String },
    TimedOut,
    /// The execution context itself failed.
    RuntimeError { message: String },
}

/// Isolated, time-bounded execution of candidate code.
///
/// Every call must start from a fresh context: nothing from a previous run
/// may be visible. On timeout the implementation must terminate the
/// execution and release its resources before returning.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Sandbox: std::fmt::Debug + Send + Sync {
    async fn run(&self, source: &str, input: &str, timeout: Duration) -> RunOutcome;
}
