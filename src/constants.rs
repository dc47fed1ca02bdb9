use std::time::Duration;

/// Prefix reserved for candidate faults. Output starting with it is never
/// treated as an answer.
pub const ERROR_SENTINEL: &str = "__ERROR__:";

/// Error text recorded for a test case that exceeded its time budget.
pub const TIMEOUT_ERROR: &str = "timeout";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

pub const LEADERBOARD_CAPACITY: usize = 100;

pub const DEFAULT_LEADERBOARD_TOP: usize = 10;

/// Exit code the harness uses when `solve` raised.
pub const FAULT_EXIT_CODE: i32 = 86;

pub const SUBMISSION_TX_ERR: &str = "Failed to send submission to evaluating stage";
pub const RECORD_TX_ERR: &str = "Failed to send verdict to recording stage";
pub const RESPONSE_TX_ERR: &str = "Failed to send response";
