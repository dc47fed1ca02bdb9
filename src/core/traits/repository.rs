use std::sync::Arc;

use crate::core::{domain::Question, errors::JudgeError};

#[mockall::automock]
pub trait QuestionRepository: std::fmt::Debug + Send + Sync {
    fn get(&self, question_id: &str) -> Result<Arc<Question>, JudgeError>;

    /// Question of the day, a deterministic function of the current date.
    fn get_today(&self) -> Result<Arc<Question>, JudgeError>;
}
