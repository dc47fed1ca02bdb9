#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("Question not found: {question_id}")]
    NotFound { question_id: String },
    #[error("Invalid request: {msg}")]
    InvalidRequest { msg: String },
    #[error("Question already exists: {question_id}")]
    AlreadyExists { question_id: String },
    #[error("Question repository is empty")]
    EmptyRepository,
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JudgeError {
    pub fn not_found(question_id: &str) -> Self {
        Self::NotFound {
            question_id: question_id.to_string(),
        }
    }

    /// Short machine-readable name for the boundary layer.
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeError::NotFound { .. } => "not_found",
            JudgeError::InvalidRequest { .. } => "invalid_request",
            JudgeError::AlreadyExists { .. } => "already_exists",
            JudgeError::EmptyRepository => "empty_repository",
            JudgeError::Storage(_) | JudgeError::Serialization(_) => "internal",
        }
    }
}
