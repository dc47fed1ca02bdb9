use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::domain::{Submission, Verdict};

pub mod evaluating;
pub mod recording;

/// A submission travelling through the evaluating and recording stages.
#[derive(Clone, Debug)]
pub struct SubmissionTask {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submission: Submission,
    pub state: SubmissionState,
}

impl SubmissionTask {
    pub fn new(submission: Submission) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            submission,
            state: SubmissionState::default(),
        }
    }

    pub fn change_state(&self, new_state: SubmissionState) -> Self {
        Self {
            state: new_state,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub enum SubmissionState {
    #[default]
    Pending,
    NotFound,
    Evaluating,
    Evaluated(Verdict),
    Recorded(Verdict),
    Failed(String),
}

impl SubmissionState {
    /// No further state follows.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            SubmissionState::NotFound | SubmissionState::Recorded(_) | SubmissionState::Failed(_)
        )
    }
}
