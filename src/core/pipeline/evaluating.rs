use std::sync::Arc;

use tokio::sync::mpsc::{Receiver, Sender};

use crate::{
    constants::{RECORD_TX_ERR, RESPONSE_TX_ERR},
    core::{
        evaluator::Evaluator,
        pipeline::{SubmissionState, SubmissionTask},
        traits::repository::QuestionRepository,
    },
};

/// Evaluates every received submission in its own task, so slow candidates
/// do not hold up others. Evaluated tasks continue to the recording stage.
#[tracing::instrument(skip_all)]
pub fn handle_evaluating(
    res_tx: Sender<SubmissionTask>,
    record_tx: Sender<SubmissionTask>,
    mut eval_rx: Receiver<SubmissionTask>,
    repository: Arc<dyn QuestionRepository>,
    evaluator: Evaluator,
) {
    tokio::spawn(async move {
        while let Some(task) = eval_rx.recv().await {
            let res_tx = res_tx.clone();
            let record_tx = record_tx.clone();
            let repository = repository.clone();
            let evaluator = evaluator.clone();

            tokio::spawn(async move {
                handle_task(task, res_tx, record_tx, repository, evaluator).await;
            });
        }
    });
}

async fn handle_task(
    task: SubmissionTask,
    res_tx: Sender<SubmissionTask>,
    record_tx: Sender<SubmissionTask>,
    repository: Arc<dyn QuestionRepository>,
    evaluator: Evaluator,
) {
    let question = match repository.get(&task.submission.question_id) {
        Ok(question) => question,
        Err(e) => {
            tracing::info!("Rejecting submission {}: {}", task.id, e);
            if res_tx.send(task.change_state(SubmissionState::NotFound)).await.is_err() {
                tracing::error!("{}", RESPONSE_TX_ERR);
            }
            return;
        }
    };

    let task = task.change_state(SubmissionState::Evaluating);
    if res_tx.send(task.clone()).await.is_err() {
        tracing::error!("{}", RESPONSE_TX_ERR);
    }

    let verdict = evaluator.evaluate(&question, &task.submission).await;

    let task = task.change_state(SubmissionState::Evaluated(verdict));
    if record_tx.send(task).await.is_err() {
        tracing::error!("{}", RECORD_TX_ERR);
    }
}
