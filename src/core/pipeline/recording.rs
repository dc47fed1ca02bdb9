use std::sync::Arc;

use tokio::sync::mpsc::{Receiver, Sender};

use crate::{
    constants::RESPONSE_TX_ERR,
    core::{
        pipeline::{SubmissionState, SubmissionTask},
        stats::StatsAggregator,
    },
    storage::stats_store::StatsStore,
};

/// Folds evaluated submissions into the aggregate state one at a time and,
/// when a store is given, persists a snapshot after each of them.
#[tracing::instrument(skip_all)]
pub fn handle_recording(
    res_tx: Sender<SubmissionTask>,
    mut record_rx: Receiver<SubmissionTask>,
    aggregator: Arc<StatsAggregator>,
    store: Option<StatsStore>,
) {
    tokio::spawn(async move {
        while let Some(task) = record_rx.recv().await {
            let SubmissionState::Evaluated(verdict) = task.state.clone() else {
                tracing::error!("Task {} is not evaluated", task.id);
                let msg = format!("Submission {} reached recording unevaluated", task.id);
                if res_tx.send(task.change_state(SubmissionState::Failed(msg))).await.is_err() {
                    tracing::error!("{}", RESPONSE_TX_ERR);
                }
                continue;
            };

            let submission = &task.submission;
            aggregator.record(&submission.question_id, &submission.user, &verdict);

            if let Some(store) = &store {
                if let Err(e) = store.save(&aggregator.snapshot()).await {
                    tracing::error!("Failed to persist stats: {}", e);
                }
            }

            let task = task.change_state(SubmissionState::Recorded(verdict));
            if res_tx.send(task).await.is_err() {
                tracing::error!("{}", RESPONSE_TX_ERR);
            }
        }
    });
}
