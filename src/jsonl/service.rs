use std::sync::Arc;

use dashmap::DashMap;
use futures::StreamExt;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::{
        mpsc::{Sender, channel},
        oneshot,
    },
};
use tokio_stream::wrappers::LinesStream;
use uuid::Uuid;

use crate::{
    constants::SUBMISSION_TX_ERR,
    core::{
        domain::Submission,
        errors::JudgeError,
        evaluator::Evaluator,
        pipeline::{
            SubmissionState, SubmissionTask, evaluating::handle_evaluating,
            recording::handle_recording,
        },
        stats::StatsAggregator,
        traits::repository::QuestionRepository,
    },
    jsonl::models::{ErrorOut, Request, Response, SubmissionRequest},
    storage::{questions::JsonQuestionRepository, stats_store::StatsStore},
};

type Pending = Arc<DashMap<Uuid, oneshot::Sender<SubmissionTask>>>;

/// Answers JSON-lines requests. Submissions go through the evaluating and
/// recording pipeline; everything else is answered directly.
#[derive(Debug)]
pub struct JudgeService {
    repository: Arc<JsonQuestionRepository>,
    aggregator: Arc<StatsAggregator>,
    eval_tx: Sender<SubmissionTask>,
    pending: Pending,
    concurrency: usize,
}

impl JudgeService {
    pub fn start(
        repository: Arc<JsonQuestionRepository>,
        aggregator: Arc<StatsAggregator>,
        evaluator: Evaluator,
        store: Option<StatsStore>,
        capacity: usize,
    ) -> Self {
        let (res_tx, mut res_rx) = channel::<SubmissionTask>(capacity);
        let (record_tx, record_rx) = channel::<SubmissionTask>(capacity);
        let (eval_tx, eval_rx) = channel::<SubmissionTask>(capacity);

        handle_evaluating(
            res_tx.clone(),
            record_tx,
            eval_rx,
            repository.clone(),
            evaluator,
        );
        handle_recording(res_tx, record_rx, aggregator.clone(), store);

        let pending: Pending = Arc::new(DashMap::new());
        let waiting = pending.clone();
        tokio::spawn(async move {
            while let Some(task) = res_rx.recv().await {
                tracing::debug!("Submission {} is {:?}", task.id, task.state);
                if !task.state.is_final() {
                    continue;
                }
                if let Some((_, reply)) = waiting.remove(&task.id) {
                    let _ = reply.send(task);
                }
            }
        });

        Self {
            repository,
            aggregator,
            eval_tx,
            pending,
            concurrency: capacity.max(1),
        }
    }

    /// Reads requests until EOF. Requests are handled concurrently, responses
    /// are written in request order.
    pub async fn serve<R, W>(&self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let responses = LinesStream::new(input.lines())
            .filter_map(|line| async move {
                match line {
                    Ok(line) if line.trim().is_empty() => None,
                    other => Some(other),
                }
            })
            .map(|line| async move {
                match line {
                    Ok(line) => Ok(self.handle_line(&line).await),
                    Err(e) => Err(e),
                }
            })
            .buffered(self.concurrency);
        let mut responses = std::pin::pin!(responses);

        while let Some(response) = responses.next().await {
            let response = response?;
            match serde_json::to_string(&response) {
                Ok(mut line) => {
                    line.push('\n');
                    output.write_all(line.as_bytes()).await?;
                    output.flush().await?;
                }
                Err(e) => tracing::error!("Failed to serialize response: {}", e),
            }
        }

        Ok(())
    }

    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => Response::Error(ErrorOut {
                error: "invalid_request".to_string(),
                detail: e.to_string(),
            }),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::Submit(req) => self.submit(req).await,
            Request::Question { q_id, reveal } => self
                .repository
                .get(&q_id)
                .map(|q| Response::Question(q.view(reveal))),
            Request::Today { reveal } => self
                .repository
                .get_today()
                .map(|q| Response::Question(q.view(reveal))),
            Request::Hints { q_id } => self
                .repository
                .hints(&q_id)
                .map(|hints| Response::Hints { hints }),
            Request::Stats { q_id } => self
                .repository
                .get(&q_id)
                .map(|_| Response::Stats(self.aggregator.stats(&q_id).into())),
            Request::Leaderboard { top } => Ok(Response::Leaderboard(
                self.aggregator
                    .leaderboard(top)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            )),
            Request::AddQuestion { question } => self
                .repository
                .add(question)
                .await
                .map(|_| Response::Ok { ok: true }),
        };

        result.unwrap_or_else(|e| {
            tracing::info!("Request failed: {}", e);
            Response::Error((&e).into())
        })
    }

    async fn submit(&self, req: SubmissionRequest) -> Result<Response, JudgeError> {
        let submission = Submission::try_from(req)?;
        let task = SubmissionTask::new(submission);
        let id = task.id;
        let question_id = task.submission.question_id.clone();

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(id, reply_tx);

        if self.eval_tx.send(task).await.is_err() {
            tracing::error!("{}", SUBMISSION_TX_ERR);
            self.pending.remove(&id);
            return Err(std::io::Error::other(SUBMISSION_TX_ERR).into());
        }

        let done = reply_rx
            .await
            .map_err(|_| std::io::Error::other("Submission pipeline stopped"))?;

        match done.state {
            SubmissionState::Recorded(verdict) => Ok(Response::Submission(verdict.into())),
            SubmissionState::Failed(msg) => Err(std::io::Error::other(msg).into()),
            _ => Err(JudgeError::not_found(&question_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::sandbox::{MockSandbox, RunOutcome};
    use serde_json::{Value, json};

    struct Fixture {
        service: JudgeService,
        aggregator: Arc<StatsAggregator>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(sandbox: MockSandbox) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(
            JsonQuestionRepository::load(dir.path().join("questions.json"))
                .await
                .unwrap(),
        );
        let aggregator = Arc::new(StatsAggregator::new());
        let service = JudgeService::start(
            repository,
            aggregator.clone(),
            Evaluator::new(Arc::new(sandbox)),
            Some(StatsStore::new(dir.path().join("store.json"))),
            16,
        );

        Fixture {
            service,
            aggregator,
            _dir: dir,
        }
    }

    async fn call(service: &JudgeService, request: Value) -> Value {
        let response = service.handle_line(&request.to_string()).await;
        serde_json::to_value(response).unwrap()
    }

    #[tokio::test]
    async fn test_literal_submission_recorded() {
        let fx = fixture(MockSandbox::new()).await;

        let response = call(
            &fx.service,
            json!({"type": "submit", "user": "alice", "q_id": "q1", "answer": "5"}),
        )
        .await;

        assert_eq!(response["passed_count"], 1);
        assert_eq!(response["total"], 2);
        assert_eq!(response["correct"], false);
        assert_eq!(response["message"], "Submission evaluated");
        assert_eq!(fx.aggregator.stats("q1").attempts, 1);

        let stats = call(&fx.service, json!({"type": "stats", "q_id": "q1"})).await;
        assert_eq!(stats["attempts"], 1);
        assert_eq!(stats["successes"], 0);
    }

    #[tokio::test]
    async fn test_source_submission() {
        let mut sandbox = MockSandbox::new();
        sandbox.expect_run().times(2).returning(|_, input, _| {
            let sum: i64 = input.split_whitespace().map(|n| n.parse::<i64>().unwrap()).sum();
            RunOutcome::Success {
                stdout: sum.to_string(),
                stderr: String::new(),
            }
        });
        let fx = fixture(sandbox).await;

        let response = call(
            &fx.service,
            json!({"type": "submit", "user": "bob", "q_id": "q1", "language": "python", "answer": "def solve(s): ..."}),
        )
        .await;

        assert_eq!(response["correct"], true);
        let board = call(&fx.service, json!({"type": "leaderboard"})).await;
        assert_eq!(board[0]["user"], "bob");
        assert_eq!(board[0]["correct"], true);
    }

    #[tokio::test]
    async fn test_request_errors() {
        let mut sandbox = MockSandbox::new();
        sandbox.expect_run().never();
        let fx = fixture(sandbox).await;

        let unsupported = call(
            &fx.service,
            json!({"type": "submit", "user": "u", "q_id": "q1", "language": "cobol", "answer": "x"}),
        )
        .await;
        assert_eq!(unsupported["error"], "invalid_request");

        let unknown = call(
            &fx.service,
            json!({"type": "submit", "user": "u", "q_id": "q404", "answer": "x"}),
        )
        .await;
        assert_eq!(unknown["error"], "not_found");

        let stats = call(&fx.service, json!({"type": "stats", "q_id": "q404"})).await;
        assert_eq!(stats["error"], "not_found");

        let garbage = fx.service.handle_line("{oops").await;
        assert!(matches!(garbage, Response::Error(ErrorOut { ref error, .. }) if error == "invalid_request"));

        assert_eq!(fx.aggregator.stats("q404").attempts, 0);
        assert_eq!(fx.aggregator.stats("q1").attempts, 0);
    }

    #[tokio::test]
    async fn test_question_views() {
        let fx = fixture(MockSandbox::new()).await;

        let hidden = call(&fx.service, json!({"type": "question", "q_id": "q2"})).await;
        assert_eq!(hidden["title"], "Reverse String");
        assert!(hidden.get("expected_solution").is_none());

        let revealed = call(&fx.service, json!({"type": "question", "q_id": "q2", "reveal": true})).await;
        assert!(revealed["expected_solution"].is_string());

        let today = call(&fx.service, json!({"type": "today"})).await;
        assert!(today["id"] == "q1" || today["id"] == "q2");

        let hints = call(&fx.service, json!({"type": "hints", "q_id": "q2"})).await;
        assert_eq!(hints["hints"], json!(["Use slicing s[::-1]"]));
    }

    #[tokio::test]
    async fn test_add_question() {
        let fx = fixture(MockSandbox::new()).await;
        let question = json!({
            "id": "q3",
            "title": "Echo",
            "difficulty": "Easy",
            "statement": "Print the input.",
            "test_cases": [{"input": "hi", "expected_output": "hi"}]
        });

        let added = call(&fx.service, json!({"type": "add_question", "question": question.clone()})).await;
        assert_eq!(added, json!({"ok": true}));

        let duplicate = call(&fx.service, json!({"type": "add_question", "question": question})).await;
        assert_eq!(duplicate["error"], "already_exists");

        let response = call(
            &fx.service,
            json!({"type": "submit", "user": "u", "q_id": "q3", "answer": " hi "}),
        )
        .await;
        assert_eq!(response["correct"], true);
    }

    #[tokio::test]
    async fn test_submit_with_stopped_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(
            JsonQuestionRepository::load(dir.path().join("questions.json"))
                .await
                .unwrap(),
        );
        let (eval_tx, eval_rx) = channel(1);
        drop(eval_rx);
        let service = JudgeService {
            repository,
            aggregator: Arc::new(StatsAggregator::new()),
            eval_tx,
            pending: Arc::new(DashMap::new()),
            concurrency: 1,
        };

        let response = call(
            &service,
            json!({"type": "submit", "user": "u", "q_id": "q1", "answer": "5"}),
        )
        .await;

        assert_eq!(response["error"], "internal");
        assert!(service.pending.is_empty());
    }

    #[tokio::test]
    async fn test_serve_preserves_request_order() {
        let fx = fixture(MockSandbox::new()).await;
        let input = [
            json!({"type": "submit", "user": "a", "q_id": "q2", "answer": "olleh"}).to_string(),
            String::new(),
            json!({"type": "hints", "q_id": "q1"}).to_string(),
            json!({"type": "stats", "q_id": "q404"}).to_string(),
        ]
        .join("\n");

        let mut output = Vec::new();
        fx.service
            .serve(input.as_bytes(), &mut output)
            .await
            .unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["passed_count"], 1);
        assert_eq!(lines[1]["hints"][1], "Return a+b");
        assert_eq!(lines[2]["error"], "not_found");
    }
}
