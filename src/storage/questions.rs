use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use itertools::Itertools;
use tokio::{fs, sync::Mutex};

use crate::core::{
    domain::{Question, TestCase},
    errors::JudgeError,
    traits::repository::QuestionRepository,
};

const SECONDS_PER_DAY: i64 = 86_400;

/// Questions kept in memory and mirrored to a JSON array on disk.
#[derive(Debug)]
pub struct JsonQuestionRepository {
    path: PathBuf,
    questions: DashMap<String, Arc<Question>>,
    write_lock: Mutex<()>,
}

impl JsonQuestionRepository {
    /// Loads `path`, seeding it with sample questions when it does not exist.
    #[tracing::instrument]
    pub async fn load<T>(path: T) -> Result<Self, JudgeError>
    where
        T: AsRef<Path> + std::fmt::Debug,
    {
        let path = path.as_ref().to_path_buf();

        let questions: Vec<Question> = match fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("Seeding {} with sample questions", path.display());
                let samples = sample_questions();
                write_questions(&path, &samples).await?;
                samples
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Loaded {} questions", questions.len());
        Ok(Self {
            path,
            questions: questions
                .into_iter()
                .map(|q| (q.id.clone(), Arc::new(q)))
                .collect(),
            write_lock: Mutex::new(()),
        })
    }

    /// Adds a new question and rewrites the backing file.
    pub async fn add(&self, question: Question) -> Result<(), JudgeError> {
        let _guard = self.write_lock.lock().await;
        let id = question.id.clone();
        match self.questions.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(JudgeError::AlreadyExists { question_id: id });
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(question));
            }
        }

        let all = self
            .questions
            .iter()
            .map(|q| q.value().as_ref().clone())
            .sorted_by(|a, b| a.id.cmp(&b.id))
            .collect_vec();
        if let Err(e) = write_questions(&self.path, &all).await {
            self.questions.remove(&id);
            return Err(e);
        }

        tracing::info!(question_id = %id, "Question added");
        Ok(())
    }

    pub fn hints(&self, question_id: &str) -> Result<Vec<String>, JudgeError> {
        self.get(question_id).map(|q| q.hints.clone())
    }

    pub fn get_today_at(&self, now: DateTime<Utc>) -> Result<Arc<Question>, JudgeError> {
        let ids = self.questions.iter().map(|q| q.key().clone()).sorted().collect_vec();
        let id = select_for_day(&ids, now.timestamp().div_euclid(SECONDS_PER_DAY))
            .ok_or(JudgeError::EmptyRepository)?;
        self.get(id)
    }
}

impl QuestionRepository for JsonQuestionRepository {
    fn get(&self, question_id: &str) -> Result<Arc<Question>, JudgeError> {
        self.questions
            .get(question_id)
            .map(|q| q.value().clone())
            .ok_or_else(|| JudgeError::not_found(question_id))
    }

    fn get_today(&self) -> Result<Arc<Question>, JudgeError> {
        self.get_today_at(Utc::now())
    }
}

/// Picks the question for day number `day` from ids sorted ascending.
pub fn select_for_day(sorted_ids: &[String], day: i64) -> Option<&String> {
    if sorted_ids.is_empty() {
        return None;
    }
    let idx = day.rem_euclid(sorted_ids.len() as i64) as usize;
    sorted_ids.get(idx)
}

async fn write_questions(path: &Path, questions: &[Question]) -> Result<(), JudgeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, serde_json::to_vec_pretty(questions)?).await?;
    Ok(())
}

fn sample_questions() -> Vec<Question> {
    vec![
        Question {
            id: "q1".to_string(),
            title: "Sum of Two Numbers".to_string(),
            difficulty: "Easy".to_string(),
            statement: "Given two integers separated by space, output their sum.".to_string(),
            sample_input: Some("2 3".to_string()),
            sample_output: Some("5".to_string()),
            test_cases: vec![
                TestCase {
                    input: Some("2 3".to_string()),
                    expected_output: "5".to_string(),
                },
                TestCase {
                    input: Some("10 5".to_string()),
                    expected_output: "15".to_string(),
                },
            ],
            hints: vec![
                "Split the input by space and convert to integers".to_string(),
                "Return a+b".to_string(),
            ],
            expected_solution: Some(
                "def solve(input_str):\n    a,b=map(int,input_str.split())\n    return str(a+b)"
                    .to_string(),
            ),
        },
        Question {
            id: "q2".to_string(),
            title: "Reverse String".to_string(),
            difficulty: "Easy".to_string(),
            statement: "Given a string, return the string reversed.".to_string(),
            sample_input: Some("hello".to_string()),
            sample_output: Some("olleh".to_string()),
            test_cases: vec![
                TestCase {
                    input: Some("hello".to_string()),
                    expected_output: "olleh".to_string(),
                },
                TestCase {
                    input: Some("abc".to_string()),
                    expected_output: "cba".to_string(),
                },
            ],
            hints: vec!["Use slicing s[::-1]".to_string()],
            expected_solution: Some("def solve(input_str):\n    return input_str[::-1]".to_string()),
        },
    ]
}
