use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    database::{Connector, Session},
    error::DatabaseError,
    models::{Answer, Credential, ExportRow, NewSubmission},
};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAnswer {
    pub submission_id: Uuid,
    pub question_id: String,
    pub value: f64,
}

#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub submissions: Vec<NewSubmission>,
    pub answers: Vec<StoredAnswer>,
}

#[derive(Default)]
struct Shared {
    committed: Mutex<Tables>,
    password: Mutex<Option<String>>,
    fail_answers: AtomicBool,
    open_sessions: AtomicUsize,
}

/// In-process stand-in for Postgres with transactional staging and fault injection.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    shared: Arc<Shared>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects connections whose credential differs from `password`.
    pub fn with_password(password: &str) -> Self {
        let database = Self::default();
        *lock(&database.shared.password) = Some(password.to_string());
        database
    }

    /// Makes every answers insert fail after the submission insert succeeded.
    pub fn fail_answers(&self, fail: bool) {
        self.shared.fail_answers.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Tables {
        lock(&self.shared.committed).clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.shared.open_sessions.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Connector for MemoryDatabase {
    async fn connect(&self, credential: &Credential) -> Result<Box<dyn Session>, DatabaseError> {
        if let Some(expected) = lock(&self.shared.password).as_deref() {
            if expected != credential.expose() {
                return Err(DatabaseError::ConnectionFailed(
                    "password authentication failed".to_string(),
                ));
            }
        }

        self.shared.open_sessions.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemorySession {
            shared: self.shared.clone(),
            staged: None,
            closed: false,
        }))
    }
}

struct MemorySession {
    shared: Arc<Shared>,
    staged: Option<Tables>,
    closed: bool,
}

impl MemorySession {
    fn staged(&mut self) -> Result<&mut Tables, DatabaseError> {
        self.staged
            .as_mut()
            .ok_or_else(|| DatabaseError::QueryFailed("No transaction in progress".to_string()))
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn begin(&mut self) -> Result<(), DatabaseError> {
        self.staged = Some(Tables::default());
        Ok(())
    }

    async fn insert_submission(&mut self, submission: &NewSubmission) -> Result<(), DatabaseError> {
        let exists = lock(&self.shared.committed)
            .submissions
            .iter()
            .any(|row| row.id == submission.id);

        let staged = self.staged()?;
        if exists || staged.submissions.iter().any(|row| row.id == submission.id) {
            return Err(DatabaseError::QueryFailed(
                "duplicate key value violates unique constraint \"submissions_pkey\"".to_string(),
            ));
        }

        staged.submissions.push(submission.clone());
        Ok(())
    }

    async fn insert_answers(
        &mut self,
        submission_id: Uuid,
        answers: &[Answer],
    ) -> Result<(), DatabaseError> {
        if self.shared.fail_answers.load(Ordering::SeqCst) {
            return Err(DatabaseError::QueryFailed(
                "injected answers insert failure".to_string(),
            ));
        }

        let staged = self.staged()?;
        if !staged.submissions.iter().any(|row| row.id == submission_id) {
            return Err(DatabaseError::QueryFailed(
                "insert violates foreign key constraint on submission_id".to_string(),
            ));
        }

        staged
            .answers
            .extend(answers.iter().map(|answer| StoredAnswer {
                submission_id,
                question_id: answer.question_id.clone(),
                value: answer.value,
            }));

        Ok(())
    }

    async fn fetch_rows(&mut self) -> Result<Vec<ExportRow>, DatabaseError> {
        let committed = lock(&self.shared.committed);

        let rows = committed
            .submissions
            .iter()
            .flat_map(|submission| {
                let answers: Vec<&StoredAnswer> = committed
                    .answers
                    .iter()
                    .filter(|answer| answer.submission_id == submission.id)
                    .collect();

                let row = |answer: Option<&StoredAnswer>| ExportRow {
                    submission_id: submission.id,
                    user_id: submission.user_id.clone(),
                    repeat_count: submission.repeat_count,
                    question_id: answer.map(|answer| answer.question_id.clone()),
                    value: answer.map(|answer| answer.value),
                };

                if answers.is_empty() {
                    vec![row(None)]
                } else {
                    answers.into_iter().map(|answer| row(Some(answer))).collect()
                }
            })
            .collect();

        Ok(rows)
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        let staged = self
            .staged
            .take()
            .ok_or_else(|| DatabaseError::QueryFailed("No transaction in progress".to_string()))?;

        let mut committed = lock(&self.shared.committed);
        committed.submissions.extend(staged.submissions);
        committed.answers.extend(staged.answers);

        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.staged = None;
        Ok(())
    }

    async fn close(mut self: Box<Self>) {
        self.release();
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.release();
    }
}
