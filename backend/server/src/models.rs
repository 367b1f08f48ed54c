use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Database password supplied with a single request. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub question_id: String,
    pub value: f64,
}

/// A validated `POST /submissions` body.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub user_id: String,
    pub repeat_count: i32,
    pub credential: Credential,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub id: Uuid,
    pub user_id: String,
    pub repeat_count: i32,
}

#[derive(Serialize)]
pub struct Created {
    pub id: Uuid,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// One line of the export: a submission joined with one of its answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub submission_id: Uuid,
    pub user_id: String,
    pub repeat_count: i32,
    pub question_id: Option<String>,
    pub value: Option<f64>,
}
