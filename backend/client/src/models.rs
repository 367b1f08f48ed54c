use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub const STORAGE_KEY: &str = "lab-form/submissions";

pub const REPEAT_COUNT_RANGE: RangeInclusive<u32> = 1..=1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub user_id: String,
    pub repeat_count: u32,
    pub db_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerValue {
    pub id: String,
    pub value: f64,
}

impl Admin {
    /// Applies the admin step checks: user id and password must not be blank and
    /// the repeat count must lie in [`REPEAT_COUNT_RANGE`]. The user id is trimmed.
    pub fn new(
        user_id: &str,
        repeat_count: u32,
        db_password: &str,
    ) -> Result<Self, ClientError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ClientError::InvalidAdmin("userId is required"));
        }

        if !REPEAT_COUNT_RANGE.contains(&repeat_count) {
            return Err(ClientError::InvalidAdmin("repeatCount must be between 1 and 1000"));
        }

        if db_password.trim().is_empty() {
            return Err(ClientError::InvalidAdmin("dbPassword is required"));
        }

        Ok(Self {
            user_id: user_id.to_string(),
            repeat_count,
            db_password: db_password.to_string(),
        })
    }
}

/// Body of `POST /submissions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub admin: Option<Admin>,
    pub answers: Vec<AnswerValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Created {
    pub id: String,
}

/// Admin block as kept on disk, without the password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAdmin {
    pub user_id: String,
    pub repeat_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSubmission {
    pub id: String,
    pub timestamp: String,
    pub admin: Option<StoredAdmin>,
    pub answers: Vec<AnswerValue>,
}

impl From<&Admin> for StoredAdmin {
    fn from(admin: &Admin) -> Self {
        Self {
            user_id: admin.user_id.clone(),
            repeat_count: admin.repeat_count,
        }
    }
}
