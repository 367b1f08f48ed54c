//! # Local Storage
//!
//! Fallback for when the API cannot be reached.
//!
//! - One key, `lab-form/submissions`, holding a JSON array of every locally saved submission
//! - Append only: each save reads the array, pushes one entry and writes the whole array back
//! - Unreadable or corrupt contents are treated as an empty array
//! - Never re-synced to the server
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    error::ClientError,
    models::{LocalSubmission, STORAGE_KEY, SubmissionPayload},
};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, ClientError> {
        match fs::read_to_string(self.path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), ClientError> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        write_atomic(&path, value)?;
        Ok(())
    }

    pub fn load_submissions(&self) -> Vec<LocalSubmission> {
        let text = match self.get_item(STORAGE_KEY) {
            Ok(Some(text)) => text,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read local submissions: {e}");
                return Vec::new();
            }
        };

        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!("Local submissions are corrupt, starting over: {e}");
            Vec::new()
        })
    }

    pub fn save_submission(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<LocalSubmission, ClientError> {
        let entry = LocalSubmission {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            admin: payload.admin.as_ref().map(Into::into),
            answers: payload.answers.clone(),
        };

        let mut current = self.load_submissions();
        current.push(entry.clone());
        self.set_item(STORAGE_KEY, &serde_json::to_string(&current)?)?;

        debug!("Saved submission {} locally", entry.id);

        Ok(entry)
    }
}

fn write_atomic(path: &Path, value: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, value)?;
    fs::rename(&tmp, path)
}
