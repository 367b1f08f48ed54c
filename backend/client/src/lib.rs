//! Client side of the feedback form.
//!
//! The form posts once to the API. When there is no API address, the request cannot be sent, or the
//! server rejects it, the submission is appended to local storage instead and the user is told it
//! only lives on this machine. A payload without an admin block takes the same path. Nothing is
//! retried and nothing is synced later.
pub mod api;
pub mod error;
pub mod models;
pub mod storage;

use reqwest::Client;
use tracing::{info, warn};

use api::create_submission;
use error::ClientError;
use models::{LocalSubmission, SubmissionPayload};
use storage::LocalStore;

#[derive(Debug)]
pub enum Outcome {
    Remote { id: String },
    Local(LocalSubmission),
}

pub async fn submit(
    http: &Client,
    base_url: Option<&str>,
    payload: &SubmissionPayload,
    store: &LocalStore,
) -> Result<Outcome, ClientError> {
    let attempt = match base_url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => create_submission(http, url, payload).await,
        None => Err(ClientError::Unconfigured),
    };

    match attempt {
        Ok(created) => {
            info!("Saved remotely, id={}", created.id);
            Ok(Outcome::Remote { id: created.id })
        }
        Err(e) => {
            warn!("Falling back to local storage: {e}");
            let entry = store.save_submission(payload)?;
            info!("Saved locally, id={}", entry.id);
            Ok(Outcome::Local(entry))
        }
    }
}
