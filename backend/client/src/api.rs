use reqwest::Client;

use crate::{
    error::ClientError,
    models::{Created, SubmissionPayload},
};

pub async fn create_submission(
    http: &Client,
    base_url: &str,
    payload: &SubmissionPayload,
) -> Result<Created, ClientError> {
    if payload.admin.is_none() {
        return Err(ClientError::MissingAdmin);
    }

    let url = format!("{}/submissions", base_url.trim_end_matches('/'));
    let response = http.post(url).json(payload).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response.json().await?)
}
