use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    database::{Connector, Session},
    error::DatabaseError,
    models::{Credential, ExportRow, NewSubmission, SubmissionRequest},
};

/// Writes the submission and its answers in one transaction and returns the new id.
///
/// The session is closed before returning on every path. Any failure after the
/// connection is open rolls the transaction back.
pub async fn persist_submission(
    connector: &dyn Connector,
    request: &SubmissionRequest,
) -> Result<Uuid, DatabaseError> {
    let submission = NewSubmission {
        id: Uuid::new_v4(),
        user_id: request.user_id.clone(),
        repeat_count: request.repeat_count,
    };

    let mut session = connector.connect(&request.credential).await?;

    let result = write(session.as_mut(), &submission, request).await;

    if let Err(e) = &result {
        warn!("Rolling back submission {}: {e}", submission.id);

        if let Err(rollback) = session.rollback().await {
            warn!("Rollback of submission {} failed: {rollback}", submission.id);
        }
    }

    session.close().await;

    result.map(|()| {
        info!(
            "Stored submission {} for {} with {} answers",
            submission.id,
            submission.user_id,
            request.answers.len()
        );
        submission.id
    })
}

/// Reads every stored submission joined with its answers.
pub async fn export_submissions(
    connector: &dyn Connector,
    credential: &Credential,
) -> Result<Vec<ExportRow>, DatabaseError> {
    let mut session = connector.connect(credential).await?;

    let result = session.fetch_rows().await;

    session.close().await;

    if let Ok(rows) = &result {
        info!("Exported {} rows", rows.len());
    }

    result
}

async fn write(
    session: &mut dyn Session,
    submission: &NewSubmission,
    request: &SubmissionRequest,
) -> Result<(), DatabaseError> {
    session.begin().await?;
    session.insert_submission(submission).await?;
    session
        .insert_answers(submission.id, &request.answers)
        .await?;
    session.commit().await
}
