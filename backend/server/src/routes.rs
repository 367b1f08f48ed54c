use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State as AxumState,
    http::{
        HeaderMap, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{Created, Credential},
    state::State,
    submission::{export_submissions, persist_submission},
    utils::{MISSING_EXPORT_PASSWORD, export_csv, get_request_from_body},
};

pub const DB_PASSWORD_HEADER: &str = "x-db-password";

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn submissions_handler(
    AxumState(state): AxumState<Arc<State>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let request = get_request_from_body(body)?;

    let id = persist_submission(state.connector.as_ref(), &request).await?;

    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn export_handler(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let credential = headers
        .get(DB_PASSWORD_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|password| !password.is_empty())
        .map(Credential::new)
        .ok_or(AppError::InvalidField(MISSING_EXPORT_PASSWORD))?;

    let rows = export_submissions(state.connector.as_ref(), &credential)
        .await
        .map_err(AppError::from_export)?;

    let body = export_csv(&rows)?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (CONTENT_DISPOSITION, "attachment; filename=\"submissions.csv\""),
        ],
        body,
    ))
}
