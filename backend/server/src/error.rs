use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::models::ErrorBody;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed JSON body")]
    MalformedPayload,

    #[error("{0}")]
    InvalidField(&'static str),

    #[error("Failed to save submission")]
    Persistence(#[source] DatabaseError),

    #[error("Failed to export submissions")]
    Export(#[source] DatabaseError),

    #[error("Unexpected error")]
    InternalError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database is not configured, missing: {0}")]
    NotConfigured(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl DatabaseError {
    /// Errors raised before a transaction exists.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            DatabaseError::NotConfigured(_) | DatabaseError::ConnectionFailed(_)
        )
    }
}

impl From<DatabaseError> for AppError {
    fn from(e: DatabaseError) -> Self {
        if e.is_connection() {
            AppError::InternalError(Box::new(e))
        } else {
            AppError::Persistence(e)
        }
    }
}

impl AppError {
    /// Same split as the `From` impl, with query failures reported as an export failure.
    pub fn from_export(e: DatabaseError) -> Self {
        if e.is_connection() {
            AppError::InternalError(Box::new(e))
        } else {
            AppError::Export(e)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::MalformedPayload | AppError::InvalidField(_) => StatusCode::BAD_REQUEST,
            AppError::Persistence(e) => {
                error!("Transaction rolled back: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Export(e) => {
                error!("Export query failed: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::InternalError(e) => {
                error!("Unexpected error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, DatabaseError};

    #[test]
    fn test_connection_errors_are_opaque() {
        let app: AppError = DatabaseError::ConnectionFailed("password rejected".into()).into();

        assert!(matches!(app, AppError::InternalError(_)));
        assert_eq!(app.to_string(), "Unexpected error");
    }

    #[test]
    fn test_query_errors_are_persistence() {
        let app: AppError = DatabaseError::QueryFailed("duplicate key".into()).into();

        assert!(matches!(app, AppError::Persistence(_)));
        assert_eq!(app.to_string(), "Failed to save submission");
    }

    #[test]
    fn test_export_errors() {
        let query = AppError::from_export(DatabaseError::QueryFailed("relation missing".into()));
        let connect = AppError::from_export(DatabaseError::NotConfigured("DB_HOST".into()));

        assert_eq!(query.to_string(), "Failed to export submissions");
        assert_eq!(connect.to_string(), "Unexpected error");
    }
}
