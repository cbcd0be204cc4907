//! Failure taxonomy shared by the scheduling validator, the grading engine and the endpoints.

use std::future::Future;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The storage layer aborted the transaction because a concurrent one touched the same rows.
    /// Safe to retry against fresh data.
    #[error("transaction aborted by a concurrent writer: {0}")]
    Contention(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(why: impl Into<String>) -> Self {
        Self::Conflict(why.into())
    }

    pub fn invalid(why: impl Into<String>) -> Self {
        Self::InvalidInput(why.into())
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidInput(_) => "invalid_input",
            Self::Contention(_) | Self::Storage(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Contention(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// SQLSTATE codes that mean "someone else got there first, try again":
// serialization_failure, deadlock_detected, unique_violation.
const RETRYABLE_SQLSTATES: [&str; 3] = ["40001", "40P01", "23505"];

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if let Some(code) = db_err.code() {
                if RETRYABLE_SQLSTATES.contains(&&*code) {
                    return Self::Contention(db_err.message().to_owned());
                }
            }
        }
        Self::Storage(format!("{e}"))
    }
}

impl From<JsonRejection> for EngineError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for EngineError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("{self}");
        }

        let body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

/// Runs a transactional operation, re-running it once from scratch if the storage layer
/// aborted it for contention. A second abort is reported as a conflict.
pub async fn retry_once<T, F, Fut>(operation: &str, mut op: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    match op().await {
        Err(EngineError::Contention(reason)) => {
            tracing::warn!("{operation}: retrying after aborted transaction ({reason})");
            match op().await {
                Err(EngineError::Contention(reason)) => Err(EngineError::Conflict(format!(
                    "{operation} lost a concurrent update twice: {reason}"
                ))),
                other => other,
            }
        }
        other => other,
    }
}
