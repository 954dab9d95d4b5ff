//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered to HTTP callers.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use docchat_core::ports::PortError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("{0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a database migration failure at startup.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The body of every failed response.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    /// Enumerable error kind, e.g. `not_found` or `llm_timeout`.
    pub kind: String,
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Port(e) => {
                let status = match e {
                    PortError::InvalidInput(_) | PortError::InvalidChunkConfig { .. } => {
                        StatusCode::BAD_REQUEST
                    }
                    PortError::NotFound(_) => StatusCode::NOT_FOUND,
                    PortError::UnreadablePdf(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    PortError::EmbeddingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    PortError::LlmUnavailable(_) => StatusCode::BAD_GATEWAY,
                    PortError::LlmTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    PortError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            }
            ApiError::Database(_) | ApiError::Migration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }

    /// The message shown to callers. Storage and internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Port(PortError::Storage(_))
            | ApiError::Database(_)
            | ApiError::Migration(_) => "A storage error occurred".to_string(),
            ApiError::Port(e) => e.to_string(),
            _ => "An internal error occurred".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            error!(kind, "Request failed: {}", self);
        }
        let body = ErrorResponse {
            success: false,
            error: self.public_message(),
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_status_and_kind() {
        let cases = [
            (PortError::InvalidInput("x".into()), StatusCode::BAD_REQUEST, "invalid_input"),
            (PortError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (PortError::UnreadablePdf("x".into()), StatusCode::UNPROCESSABLE_ENTITY, "unreadable_pdf"),
            (PortError::LlmTimeout(30), StatusCode::GATEWAY_TIMEOUT, "llm_timeout"),
            (PortError::LlmUnavailable("x".into()), StatusCode::BAD_GATEWAY, "llm_unavailable"),
            (PortError::Storage("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "storage_failure"),
        ];
        for (err, status, kind) in cases {
            assert_eq!(ApiError::from(err).status_and_kind(), (status, kind));
        }
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err = ApiError::from(PortError::Storage("no such table: chunks".into()));
        assert_eq!(err.public_message(), "A storage error occurred");

        let err = ApiError::from(PortError::NotFound("Session abc not found".into()));
        assert_eq!(err.public_message(), "Item not found: Session abc not found");
    }

    #[test]
    fn startup_failures_are_internal() {
        let err = ApiError::from(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "address already in use",
        ));
        assert_eq!(
            err.status_and_kind(),
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        );
        assert_eq!(err.public_message(), "An internal error occurred");
    }
}
