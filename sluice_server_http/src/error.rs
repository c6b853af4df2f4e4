use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sluice_ingest_core::{AdminError, TransportError};
use thiserror::Error;

use crate::types::ErrorResponse;

/// Errors returned by the cluster HTTP server.
#[derive(Error, Debug)]
pub enum HttpServerError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("remote error: {message}")]
    Remote { status: u16, message: String },
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = HttpServerError> = std::result::Result<T, E>;

impl HttpServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HttpServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpServerError::NotFound(_) => StatusCode::NOT_FOUND,
            HttpServerError::Conflict(_) => StatusCode::CONFLICT,
            HttpServerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            HttpServerError::Remote { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            HttpServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AdminError> for HttpServerError {
    fn from(error: AdminError) -> Self {
        match error {
            AdminError::NotFound { .. } => HttpServerError::NotFound(error.to_string()),
            AdminError::AlreadyExists { .. } => HttpServerError::Conflict(error.to_string()),
            AdminError::InvalidArgument { .. } => HttpServerError::BadRequest(error.to_string()),
            AdminError::Timeout { .. } => HttpServerError::Timeout(error.to_string()),
            AdminError::Remote { status, message } => HttpServerError::Remote { status, message },
            AdminError::Connection { .. } | AdminError::Internal { .. } => {
                HttpServerError::Internal(error.to_string())
            }
        }
    }
}

impl From<TransportError> for HttpServerError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::ShardNotFound { .. } => HttpServerError::NotFound(error.to_string()),
            TransportError::MalformedRequest { ref source } => {
                HttpServerError::BadRequest(format!("{error}: {source}"))
            }
            TransportError::Remote { status, message } => {
                HttpServerError::Remote { status, message }
            }
            _ => HttpServerError::Internal(error.to_string()),
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let response = Json(ErrorResponse {
            message: self.to_string(),
        });

        (status_code, response).into_response()
    }
}
