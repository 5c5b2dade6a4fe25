//! Response types and error mapping for the HTTP surface

use axum::{
    Json,
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::errors::AppError;
use crate::language::LookupResponse;

/// Message reported to webhook callers when the downstream write fails
pub const UPSERT_FAILED: &str = "error in upsert to SFMC";

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// `{status}` / `{status, message}` body used by every webhook endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn new<S: Into<String>>(status: S) -> Self {
        Self {
            status: status.into(),
            message: None,
        }
    }

    pub fn success() -> Self {
        Self::new("success")
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }
}

impl IntoResponse for StatusResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for LookupResponse {
    fn into_response(self) -> Response {
        match self {
            LookupResponse::Table(entries) => Json(entries).into_response(),
            LookupResponse::Language(answer) => Json(answer).into_response(),
            LookupResponse::Text(text) => (
                [(CONTENT_TYPE, TEXT_CONTENT_TYPE), (CONTENT_DISPOSITION, "inline")],
                text,
            )
                .into_response(),
        }
    }
}

/// Map a failed lookup or request onto an HTTP response.
///
/// Sync, merge and state failures are reported as a bare 500 so callers
/// never see partial data or internal details.
pub fn handle_error(error: AppError) -> Response {
    match &error {
        AppError::Validation { message } => {
            (StatusCode::BAD_REQUEST, StatusResponse::error(message.clone())).into_response()
        }
        _ => {
            error!("Request failed: {}", error);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Webhook result: always 200 with a `{status}` body
pub fn webhook_outcome(result: Result<(), AppError>) -> Response {
    match result {
        Ok(()) => StatusResponse::success().into_response(),
        Err(AppError::Validation { message }) => StatusResponse::error(message).into_response(),
        Err(e) => {
            error!("Error in upsert: {}", e);
            StatusResponse::error(UPSERT_FAILED).into_response()
        }
    }
}
