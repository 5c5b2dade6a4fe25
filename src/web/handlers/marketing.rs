//! Marketing webhook handlers
//!
//! Every webhook answers 200 with a `{status}` body; failures are reported
//! in the body, not the status code.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::web::{
    AppState,
    responses::{StatusResponse, handle_error, webhook_outcome},
};

/// Parse a webhook body; an empty body is an empty object
fn parse_body(body: &[u8]) -> AppResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body).map_err(|e| AppError::validation(format!("invalid JSON body: {e}")))
}

pub async fn consent(State(state): State<AppState>, body: Bytes) -> Response {
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return handle_error(e),
    };
    debug!("Consent payload: {}", body);
    webhook_outcome(state.marketing.submit_consent(&body).await)
}

pub async fn feedback(State(state): State<AppState>, body: Bytes) -> Response {
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return handle_error(e),
    };
    debug!("Feedback payload: {}", body);
    webhook_outcome(state.marketing.submit_feedback(&body).await)
}

/// Relay the raw event to the forward target, then record it
pub async fn tracking(
    State(state): State<AppState>,
    Path(target): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state
        .marketing
        .forward_event(&target, &headers, body.clone())
        .await;

    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return handle_error(e),
    };
    debug!(forward_target = %target, "Tracking payload: {}", body);
    webhook_outcome(state.marketing.submit_tracking(&body).await)
}

pub async fn bulk_tracking(State(state): State<AppState>, body: Bytes) -> Response {
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return handle_error(e),
    };
    match state.marketing.submit_bulk_tracking(&body).await {
        Ok(submitted) => {
            debug!("Bulk import submitted {} rows", submitted);
            webhook_outcome(Ok(()))
        }
        Err(e) => webhook_outcome(Err(e)),
    }
}

/// `{status:"valid"}` when the body carries a `date`
pub async fn compare_time(body: Bytes) -> Response {
    let body = match parse_body(&body) {
        Ok(body) => body,
        Err(e) => return handle_error(e),
    };
    let has_date = body.as_object().is_some_and(|object| object.contains_key("date"));
    let status = if has_date { "valid" } else { "missing date" };
    StatusResponse::new(status).into_response()
}
