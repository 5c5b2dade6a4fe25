//! Platform health probes

use axum::http::StatusCode;

/// `/_/health`, `/_/check` and `/_/metrics` all answer 200 with no body
pub async fn probe() -> StatusCode {
    StatusCode::OK
}
