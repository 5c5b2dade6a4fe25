//! Language-pack lookup handlers

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::language::LookupFormat;
use crate::web::{AppState, responses::handle_error};

#[derive(Debug, Default, Deserialize)]
pub struct LookupParams {
    pub format: Option<String>,
}

impl LookupParams {
    fn format(&self) -> LookupFormat {
        LookupFormat::parse(self.format.as_deref())
    }
}

/// `GET /language`: full table or raw merged text
pub async fn full_table(State(state): State<AppState>, Query(params): Query<LookupParams>) -> Response {
    lookup(&state, None, params.format()).await
}

/// `GET /language/{phone}`: one phone number
pub async fn single_phone(
    State(state): State<AppState>,
    Path(phone): Path<String>,
    Query(params): Query<LookupParams>,
) -> Response {
    lookup(&state, Some(&phone), params.format()).await
}

async fn lookup(state: &AppState, phone: Option<&str>, format: LookupFormat) -> Response {
    match state.language.lookup(phone, format).await {
        Ok(answer) => answer.into_response(),
        Err(e) => handle_error(e),
    }
}
