// src/server/handlers/mod.rs
pub mod documents;
pub mod lookup;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::extractors::section::parse_requirements;
use crate::server::error::ApiError;
use crate::server::state::SharedState;

pub async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "llm": state.assist.as_ref().map(|a| a.provider()),
        "cached_answers": state.assist.as_ref().map_or(0, |a| a.cache().len()),
    }))
}

/// Drops every cached LLM answer.
pub async fn clear_cache(State(state): State<SharedState>) -> Json<Value> {
    let cleared = match &state.assist {
        Some(assist) if !assist.cache().is_empty() => {
            let count = assist.cache().len();
            assist.cache().clear();
            count
        }
        _ => 0,
    };
    tracing::info!("Cleared {} cached LLM answers", cleared);
    Json(json!({ "cleared": cleared, "success": true }))
}

/// Validates a single keyword with the same rules as requirement lists.
pub(crate) fn single_keyword(raw: &str) -> Result<String, ApiError> {
    let mut keywords = parse_requirements(raw)?;
    match keywords.len() {
        1 => Ok(keywords.remove(0)),
        0 => Err(ApiError::BadRequest("keyword is empty".to_string())),
        _ => Err(ApiError::BadRequest("expected a single keyword".to_string())),
    }
}
