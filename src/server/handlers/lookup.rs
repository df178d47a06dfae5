// src/server/handlers/lookup.rs
//! JSON endpoints working on already extracted text.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::extractors::context::{article_lines, keyword_context, ContextHit};
use crate::extractors::section::KeywordResult;
use crate::extractors::toc::TableOfContents;
use crate::llm::response::SimilarityAnswer;
use crate::server::error::ApiError;
use crate::server::handlers::single_keyword;
use crate::server::state::SharedState;

const DEFAULT_CONTEXT_RADIUS: usize = 2;

// ── Input ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SectionRequest {
    pub text: String,
    pub keyword: String,
}

#[derive(Debug, Deserialize)]
pub struct SimilarRequest {
    pub keyword: String,
    pub context: String,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: String,
    pub context: String,
}

#[derive(Debug, Deserialize)]
pub struct ContextRequest {
    pub text: String,
    pub keyword: String,
    pub radius: Option<usize>,
}

// ── Output ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,
    /// The model's answer as returned
    pub result: String,
    pub cached: bool,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub cached: bool,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ContextResponse {
    pub keyword: String,
    pub hits: Vec<ContextHit>,
    pub article_lines: Vec<String>,
    pub success: bool,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

pub async fn section(
    State(state): State<SharedState>,
    payload: Result<Json<SectionRequest>, JsonRejection>,
) -> Result<Json<KeywordResult>, ApiError> {
    let Json(req) = payload?;
    let keyword = single_keyword(&req.keyword)?;

    let toc = TableOfContents::build(&req.text, &state.rules);
    let (outcome, fallback_error) = state
        .locator
        .resolve(&req.text, &toc, &keyword, state.assist.as_ref())
        .await;

    Ok(Json(KeywordResult::from_outcome(&outcome, fallback_error)))
}

pub async fn similar(
    State(state): State<SharedState>,
    payload: Result<Json<SimilarRequest>, JsonRejection>,
) -> Result<Json<SimilarResponse>, ApiError> {
    let Json(req) = payload?;
    let assist = state.assist.as_ref().ok_or(ApiError::LlmUnavailable)?;
    let keyword = single_keyword(&req.keyword)?;
    if req.context.trim().is_empty() {
        return Err(ApiError::BadRequest("context is empty".to_string()));
    }

    let reply = assist.similar(&keyword, &req.context).await?;
    let (found, term, sentence) = match reply.value {
        SimilarityAnswer::Similar { term, sentence } => (true, Some(term), Some(sentence)),
        SimilarityAnswer::NoMatch => (false, None, None),
    };

    Ok(Json(SimilarResponse {
        found,
        term,
        sentence,
        result: reply.raw,
        cached: reply.cached,
        success: true,
    }))
}

pub async fn ask(
    State(state): State<SharedState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(req) = payload?;
    if req.query.trim().is_empty() || req.context.trim().is_empty() {
        return Err(ApiError::BadRequest("query and context are required".to_string()));
    }
    let assist = state.assist.as_ref().ok_or(ApiError::LlmUnavailable)?;

    let reply = assist.ask_question(req.query.trim(), &req.context).await?;
    Ok(Json(AskResponse {
        answer: reply.value,
        cached: reply.cached,
        success: true,
    }))
}

pub async fn context(payload: Result<Json<ContextRequest>, JsonRejection>) -> Result<Json<ContextResponse>, ApiError> {
    let Json(req) = payload?;
    let keyword = single_keyword(&req.keyword)?;
    let radius = req.radius.unwrap_or(DEFAULT_CONTEXT_RADIUS);

    Ok(Json(ContextResponse {
        hits: keyword_context(&req.text, &keyword, radius)?,
        article_lines: article_lines(&req.text, &keyword)?,
        keyword,
        success: true,
    }))
}
