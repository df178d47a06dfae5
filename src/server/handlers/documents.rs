// src/server/handlers/documents.rs
//! PDF upload endpoints.

use std::collections::HashMap;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use crate::extractors::section::{parse_requirements, KeywordResult};
use crate::extractors::toc::{TableOfContents, TocEntry};
use crate::llm::DEFAULT_TOC_CHUNK_CHARS;
use crate::pdf::{ExtractedDocument, TextSource, UploadedPdf};
use crate::server::error::ApiError;
use crate::server::state::SharedState;

// ── Responses ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct TocResponse {
    pub file_name: String,
    pub file_size: usize,
    pub text_source: TextSource,
    pub pdf_text: String,
    pub table_of_contents: Vec<TocEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_toc_error: Option<String>,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub file_name: String,
    pub file_size: usize,
    pub table_of_contents: Vec<TocEntry>,
    pub technical_details: Vec<KeywordResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_toc_error: Option<String>,
    pub success: bool,
}

// ── Multipart input ───────────────────────────────────────────────────────────

struct UploadForm {
    file: Option<UploadedPdf>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut mp: Multipart) -> Result<Self, ApiError> {
        let mut file = None;
        let mut fields = HashMap::new();

        while let Some(field) = mp.next_field().await? {
            let name = field.name().unwrap_or("").to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
                let content_type = field.content_type().map(String::from);
                let bytes = field.bytes().await?;
                file = Some(UploadedPdf { file_name, content_type, bytes: bytes.to_vec() });
            } else if !name.is_empty() {
                fields.insert(name, field.text().await?);
            }
        }

        Ok(Self { file, fields })
    }

    fn take_file(&mut self) -> Result<UploadedPdf, ApiError> {
        self.file
            .take()
            .ok_or_else(|| ApiError::BadRequest("No file uploaded (expected multipart field 'file')".to_string()))
    }

    fn flag(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"))
    }
}

/// Heuristic TOC, optionally extended by LLM suggestions. A failing LLM
/// leaves the heuristic TOC in place and reports the error.
async fn build_toc(state: &SharedState, doc: &ExtractedDocument, with_llm: bool) -> (TableOfContents, Option<String>) {
    let mut toc = TableOfContents::build(&doc.text, &state.rules);
    if toc.is_empty() {
        tracing::warn!("No headings detected in {}", doc.file_name);
    } else {
        tracing::info!("Built table of contents for {}: {} entries", doc.file_name, toc.len());
    }

    let assist = match (&state.assist, with_llm) {
        (Some(assist), true) => assist,
        _ => return (toc, None),
    };
    match assist.suggest_toc(&doc.text, DEFAULT_TOC_CHUNK_CHARS).await {
        Ok(suggestions) => {
            let added = toc.merge(suggestions);
            tracing::info!("Merged {} LLM headings into table of contents", added);
            (toc, None)
        }
        Err(e) => {
            tracing::warn!("LLM table of contents failed: {}", e);
            (toc, Some(e.to_string()))
        }
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

pub async fn toc(State(state): State<SharedState>, mp: Multipart) -> Result<Json<TocResponse>, ApiError> {
    let mut form = UploadForm::read(mp).await?;
    let upload = form.take_file()?;
    let doc = state.loader.load(upload).await?;
    Ok(Json(process_document(&state, doc, &keywords, form.flag("llm_toc")).await))
}

async fn process_document(
    state: &SharedState,
    doc: ExtractedDocument,
    keywords: &[String],
    with_llm_toc: bool,
) -> ProcessResponse {
    let (toc, llm_toc_error) = build_toc(state, &doc, with_llm_toc).await;

    let mut technical_details = Vec::with_capacity(keywords.len());
    for keyword in keywords {
        let (outcome, fallback_error) = state
            .locator
            .resolve(&doc.text, &toc, keyword, state.assist.as_ref())
            .await;
        technical_details.push(KeywordResult::from_outcome(&outcome, fallback_error));
    }
    tracing::info!(
        "Processed {} keywords for {}: {} found",
        keywords.len(),
        doc.file_name,
        technical_details.iter().filter(|r| r.found).count()
    );

    ProcessResponse {
        file_name: doc.file_name,
        file_size: doc.file_size,
        table_of_contents: toc.entries().to_vec(),
        technical_details,
        llm_toc_error,
        success: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{HeadingRules, LocatorOptions};
    use crate::llm::testing::{assist_with, FakeBackend};
    use crate::pdf::{DocumentLoader, DEFAULT_MAX_UPLOAD_BYTES};
    use crate::server::state::AppState;
    use std::sync::Arc;

    const FIXTURE: &str = include_str!("../../../tests/fixtures/stenter_spec.txt");

    fn shared(backend: Arc<FakeBackend>) -> SharedState {
        Arc::new(AppState::new(
            DocumentLoader::new(DEFAULT_MAX_UPLOAD_BYTES, None),
            HeadingRules::default(),
            LocatorOptions::default(),
            Some(assist_with(backend)),
        ))
    }

    fn document() -> ExtractedDocument {
        ExtractedDocument {
            file_name: "spannrahmen.pdf".into(),
            file_size: 4096,
            text: FIXTURE.to_string(),
            source: TextSource::PdfText,
        }
    }

    #[tokio::test]
    async fn process_reports_failed_llm_toc() {
        let state = shared(Arc::new(FakeBackend::new(vec![Err(503)])));
        let response = process_document(&state, document(), &["Preis".to_string()], true).await;

        assert!(response.llm_toc_error.as_deref().is_some_and(|e| e.contains("503")));
        assert!(!response.table_of_contents.is_empty());
        assert!(response.technical_details[0].found);
    }

    #[tokio::test]
    async fn process_without_llm_toc_has_no_toc_error() {
        let backend = Arc::new(FakeBackend::new(vec![Err(503)]));
        let state = shared(backend.clone());
        let response = process_document(&state, document(), &["Preis".to_string()], false).await;

        assert_eq!(response.llm_toc_error, None);
        assert_eq!(backend.call_count(), 0);
        let json = serde_json::to_value(&response).expect("json");
        assert!(json.get("llm_toc_error").is_none());
    }
}
