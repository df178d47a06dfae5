// src/server/state.rs
//! Shared application state for the web server.

use std::sync::Arc;

use crate::config::Settings;
use crate::extractors::{HeadingRules, LocatorOptions, SectionLocator};
use crate::llm::LlmAssist;
use crate::pdf::DocumentLoader;
use crate::utils::AppError;

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub loader: DocumentLoader,
    pub rules: HeadingRules,
    pub locator: SectionLocator,
    /// `None` when no LLM provider is configured
    pub assist: Option<LlmAssist>,
}

impl AppState {
    pub fn new(loader: DocumentLoader, rules: HeadingRules, options: LocatorOptions, assist: Option<LlmAssist>) -> Self {
        Self {
            loader,
            rules,
            locator: SectionLocator::new(options),
            assist,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        Ok(Self::new(
            settings.loader()?,
            settings.heading_rules(),
            settings.locator_options(),
            settings.assist()?,
        ))
    }
}

pub type SharedState = Arc<AppState>;
