// src/config.rs
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::extractors::{HeadingRules, LocatorOptions, Scope};
use crate::llm::backend::{ANTHROPIC_DEFAULT_MODEL, MISTRAL_DEFAULT_MODEL};
use crate::llm::{AnthropicBackend, LlmAssist, LlmBackend, MistralBackend, RetryPolicy};
use crate::pdf::{DocumentLoader, MistralOcr, DEFAULT_MAX_UPLOAD_BYTES};
use crate::utils::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Provider {
    Anthropic,
    Mistral,
    None,
}

/// Settings shared by every subcommand. Each flag falls back to an
/// environment variable (`.env` is loaded at start-up).
#[derive(clap::Args, Debug, Clone)]
pub struct Settings {
    /// LLM provider; defaults to the first one with an API key
    #[arg(long, env = "LLM_PROVIDER", value_enum)]
    pub llm_provider: Option<Provider>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    pub mistral_api_key: Option<String>,

    /// Model name (provider default if unset)
    #[arg(long, env = "LLM_MODEL")]
    pub llm_model: Option<String>,

    /// Override the provider API base URL
    #[arg(long, env = "LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// Attempts per LLM request (1 = no retry)
    #[arg(long, env = "LLM_MAX_RETRIES", default_value_t = 1)]
    pub llm_max_retries: u32,

    /// Characters of document text sent as LLM context
    #[arg(long, env = "LLM_CONTEXT_CHARS", default_value_t = 12_000)]
    pub llm_context_chars: usize,

    /// Cached LLM answers (0 disables the cache)
    #[arg(long, env = "CACHE_CAPACITY", default_value_t = 256)]
    pub cache_capacity: usize,

    /// Seconds before a cached answer expires (0 = never)
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 3600)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    /// Extra heading titles, comma separated
    #[arg(long, env = "KNOWN_HEADINGS", value_delimiter = ',')]
    pub known_headings: Vec<String>,

    /// Longer section bodies are trimmed (0 = keep everything)
    #[arg(long, env = "MAX_SECTION_CHARS", default_value_t = 1000)]
    pub max_section_chars: usize,

    #[arg(long, env = "SECTION_SCOPE", value_enum, default_value_t = Scope::Leaf)]
    pub section_scope: Scope,

    /// Only accept numbered, all-caps and configured headings
    #[arg(long, env = "NO_STANDALONE_HEADINGS")]
    pub no_standalone_headings: bool,

    /// OCR scanned PDFs with Mistral when no text layer is found
    #[arg(long, env = "USE_OCR")]
    pub use_ocr: bool,
}

impl Settings {
    pub fn heading_rules(&self) -> HeadingRules {
        HeadingRules {
            standalone: !self.no_standalone_headings,
            ..HeadingRules::default()
        }
        .with_known_headings(self.known_headings.iter().cloned())
    }

    pub fn locator_options(&self) -> LocatorOptions {
        LocatorOptions {
            scope: self.section_scope,
            max_section_chars: (self.max_section_chars > 0).then_some(self.max_section_chars),
            ..LocatorOptions::default()
        }
    }

    pub fn provider(&self) -> Provider {
        match self.llm_provider {
            Some(provider) => provider,
            None if self.anthropic_api_key.is_some() => Provider::Anthropic,
            None if self.mistral_api_key.is_some() => Provider::Mistral,
            None => Provider::None,
        }
    }

    pub fn backend(&self) -> Result<Option<Arc<dyn LlmBackend>>, AppError> {
        let missing_key = |var: &str| AppError::Config(format!("{} is required for the selected LLM provider", var));

        let backend: Arc<dyn LlmBackend> = match self.provider() {
            Provider::None => return Ok(None),
            Provider::Anthropic => {
                let key = self.anthropic_api_key.as_deref().ok_or_else(|| missing_key("ANTHROPIC_API_KEY"))?;
                let model = self.llm_model.as_deref().unwrap_or(ANTHROPIC_DEFAULT_MODEL);
                let mut backend = AnthropicBackend::new(key, model);
                if let Some(url) = &self.llm_base_url {
                    backend = backend.with_base_url(url.as_str());
                }
                Arc::new(backend)
            }
            Provider::Mistral => {
                let key = self.mistral_api_key.as_deref().ok_or_else(|| missing_key("MISTRAL_API_KEY"))?;
                let model = self.llm_model.as_deref().unwrap_or(MISTRAL_DEFAULT_MODEL);
                let mut backend = MistralBackend::new(key, model);
                if let Some(url) = &self.llm_base_url {
                    backend = backend.with_base_url(url.as_str());
                }
                Arc::new(backend)
            }
        };

        tracing::info!("Using LLM provider {} ({})", backend.provider(), backend.model_id());
        Ok(Some(backend))
    }

    pub fn assist(&self) -> Result<Option<LlmAssist>, AppError> {
        let retry = RetryPolicy {
            max_attempts: self.llm_max_retries.max(1),
            ..RetryPolicy::default()
        };
        Ok(self.backend()?.map(|backend| {
            LlmAssist::new(
                backend,
                ResponseCache::new(self.cache_capacity, Duration::from_secs(self.cache_ttl_secs)),
                retry,
                self.llm_context_chars,
            )
        }))
    }

    pub fn loader(&self) -> Result<DocumentLoader, AppError> {
        let ocr = if self.use_ocr {
            let key = self
                .mistral_api_key
                .as_deref()
                .ok_or_else(|| AppError::Config("USE_OCR requires MISTRAL_API_KEY".to_string()))?;
            Some(MistralOcr::new(key))
        } else {
            None
        };
        Ok(DocumentLoader::new(self.max_upload_bytes, ocr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: Settings,
    }

    fn parse(args: &[&str]) -> Settings {
        TestCli::parse_from(std::iter::once("test").chain(args.iter().copied())).settings
    }

    #[test]
    fn provider_follows_available_keys() {
        let settings = parse(&["--mistral-api-key", "m"]);
        assert_eq!(settings.provider(), Provider::Mistral);

        let settings = parse(&["--mistral-api-key", "m", "--anthropic-api-key", "a"]);
        assert_eq!(settings.provider(), Provider::Anthropic);

        let settings = parse(&["--llm-provider", "none", "--anthropic-api-key", "a"]);
        assert!(settings.assist().expect("no backend").is_none());
    }

    #[test]
    fn selected_provider_needs_its_key() {
        let settings = parse(&["--llm-provider", "mistral", "--anthropic-api-key", "a"]);
        assert!(matches!(settings.backend(), Err(AppError::Config(_))));
    }

    #[test]
    fn builds_rules_and_options() {
        let settings = parse(&[
            "--known-headings", "Lieferumfang,Optionen",
            "--max-section-chars", "0",
            "--section-scope", "subtree",
            "--no-standalone-headings",
        ]);
        let rules = settings.heading_rules();
        assert_eq!(rules.known_headings, vec!["Lieferumfang", "Optionen"]);
        assert!(!rules.standalone);

        let options = settings.locator_options();
        assert_eq!(options.max_section_chars, None);
        assert_eq!(options.scope, Scope::Subtree);
    }

    #[test]
    fn ocr_requires_mistral_key() {
        let settings = parse(&["--use-ocr"]);
        assert!(settings.loader().is_err());
        let settings = parse(&["--use-ocr", "--mistral-api-key", "m", "--max-upload-bytes", "10"]);
        assert_eq!(settings.loader().expect("loader").max_bytes(), 10);
    }
}
