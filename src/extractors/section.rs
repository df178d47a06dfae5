// src/extractors/section.rs

// --- Imports ---
use crate::extractors::toc::{floor_char_boundary, Scope, TableOfContents};
use crate::llm::response::SimilarityAnswer;
use crate::llm::LlmAssist;
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

// --- Constants ---
const MAX_KEYWORD_CHARS: usize = 500;
const PATTERN_HEADING_TAIL: usize = 50;
const PATTERN_WINDOW_CHARS: usize = 1000;
const PATTERN_FALLBACK_CHARS: usize = 500;
const EXTRACT_RADIUS_CHARS: usize = 2000;
const TRIM_PARAGRAPHS: usize = 3;

// --- Regex Patterns (Lazy Static) ---
// Where an unstructured section body ends: next article code, a large gap, or a numbered line.
static SECTION_END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{2}\.\d{2}\.\d{2}\.\d{2}|\n\n\n|\n\s*\d+\.\s+")
        .expect("Failed to compile SECTION_END_RE")
});

static PARAGRAPH_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n\s*\n").expect("Failed to compile PARAGRAPH_BREAK_RE")
});

// --- Data Structures ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ExactHeading,
    PositionInterval,
    PatternHeuristic,
    LlmSimilarity,
    LlmExtract,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedSection {
    pub keyword: String,
    pub heading: String,
    pub level: Option<u8>,
    pub body: String,
    pub start: usize,
    pub end: usize,
    pub match_offset: Option<usize>,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocateOutcome {
    Found(LocatedSection),
    NotFound { keyword: String },
}

impl LocateOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, LocateOutcome::Found(_))
    }

    pub fn section(&self) -> Option<&LocatedSection> {
        match self {
            LocateOutcome::Found(section) => Some(section),
            LocateOutcome::NotFound { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocatorOptions {
    pub scope: Scope,
    /// Longer bodies are shortened with [`trim_section`].
    pub max_section_chars: Option<usize>,
    pub pattern_heuristic: bool,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            scope: Scope::Leaf,
            max_section_chars: Some(1000),
            pattern_heuristic: true,
        }
    }
}

/// Per-keyword answer shared by the CLI and the HTTP API.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeywordResult {
    pub keyword: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_error: Option<String>,
}

impl KeywordResult {
    pub fn from_outcome(outcome: &LocateOutcome, fallback_error: Option<String>) -> Self {
        match outcome {
            LocateOutcome::Found(section) => Self {
                keyword: section.keyword.clone(),
                found: true,
                heading: Some(section.heading.clone()),
                level: section.level,
                section: Some(section.body.clone()),
                strategy: Some(section.strategy),
                start: Some(section.start),
                end: Some(section.end),
                message: None,
                fallback_error,
            },
            LocateOutcome::NotFound { keyword } => Self {
                keyword: keyword.clone(),
                found: false,
                message: Some(format!("No section found for '{}'", keyword)),
                fallback_error,
                ..Self::default()
            },
        }
    }
}

// --- Strategies ---
/// One way of mapping a keyword to a section.
pub trait LocateStrategy: Send + Sync {
    fn kind(&self) -> Strategy;

    fn locate(
        &self,
        text: &str,
        toc: &TableOfContents,
        keyword: &str,
        options: &LocatorOptions,
    ) -> Option<LocatedSection>;
}

/// A heading title contains the keyword.
pub struct ExactHeadingStrategy;

impl LocateStrategy for ExactHeadingStrategy {
    fn kind(&self) -> Strategy {
        Strategy::ExactHeading
    }

    fn locate(&self, text: &str, toc: &TableOfContents, keyword: &str, options: &LocatorOptions) -> Option<LocatedSection> {
        let index = toc.find_title(keyword)?;
        section_for_entry(text, toc, index, keyword, None, self.kind(), options)
    }
}

/// The keyword occurs in the body text; the last heading before it owns the section.
pub struct PositionIntervalStrategy;

impl LocateStrategy for PositionIntervalStrategy {
    fn kind(&self) -> Strategy {
        Strategy::PositionInterval
    }

    fn locate(&self, text: &str, toc: &TableOfContents, keyword: &str, options: &LocatorOptions) -> Option<LocatedSection> {
        let offset = find_keyword(text, keyword)?;
        let index = toc.enclosing(offset)?;
        section_for_entry(text, toc, index, keyword, Some(offset), self.kind(), options)
    }
}

/// Fallback for keywords without an enclosing heading: the matched line is
/// the heading and the following text up to the next structural break is the body.
pub struct PatternHeuristicStrategy;

impl LocateStrategy for PatternHeuristicStrategy {
    fn kind(&self) -> Strategy {
        Strategy::PatternHeuristic
    }

    fn locate(&self, text: &str, toc: &TableOfContents, keyword: &str, options: &LocatorOptions) -> Option<LocatedSection> {
        let needle = regex::escape(keyword.trim());
        if needle.is_empty() {
            return None;
        }
        let pattern = format!(r"{}[^\n]{{0,{}}}", needle, PATTERN_HEADING_TAIL);
        let re = RegexBuilder::new(&pattern).case_insensitive(true).build().ok()?;
        let m = re.find(text)?;

        // The body must not run into the first detected section.
        let limit = toc
            .entries()
            .first()
            .map_or(text.len(), |entry| entry.offset)
            .max(m.end());
        let rest = &text[m.end()..limit];
        let window = prefix_chars(rest, PATTERN_WINDOW_CHARS);
        let cut = SECTION_END_RE
            .find(window)
            .map(|end| window[..end.start()].trim())
            .filter(|body| !body.is_empty());
        let body = match cut {
            Some(body) => body,
            None => prefix_chars(rest, PATTERN_FALLBACK_CHARS).trim(),
        };
        if body.is_empty() {
            tracing::debug!("Pattern match for '{}' has no body text", keyword);
            return None;
        }

        let end = m.end() + (rest.len() - rest.trim_start().len()) + body.len();
        Some(LocatedSection {
            keyword: keyword.to_string(),
            heading: m.as_str().trim().to_string(),
            level: None,
            body: apply_limit(body, options),
            start: m.start(),
            end,
            match_offset: Some(m.start()),
            strategy: self.kind(),
        })
    }
}

// --- Locator ---
pub struct SectionLocator {
    options: LocatorOptions,
    strategies: Vec<Box<dyn LocateStrategy>>,
}

impl SectionLocator {
    pub fn new(options: LocatorOptions) -> Self {
        let mut strategies: Vec<Box<dyn LocateStrategy>> =
            vec![Box::new(ExactHeadingStrategy), Box::new(PositionIntervalStrategy)];
        if options.pattern_heuristic {
            strategies.push(Box::new(PatternHeuristicStrategy));
        }
        Self { options, strategies }
    }

    /// Runs the heuristic strategies in order. Never fails: a keyword that
    /// cannot be placed yields [`LocateOutcome::NotFound`].
    pub fn locate(&self, text: &str, toc: &TableOfContents, keyword: &str) -> LocateOutcome {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return LocateOutcome::NotFound { keyword: String::new() };
        }

        for strategy in &self.strategies {
            if let Some(section) = strategy.locate(text, toc, keyword, &self.options) {
                tracing::debug!(
                    "Located '{}' via {:?} under '{}' [{}..{}]",
                    keyword, section.strategy, section.heading, section.start, section.end
                );
                return LocateOutcome::Found(section);
            }
        }

        tracing::info!("No heuristic section found for '{}'", keyword);
        LocateOutcome::NotFound { keyword: keyword.to_string() }
    }

    /// Like [`locate`](Self::locate), then asks the LLM when the heuristics
    /// come up empty. LLM failures do not abort the lookup; they are returned
    /// next to a `NotFound` outcome.
    pub async fn resolve(
        &self,
        text: &str,
        toc: &TableOfContents,
        keyword: &str,
        assist: Option<&LlmAssist>,
    ) -> (LocateOutcome, Option<String>) {
        let outcome = self.locate(text, toc, keyword);
        let assist = match (&outcome, assist) {
            (LocateOutcome::NotFound { .. }, Some(assist)) => assist,
            _ => return (outcome, None),
        };
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return (outcome, None);
        }

        let attempt = match find_keyword(text, keyword) {
            None => self.resolve_similar(text, toc, keyword, assist).await,
            Some(offset) => self.resolve_extract(text, toc, keyword, offset, assist).await,
        };

        match attempt {
            Ok(Some(section)) => (LocateOutcome::Found(section), None),
            Ok(None) => (outcome, None),
            Err(e) => {
                tracing::warn!("LLM fallback for '{}' failed: {}", keyword, e);
                (outcome, Some(e.to_string()))
            }
        }
    }

    async fn resolve_similar(
        &self,
        text: &str,
        toc: &TableOfContents,
        keyword: &str,
        assist: &LlmAssist,
    ) -> Result<Option<LocatedSection>, crate::utils::error::LlmError> {
        let context = prefix_chars(text, assist.context_chars());
        let reply = assist.similar(keyword, context).await?;
        let (term, sentence) = match reply.value {
            SimilarityAnswer::Similar { term, sentence } => (term, sentence),
            SimilarityAnswer::NoMatch => return Ok(None),
        };
        tracing::info!("LLM suggested '{}' as similar to '{}'", term, keyword);

        let relabel = |mut section: LocatedSection| {
            section.keyword = keyword.to_string();
            section.strategy = Strategy::LlmSimilarity;
            section
        };

        if let LocateOutcome::Found(section) = self.locate(text, toc, &term) {
            return Ok(Some(relabel(section)));
        }

        let sentence_offset = find_keyword(text, sentence.trim());
        if let Some(index) = sentence_offset.and_then(|offset| toc.enclosing(offset)) {
            if let Some(section) = section_for_entry(text, toc, index, keyword, sentence_offset, Strategy::LlmSimilarity, &self.options) {
                return Ok(Some(section));
            }
        }

        // Only the LLM's sentence is left.
        let start = sentence_offset.unwrap_or(0);
        Ok(Some(LocatedSection {
            keyword: keyword.to_string(),
            heading: term,
            level: None,
            body: sentence.trim().to_string(),
            start,
            end: sentence_offset.map_or(0, |offset| offset + sentence.trim().len()),
            match_offset: sentence_offset,
            strategy: Strategy::LlmSimilarity,
        }))
    }

    async fn resolve_extract(
        &self,
        text: &str,
        toc: &TableOfContents,
        keyword: &str,
        offset: usize,
        assist: &LlmAssist,
    ) -> Result<Option<LocatedSection>, crate::utils::error::LlmError> {
        let (start, end) = char_window(text, offset, EXTRACT_RADIUS_CHARS);
        let reply = assist.extract_section(keyword, &text[start..end]).await?;
        let Some(body) = reply.value else {
            return Ok(None);
        };

        let entry = toc.enclosing(offset).and_then(|i| toc.entries().get(i));
        Ok(Some(LocatedSection {
            keyword: keyword.to_string(),
            heading: entry.map_or_else(|| keyword.to_string(), |e| e.title.clone()),
            level: entry.map(|e| e.level),
            body: apply_limit(&body, &self.options),
            start,
            end,
            match_offset: Some(offset),
            strategy: Strategy::LlmExtract,
        }))
    }
}

// --- Helpers ---
fn section_for_entry(
    text: &str,
    toc: &TableOfContents,
    index: usize,
    keyword: &str,
    match_offset: Option<usize>,
    strategy: Strategy,
    options: &LocatorOptions,
) -> Option<LocatedSection> {
    let entry = toc.entries().get(index)?;
    let span = toc.span(index, text.len(), options.scope)?;
    let body_start = text[span.clone()]
        .find('\n')
        .map_or(span.end, |i| span.start + i + 1);

    Some(LocatedSection {
        keyword: keyword.to_string(),
        heading: entry.title.clone(),
        level: Some(entry.level),
        body: apply_limit(text[body_start..span.end].trim(), options),
        start: span.start,
        end: span.end,
        match_offset,
        strategy,
    })
}

fn apply_limit(body: &str, options: &LocatorOptions) -> String {
    match options.max_section_chars {
        Some(max) => trim_section(body, max),
        None => body.to_string(),
    }
}

fn prefix_chars(text: &str, chars: usize) -> &str {
    text.char_indices().nth(chars).map_or(text, |(i, _)| &text[..i])
}

/// Byte range covering up to `radius` characters on each side of `at`.
fn char_window(text: &str, at: usize, radius: usize) -> (usize, usize) {
    let at = floor_char_boundary(text, at);
    let start = match radius {
        0 => at,
        _ => text[..at].char_indices().rev().nth(radius - 1).map_or(0, |(i, _)| i),
    };
    (start, at + prefix_chars(&text[at..], radius).len())
}

/// Case-insensitive, literal keyword pattern.
pub fn keyword_pattern(keyword: &str) -> Result<Regex, ExtractError> {
    RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
        .map_err(|e| ExtractError::RegexError(e.to_string()))
}

/// Byte offset of the first case-insensitive occurrence of `keyword`.
pub fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    if keyword.is_empty() {
        return None;
    }
    keyword_pattern(keyword).ok()?.find(text).map(|m| m.start())
}

/// Shortens a long section body: the first paragraphs if there are several,
/// otherwise a cut at the last sentence end that fits.
pub fn trim_section(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }

    let paragraphs: Vec<&str> = PARAGRAPH_BREAK_RE
        .split(body)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if paragraphs.len() > 1 {
        return paragraphs
            .iter()
            .take(TRIM_PARAGRAPHS)
            .copied()
            .collect::<Vec<_>>()
            .join("\n\n");
    }

    let head = prefix_chars(body, max_chars);
    match head.rfind(['.', '!', '?']) {
        Some(i) if i > 0 => head[..=i].to_string(),
        _ => head.trim_end().to_string(),
    }
}

/// Parses the newline-separated keyword list of a request.
pub fn parse_requirements(input: &str) -> Result<Vec<String>, ExtractError> {
    let mut keywords: Vec<String> = Vec::new();
    for line in input.lines() {
        let line = line.trim();
        let keyword = line.strip_prefix('/').unwrap_or(line).trim();
        if keyword.is_empty() {
            continue;
        }
        if keyword.chars().count() > MAX_KEYWORD_CHARS {
            return Err(ExtractError::InvalidKeyword(format!(
                "keyword exceeds {} characters",
                MAX_KEYWORD_CHARS
            )));
        }
        if !keywords.iter().any(|k| k == keyword) {
            keywords.push(keyword.to_string());
        }
    }
    Ok(keywords)
}
