// src/llm/response.rs
//! Parsers for LLM answers. Anything that does not match the requested shape
//! is [`LlmError::Malformed`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extractors::toc::SuggestedHeading;
use crate::utils::error::LlmError;

pub const NO_MATCH_ANSWER: &str = "Keine relevanten Informationen gefunden";

// --- Regex Patterns (Lazy Static) ---
static SIMILAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)similar\s+results\s+for\s+the\s+keyword\s*['"„“]?[^'"“”:\n]*['"“”]?\s*:\s*([^\n]+?)\s*(?:\n+(.+))?$"#)
        .expect("Failed to compile SIMILAR_RE")
});

static JSON_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("Failed to compile JSON_FENCE_RE")
});

#[derive(Debug, Clone, PartialEq)]
pub enum SimilarityAnswer {
    Similar { term: String, sentence: String },
    NoMatch,
}

fn clean(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim()
}

fn is_no_match(answer: &str) -> bool {
    answer
        .trim_end_matches('.')
        .trim()
        .eq_ignore_ascii_case(NO_MATCH_ANSWER)
}

/// Parses `Similar Results for the keyword '<k>': <term>` followed by the
/// sentence containing the term, or the fixed no-match answer.
pub fn parse_similarity(raw: &str) -> Result<SimilarityAnswer, LlmError> {
    let answer = clean(raw);
    if is_no_match(answer) {
        return Ok(SimilarityAnswer::NoMatch);
    }

    let caps = SIMILAR_RE
        .captures(answer)
        .ok_or_else(|| LlmError::Malformed(format!("unexpected similarity answer: {}", preview(answer))))?;
    let term = caps.get(1).map(|m| clean(m.as_str())).unwrap_or_default();
    if term.is_empty() {
        return Err(LlmError::Malformed("similarity answer names no term".into()));
    }
    let sentence = caps
        .get(2)
        .map(|m| clean(m.as_str()))
        .filter(|s| !s.is_empty())
        .unwrap_or(term);

    Ok(SimilarityAnswer::Similar {
        term: term.to_string(),
        sentence: sentence.to_string(),
    })
}

/// Section text for a keyword, or `None` for the no-match answer or an empty reply.
pub fn parse_section(raw: &str) -> Result<Option<String>, LlmError> {
    let answer = match JSON_FENCE_RE.captures(raw) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim(),
        None => clean(raw),
    };
    if answer.is_empty() || is_no_match(answer) {
        return Ok(None);
    }
    Ok(Some(answer.to_string()))
}

/// Free-text answer to a question; an empty reply is unusable.
pub fn parse_answer(raw: &str) -> Result<String, LlmError> {
    let answer = raw.trim();
    if answer.is_empty() {
        return Err(LlmError::Malformed("empty answer".into()));
    }
    Ok(answer.to_string())
}

/// Heading list from a ```json fence or the first bare `[...]` array.
/// Entries with an empty title or a level outside 1..=6 are dropped.
pub fn parse_toc_json(raw: &str) -> Result<Vec<SuggestedHeading>, LlmError> {
    let body = JSON_FENCE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);

    let start = body.find('[');
    let end = body.rfind(']');
    let array = match (start, end) {
        (Some(s), Some(e)) if s < e => &body[s..=e],
        _ => return Err(LlmError::Malformed(format!("no JSON array in answer: {}", preview(raw)))),
    };

    let headings: Vec<SuggestedHeading> =
        serde_json::from_str(array).map_err(|e| LlmError::Malformed(format!("invalid heading JSON: {}", e)))?;

    Ok(headings
        .into_iter()
        .filter(|h| !h.title.trim().is_empty() && (1..=6).contains(&h.level))
        .collect())
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}
