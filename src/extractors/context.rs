// src/extractors/context.rs
//! Sentence-level keyword search: every hit with its surrounding sentences,
//! plus the article/position lines that mention the keyword.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::extractors::section::keyword_pattern;
use crate::utils::error::ExtractError;

static SENTENCE_END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[.!?]\s+").expect("Failed to compile SENTENCE_END_RE")
});

static CONTEXT_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\.?\s+\p{Lu}").expect("Failed to compile CONTEXT_TITLE_RE")
});

static ARTICLE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+(?:\.\d+)*\s+\d+\s+|-*\s*\d+\s+)").expect("Failed to compile ARTICLE_LINE_RE")
});

static CONTACT_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"SWIFT|BIC|IBAN|AG,|Bank|Telefon|E-Mail|USt-ID").expect("Failed to compile CONTACT_LINE_RE")
});

const DEFAULT_TITLE: &str = "Abschnitt";
pub const WRAP_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sentence<'a> {
    pub text: &'a str,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextHit {
    pub title: String,
    pub context: String,
    pub sentence_index: usize,
}

/// Splits after `.`, `!` or `?` when whitespace and an uppercase letter follow.
/// A bare heading number such as `"1."` does not end a sentence.
pub fn split_sentences(text: &str) -> Vec<Sentence<'_>> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END_RE.find_iter(text) {
        let next_upper = text[m.end()..].chars().next().is_some_and(char::is_uppercase);
        let has_letters = text[start..m.start()].chars().any(char::is_alphabetic);
        if !next_upper || !has_letters {
            continue;
        }
        push_sentence(text, start, m.start() + 1, &mut sentences);
        start = m.end();
    }
    push_sentence(text, start, text.len(), &mut sentences);

    sentences
}

fn push_sentence<'a>(text: &'a str, start: usize, end: usize, out: &mut Vec<Sentence<'a>>) {
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        let lead = raw.len() - raw.trim_start().len();
        out.push(Sentence { text: trimmed, offset: start + lead });
    }
}

/// Every sentence mentioning `keyword`, with `radius` sentences on each side.
pub fn keyword_context(text: &str, keyword: &str, radius: usize) -> Result<Vec<ContextHit>, ExtractError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(ExtractError::InvalidKeyword("keyword is empty".into()));
    }
    let pattern = keyword_pattern(keyword)?;
    let sentences = split_sentences(text);
    let mut hits = Vec::new();

    for (index, sentence) in sentences.iter().enumerate() {
        if !pattern.is_match(sentence.text) {
            continue;
        }
        let title = sentences[..=index]
            .iter()
            .rev()
            .find(|s| CONTEXT_TITLE_RE.is_match(s.text))
            .map_or(DEFAULT_TITLE, |s| s.text.lines().next().unwrap_or(s.text));

        let from = index.saturating_sub(radius);
        let to = (index + radius + 1).min(sentences.len());
        let joined = sentences[from..to]
            .iter()
            .map(|s| s.text)
            .collect::<Vec<_>>()
            .join(" ");
        let highlighted = pattern.replace_all(&joined, "**${0}**");

        hits.push(ContextHit {
            title: title.trim().to_string(),
            context: wrap_text(&highlighted, WRAP_WIDTH),
            sentence_index: index,
        });
    }

    tracing::debug!("Found {} context hits for '{}'", hits.len(), keyword);
    Ok(hits)
}

/// Lines mentioning `keyword` that look like article or position lines.
pub fn article_lines(text: &str, keyword: &str) -> Result<Vec<String>, ExtractError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(ExtractError::InvalidKeyword("keyword is empty".into()));
    }
    let pattern = keyword_pattern(keyword)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| ARTICLE_LINE_RE.is_match(line))
        .filter(|line| !CONTACT_LINE_RE.is_match(line))
        .filter(|line| pattern.is_match(line))
        .map(String::from)
        .collect())
}

/// Greedy word wrap. Words longer than `width` get a line of their own.
pub fn wrap_text(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}
