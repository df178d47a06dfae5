// src/extractors/heading.rs
//! Heading classification for plain text extracted from PDFs.
//!
//! Extracted text carries no markup, so a heading is recognised from the
//! shape of its line alone. All heading decisions in the crate go through
//! [`classify_line`]. The rules are evaluated in a fixed order and the first
//! one that fires wins:
//!
//! 1. reject: blank lines, over-long lines, page footers, article codes,
//!    lines without letters
//! 2. numbered (`1.2.3 Title`, title starting uppercase): level = number of
//!    numeric components
//! 3. configured known headings
//! 4. all-caps lines: level 1
//! 5. short standalone lines after a blank line: level 2

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

// --- Regex Patterns (Lazy Static) ---
static NUMBERED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3}(?:\.\d{1,3})*)\.?\s+(\S.*)$")
        .expect("Failed to compile NUMBERED_RE")
});

// "Seite 11 / 23", "Page 3 of 10"
static PAGE_FOOTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:seite\s+\d+\s*/\s*\d+|page\s+\d+\s+of\s+\d+)\b")
        .expect("Failed to compile PAGE_FOOTER_RE")
});

// Position codes such as "17.02.01.01" mark catalogue items, not chapters.
static ARTICLE_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}\.\d{2}\.\d{2}\.\d{2}\b").expect("Failed to compile ARTICLE_CODE_RE")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeadingKind {
    Numbered { depth: u8 },
    Known,
    AllCaps,
    Standalone,
}

/// Tunables for [`classify_line`].
#[derive(Debug, Clone)]
pub struct HeadingRules {
    /// Lines with this many characters or more are never headings.
    pub max_len: usize,
    /// Deepest level assigned to numbered headings.
    pub max_level: u8,
    /// Upper bound for all-caps and standalone headings.
    pub caps_max_len: usize,
    pub standalone_max_words: usize,
    /// Titles that are always headings when a line contains them.
    pub known_headings: Vec<String>,
    pub known_level: u8,
    /// Enables rule 5.
    pub standalone: bool,
}

impl Default for HeadingRules {
    fn default() -> Self {
        Self {
            max_len: 100,
            max_level: 6,
            caps_max_len: 60,
            standalone_max_words: 8,
            known_headings: Vec::new(),
            known_level: 1,
            standalone: true,
        }
    }
}

impl HeadingRules {
    pub fn with_known_headings<I, S>(mut self, headings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_headings = headings
            .into_iter()
            .map(Into::into)
            .map(|h: String| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        self
    }
}

/// A line plus the neighbourhood facts the classifier needs.
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    pub line: &'a str,
    /// True when the previous line is blank or there is no previous line.
    pub prev_blank: bool,
}

/// Returns the numbering depth of a numbered heading line, e.g. `"1.2.3 Antrieb"` -> 3.
pub fn numbering_depth(line: &str) -> Option<u8> {
    let caps = NUMBERED_RE.captures(line.trim())?;
    let components = caps.get(1)?.as_str().split('.').count();
    Some(u8::try_from(components).unwrap_or(u8::MAX))
}

/// Classifies a single line. Returns the heading kind and its level, or `None`
/// for body text.
pub fn classify_line(ctx: &LineContext<'_>, rules: &HeadingRules) -> Option<(HeadingKind, u8)> {
    let line = ctx.line.trim();
    let char_count = line.chars().count();

    // Rule 1: reject
    if line.is_empty() || char_count >= rules.max_len {
        return None;
    }
    if !line.chars().any(char::is_alphabetic) {
        return None;
    }
    if PAGE_FOOTER_RE.is_match(line) || ARTICLE_CODE_RE.is_match(line) {
        return None;
    }

    // Rule 2: numbered
    if let Some(caps) = NUMBERED_RE.captures(line) {
        let title = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let starts_upper = title.chars().next().is_some_and(char::is_uppercase);
        if starts_upper && !ends_with_any(line, &['.', ',', ';', ':']) {
            let depth = numbering_depth(line).unwrap_or(1);
            let level = depth.min(rules.max_level).max(1);
            return Some((HeadingKind::Numbered { depth }, level));
        }
    }

    // Rule 3: configured titles
    if !rules.known_headings.is_empty() {
        let lowered = line.to_lowercase();
        if rules
            .known_headings
            .iter()
            .any(|known| lowered.contains(&known.to_lowercase()))
        {
            return Some((HeadingKind::Known, rules.known_level.max(1)));
        }
    }

    // Rule 4: all caps
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    if letters >= 4
        && char_count <= rules.caps_max_len
        && !line.chars().any(char::is_lowercase)
        && !ends_with_any(line, &['.', ',', ';'])
    {
        return Some((HeadingKind::AllCaps, 1));
    }

    // Rule 5: standalone line after a blank line
    if rules.standalone
        && ctx.prev_blank
        && char_count <= rules.caps_max_len
        && line.chars().next().is_some_and(char::is_uppercase)
        && !ends_with_any(line, &['.', ',', ';', ':'])
        && line.split_whitespace().count() <= rules.standalone_max_words
    {
        return Some((HeadingKind::Standalone, 2));
    }

    None
}

fn ends_with_any(line: &str, chars: &[char]) -> bool {
    line.chars().last().is_some_and(|c| chars.contains(&c))
}
