// src/extractors/toc.rs
//! Table of contents recovered from plain document text.
//!
//! Offsets are byte offsets into the normalised document text and always fall
//! on char boundaries, so they can be used to slice the text directly.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::extractors::heading::{classify_line, HeadingRules, LineContext};

/// How far a section reaches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Up to the next heading of any level.
    #[default]
    Leaf,
    /// Up to the next heading of the same or a higher level (nested headings included).
    Subtree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Heuristic,
    Llm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TocEntry {
    pub title: String,
    pub level: u8,
    #[serde(rename = "position")]
    pub offset: usize,
    pub line: usize,
    pub source: EntrySource,
}

/// A heading proposed by an LLM, positioned relative to the chunk it was found in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SuggestedHeading {
    pub title: String,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default)]
    pub position: usize,
}

fn default_level() -> u8 {
    1
}

// LLM suggestions this close to an existing heading with the same title are duplicates.
const DUPLICATE_WINDOW: usize = 200;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TableOfContents {
    entries: Vec<TocEntry>,
}

impl TableOfContents {
    /// Scans `text` line by line and records every line the classifier accepts.
    pub fn build(text: &str, rules: &HeadingRules) -> Self {
        let mut entries = Vec::new();
        let mut offset = 0usize;
        let mut prev_blank = true;

        for (line_no, raw) in text.split('\n').enumerate() {
            let ctx = LineContext { line: raw, prev_blank };
            if let Some((_, level)) = classify_line(&ctx, rules) {
                let lead = raw.len() - raw.trim_start().len();
                entries.push(TocEntry {
                    title: raw.trim().to_string(),
                    level,
                    offset: offset + lead,
                    line: line_no,
                    source: EntrySource::Heuristic,
                });
            }
            prev_blank = raw.trim().is_empty();
            offset += raw.len() + 1;
        }

        tracing::debug!("Detected {} headings in {} bytes of text", entries.len(), text.len());
        Self { entries }
    }

    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the heading whose section contains `offset`, i.e. the last
    /// heading starting at or before it.
    pub fn enclosing(&self, offset: usize) -> Option<usize> {
        self.entries
            .partition_point(|e| e.offset <= offset)
            .checked_sub(1)
    }

    /// Byte range covered by the section of entry `index`.
    pub fn span(&self, index: usize, text_len: usize, scope: Scope) -> Option<Range<usize>> {
        let entry = self.entries.get(index)?;
        let following = &self.entries[index + 1..];
        let end = match scope {
            Scope::Leaf => following.first(),
            Scope::Subtree => following.iter().find(|e| e.level <= entry.level),
        }
        .map_or(text_len, |e| e.offset);

        Some(entry.offset..end.max(entry.offset))
    }

    /// First entry whose title contains `keyword`, ignoring case.
    pub fn find_title(&self, keyword: &str) -> Option<usize> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .position(|e| e.title.to_lowercase().contains(&needle))
    }

    /// Adds entries from another source. Entries at an occupied offset, or
    /// repeating a nearby title, are dropped.
    pub fn merge(&mut self, incoming: Vec<TocEntry>) -> usize {
        let mut added = 0;
        for entry in incoming {
            let duplicate = self.entries.iter().any(|existing| {
                existing.offset == entry.offset
                    || (existing.offset.abs_diff(entry.offset) < DUPLICATE_WINDOW
                        && existing.title.eq_ignore_ascii_case(&entry.title))
            });
            if duplicate {
                tracing::trace!("Skipping duplicate heading '{}' at {}", entry.title, entry.offset);
                continue;
            }
            self.entries.push(entry);
            added += 1;
        }
        self.entries.sort_by_key(|e| e.offset);
        added
    }
}

/// Splits `text` into chunks of at most `chunk_chars` characters, preferring to
/// break after a newline. Returns `(byte_offset, chunk)` pairs.
pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<(usize, &str)> {
    let chunk_chars = chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let rest = &text[start..];
        let hard_end = rest
            .char_indices()
            .nth(chunk_chars)
            .map_or(rest.len(), |(i, _)| i);
        let end = if hard_end < rest.len() {
            rest[..hard_end].rfind('\n').map_or(hard_end, |i| i + 1)
        } else {
            hard_end
        };
        chunks.push((start, &rest[..end]));
        start += end;
    }

    chunks
}

/// Turns chunk-relative LLM suggestions into entries anchored in `text`.
///
/// The suggested position is only a hint: the title is searched in the chunk
/// and the occurrence closest to the hint wins. Titles that cannot be found
/// fall back to the start of the line containing the hint.
pub fn anchor_suggestions(
    text: &str,
    chunk_offset: usize,
    chunk: &str,
    suggestions: Vec<SuggestedHeading>,
) -> Vec<TocEntry> {
    let mut entries = Vec::new();

    for suggestion in suggestions {
        let title = suggestion.title.trim();
        if title.is_empty() {
            continue;
        }
        let hint = chunk
            .char_indices()
            .nth(suggestion.position)
            .map_or(chunk.len(), |(i, _)| i);

        let local = chunk
            .match_indices(title)
            .map(|(i, _)| i)
            .min_by_key(|i| i.abs_diff(hint))
            .unwrap_or_else(|| line_start(chunk, hint));

        let offset = chunk_offset + local;
        if offset >= text.len() {
            continue;
        }
        entries.push(TocEntry {
            title: title.to_string(),
            level: suggestion.level.clamp(1, 6),
            offset,
            line: text[..offset].matches('\n').count(),
            source: EntrySource::Llm,
        });
    }

    entries
}

fn line_start(text: &str, at: usize) -> usize {
    let at = floor_char_boundary(text, at);
    text[..at].rfind('\n').map_or(0, |i| i + 1)
}

pub(crate) fn floor_char_boundary(text: &str, at: usize) -> usize {
    if at >= text.len() {
        return text.len();
    }
    (0..=at).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0)
}
