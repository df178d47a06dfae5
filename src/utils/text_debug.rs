// src/utils/text_debug.rs
use std::fs;
use std::path::Path;

use crate::extractors::section::keyword_pattern;
use crate::extractors::toc::TableOfContents;
use crate::utils::error::AppError;

/// Wraps each highlighted range of `text` in `[[label@start-end: ...]]` markers.
/// Ranges overlapping an earlier one are skipped.
pub fn render_debug_text(text: &str, highlights: &[(usize, usize, &str)]) -> String {
    let mut sorted_highlights = highlights.to_vec();
    sorted_highlights.sort_by_key(|h| (h.0, std::cmp::Reverse(h.1)));

    let mut out = String::with_capacity(text.len() + highlights.len() * 32);
    let mut last_pos = 0;

    for (start, end, label) in sorted_highlights {
        if start < last_pos || end > text.len() || start > end {
            tracing::trace!("Skipping highlight {}-{} ({})", start, end, label);
            continue;
        }
        if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
            continue;
        }
        out.push_str(&text[last_pos..start]);
        out.push_str(&format!("[[{}@{}-{}: ", label, start, end));
        out.push_str(&text[start..end]);
        out.push_str("]]");
        last_pos = end;
    }
    out.push_str(&text[last_pos..]);

    out
}

/// Writes `text` with every TOC heading and keyword match marked, for checking
/// what the heading classifier and the locator saw.
pub fn save_debug_text(
    text: &str,
    toc: &TableOfContents,
    keywords: &[String],
    filename: &Path,
) -> Result<(), AppError> {
    let mut highlights: Vec<(usize, usize, String)> = toc
        .entries()
        .iter()
        .map(|e| (e.offset, e.offset + e.title.len(), format!("H{}", e.level)))
        .collect();

    for keyword in keywords {
        let re = keyword_pattern(keyword)?;
        for mat in re.find_iter(text) {
            highlights.push((mat.start(), mat.end(), format!("kw:{}", keyword)));
        }
    }

    let borrowed: Vec<(usize, usize, &str)> = highlights
        .iter()
        .map(|(s, e, label)| (*s, *e, label.as_str()))
        .collect();
    fs::write(filename, render_debug_text(text, &borrowed))?;

    tracing::info!("Saved debug text to {}", filename.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::heading::HeadingRules;

    #[test]
    fn marks_highlights_in_order() {
        let text = "1. Einleitung\nDer Brenner heizt.";
        let rendered = render_debug_text(text, &[(18, 25, "kw"), (0, 13, "H1"), (20, 22, "inner")]);
        assert_eq!(rendered, "[[H1@0-13: 1. Einleitung]]\nDer [[kw@18-25: Brenner]] heizt.");
    }

    #[test]
    fn writes_annotated_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("debug.txt");
        let text = "1. Einleitung\nDer Brenner heizt.";
        let toc = TableOfContents::build(text, &HeadingRules::default());

        save_debug_text(text, &toc, &["brenner".to_string()], &path).expect("write debug file");
        let written = fs::read_to_string(&path).expect("read debug file");
        assert!(written.starts_with("[[H1@0-13: 1. Einleitung]]"));
        assert!(written.contains("[[kw:brenner@18-25: Brenner]]"));
    }
}
