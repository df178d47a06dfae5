// src/storage/mod.rs
use std::fs;
use std::path::{Path, PathBuf};
use crate::extractors::section::LocatedSection;
use crate::extractors::toc::TableOfContents;
use crate::utils::error::StorageError;
use std::io::Write;

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    // One directory per source document: /base_dir/<document stem>/
    fn document_dir(&self, doc_stem: &str) -> Result<PathBuf, StorageError> {
        let target_dir = self.base_dir.join(slugify(doc_stem));
        if !target_dir.exists() {
            fs::create_dir_all(&target_dir).map_err(StorageError::IoError)?;
        }
        Ok(target_dir)
    }

    /// Saves the section heading and body as plain text
    pub fn save_section(&self, doc_stem: &str, section: &LocatedSection) -> Result<PathBuf, StorageError> {
        let file_path = self
            .document_dir(doc_stem)?
            .join(format!("{}.txt", slugify(&section.keyword)));

        let mut file = fs::File::create(&file_path).map_err(StorageError::IoError)?;
        writeln!(file, "{}\n", section.heading).map_err(StorageError::IoError)?;
        file.write_all(section.body.as_bytes()).map_err(StorageError::IoError)?;

        tracing::info!("Saved section to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves metadata about the section in JSON format
    pub fn save_section_metadata(&self, doc_stem: &str, section: &LocatedSection) -> Result<PathBuf, StorageError> {
        let file_path = self
            .document_dir(doc_stem)?
            .join(format!("{}_meta.json", slugify(&section.keyword)));

        let metadata = serde_json::json!({
            "document": doc_stem,
            "keyword": section.keyword,
            "heading": section.heading,
            "level": section.level,
            "strategy": section.strategy,
            "start": section.start,
            "end": section.end,
            "match_offset": section.match_offset,
            "content_length": section.body.len(),
            "extraction_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let metadata_str = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, metadata_str).map_err(StorageError::IoError)?;

        tracing::info!("Saved metadata to {}", file_path.display());
        Ok(file_path)
    }

    pub fn save_toc(&self, doc_stem: &str, toc: &TableOfContents) -> Result<PathBuf, StorageError> {
        let file_path = self.document_dir(doc_stem)?.join("toc.json");
        let json = serde_json::to_string_pretty(toc)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, json).map_err(StorageError::IoError)?;

        tracing::info!("Saved table of contents ({} entries) to {}", toc.len(), file_path.display());
        Ok(file_path)
    }
}

/// File-name-safe form of a keyword or document name.
fn slugify(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_lowercase().next().unwrap_or(c) } else { '_' })
        .collect();
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() { "unnamed".to_string() } else { slug }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::heading::HeadingRules;
    use crate::extractors::section::Strategy;

    fn section() -> LocatedSection {
        LocatedSection {
            keyword: "Wärmerückgewinnung / WRG".into(),
            heading: "Wärmerückgewinnung (WRG) ECO-HEAT".into(),
            level: Some(2),
            body: "In der Luft/Luft Wärmerückgewinnung ...".into(),
            start: 10,
            end: 90,
            match_offset: None,
            strategy: Strategy::ExactHeading,
        }
    }

    #[test]
    fn saves_section_and_metadata() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = StorageManager::new(dir.path().join("out")).expect("storage");

        let path = storage.save_section("Angebot 74.646", &section()).expect("save section");
        assert!(path.ends_with("angebot_74_646/wärmerückgewinnung___wrg.txt"));
        let content = fs::read_to_string(&path).expect("read section");
        assert!(content.starts_with("Wärmerückgewinnung (WRG) ECO-HEAT\n\nIn der Luft"));

        let meta_path = storage.save_section_metadata("Angebot 74.646", &section()).expect("save metadata");
        let meta: serde_json::Value = serde_json::from_str(&fs::read_to_string(meta_path).expect("read meta")).expect("json");
        assert_eq!(meta["strategy"], "exact_heading");
        assert_eq!(meta["level"], 2);
        assert!(meta["extraction_timestamp"].is_string());
    }

    #[test]
    fn saves_toc_as_json() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = StorageManager::new(dir.path()).expect("storage");
        let toc = TableOfContents::build("1. Einleitung\nText\n1.1 Details\nMehr", &HeadingRules::default());

        let path = storage.save_toc("doc", &toc).expect("save toc");
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).expect("read toc")).expect("json");
        assert_eq!(json[1]["title"], "1.1 Details");
        assert_eq!(json[1]["level"], 2);
        assert_eq!(json[1]["position"], 19);
    }

    #[test]
    fn slugs_are_never_empty() {
        assert_eq!(slugify("  ///  "), "unnamed");
        assert_eq!(slugify("Preis"), "preis");
    }
}
