// src/pdf/mod.rs
//! Upload validation and PDF-to-text conversion.

pub mod ocr;

use serde::Serialize;

use crate::utils::error::PdfError;
pub use ocr::MistralOcr;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
const PDF_CONTENT_TYPE: &str = "application/pdf";
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Clone)]
pub struct UploadedPdf {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    PdfText,
    Ocr,
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub file_name: String,
    pub file_size: usize,
    pub text: String,
    pub source: TextSource,
}

pub fn validate_upload(upload: &UploadedPdf, max_bytes: usize) -> Result<(), PdfError> {
    let size = upload.bytes.len();
    if size == 0 {
        return Err(PdfError::Empty);
    }
    if size > max_bytes {
        return Err(PdfError::TooLarge { size, max: max_bytes });
    }

    let declared_pdf = upload
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE));
    if !declared_pdf && !upload.bytes.starts_with(PDF_MAGIC) {
        let what = upload.content_type.clone().unwrap_or_else(|| upload.file_name.clone());
        return Err(PdfError::NotPdf(what));
    }
    Ok(())
}

/// Runs `pdf_extract` on the blocking pool. A panic inside the parser is
/// reported as an extraction error.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String, PdfError> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| PdfError::Extraction(format!("extraction task failed: {}", e)))?
        .map_err(|e| PdfError::Extraction(e.to_string()))
}

/// Unifies line endings and whitespace while keeping the line structure.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace(['\r', '\x0C'], "\n");

    unified
        .split('\n')
        .map(|line| {
            let cleaned: String = line
                .chars()
                .map(|c| if c == '\u{A0}' { ' ' } else { c })
                .filter(|c| *c == '\t' || !c.is_control())
                .filter(|c| *c != '\u{FEFF}')
                .collect();
            cleaned.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns uploads into normalised document text.
pub struct DocumentLoader {
    max_bytes: usize,
    ocr: Option<MistralOcr>,
}

impl DocumentLoader {
    pub fn new(max_bytes: usize, ocr: Option<MistralOcr>) -> Self {
        Self { max_bytes, ocr }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn load(&self, upload: UploadedPdf) -> Result<ExtractedDocument, PdfError> {
        validate_upload(&upload, self.max_bytes)?;
        tracing::info!("Extracting text from {} ({} bytes)", upload.file_name, upload.bytes.len());

        let text = extract_text(upload.bytes.clone()).await?;
        self.finish(upload, text).await
    }

    /// Normalises extracted text, switching to OCR when it is blank.
    async fn finish(&self, upload: UploadedPdf, extracted: String) -> Result<ExtractedDocument, PdfError> {
        let file_size = upload.bytes.len();
        let text = normalize_text(&extracted);
        if !text.trim().is_empty() {
            return Ok(ExtractedDocument { file_name: upload.file_name, file_size, text, source: TextSource::PdfText });
        }

        let Some(ocr) = &self.ocr else {
            tracing::warn!("{} has no text layer and OCR is disabled", upload.file_name);
            return Err(PdfError::NoText);
        };
        let text = normalize_text(&ocr.recognize(&upload.bytes, &upload.file_name).await?);
        if text.trim().is_empty() {
            return Err(PdfError::NoText);
        }
        Ok(ExtractedDocument { file_name: upload.file_name, file_size, text, source: TextSource::Ocr })
    }
}
