// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Uploaded file is empty")]
    Empty,

    #[error("File is too large: {size} bytes (maximum {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Only PDF files are accepted: {0}")]
    NotPdf(String),

    #[error("PDF text extraction failed: {0}")]
    Extraction(String),

    #[error("No text could be extracted from the document")]
    NoText,

    #[error("OCR request failed: {0}")]
    Ocr(String),

    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Regular expression error: {0}")]
    RegexError(String),

    #[error("Invalid keyword: {0}")]
    InvalidKeyword(String),
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error [{status}]: {message}")]
    Api { status: u16, message: String },

    #[error("LLM rate limit exceeded")]
    RateLimited,

    #[error("Malformed LLM response: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Whether repeating the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::RateLimited => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Malformed(_) => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Document loading failed: {0}")]
    Pdf(#[from] PdfError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("LLM processing failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(LlmError::RateLimited.is_transient());
        assert!(LlmError::Api { status: 503, message: "busy".into() }.is_transient());
        assert!(!LlmError::Api { status: 401, message: "bad key".into() }.is_transient());
        assert!(!LlmError::Malformed("garbage".into()).is_transient());
    }

    #[test]
    fn app_error_wraps_sources() {
        let err: AppError = PdfError::TooLarge { size: 10, max: 5 }.into();
        assert_eq!(
            err.to_string(),
            "Document loading failed: File is too large: 10 bytes (maximum 5 bytes)"
        );
    }
}
