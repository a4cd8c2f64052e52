use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("PDF has no pages")]
    EmptyDocument,

    #[error("no OCR engine could process the page (tried: {})", attempted.join(", "))]
    OcrEngineUnavailable { attempted: Vec<String> },

    #[error("pdftoppm not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    RasterizerUnavailable,

    #[error("pdftoppm failed with exit code {code}: {stderr}")]
    RasterizerFailed { code: i32, stderr: String },

    #[error("failed to load ruleset from {path}: {reason}")]
    RulesetLoad { path: PathBuf, reason: String },

    #[error("invalid ruleset: {0}")]
    RulesetInvalid(String),

    #[error("processing timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TallyError {
    /// Message shown to the chat user when a submission fails.
    pub fn user_message(&self) -> String {
        match self {
            TallyError::UnsupportedFormat(_) => {
                "Sorry, I couldn't read that file. Please send a photo, an image file or a PDF."
                    .to_string()
            }
            TallyError::EmptyDocument => "That PDF has no pages.".to_string(),
            TallyError::OcrEngineUnavailable { .. } => {
                "Text recognition is unavailable right now, please try again later.".to_string()
            }
            TallyError::RasterizerUnavailable | TallyError::RasterizerFailed { .. } => {
                "Sorry, I couldn't render that PDF.".to_string()
            }
            TallyError::Timeout { .. } => {
                "Processing took too long. Try a smaller file or fewer pages.".to_string()
            }
            _ => "Sorry, processing failed.".to_string(),
        }
    }
}
