use crate::types::CueKey;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid template version '{0}': expected major.minor")]
    InvalidVersion(String),

    #[error("Cue not found at {0}")]
    CueNotFound(CueKey),

    #[error("Template has never been synced")]
    NeverSynced,

    #[error("Image processing failed: {0}")]
    Image(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
