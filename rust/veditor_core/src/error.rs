//! Error type for the editor's boundaries (JSON, configuration, uploads).

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("image upload failed: {0}")]
    Upload(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
