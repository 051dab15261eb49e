use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Requested page {page} is out of range, last page is {total_pages}")]
    PageOutOfRange { page: u32, total_pages: u32 },

    #[error("Blob write failed for key {key}: {reason}")]
    BlobWriteFailed { key: String, reason: String },

    #[error("Blob delete failed for key {key}: {reason}")]
    BlobDeleteFailed { key: String, reason: String },

    #[error("Metadata store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MediaError::InvalidInput(_)
                | MediaError::NotFound(_)
                | MediaError::PageOutOfRange { .. }
        )
    }
}

impl From<rusqlite::Error> for MediaError {
    fn from(error: rusqlite::Error) -> Self {
        MediaError::StoreUnavailable(error.to_string())
    }
}

impl From<serde_json::Error> for MediaError {
    fn from(error: serde_json::Error) -> Self {
        MediaError::Internal(format!("serialization error: {}", error))
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;
