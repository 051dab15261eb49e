use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mediary_core::MediaError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authorization token not provided")]
    MissingToken,

    #[error("Invalid authorization token")]
    InvalidToken,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unsupported file type {0}, allowed types are jpeg, png, gif, webp and svg")]
    UnsupportedMediaType(String),

    #[error("File exceeds the {limit} byte upload limit")]
    PayloadTooLarge { limit: usize },

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::InvalidToken => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Multipart(error) => error.status(),
            ApiError::Media(error) => match error {
                MediaError::InvalidInput(_) | MediaError::PageOutOfRange { .. } => {
                    StatusCode::BAD_REQUEST
                }
                MediaError::NotFound(_) => StatusCode::NOT_FOUND,
                MediaError::BlobWriteFailed { .. } | MediaError::BlobDeleteFailed { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                MediaError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                MediaError::Config(_) | MediaError::Io(_) | MediaError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::debug!("request rejected: {}", self);
        }

        (status, axum::Json(ApiResponse::error(self.to_string()))).into_response()
    }
}
