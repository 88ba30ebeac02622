use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Message shown for every extraction-stage failure. Details only go to the log.
pub const GENERIC_PROCESSING_MESSAGE: &str = "Failed to process the document. Please try again.";

#[derive(Error, Debug)]
pub enum DocError {
    #[error("Failed to initialize recognition engine: {0}")]
    InitializationError(String),

    #[error("Recognition engine is still loading, please wait and select the file again")]
    NotReady,

    #[error("Unsupported file type: {0} (only JPG, PNG or PDF files are accepted)")]
    UnsupportedMediaType(String),

    #[error("Select the document type before uploading a file")]
    MissingCategory,

    #[error("Unknown document type: {0}")]
    UnknownCategory(String),

    #[error("Text recognition failed: {0}")]
    RecognitionError(String),

    #[error("PDF rasterization failed: {0}")]
    RasterizationError(String),

    #[error("Another document is being processed, try again when it finishes")]
    Busy,

    #[error("Processing was cancelled")]
    Cancelled,

    #[error("Missing file in request")]
    MissingFile,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid keyword configuration: {0}")]
    KeywordConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classes as seen by whoever drives a processing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Engine failed to load. Terminal until the process restarts.
    Initialization,
    /// Bad file type or missing category. Fix the input and retry.
    InputValidation,
    /// Engine still loading. Wait and retry.
    NotReady,
    /// OCR or rasterization failed. The same file may be retried.
    Extraction,
    /// Request plumbing, configuration and concurrency errors.
    Service,
}

impl DocError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocError::InitializationError(_) => ErrorKind::Initialization,
            DocError::UnsupportedMediaType(_)
            | DocError::MissingCategory
            | DocError::UnknownCategory(_) => ErrorKind::InputValidation,
            DocError::NotReady => ErrorKind::NotReady,
            DocError::RecognitionError(_)
            | DocError::RasterizationError(_)
            | DocError::Cancelled => ErrorKind::Extraction,
            DocError::Busy
            | DocError::MissingFile
            | DocError::FileTooLarge { .. }
            | DocError::InvalidRequest(_)
            | DocError::KeywordConfig(_)
            | DocError::Internal(_) => ErrorKind::Service,
        }
    }

    /// Text that is safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Extraction => GENERIC_PROCESSING_MESSAGE.to_string(),
            ErrorKind::Initialization => {
                "Failed to load the recognition engine. Restart the service.".to_string()
            }
            _ => self.to_string(),
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            DocError::InitializationError(_) => (StatusCode::SERVICE_UNAVAILABLE, "ENGINE_FAILED"),
            DocError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY"),
            DocError::UnsupportedMediaType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE")
            }
            DocError::MissingCategory => (StatusCode::BAD_REQUEST, "MISSING_CATEGORY"),
            DocError::UnknownCategory(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_CATEGORY"),
            DocError::RecognitionError(_)
            | DocError::RasterizationError(_)
            | DocError::Cancelled => (StatusCode::UNPROCESSABLE_ENTITY, "PROCESSING_ERROR"),
            DocError::Busy => (StatusCode::CONFLICT, "BUSY"),
            DocError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            DocError::FileTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
            DocError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            DocError::KeywordConfig(_) | DocError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for DocError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = Json(ErrorResponse {
            error: self.user_message(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
