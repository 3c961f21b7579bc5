use crate::services::staging::UploadError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    /// A converter reported failure; the message is shown to the client
    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Conversion(_) | AppError::Internal(_) | AppError::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::NoFilePart => AppError::BadRequest(e.to_string()),
            UploadError::PayloadTooLarge(_) => AppError::PayloadTooLarge(e.to_string()),
            UploadError::Io(io) => AppError::Internal(format!("Staging failed: {}", io)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::Conversion(msg) => msg,
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Conversion failed: internal error".to_string()
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                "Conversion failed: internal error".to_string()
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Renders an [`AppError`] as a short plain-text body (download route)
pub struct PlainTextError(pub AppError);

impl From<AppError> for PlainTextError {
    fn from(e: AppError) -> Self {
        PlainTextError(e)
    }
}

impl IntoResponse for PlainTextError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let text = match self.0 {
            AppError::NotFound(_) => "File not found",
            AppError::BadRequest(_) => "Bad request",
            other => {
                tracing::error!("Download error: {}", other);
                "Download failed"
            }
        };
        (status, text).into_response()
    }
}
