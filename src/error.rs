use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failure of one analysis attempt. Every variant ends up in the error banner
/// and in the synthetic "Analysis Failed" card.
#[derive(Error, Debug)]
pub enum DiagnosisError {
    #[error("Failed to read the image: {0}")]
    Encoding(String),

    #[error("API error: {code} {reason}")]
    Status { code: u16, reason: String },

    #[error("Request to the inference API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response structure from the API.")]
    InvalidResponseStructure,

    #[error("Failed to parse the AI's response. The response was not valid JSON.")]
    InvalidJson(#[source] serde_json::Error),
}

/// A form post with no file part at all. Unreadable or oversized files are
/// not handler errors; they land in the UI as `DiagnosisError::Encoding`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("No image file in upload")]
    MissingFile,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::warn!("Upload rejected: {}", self);
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}
