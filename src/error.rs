use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;
use tracing::error;

#[derive(Debug, ThisError)]
pub enum GalleryError {
    #[error("{0}")]
    Validation(String),

    #[error("No session found")]
    NoSession,

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Image provider error: {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid JSON body: {0}")]
    JsonBody(#[from] JsonRejection),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Malformed data URL")]
    MalformedDataUrl,

    #[error("Inline image payload is empty")]
    EmptyPayload,

    #[error("Image path is outside the content root: {0}")]
    UnresolvablePath(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            GalleryError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "BAD_REQUEST".to_string(),
                    message: msg,
                },
            ),
            GalleryError::NoSession => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "NO_SESSION".to_string(),
                    message: "No session found".to_string(),
                },
            ),
            GalleryError::JsonBody(e) => {
                let (status, code) = if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
                } else {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST")
                };
                (
                    status,
                    ApiErrorBody {
                        code: code.to_string(),
                        message: e.body_text(),
                    },
                )
            }
            GalleryError::Multipart(e) => {
                let status = e.status();
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "BAD_REQUEST"
                };
                (
                    status,
                    ApiErrorBody {
                        code: code.to_string(),
                        message: e.body_text(),
                    },
                )
            }
            GalleryError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody {
                    code: "UNAUTHORIZED".to_string(),
                    message: "Unauthorized access".to_string(),
                },
            ),
            GalleryError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody {
                    code: "NOT_FOUND".to_string(),
                    message: msg,
                },
            ),
            GalleryError::Upstream { status, body } => (
                status,
                ApiErrorBody {
                    code: "UPSTREAM_ERROR".to_string(),
                    message: format!("Image provider error: {body}"),
                },
            ),
            GalleryError::Reqwest(_) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody {
                    code: "BAD_GATEWAY".to_string(),
                    message: "Image provider is unavailable.".to_string(),
                },
            ),
            other @ (GalleryError::Base64(_)
            | GalleryError::MalformedDataUrl
            | GalleryError::EmptyPayload
            | GalleryError::UnresolvablePath(_)
            | GalleryError::Image(_)
            | GalleryError::Json(_)
            | GalleryError::Io(_)
            | GalleryError::DatabaseError(_)
            | GalleryError::Task(_)
            | GalleryError::Config(_)) => {
                error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorBody {
                        code: "INTERNAL_ERROR".to_string(),
                        message: "An internal server error occurred.".to_string(),
                    },
                )
            }
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
