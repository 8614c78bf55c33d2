use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid params - {0}")]
    InvalidParams(String),

    #[error("Invalid configuration - {0}")]
    InvalidConfig(String),

    #[error("Internal server error - {0}")]
    InternalServerError(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Not found")]
    NotFound,

    #[error("Service unavailable - {0}")]
    ServiceUnavailable(String),

    #[error("Upstream error - {0}")]
    Upstream(String),

    #[error("Pixel table incomplete - {0}")]
    IncompletePixelTable(String),

    #[error("Argument decode error - {0}")]
    Decode(String),

    #[error("HTTP client error - {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Feed connection error - {0}")]
    FeedConnection(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error - {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error - {0}")]
    IoError(#[from] std::io::Error),

    #[error("TryInitError - {0}")]
    TryInitError(#[from] tracing_subscriber::util::TryInitError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidParams(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_)
            | Self::IncompletePixelTable(_)
            | Self::Decode(_)
            | Self::HttpClient(_)
            | Self::FeedConnection(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to a client. Internal details are logged instead.
    pub fn user_safe_message(&self) -> String {
        match self {
            Self::InvalidParams(msg) => msg.clone(),
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::PayloadTooLarge => "Payload too large".to_string(),
            Self::NotFound => "Not found".to_string(),
            Self::ServiceUnavailable(reason) => {
                tracing::warn!(reason = %reason, "Service unavailable");
                "Service temporarily unavailable. Please try again later.".to_string()
            }
            Self::Upstream(_)
            | Self::IncompletePixelTable(_)
            | Self::Decode(_)
            | Self::HttpClient(_)
            | Self::FeedConnection(_) => {
                tracing::error!(error = %self, "Upstream error");
                "Upstream service error".to_string()
            }
            _ => {
                tracing::error!(error = %self, "Internal server error");
                "Internal server error".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::to_string(&ErrorBody::new(self.user_safe_message()))
            .unwrap_or_else(|_| r#"{"ok":false,"error":"Internal server error"}"#.to_string());

        (status, [("content-type", "application/json")], body).into_response()
    }
}
