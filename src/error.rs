use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] SqlxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("duplicate submission of existing record {id}")]
    Duplicate { id: i64 },

    #[error("phone verification required")]
    OtpRequired,

    #[error("verification token is invalid or expired")]
    OtpInvalidToken,

    #[error("no verification code was requested for this number")]
    OtpNotRequested,

    #[error("verification code expired")]
    OtpExpired,

    #[error("verification code mismatch, {remaining} attempts left")]
    OtpMismatch { remaining: u32 },

    #[error("too many wrong verification attempts")]
    OtpAttemptsExceeded,

    #[error("verification code throttled, retry after {retry_after_secs}s")]
    OtpThrottled { retry_after_secs: u64 },

    #[error("unauthorized")]
    Unauthorized,

    #[error("payment signature mismatch")]
    SignatureMismatch,

    #[error("{service} responded with status {status}")]
    UpstreamStatus {
        service: &'static str,
        status: StatusCode,
    },

    #[error("SMS delivery failed: {0}")]
    Sms(String),

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Ractor error: {0}")]
    RactorError(String),
}

impl StoreError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        StoreError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether an outbound call failing with this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Reqwest(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            StoreError::UpstreamStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_body) = match self {
            StoreError::Validation { field, reason } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorBody::new("VALIDATION_ERROR", format!("invalid {field}: {reason}"))
                    .with_details(json!({ "field": field })),
            ),
            StoreError::Json(_) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("BAD_REQUEST", "Malformed payload."),
            ),
            StoreError::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("BAD_REQUEST", reason),
            ),
            StoreError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ApiErrorBody::new("PAYLOAD_TOO_LARGE", "request body too large"),
            ),
            StoreError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                ApiErrorBody::new("NOT_FOUND", format!("{what} not found.")),
            ),
            StoreError::Duplicate { id } => (
                StatusCode::CONFLICT,
                ApiErrorBody::new(
                    "DUPLICATE_SUBMISSION",
                    "A submission for this phone number was already received.",
                )
                .with_details(json!({ "id": id })),
            ),
            StoreError::OtpRequired | StoreError::OtpInvalidToken => (
                StatusCode::FORBIDDEN,
                ApiErrorBody::new("OTP_REQUIRED", "Phone number verification is required."),
            ),
            StoreError::OtpNotRequested => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("OTP_NOT_REQUESTED", "Request a verification code first."),
            ),
            StoreError::OtpExpired => (
                StatusCode::GONE,
                ApiErrorBody::new("OTP_EXPIRED", "The verification code has expired."),
            ),
            StoreError::OtpMismatch { remaining } => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("OTP_MISMATCH", "The verification code is incorrect.")
                    .with_details(json!({ "remaining_attempts": remaining })),
            ),
            StoreError::OtpAttemptsExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorBody::new(
                    "OTP_ATTEMPTS_EXCEEDED",
                    "Too many incorrect attempts; request a new code.",
                ),
            ),
            StoreError::OtpThrottled { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiErrorBody::new("OTP_THROTTLED", "Please wait before requesting another code.")
                    .with_details(json!({ "retry_after_secs": retry_after_secs })),
            ),
            StoreError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ApiErrorBody::new("UNAUTHORIZED", "Authentication required."),
            ),
            StoreError::SignatureMismatch => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody::new("SIGNATURE_MISMATCH", "Payment could not be verified."),
            ),
            StoreError::Reqwest(_)
            | StoreError::UrlParse(_)
            | StoreError::UpstreamStatus { .. }
            | StoreError::Sms(_) => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody::new("BAD_GATEWAY", "Upstream service is unavailable."),
            ),
            StoreError::DatabaseError(_)
            | StoreError::Csv(_)
            | StoreError::Io(_)
            | StoreError::Email(_)
            | StoreError::RactorError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiErrorBody::new("INTERNAL_ERROR", "An internal server error occurred."),
            ),
        };
        (status, Json(ApiErrorResponse { error: error_body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiErrorBody {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
