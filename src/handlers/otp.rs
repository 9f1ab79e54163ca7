use axum::{Json, extract::State};

use crate::error::StoreError;
use crate::middleware::ApiJson;
use crate::router::StoreState;
use crate::types::Phone;
use crate::types::otp::{SendOtpRequest, SendOtpResponse, VerifyOtpRequest, VerifyOtpResponse};

/// POST /api/otp/send
pub async fn send_otp(
    State(state): State<StoreState>,
    ApiJson(req): ApiJson<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, StoreError> {
    let phone = Phone::parse(&req.phone)?;
    let issued = state.otp.send(&phone, req.purpose).await?;
    Ok(Json(SendOtpResponse {
        sent: true,
        expires_in_secs: issued.ttl.as_secs(),
        resend_after_secs: issued.resend_after.as_secs(),
    }))
}

/// POST /api/otp/verify
pub async fn verify_otp(
    State(state): State<StoreState>,
    ApiJson(req): ApiJson<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, StoreError> {
    let phone = Phone::parse(&req.phone)?;
    let code = req.code.trim();
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(StoreError::validation("code", "must be 6 digits"));
    }
    let verified = state.otp.verify(&phone, req.purpose, code).await?;
    Ok(Json(VerifyOtpResponse {
        verified: true,
        token: verified.token,
        expires_in_secs: verified.ttl.as_secs(),
    }))
}
