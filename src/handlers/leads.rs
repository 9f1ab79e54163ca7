use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::db::LeadKind;
use crate::error::StoreError;
use crate::handlers::{ensure_active_dealership, window_start};
use crate::middleware::ApiJson;
use crate::router::StoreState;
use crate::service::lead_dispatch::LeadJob;
use crate::types::forms::{ContactForm, TestRideForm};
use crate::types::{OtpPurpose, Phone};

#[derive(Debug, Serialize)]
pub struct LeadAccepted {
    pub id: i64,
    pub status: &'static str,
}

impl LeadAccepted {
    fn received(id: i64) -> Self {
        Self {
            id,
            status: "received",
        }
    }
}

/// Consume the form's verification token unless OTP is switched off.
pub(crate) async fn require_otp(
    state: &StoreState,
    token: Option<&str>,
    phone: &Phone,
    purpose: OtpPurpose,
) -> Result<(), StoreError> {
    if !state.config.otp.enabled {
        return Ok(());
    }
    state.otp.redeem(token, phone, purpose).await
}

async fn reject_duplicate(
    state: &StoreState,
    kind: LeadKind,
    phone: &Phone,
) -> Result<(), StoreError> {
    let since = window_start(state.config.leads.duplicate_window_secs);
    match state.storage.recent_lead_by_phone(kind, phone, since).await? {
        Some(id) => {
            info!(kind = kind.label(), id, phone = %phone, "duplicate submission rejected");
            Err(StoreError::Duplicate { id })
        }
        None => Ok(()),
    }
}

/// POST /api/contact
pub async fn submit_contact(
    State(state): State<StoreState>,
    ApiJson(form): ApiJson<ContactForm>,
) -> Result<(StatusCode, Json<LeadAccepted>), StoreError> {
    let contact = form.validate()?;
    require_otp(&state, form.otp_token.as_deref(), &contact.phone, OtpPurpose::Contact).await?;
    reject_duplicate(&state, LeadKind::Contact, &contact.phone).await?;

    let id = state.storage.insert_contact(&contact).await?;
    state.dispatcher.enqueue(LeadJob::contact(id));
    info!(id, phone = %contact.phone, "contact enquiry received");
    Ok((StatusCode::CREATED, Json(LeadAccepted::received(id))))
}

/// POST /api/test-rides
pub async fn submit_test_ride(
    State(state): State<StoreState>,
    ApiJson(form): ApiJson<TestRideForm>,
) -> Result<(StatusCode, Json<LeadAccepted>), StoreError> {
    let ride = form.validate(Utc::now().date_naive())?;
    if let Some(id) = ride.dealership_id {
        ensure_active_dealership(&state, id).await?;
    }
    require_otp(&state, form.otp_token.as_deref(), &ride.phone, OtpPurpose::TestRide).await?;
    reject_duplicate(&state, LeadKind::TestRide, &ride.phone).await?;

    let id = state.storage.insert_test_drive(&ride).await?;
    state.dispatcher.enqueue(LeadJob::test_ride(id));
    info!(id, phone = %ride.phone, date = %ride.preferred_date, "test ride request received");
    Ok((StatusCode::CREATED, Json(LeadAccepted::received(id))))
}
