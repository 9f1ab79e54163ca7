use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{DbTransaction, TransactionStatus};
use crate::error::StoreError;
use crate::handlers::leads::require_otp;
use crate::handlers::{ensure_active_dealership, window_start};
use crate::middleware::{ApiJson, ApiPath, JsonOrForm};
use crate::router::StoreState;
use crate::service::lead_dispatch::LeadJob;
use crate::types::forms::BookingForm;
use crate::types::{OtpPurpose, Variant};

/// What the browser needs to open the hosted checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutPayload {
    pub order_ref: String,
    pub gateway_order_id: String,
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Serialize)]
pub struct BookingStatus {
    pub order_ref: String,
    pub status: TransactionStatus,
    pub variant: Variant,
    pub colour: String,
    pub amount: i64,
    pub currency: String,
}

impl From<&DbTransaction> for BookingStatus {
    fn from(tx: &DbTransaction) -> Self {
        Self {
            order_ref: tx.order_ref.clone(),
            status: tx.status,
            variant: tx.variant,
            colour: tx.colour.clone(),
            amount: tx.amount,
            currency: tx.currency.clone(),
        }
    }
}

/// Checkout callback. Field names follow the gateway's own (`razorpay_*`) as aliases.
#[derive(Debug, Deserialize)]
pub struct PaymentCallback {
    #[serde(alias = "razorpay_order_id")]
    pub gateway_order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

/// `EV` followed by 12 upper-case hex characters.
pub fn new_order_ref() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("EV{}", hex[..12].to_ascii_uppercase())
}

fn checkout(state: &StoreState, tx: &DbTransaction, gateway_order_id: String) -> CheckoutPayload {
    CheckoutPayload {
        order_ref: tx.order_ref.clone(),
        gateway_order_id,
        amount: tx.amount,
        currency: tx.currency.clone(),
        key_id: state.payments.key_id().to_string(),
        checkout_url: state.payments.checkout_url().to_string(),
    }
}

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<StoreState>,
    ApiJson(form): ApiJson<BookingForm>,
) -> Result<(StatusCode, Json<CheckoutPayload>), StoreError> {
    let booking = form.validate()?;
    if let Some(id) = booking.dealership_id {
        ensure_active_dealership(&state, id).await?;
    }
    require_otp(&state, form.otp_token.as_deref(), &booking.phone, OtpPurpose::Booking).await?;

    let since = window_start(state.config.payment.reuse_window_secs);
    if let Some(tx) = state
        .storage
        .find_reusable_transaction(&booking.phone, booking.variant, &booking.colour, since)
        .await?
        && let Some(gateway_order_id) = tx.gateway_order_id.clone()
    {
        info!(order_ref = %tx.order_ref, "reusing pending booking");
        return Ok((StatusCode::OK, Json(checkout(&state, &tx, gateway_order_id))));
    }

    let payment_cfg = &state.config.payment;
    let order_ref = new_order_ref();
    let tx = state
        .storage
        .insert_transaction(
            &booking,
            &order_ref,
            payment_cfg.booking_amount,
            &payment_cfg.currency,
        )
        .await?;

    let order = match state
        .payments
        .create_order(tx.amount, &tx.currency, &tx.order_ref)
        .await
    {
        Ok(order) => order,
        Err(e) => {
            warn!(order_ref = %tx.order_ref, error = %e, "gateway order creation failed");
            if let Err(db_err) = state.storage.mark_failed(tx.id, &e.to_string()).await {
                error!(order_ref = %tx.order_ref, error = %db_err, "failed to record gateway failure");
            }
            return Err(e);
        }
    };
    state.storage.set_gateway_order(tx.id, &order.id).await?;

    info!(
        order_ref = %tx.order_ref,
        gateway_order_id = %order.id,
        variant = %booking.variant,
        amount = tx.amount,
        "booking created"
    );
    Ok((StatusCode::CREATED, Json(checkout(&state, &tx, order.id))))
}

/// POST /api/payments/callback
///
/// Replays on a settled transaction return its current state without touching it.
pub async fn payment_callback(
    State(state): State<StoreState>,
    JsonOrForm(cb): JsonOrForm<PaymentCallback>,
) -> Result<Json<BookingStatus>, StoreError> {
    for (field, value) in [
        ("gateway_order_id", &cb.gateway_order_id),
        ("payment_id", &cb.payment_id),
        ("signature", &cb.signature),
    ] {
        if value.trim().is_empty() {
            return Err(StoreError::validation(field, "must not be empty"));
        }
    }

    let tx = state
        .storage
        .get_transaction_by_gateway_order(cb.gateway_order_id.trim())
        .await?;
    if tx.status != TransactionStatus::Created {
        info!(order_ref = %tx.order_ref, status = ?tx.status, "callback on settled booking");
        return Ok(Json(BookingStatus::from(&tx)));
    }

    if !state.payments.verify_signature(
        cb.gateway_order_id.trim(),
        cb.payment_id.trim(),
        cb.signature.trim(),
    ) {
        warn!(order_ref = %tx.order_ref, "payment signature mismatch");
        state.storage.mark_failed(tx.id, "signature mismatch").await?;
        return Err(StoreError::SignatureMismatch);
    }

    if state.storage.mark_paid(tx.id, cb.payment_id.trim()).await? {
        info!(order_ref = %tx.order_ref, payment_id = %cb.payment_id, "booking paid");
        state.dispatcher.enqueue(LeadJob::booking(tx.id));
    }
    let tx = state.storage.get_transaction(tx.id).await?;
    Ok(Json(BookingStatus::from(&tx)))
}

/// GET /api/bookings/{order_ref}
pub async fn booking_status(
    State(state): State<StoreState>,
    ApiPath(order_ref): ApiPath<String>,
) -> Result<Json<BookingStatus>, StoreError> {
    let tx = state.storage.get_transaction_by_ref(&order_ref).await?;
    Ok(Json(BookingStatus::from(&tx)))
}
