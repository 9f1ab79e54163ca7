pub mod admin;
pub mod booking;
pub mod catalog;
pub mod leads;
pub mod otp;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::StoreError;
use crate::router::StoreState;

/// Start of a look-back window of `secs` ending now.
pub(crate) fn window_start(secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|d| Utc::now().checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A form may only name a dealership that exists and is active.
pub(crate) async fn ensure_active_dealership(state: &StoreState, id: i64) -> Result<(), StoreError> {
    match state.storage.get_dealership(id).await {
        Ok(d) if d.active => Ok(()),
        Ok(_) => Err(StoreError::validation(
            "dealership_id",
            "dealership is not taking bookings",
        )),
        Err(StoreError::NotFound(_)) => Err(StoreError::validation(
            "dealership_id",
            "unknown dealership",
        )),
        Err(e) => Err(e),
    }
}
