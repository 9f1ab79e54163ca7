//! Inbound form payloads and their validation.
//!
//! Each `*Form` is the raw JSON body; `validate` produces the trimmed, typed
//! value that storage accepts.

use chrono::{Days, NaiveDate};
use serde::Deserialize;

use crate::error::StoreError;
use crate::types::catalog::Variant;
use crate::types::phone::Phone;

const MAX_MESSAGE_LEN: usize = 2000;
const MAX_TEST_RIDE_DAYS_AHEAD: u64 = 90;

#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub city: Option<String>,
    pub message: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub otp_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidContact {
    pub name: String,
    pub email: String,
    pub phone: Phone,
    pub city: Option<String>,
    pub message: String,
    pub source: Option<String>,
}

impl ContactForm {
    pub fn validate(&self) -> Result<ValidContact, StoreError> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err(StoreError::validation("message", "must not be empty"));
        }
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(StoreError::validation(
                "message",
                format!("must be at most {MAX_MESSAGE_LEN} characters"),
            ));
        }
        Ok(ValidContact {
            name: clean_name(&self.name)?,
            email: clean_email(&self.email)?,
            phone: Phone::parse(&self.phone)?,
            city: optional_text("city", self.city.as_deref(), 80)?,
            message: message.to_string(),
            source: optional_text("source", self.source.as_deref(), 120)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TestRideForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    #[serde(default)]
    pub dealership_id: Option<i64>,
    #[serde(default)]
    pub variant: Option<Variant>,
    pub preferred_date: NaiveDate,
    #[serde(default)]
    pub preferred_slot: Option<String>,
    #[serde(default)]
    pub otp_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidTestRide {
    pub name: String,
    pub email: String,
    pub phone: Phone,
    pub city: String,
    pub dealership_id: Option<i64>,
    pub variant: Option<Variant>,
    pub preferred_date: NaiveDate,
    pub preferred_slot: Option<String>,
}

impl TestRideForm {
    /// `today` is the local calendar date the booking window is measured from.
    pub fn validate(&self, today: NaiveDate) -> Result<ValidTestRide, StoreError> {
        if self.preferred_date < today {
            return Err(StoreError::validation("preferred_date", "must not be in the past"));
        }
        let last = today
            .checked_add_days(Days::new(MAX_TEST_RIDE_DAYS_AHEAD))
            .unwrap_or(NaiveDate::MAX);
        if self.preferred_date > last {
            return Err(StoreError::validation(
                "preferred_date",
                format!("must be within {MAX_TEST_RIDE_DAYS_AHEAD} days"),
            ));
        }
        Ok(ValidTestRide {
            name: clean_name(&self.name)?,
            email: clean_email(&self.email)?,
            phone: Phone::parse(&self.phone)?,
            city: required_text("city", &self.city, 80)?,
            dealership_id: self.dealership_id,
            variant: self.variant,
            preferred_date: self.preferred_date,
            preferred_slot: optional_text("preferred_slot", self.preferred_slot.as_deref(), 32)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub pincode: String,
    pub variant: Variant,
    pub colour: String,
    #[serde(default)]
    pub dealership_id: Option<i64>,
    #[serde(default)]
    pub otp_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidBooking {
    pub name: String,
    pub email: String,
    pub phone: Phone,
    pub city: String,
    pub pincode: String,
    pub variant: Variant,
    pub colour: String,
    pub dealership_id: Option<i64>,
}

impl BookingForm {
    pub fn validate(&self) -> Result<ValidBooking, StoreError> {
        let colour = self.colour.trim().to_ascii_lowercase();
        if !self.variant.offers(&colour) {
            return Err(StoreError::validation(
                "colour",
                format!("{colour} is not offered for {}", self.variant),
            ));
        }
        let pincode = self.pincode.trim();
        if pincode.len() != 6
            || !pincode.chars().all(|c| c.is_ascii_digit())
            || pincode.starts_with('0')
        {
            return Err(StoreError::validation("pincode", "must be a 6-digit PIN code"));
        }
        Ok(ValidBooking {
            name: clean_name(&self.name)?,
            email: clean_email(&self.email)?,
            phone: Phone::parse(&self.phone)?,
            city: required_text("city", &self.city, 80)?,
            pincode: pincode.to_string(),
            variant: self.variant,
            colour,
            dealership_id: self.dealership_id,
        })
    }
}

fn clean_name(raw: &str) -> Result<String, StoreError> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let len = name.chars().count();
    if !(2..=100).contains(&len) {
        return Err(StoreError::validation("name", "must be 2 to 100 characters"));
    }
    Ok(name)
}

fn clean_email(raw: &str) -> Result<String, StoreError> {
    let email = raw.trim().to_lowercase();
    let invalid = || StoreError::validation("email", "must be a valid email address");
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return Err(invalid());
    };
    if host.is_empty() || tld.is_empty() {
        return Err(invalid());
    }
    Ok(email)
}

fn required_text(field: &'static str, raw: &str, max: usize) -> Result<String, StoreError> {
    optional_text(field, Some(raw), max)?
        .ok_or_else(|| StoreError::validation(field, "must not be empty"))
}

fn optional_text(
    field: &'static str,
    raw: Option<&str>,
    max: usize,
) -> Result<Option<String>, StoreError> {
    let Some(value) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(StoreError::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(Some(value.to_string()))
}
