use serde::{Deserialize, Serialize};
use std::fmt;

/// The form a verification code is issued for; codes and tokens never cross purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Contact,
    TestRide,
    Booking,
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OtpPurpose::Contact => "contact",
            OtpPurpose::TestRide => "test_ride",
            OtpPurpose::Booking => "booking",
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub phone: String,
    pub purpose: OtpPurpose,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub purpose: OtpPurpose,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub sent: bool,
    pub expires_in_secs: u64,
    pub resend_after_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub verified: bool,
    pub token: String,
    pub expires_in_secs: u64,
}
