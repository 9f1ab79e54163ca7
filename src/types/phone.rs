use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

/// A normalised 10-digit Indian mobile number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Accepts common input shapes: `98765 43210`, `+91-98765-43210`,
    /// `091 9876543210`, `(987) 654-3210`.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
            .collect();
        let digits = digits.strip_prefix('+').unwrap_or(&digits);
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(StoreError::validation("phone", "must contain digits only"));
        }

        let national = match digits.len() {
            10 => digits,
            11 if digits.starts_with('0') => &digits[1..],
            12 if digits.starts_with("91") => &digits[2..],
            13 if digits.starts_with("091") => &digits[3..],
            _ => return Err(StoreError::validation("phone", "must be a 10-digit mobile number")),
        };

        if !matches!(national.as_bytes()[0], b'6'..=b'9') {
            return Err(StoreError::validation("phone", "must start with 6, 7, 8 or 9"));
        }
        Ok(Self(national.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// E.164 form used by the SMS gateway.
    pub fn e164(&self) -> String {
        format!("+91{}", self.0)
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Phone {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Phone::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(value: Phone) -> Self {
        value.0
    }
}
