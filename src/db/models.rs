use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{DeserializeOwned, Error as _, IntoDeserializer};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

use crate::types::catalog::Variant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CrmStatus {
    Pending,
    Synced,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TransactionStatus {
    Created,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbContact {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: Option<String>,
    pub message: String,
    pub source: Option<String>,
    pub crm_status: CrmStatus,
    pub crm_attempts: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbTestDrive {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub dealership_id: Option<i64>,
    pub variant: Option<Variant>,
    pub preferred_date: NaiveDate,
    pub preferred_slot: Option<String>,
    pub crm_status: CrmStatus,
    pub crm_attempts: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbTransaction {
    pub id: i64,
    pub order_ref: String,
    pub gateway_order_id: Option<String>,
    pub payment_id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub pincode: String,
    pub variant: Variant,
    pub colour: String,
    pub dealership_id: Option<i64>,
    pub amount: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub failure_reason: Option<String>,
    pub crm_status: CrmStatus,
    pub crm_attempts: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbDealership {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Admin-editable dealership fields.
#[derive(Debug, Clone, Deserialize)]
pub struct DealershipInput {
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq, FromRow)]
pub struct TableCounts {
    pub total: i64,
    pub today: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DashboardStats {
    pub contacts: TableCounts,
    pub test_rides: TableCounts,
    pub transactions: TableCounts,
    pub paid_transactions: i64,
    pub paid_amount: i64,
    pub crm_failed: i64,
}

/// The three lead-bearing tables that are forwarded to the CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadKind {
    Contact,
    TestRide,
    Booking,
}

impl LeadKind {
    pub fn table(self) -> &'static str {
        match self {
            LeadKind::Contact => "contacts",
            LeadKind::TestRide => "test_drives",
            LeadKind::Booking => "transactions",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LeadKind::Contact => "Contact",
            LeadKind::TestRide => "Test Ride",
            LeadKind::Booking => "Booking",
        }
    }
}

/// Admin list/export filter. Dates are inclusive UTC calendar days.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListFilter {
    #[serde(deserialize_with = "blank_as_none")]
    pub from: Option<NaiveDate>,
    #[serde(deserialize_with = "blank_as_none")]
    pub to: Option<NaiveDate>,
    #[serde(deserialize_with = "blank_as_none")]
    pub q: Option<String>,
    #[serde(deserialize_with = "blank_as_none")]
    pub status: Option<TransactionStatus>,
    #[serde(deserialize_with = "blank_as_zero")]
    pub page: u32,
    #[serde(deserialize_with = "blank_as_zero")]
    pub per_page: u32,
}

/// Filter forms submit untouched inputs as `field=`.
fn blank_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<String>::deserialize(de)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => T::deserialize(IntoDeserializer::<'_, D::Error>::into_deserializer(s)).map(Some),
    }
}

fn blank_as_zero<'de, D>(de: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(de)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(0),
        Some(s) => s.parse().map_err(D::Error::custom),
    }
}

impl ListFilter {
    pub const DEFAULT_PER_PAGE: u32 = 25;
    pub const MAX_PER_PAGE: u32 = 200;

    pub fn from_ts(&self) -> Option<DateTime<Utc>> {
        self.from
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Exclusive upper bound: midnight after `to`.
    pub fn until_ts(&self) -> Option<DateTime<Utc>> {
        self.to
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    pub fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn limit(&self) -> u32 {
        match self.per_page {
            0 => Self::DEFAULT_PER_PAGE,
            n => n.min(Self::MAX_PER_PAGE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}
