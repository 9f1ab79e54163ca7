//! CSV rendering for the admin export endpoints.

use crate::db::models::{DbContact, DbTestDrive, DbTransaction};
use crate::error::StoreError;
use serde::Serialize;

/// A row type with a fixed header line, so an empty export still has columns.
pub trait CsvRow: Serialize {
    const HEADERS: &'static [&'static str];
}

impl CsvRow for DbContact {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "name",
        "email",
        "phone",
        "city",
        "message",
        "source",
        "crm_status",
        "crm_attempts",
        "created_at",
    ];
}

impl CsvRow for DbTestDrive {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "name",
        "email",
        "phone",
        "city",
        "dealership_id",
        "variant",
        "preferred_date",
        "preferred_slot",
        "crm_status",
        "crm_attempts",
        "created_at",
    ];
}

impl CsvRow for DbTransaction {
    const HEADERS: &'static [&'static str] = &[
        "id",
        "order_ref",
        "gateway_order_id",
        "payment_id",
        "name",
        "email",
        "phone",
        "city",
        "pincode",
        "variant",
        "colour",
        "dealership_id",
        "amount",
        "currency",
        "status",
        "failure_reason",
        "crm_status",
        "crm_attempts",
        "created_at",
        "updated_at",
    ];
}

pub fn to_csv<T: CsvRow>(rows: &[T]) -> Result<Vec<u8>, StoreError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(T::HEADERS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.into_inner().map_err(|e| StoreError::Io(e.into_error()))
}
