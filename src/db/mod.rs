//! Database module: row models, schema and the SQLite-backed storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows, status enums and list filters
//! - `schema.rs`: SQL DDL applied on startup
//! - `sqlite.rs`: `Storage`, every query the handlers and dispatcher run

pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::{
    CrmStatus, DbContact, DbDealership, DbTestDrive, DbTransaction, LeadKind, ListFilter,
    TransactionStatus,
};
pub use sqlite::{SqlitePool, Storage};
