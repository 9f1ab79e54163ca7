//! SQL DDL for the site's lead, booking and dealer tables (SQLite).

/// Timestamps are written by sqlx's chrono encoding (`YYYY-MM-DD HH:MM:SS.f+00:00`),
/// which sorts lexicographically in UTC, so range filters compare as text.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS dealerships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    city TEXT NOT NULL,
    state TEXT NOT NULL,
    address TEXT NOT NULL,
    phone TEXT NULL,
    latitude REAL NULL,
    longitude REAL NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dealerships_city ON dealerships(city COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT NOT NULL,
    city TEXT NULL,
    message TEXT NOT NULL,
    source TEXT NULL,
    crm_status TEXT NOT NULL DEFAULT 'pending',
    crm_attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_contacts_phone_created ON contacts(phone, created_at);

CREATE TABLE IF NOT EXISTS test_drives (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT NOT NULL,
    city TEXT NOT NULL,
    dealership_id INTEGER NULL REFERENCES dealerships(id),
    variant TEXT NULL,
    preferred_date TEXT NOT NULL,
    preferred_slot TEXT NULL,
    crm_status TEXT NOT NULL DEFAULT 'pending',
    crm_attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_test_drives_phone_created ON test_drives(phone, created_at);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_ref TEXT NOT NULL UNIQUE,
    gateway_order_id TEXT NULL UNIQUE,
    payment_id TEXT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT NOT NULL,
    city TEXT NOT NULL,
    pincode TEXT NOT NULL,
    variant TEXT NOT NULL,
    colour TEXT NOT NULL,
    dealership_id INTEGER NULL REFERENCES dealerships(id),
    amount INTEGER NOT NULL,
    currency TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'created',
    failure_reason TEXT NULL,
    crm_status TEXT NOT NULL DEFAULT 'pending',
    crm_attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_phone_created ON transactions(phone, created_at);
CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status)
"#;
