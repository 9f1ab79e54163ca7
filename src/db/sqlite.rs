use crate::db::models::{
    CrmStatus, DashboardStats, DbContact, DbDealership, DbTestDrive, DbTransaction,
    DealershipInput, LeadKind, ListFilter, TableCounts, TransactionStatus,
};
use crate::db::schema::SQLITE_INIT;
use crate::error::StoreError;
use crate::types::catalog::Variant;
use crate::types::forms::{ValidBooking, ValidContact, ValidTestRide};
use crate::types::phone::Phone;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Pool, QueryBuilder, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

const CONTACT_COLUMNS: &str =
    "id, name, email, phone, city, message, source, crm_status, crm_attempts, created_at";
const TEST_DRIVE_COLUMNS: &str = "id, name, email, phone, city, dealership_id, variant, \
     preferred_date, preferred_slot, crm_status, crm_attempts, created_at";
const TRANSACTION_COLUMNS: &str = "id, order_ref, gateway_order_id, payment_id, name, email, \
     phone, city, pincode, variant, colour, dealership_id, amount, currency, status, \
     failure_reason, crm_status, crm_attempts, created_at, updated_at";
const DEALERSHIP_COLUMNS: &str =
    "id, name, city, state, address, phone, latitude, longitude, active, created_at";

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database and apply the schema.
    ///
    /// In-memory URLs get a single long-lived connection, otherwise every
    /// pooled connection would see its own empty database.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let in_memory = database_url.contains(":memory:");
        if !in_memory
            && let Some(dir) = connect_opts.get_filename().parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir).await?;
        }
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(connect_opts)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(connect_opts).await?
        };
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    // ---- contacts ----

    pub async fn insert_contact(&self, c: &ValidContact) -> Result<i64, StoreError> {
        let res = sqlx::query(
            r#"INSERT INTO contacts (name, email, phone, city, message, source, crm_status, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&c.name)
        .bind(&c.email)
        .bind(c.phone.as_str())
        .bind(&c.city)
        .bind(&c.message)
        .bind(&c.source)
        .bind(CrmStatus::Pending)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn get_contact(&self, id: i64) -> Result<DbContact, StoreError> {
        sqlx::query_as::<_, DbContact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("contact"))
    }

    // ---- test drives ----

    pub async fn insert_test_drive(&self, t: &ValidTestRide) -> Result<i64, StoreError> {
        let res = sqlx::query(
            r#"INSERT INTO test_drives (
                   name, email, phone, city, dealership_id, variant,
                   preferred_date, preferred_slot, crm_status, created_at
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&t.name)
        .bind(&t.email)
        .bind(t.phone.as_str())
        .bind(&t.city)
        .bind(t.dealership_id)
        .bind(t.variant)
        .bind(t.preferred_date)
        .bind(&t.preferred_slot)
        .bind(CrmStatus::Pending)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn get_test_drive(&self, id: i64) -> Result<DbTestDrive, StoreError> {
        sqlx::query_as::<_, DbTestDrive>(&format!(
            "SELECT {TEST_DRIVE_COLUMNS} FROM test_drives WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("test ride"))
    }

    /// Most recent lead of `kind` from `phone` created at or after `since`.
    pub async fn recent_lead_by_phone(
        &self,
        kind: LeadKind,
        phone: &Phone,
        since: DateTime<Utc>,
    ) -> Result<Option<i64>, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT id FROM {} WHERE phone = ? AND created_at >= ? ORDER BY id DESC LIMIT 1",
            kind.table()
        ))
        .bind(phone.as_str())
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    // ---- transactions ----

    pub async fn insert_transaction(
        &self,
        b: &ValidBooking,
        order_ref: &str,
        amount: i64,
        currency: &str,
    ) -> Result<DbTransaction, StoreError> {
        let now = Utc::now();
        let res = sqlx::query(
            r#"INSERT INTO transactions (
                   order_ref, name, email, phone, city, pincode, variant, colour,
                   dealership_id, amount, currency, status, crm_status, created_at, updated_at
               ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(order_ref)
        .bind(&b.name)
        .bind(&b.email)
        .bind(b.phone.as_str())
        .bind(&b.city)
        .bind(&b.pincode)
        .bind(b.variant)
        .bind(&b.colour)
        .bind(b.dealership_id)
        .bind(amount)
        .bind(currency)
        .bind(TransactionStatus::Created)
        .bind(CrmStatus::Pending)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        self.get_transaction(res.last_insert_rowid()).await
    }

    pub async fn get_transaction(&self, id: i64) -> Result<DbTransaction, StoreError> {
        sqlx::query_as::<_, DbTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("transaction"))
    }

    pub async fn get_transaction_by_ref(&self, order_ref: &str) -> Result<DbTransaction, StoreError> {
        sqlx::query_as::<_, DbTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE order_ref = ?"
        ))
        .bind(order_ref)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("transaction"))
    }

    pub async fn get_transaction_by_gateway_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<DbTransaction, StoreError> {
        sqlx::query_as::<_, DbTransaction>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE gateway_order_id = ?"
        ))
        .bind(gateway_order_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("transaction"))
    }

    /// An unpaid booking for the same phone/variant/colour that already has a gateway order.
    pub async fn find_reusable_transaction(
        &self,
        phone: &Phone,
        variant: Variant,
        colour: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DbTransaction>, StoreError> {
        let row = sqlx::query_as::<_, DbTransaction>(&format!(
            r#"SELECT {TRANSACTION_COLUMNS} FROM transactions
               WHERE phone = ? AND variant = ? AND colour = ? AND status = ?
                 AND gateway_order_id IS NOT NULL AND created_at >= ?
               ORDER BY id DESC LIMIT 1"#
        ))
        .bind(phone.as_str())
        .bind(variant)
        .bind(colour)
        .bind(TransactionStatus::Created)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn set_gateway_order(
        &self,
        id: i64,
        gateway_order_id: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE transactions SET gateway_order_id = ?, updated_at = ? WHERE id = ?")
            .bind(gateway_order_id)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Transition `created -> paid`. Returns false if the row had already left `created`.
    pub async fn mark_paid(&self, id: i64, payment_id: &str) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"UPDATE transactions SET status = ?, payment_id = ?, failure_reason = NULL, updated_at = ?
               WHERE id = ? AND status = ?"#,
        )
        .bind(TransactionStatus::Paid)
        .bind(payment_id)
        .bind(Utc::now())
        .bind(id)
        .bind(TransactionStatus::Created)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    /// Transition `created -> failed`. Returns false if the row had already left `created`.
    pub async fn mark_failed(&self, id: i64, reason: &str) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"UPDATE transactions SET status = ?, failure_reason = ?, updated_at = ?
               WHERE id = ? AND status = ?"#,
        )
        .bind(TransactionStatus::Failed)
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .bind(TransactionStatus::Created)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    // ---- CRM bookkeeping ----

    /// Record a dispatch outcome and bump the attempt counter.
    pub async fn set_crm_status(
        &self,
        kind: LeadKind,
        id: i64,
        status: CrmStatus,
    ) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "UPDATE {} SET crm_status = ?, crm_attempts = crm_attempts + 1 WHERE id = ?",
            kind.table()
        ))
        .bind(status)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Leads whose CRM forwarding failed. Bookings only count once paid.
    pub async fn list_failed_crm(&self) -> Result<Vec<(LeadKind, i64)>, StoreError> {
        let mut out = Vec::new();
        for kind in [LeadKind::Contact, LeadKind::TestRide, LeadKind::Booking] {
            let mut qb = QueryBuilder::<Sqlite>::new(format!(
                "SELECT id FROM {} WHERE crm_status = ",
                kind.table()
            ));
            qb.push_bind(CrmStatus::Failed);
            if kind == LeadKind::Booking {
                qb.push(" AND status = ").push_bind(TransactionStatus::Paid);
            }
            qb.push(" ORDER BY id");
            let ids = qb.build_query_scalar::<i64>().fetch_all(&self.pool).await?;
            out.extend(ids.into_iter().map(|id| (kind, id)));
        }
        Ok(out)
    }

    // ---- dealerships ----

    pub async fn insert_dealership(&self, d: &DealershipInput) -> Result<DbDealership, StoreError> {
        let res = sqlx::query(
            r#"INSERT INTO dealerships (name, city, state, address, phone, latitude, longitude, active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&d.name)
        .bind(&d.city)
        .bind(&d.state)
        .bind(&d.address)
        .bind(&d.phone)
        .bind(d.latitude)
        .bind(d.longitude)
        .bind(d.active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        self.get_dealership(res.last_insert_rowid()).await
    }

    pub async fn update_dealership(
        &self,
        id: i64,
        d: &DealershipInput,
    ) -> Result<DbDealership, StoreError> {
        let res = sqlx::query(
            r#"UPDATE dealerships SET
                   name = ?, city = ?, state = ?, address = ?, phone = ?,
                   latitude = ?, longitude = ?, active = ?
               WHERE id = ?"#,
        )
        .bind(&d.name)
        .bind(&d.city)
        .bind(&d.state)
        .bind(&d.address)
        .bind(&d.phone)
        .bind(d.latitude)
        .bind(d.longitude)
        .bind(d.active)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("dealership"));
        }
        self.get_dealership(id).await
    }

    pub async fn deactivate_dealership(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE dealerships SET active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound("dealership"));
        }
        Ok(())
    }

    pub async fn get_dealership(&self, id: i64) -> Result<DbDealership, StoreError> {
        sqlx::query_as::<_, DbDealership>(&format!(
            "SELECT {DEALERSHIP_COLUMNS} FROM dealerships WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("dealership"))
    }

    pub async fn list_active_dealerships(
        &self,
        city: Option<&str>,
    ) -> Result<Vec<DbDealership>, StoreError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {DEALERSHIP_COLUMNS} FROM dealerships WHERE active = 1"
        ));
        if let Some(city) = city.map(str::trim).filter(|c| !c.is_empty()) {
            qb.push(" AND city = ")
                .push_bind(city.to_string())
                .push(" COLLATE NOCASE");
        }
        qb.push(" ORDER BY city, name");
        Ok(qb
            .build_query_as::<DbDealership>()
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_all_dealerships(&self) -> Result<Vec<DbDealership>, StoreError> {
        Ok(sqlx::query_as::<_, DbDealership>(&format!(
            "SELECT {DEALERSHIP_COLUMNS} FROM dealerships ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn dealership_cities(&self) -> Result<Vec<String>, StoreError> {
        Ok(sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT city FROM dealerships WHERE active = 1 ORDER BY city COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    // ---- admin listings ----

    pub async fn list_contacts(
        &self,
        filter: &ListFilter,
    ) -> Result<(Vec<DbContact>, i64), StoreError> {
        self.list_page("contacts", CONTACT_COLUMNS, filter).await
    }

    pub async fn list_test_drives(
        &self,
        filter: &ListFilter,
    ) -> Result<(Vec<DbTestDrive>, i64), StoreError> {
        self.list_page("test_drives", TEST_DRIVE_COLUMNS, filter).await
    }

    pub async fn list_transactions(
        &self,
        filter: &ListFilter,
    ) -> Result<(Vec<DbTransaction>, i64), StoreError> {
        self.list_page("transactions", TRANSACTION_COLUMNS, filter).await
    }

    pub async fn export_contacts(&self, filter: &ListFilter) -> Result<Vec<DbContact>, StoreError> {
        self.list_all("contacts", CONTACT_COLUMNS, filter).await
    }

    pub async fn export_test_drives(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<DbTestDrive>, StoreError> {
        self.list_all("test_drives", TEST_DRIVE_COLUMNS, filter).await
    }

    pub async fn export_transactions(
        &self,
        filter: &ListFilter,
    ) -> Result<Vec<DbTransaction>, StoreError> {
        self.list_all("transactions", TRANSACTION_COLUMNS, filter).await
    }

    async fn list_page<T>(
        &self,
        table: &str,
        columns: &str,
        filter: &ListFilter,
    ) -> Result<(Vec<T>, i64), StoreError>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut count = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {table}"));
        push_filters(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {columns} FROM {table}"));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(filter.limit()))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset()));
        let items = select.build_query_as::<T>().fetch_all(&self.pool).await?;
        Ok((items, total))
    }

    async fn list_all<T>(
        &self,
        table: &str,
        columns: &str,
        filter: &ListFilter,
    ) -> Result<Vec<T>, StoreError>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {columns} FROM {table}"));
        push_filters(&mut select, filter);
        select.push(" ORDER BY created_at DESC, id DESC");
        Ok(select.build_query_as::<T>().fetch_all(&self.pool).await?)
    }

    pub async fn dashboard_stats(
        &self,
        today_start: DateTime<Utc>,
    ) -> Result<DashboardStats, StoreError> {
        let mut stats = DashboardStats::default();
        for (table, slot) in [
            ("contacts", &mut stats.contacts),
            ("test_drives", &mut stats.test_rides),
            ("transactions", &mut stats.transactions),
        ] {
            *slot = sqlx::query_as::<_, TableCounts>(&format!(
                "SELECT COUNT(*) AS total, COALESCE(SUM(created_at >= ?), 0) AS today FROM {table}"
            ))
            .bind(today_start)
            .fetch_one(&self.pool)
            .await?;
        }

        let (paid, amount): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM transactions WHERE status = ?",
        )
        .bind(TransactionStatus::Paid)
        .fetch_one(&self.pool)
        .await?;
        stats.paid_transactions = paid;
        stats.paid_amount = amount;
        stats.crm_failed = self.list_failed_crm().await?.len() as i64;
        Ok(stats)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ListFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(from) = filter.from_ts() {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(until) = filter.until_ts() {
        qb.push(" AND created_at < ").push_bind(until);
    }
    if let Some(q) = filter.search() {
        let pattern = format!("%{q}%");
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR email LIKE ")
            .push_bind(pattern.clone())
            .push(" OR phone LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
}
