use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Key, PrivateCookieJar};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::db::models::{DashboardStats, DealershipInput};
use crate::db::{DbContact, DbDealership, DbTestDrive, DbTransaction, ListFilter};
use crate::error::StoreError;
use crate::middleware::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::auth::{self, RequireAdmin};
use crate::router::StoreState;
use crate::service::export::{CsvRow, to_csv};
use crate::service::lead_dispatch::LeadJob;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl<T> Page<T> {
    fn new((items, total): (Vec<T>, i64), filter: &ListFilter) -> Self {
        Self {
            items,
            page: filter.page(),
            per_page: filter.limit(),
            total,
        }
    }
}

/// POST /admin/login
pub async fn login(
    State(state): State<StoreState>,
    jar: PrivateCookieJar<Key>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(PrivateCookieJar<Key>, Json<Value>), StoreError> {
    let basic = &state.config.basic;
    if !auth::key_matches(req.key.trim(), &basic.admin_key) {
        warn!("admin login rejected");
        return Err(StoreError::Unauthorized);
    }
    let cookie = auth::session_cookie(basic.session_ttl_secs, !basic.insecure_cookie);
    info!("admin session opened");
    Ok((
        jar.add(cookie),
        Json(json!({ "ok": true, "expires_in_secs": basic.session_ttl_secs })),
    ))
}

/// POST /admin/logout
pub async fn logout(jar: PrivateCookieJar<Key>) -> (PrivateCookieJar<Key>, StatusCode) {
    (jar.remove(auth::removal_cookie()), StatusCode::NO_CONTENT)
}

/// GET /admin/api/dashboard
pub async fn dashboard(
    _: RequireAdmin,
    State(state): State<StoreState>,
) -> Result<Json<DashboardStats>, StoreError> {
    let today_start = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now);
    Ok(Json(state.storage.dashboard_stats(today_start).await?))
}

/// Transaction status only filters the transactions table.
fn lead_filter(mut filter: ListFilter) -> ListFilter {
    filter.status = None;
    filter
}

pub async fn list_contacts(
    _: RequireAdmin,
    State(state): State<StoreState>,
    ApiQuery(filter): ApiQuery<ListFilter>,
) -> Result<Json<Page<DbContact>>, StoreError> {
    let filter = lead_filter(filter);
    let page = state.storage.list_contacts(&filter).await?;
    Ok(Json(Page::new(page, &filter)))
}

pub async fn list_test_rides(
    _: RequireAdmin,
    State(state): State<StoreState>,
    ApiQuery(filter): ApiQuery<ListFilter>,
) -> Result<Json<Page<DbTestDrive>>, StoreError> {
    let filter = lead_filter(filter);
    let page = state.storage.list_test_drives(&filter).await?;
    Ok(Json(Page::new(page, &filter)))
}

pub async fn list_transactions(
    _: RequireAdmin,
    State(state): State<StoreState>,
    ApiQuery(filter): ApiQuery<ListFilter>,
) -> Result<Json<Page<DbTransaction>>, StoreError> {
    let page = state.storage.list_transactions(&filter).await?;
    Ok(Json(Page::new(page, &filter)))
}

fn csv_attachment<T: CsvRow>(name: &str, rows: &[T]) -> Result<Response, StoreError> {
    let body = to_csv(rows)?;
    let filename = format!("{name}-{}.csv", Utc::now().format("%Y%m%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

pub async fn export_contacts(
    _: RequireAdmin,
    State(state): State<StoreState>,
    ApiQuery(filter): ApiQuery<ListFilter>,
) -> Result<Response, StoreError> {
    let rows = state.storage.export_contacts(&lead_filter(filter)).await?;
    csv_attachment("contacts", &rows)
}

pub async fn export_test_rides(
    _: RequireAdmin,
    State(state): State<StoreState>,
    ApiQuery(filter): ApiQuery<ListFilter>,
) -> Result<Response, StoreError> {
    let rows = state.storage.export_test_drives(&lead_filter(filter)).await?;
    csv_attachment("test-rides", &rows)
}

pub async fn export_transactions(
    _: RequireAdmin,
    State(state): State<StoreState>,
    ApiQuery(filter): ApiQuery<ListFilter>,
) -> Result<Response, StoreError> {
    let rows = state.storage.export_transactions(&filter).await?;
    csv_attachment("transactions", &rows)
}

/// GET /admin/api/transactions/{order_ref}
pub async fn get_transaction(
    _: RequireAdmin,
    State(state): State<StoreState>,
    ApiPath(order_ref): ApiPath<String>,
) -> Result<Json<DbTransaction>, StoreError> {
    Ok(Json(state.storage.get_transaction_by_ref(&order_ref).await?))
}

pub async fn list_dealerships(
    _: RequireAdmin,
    State(state): State<StoreState>,
) -> Result<Json<Vec<DbDealership>>, StoreError> {
    Ok(Json(state.storage.list_all_dealerships().await?))
}

fn check_dealership(input: &DealershipInput) -> Result<(), StoreError> {
    for (field, value) in [
        ("name", &input.name),
        ("city", &input.city),
        ("state", &input.state),
        ("address", &input.address),
    ] {
        if value.trim().is_empty() {
            return Err(StoreError::validation(field, "must not be empty"));
        }
    }
    if input.latitude.is_some_and(|lat| !(-90.0..=90.0).contains(&lat)) {
        return Err(StoreError::validation("latitude", "out of range"));
    }
    if input.longitude.is_some_and(|lon| !(-180.0..=180.0).contains(&lon)) {
        return Err(StoreError::validation("longitude", "out of range"));
    }
    Ok(())
}

pub async fn create_dealership(
    _: RequireAdmin,
    State(state): State<StoreState>,
    ApiJson(input): ApiJson<DealershipInput>,
) -> Result<(StatusCode, Json<DbDealership>), StoreError> {
    check_dealership(&input)?;
    let dealer = state.storage.insert_dealership(&input).await?;
    info!(id = dealer.id, city = %dealer.city, "dealership created");
    Ok((StatusCode::CREATED, Json(dealer)))
}

pub async fn update_dealership(
    _: RequireAdmin,
    State(state): State<StoreState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(input): ApiJson<DealershipInput>,
) -> Result<Json<DbDealership>, StoreError> {
    check_dealership(&input)?;
    Ok(Json(state.storage.update_dealership(id, &input).await?))
}

/// Soft delete: the row stays for historical leads but leaves public listings.
pub async fn delete_dealership(
    _: RequireAdmin,
    State(state): State<StoreState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, StoreError> {
    state.storage.deactivate_dealership(id).await?;
    info!(id, "dealership deactivated");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/api/leads/resync
pub async fn resync_leads(
    _: RequireAdmin,
    State(state): State<StoreState>,
) -> Result<Json<Value>, StoreError> {
    let failed = state.storage.list_failed_crm().await?;
    for &(kind, id) in &failed {
        state.dispatcher.enqueue(LeadJob { kind, id });
    }
    info!(count = failed.len(), "re-queued failed CRM leads");
    Ok(Json(json!({ "requeued": failed.len() })))
}
