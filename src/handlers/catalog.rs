use axum::{Json, extract::State};
use serde::Deserialize;

use crate::db::DbDealership;
use crate::error::StoreError;
use crate::middleware::ApiQuery;
use crate::router::StoreState;
use crate::types::catalog::{VariantEntry, catalog};

#[derive(Debug, Default, Deserialize)]
pub struct DealershipQuery {
    pub city: Option<String>,
}

/// GET /api/variants
pub async fn list_variants() -> Json<Vec<VariantEntry>> {
    Json(catalog())
}

/// GET /api/dealerships?city=
pub async fn list_dealerships(
    State(state): State<StoreState>,
    ApiQuery(query): ApiQuery<DealershipQuery>,
) -> Result<Json<Vec<DbDealership>>, StoreError> {
    let city = query.city.as_deref().map(str::trim).filter(|c| !c.is_empty());
    Ok(Json(state.storage.list_active_dealerships(city).await?))
}

/// GET /api/dealerships/cities
pub async fn list_cities(State(state): State<StoreState>) -> Result<Json<Vec<String>>, StoreError> {
    Ok(Json(state.storage.dealership_cities().await?))
}
