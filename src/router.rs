use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRef},
    http::{HeaderValue, Method, header},
    routing::{get, post, put},
};
use axum_extra::extract::cookie::Key;
use serde_json::{Value, json};
use sha2::{Digest, Sha512};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::Config;
use crate::db::Storage;
use crate::error::StoreError;
use crate::handlers::{admin, booking, catalog, leads, otp};
use crate::integrations::{Integrations, PaymentGateway};
use crate::middleware::FORM_BODY_LIMIT;
use crate::service::lead_dispatch::{DispatchContext, LeadDispatcher};
use crate::service::otp_actor::{self, OtpHandle, OtpSettings};

#[derive(Clone)]
pub struct StoreState {
    pub config: Arc<Config>,
    pub storage: Storage,
    pub otp: OtpHandle,
    pub dispatcher: LeadDispatcher,
    pub payments: Arc<dyn PaymentGateway>,
    cookie_key: Key,
}

impl StoreState {
    /// Spawn the OTP actor and the dispatch pipeline and bundle them with storage.
    pub async fn new(
        config: Arc<Config>,
        storage: Storage,
        integrations: Integrations,
    ) -> Result<Self, StoreError> {
        let otp = otp_actor::spawn(OtpSettings::from(&config.otp), integrations.sms).await?;
        let dispatcher = LeadDispatcher::spawn(
            DispatchContext {
                storage: storage.clone(),
                crm: integrations.crm,
                mailer: integrations.mailer,
                email: config.email.clone(),
            },
            &config.leads,
        );
        let cookie_key = cookie_key(&config.basic.cookie_secret);

        Ok(Self {
            config,
            storage,
            otp,
            dispatcher,
            payments: integrations.payments,
            cookie_key,
        })
    }
}

impl FromRef<StoreState> for Key {
    fn from_ref(state: &StoreState) -> Self {
        state.cookie_key.clone()
    }
}

/// Stretch the configured secret to the 64 bytes a cookie key needs.
/// Without a secret, sessions only survive until restart.
fn cookie_key(secret: &str) -> Key {
    if secret.len() < 32 {
        warn!("basic.cookie_secret shorter than 32 bytes; using a random session key");
        return Key::generate();
    }
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(60 * 60))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn store_router(state: StoreState) -> Router {
    let public = Router::new()
        .route("/api/variants", get(catalog::list_variants))
        .route("/api/dealerships", get(catalog::list_dealerships))
        .route("/api/dealerships/cities", get(catalog::list_cities))
        .route("/api/otp/send", post(otp::send_otp))
        .route("/api/otp/verify", post(otp::verify_otp))
        .route("/api/contact", post(leads::submit_contact))
        .route("/api/test-rides", post(leads::submit_test_ride))
        .route("/api/bookings", post(booking::create_booking))
        .route("/api/bookings/{order_ref}", get(booking::booking_status))
        .route("/api/payments/callback", post(booking::payment_callback))
        .layer(DefaultBodyLimit::max(FORM_BODY_LIMIT));

    let admin = Router::new()
        .route("/login", post(admin::login))
        .route("/logout", post(admin::logout))
        .route("/api/dashboard", get(admin::dashboard))
        .route("/api/contacts", get(admin::list_contacts))
        .route("/api/contacts/export", get(admin::export_contacts))
        .route("/api/test-rides", get(admin::list_test_rides))
        .route("/api/test-rides/export", get(admin::export_test_rides))
        .route("/api/transactions", get(admin::list_transactions))
        .route("/api/transactions/export", get(admin::export_transactions))
        .route("/api/transactions/{order_ref}", get(admin::get_transaction))
        .route(
            "/api/dealerships",
            get(admin::list_dealerships).post(admin::create_dealership),
        )
        .route(
            "/api/dealerships/{id}",
            put(admin::update_dealership).delete(admin::delete_dealership),
        )
        .route("/api/leads/resync", post(admin::resync_leads))
        .layer(DefaultBodyLimit::max(FORM_BODY_LIMIT));

    Router::new()
        .route("/health", get(health))
        .merge(public)
        .nest("/admin", admin)
        .layer(cors_layer(&state.config.basic.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
