#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use evstore::StoreError;
use evstore::config::Config;
use evstore::db::Storage;
use evstore::db::models::DealershipInput;
use evstore::integrations::payment;
use evstore::integrations::{
    CrmSink, Email, GatewayOrder, Integrations, LeadRecord, Mailer, PaymentGateway, SmsSender,
};
use evstore::router::{StoreState, store_router};
use evstore::types::Phone;
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN_KEY: &str = "admin-test-key";
pub const GATEWAY_SECRET: &str = "gateway-test-secret";

#[derive(Default)]
pub struct FakeSms {
    sent: Mutex<Vec<(String, String)>>,
    pub fail: Mutex<bool>,
}

impl FakeSms {
    pub fn last_code(&self, phone: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == phone)
            .map(|(_, code)| code.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl SmsSender for FakeSms {
    async fn send_otp(&self, phone: &Phone, code: &str, _ttl: Duration) -> Result<(), StoreError> {
        if *self.fail.lock().unwrap() {
            return Err(StoreError::Sms("gateway down".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((phone.as_str().to_string(), code.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<Email>>,
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, email: Email) -> Result<(), StoreError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCrm {
    pub submitted: Mutex<Vec<LeadRecord>>,
    pub fail: Mutex<bool>,
}

#[async_trait]
impl CrmSink for FakeCrm {
    async fn submit(&self, lead: &LeadRecord) -> Result<(), StoreError> {
        if *self.fail.lock().unwrap() {
            return Err(StoreError::UpstreamStatus {
                service: "salesforce",
                status: StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        self.submitted.lock().unwrap().push(lead.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGateway {
    pub orders: Mutex<Vec<(i64, String, String)>>,
    pub fail: Mutex<bool>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, StoreError> {
        if *self.fail.lock().unwrap() {
            return Err(StoreError::UpstreamStatus {
                service: "payment gateway",
                status: StatusCode::BAD_GATEWAY,
            });
        }
        let mut orders = self.orders.lock().unwrap();
        orders.push((amount, currency.to_string(), receipt.to_string()));
        Ok(GatewayOrder {
            id: format!("order_test_{}", orders.len()),
            status: Some("created".to_string()),
        })
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        payment::signature_matches(GATEWAY_SECRET, order_id, payment_id, signature)
    }

    fn key_id(&self) -> &str {
        "rzp_test_key"
    }

    fn checkout_url(&self) -> &str {
        "https://checkout.example.com/v1/checkout.js"
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: StoreState,
    pub storage: Storage,
    pub sms: Arc<FakeSms>,
    pub mailer: Arc<FakeMailer>,
    pub crm: Arc<FakeCrm>,
    pub gateway: Arc<FakeGateway>,
}

pub fn test_config() -> Config {
    let mut cfg = Config::default();
    cfg.basic.admin_key = ADMIN_KEY.to_string();
    cfg.basic.cookie_secret = "0123456789abcdef0123456789abcdef-test".to_string();
    cfg.basic.insecure_cookie = true;
    cfg.email.notify_to = vec!["sales@example.com".to_string()];
    cfg
}

pub async fn spawn_app(tune: impl FnOnce(&mut Config)) -> TestApp {
    let mut cfg = test_config();
    tune(&mut cfg);

    let storage = Storage::connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    let sms = Arc::new(FakeSms::default());
    let mailer = Arc::new(FakeMailer::default());
    let crm = Arc::new(FakeCrm::default());
    let gateway = Arc::new(FakeGateway::default());

    let integrations = Integrations {
        sms: sms.clone(),
        mailer: mailer.clone(),
        crm: Some(crm.clone()),
        payments: gateway.clone(),
    };
    let state = StoreState::new(Arc::new(cfg), storage.clone(), integrations)
        .await
        .expect("state");
    let app = store_router(state.clone());

    TestApp {
        app,
        state,
        storage,
        sms,
        mailer,
        crm,
        gateway,
    }
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}

pub fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
        .body(Body::empty())
        .expect("failed to build request")
}

pub fn admin_json(method: &str, uri: &str, body: &Value) -> Request<Body> {
    let mut req = json_request(method, uri, body);
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {ADMIN_KEY}").parse().unwrap(),
    );
    req
}

pub async fn call(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("request failed")
}

pub async fn call_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = call(app, req).await;
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("response body was not json")
    };
    (status, value)
}

pub async fn add_dealership(storage: &Storage, name: &str, city: &str, active: bool) -> i64 {
    storage
        .insert_dealership(&DealershipInput {
            name: name.to_string(),
            city: city.to_string(),
            state: "Maharashtra".to_string(),
            address: "1 MG Road".to_string(),
            phone: None,
            latitude: None,
            longitude: None,
            active,
        })
        .await
        .expect("insert dealership")
        .id
}

/// Poll until `check` holds; dispatch runs on a background task.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
