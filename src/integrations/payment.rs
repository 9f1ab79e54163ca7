use crate::config::PaymentConfig;
use crate::error::StoreError;
use crate::integrations::default_retry_policy;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt::Write as _;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayOrder {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted-checkout order for `amount` minor units.
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, StoreError>;

    /// Check the checkout callback signature for `order_id|payment_id`.
    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;

    /// Public key id handed to the browser checkout widget.
    fn key_id(&self) -> &str;

    fn checkout_url(&self) -> &str;
}

pub struct HttpPaymentGateway {
    client: reqwest::Client,
    cfg: PaymentConfig,
    retry_policy: ExponentialBuilder,
}

#[derive(Serialize)]
struct CreateOrder<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// `{base_url}/v1/orders`, keeping any path prefix on the base.
fn orders_url(base: &Url) -> Result<Url, StoreError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("v1/orders")?)
}

impl HttpPaymentGateway {
    pub fn new(client: reqwest::Client, cfg: PaymentConfig) -> Self {
        Self {
            client,
            cfg,
            retry_policy: default_retry_policy(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: ExponentialBuilder) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    async fn create_once(&self, body: &CreateOrder<'_>) -> Result<GatewayOrder, StoreError> {
        let url = orders_url(&self.cfg.base_url)?;
        let resp = self
            .client
            .post(url)
            .basic_auth(&self.cfg.key_id, Some(&self.cfg.key_secret))
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StoreError::UpstreamStatus {
                service: "payment gateway",
                status,
            });
        }
        Ok(resp.json::<GatewayOrder>().await?)
    }
}

/// `hex(HMAC-SHA256(secret, "{order_id}|{payment_id}"))`
pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC takes any key size");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    mac.finalize()
        .into_bytes()
        .iter()
        .fold(String::with_capacity(64), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

pub fn signature_matches(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let expected = sign(secret, order_id, payment_id);
    let given = signature.trim().to_ascii_lowercase();
    bool::from(expected.as_bytes().ct_eq(given.as_bytes()))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, StoreError> {
        let body = CreateOrder {
            amount,
            currency,
            receipt,
        };
        let order = (|| async { self.create_once(&body).await })
            .retry(self.retry_policy.clone())
            .when(|e: &StoreError| e.is_retryable())
            .notify(|err, dur: Duration| {
                warn!("create order retrying after error {}, sleeping {:?}", err, dur);
            })
            .await?;
        info!(receipt, gateway_order_id = %order.id, amount, "gateway order created");
        Ok(order)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        signature_matches(&self.cfg.key_secret, order_id, payment_id, signature)
    }

    fn key_id(&self) -> &str {
        &self.cfg.key_id
    }

    fn checkout_url(&self) -> &str {
        self.cfg.checkout_url.as_str()
    }
}
