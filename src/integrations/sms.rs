use crate::config::SmsConfig;
use crate::error::StoreError;
use crate::types::phone::Phone;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_otp(&self, phone: &Phone, code: &str, ttl: Duration) -> Result<(), StoreError>;
}

/// Development sender: the code only goes to the log.
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_otp(&self, phone: &Phone, code: &str, ttl: Duration) -> Result<(), StoreError> {
        info!(phone = %phone, code, ttl_secs = ttl.as_secs(), "OTP issued (SMS disabled)");
        Ok(())
    }
}

/// JSON-over-HTTP SMS gateway with bearer authentication.
pub struct HttpSmsSender {
    client: reqwest::Client,
    endpoint: Url,
    cfg: SmsConfig,
}

#[derive(Serialize)]
struct SmsPayload<'a> {
    sender: &'a str,
    to: String,
    message: String,
}

impl HttpSmsSender {
    pub fn new(client: reqwest::Client, endpoint: Url, cfg: SmsConfig) -> Self {
        Self {
            client,
            endpoint,
            cfg,
        }
    }
}

pub fn render_otp_message(template: &str, code: &str, ttl: Duration) -> String {
    let minutes = ttl.as_secs().div_ceil(60).max(1);
    template
        .replace("{code}", code)
        .replace("{minutes}", &minutes.to_string())
}

#[async_trait]
impl SmsSender for HttpSmsSender {
    async fn send_otp(&self, phone: &Phone, code: &str, ttl: Duration) -> Result<(), StoreError> {
        let payload = SmsPayload {
            sender: &self.cfg.sender_id,
            to: phone.e164(),
            message: render_otp_message(&self.cfg.template, code, ttl),
        };
        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.cfg.api_key)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(phone = %phone, %status, body, "SMS gateway rejected OTP");
            return Err(StoreError::Sms(format!("gateway responded {status}")));
        }
        info!(phone = %phone, "OTP SMS dispatched");
        Ok(())
    }
}
