//! Outbound integrations: SMS for OTP delivery, SES email, Salesforce
//! Web-to-Lead and the payment gateway.

pub mod mailer;
pub mod payment;
pub mod salesforce;
pub mod sms;

use crate::config::Config;
use crate::error::StoreError;
use backon::ExponentialBuilder;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use mailer::{Email, LogMailer, Mailer, SesMailer};
pub use payment::{GatewayOrder, HttpPaymentGateway, PaymentGateway};
pub use salesforce::{CrmSink, LeadRecord, WebToLead};
pub use sms::{HttpSmsSender, LogSmsSender, SmsSender};

/// Shared HTTP client for every outbound integration.
pub fn http_client() -> Result<reqwest::Client, StoreError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("evstore/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(15))
        .build()?;
    Ok(client)
}

pub(crate) fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Every outbound dependency the router needs, behind trait objects so tests
/// can swap in fakes.
#[derive(Clone)]
pub struct Integrations {
    pub sms: Arc<dyn SmsSender>,
    pub mailer: Arc<dyn Mailer>,
    pub crm: Option<Arc<dyn CrmSink>>,
    pub payments: Arc<dyn PaymentGateway>,
}

impl Integrations {
    /// Build the production integrations from configuration.
    pub async fn from_config(cfg: &Config) -> Result<Self, StoreError> {
        let client = http_client()?;

        let sms: Arc<dyn SmsSender> = match (&cfg.sms.endpoint, cfg.sms.enabled) {
            (Some(endpoint), true) => Arc::new(HttpSmsSender::new(
                client.clone(),
                endpoint.clone(),
                cfg.sms.clone(),
            )),
            _ => {
                info!("SMS delivery disabled; OTP codes are logged");
                Arc::new(LogSmsSender)
            }
        };

        let mailer: Arc<dyn Mailer> = if cfg.email.enabled {
            Arc::new(SesMailer::from_env(&cfg.email).await)
        } else {
            info!("email delivery disabled; messages are logged");
            Arc::new(LogMailer)
        };

        let crm: Option<Arc<dyn CrmSink>> = if cfg.salesforce.enabled {
            Some(Arc::new(WebToLead::new(client.clone(), cfg.salesforce.clone())))
        } else {
            info!("Salesforce Web-to-Lead disabled; leads are stored only");
            None
        };

        let payments: Arc<dyn PaymentGateway> =
            Arc::new(HttpPaymentGateway::new(client, cfg.payment.clone()));

        Ok(Self {
            sms,
            mailer,
            crm,
            payments,
        })
    }
}
