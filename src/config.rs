use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;
use url::Url;

/// Process-wide configuration, resolved once on first access.
///
/// Layering: built-in defaults -> `config.toml` -> `EVSTORE_*` env vars
/// (nested keys split on `__`, e.g. `EVSTORE_OTP__TTL_SECS=120`).
pub static CONFIG: LazyLock<Config> = LazyLock::new(|| {
    Config::figment()
        .extract()
        .expect("FATAL: invalid configuration")
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub basic: BasicConfig,
    pub otp: OtpConfig,
    pub leads: LeadsConfig,
    pub salesforce: SalesforceConfig,
    pub email: EmailConfig,
    pub sms: SmsConfig,
    pub payment: PaymentConfig,
}

impl Config {
    pub fn figment() -> Figment {
        let path = std::env::var("EVSTORE_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("EVSTORE_").split("__"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Shared secret for the admin API (bearer token and login key).
    pub admin_key: String,
    /// Master secret for private cookies; at least 32 bytes or a random key is generated.
    pub cookie_secret: String,
    pub session_ttl_secs: u64,
    pub insecure_cookie: bool,
    pub cors_origins: Vec<String>,
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite://data/evstore.sqlite".to_string(),
            loglevel: "info".to_string(),
            admin_key: "change-me".to_string(),
            cookie_secret: String::new(),
            session_ttl_secs: 8 * 3600,
            insecure_cookie: false,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_attempts: u32,
    pub resend_interval_secs: u64,
    pub max_sends_per_hour: u32,
    pub token_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
            max_attempts: 5,
            resend_interval_secs: 30,
            max_sends_per_hour: 5,
            token_ttl_secs: 900,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadsConfig {
    pub duplicate_window_secs: u64,
    pub dispatch_concurrency: usize,
    pub crm_rate_per_minute: u32,
}

impl Default for LeadsConfig {
    fn default() -> Self {
        Self {
            duplicate_window_secs: 24 * 3600,
            dispatch_concurrency: 4,
            crm_rate_per_minute: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesforceConfig {
    pub enabled: bool,
    pub endpoint: Url,
    pub oid: String,
    pub lead_source: String,
    /// Logical lead attribute (`variant`, `colour`, `preferred_date`, ...) -> Salesforce field id.
    pub custom_fields: HashMap<String, String>,
}

impl Default for SalesforceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: Url::parse(
                "https://webto.salesforce.com/servlet/servlet.WebToLead?encoding=UTF-8",
            )
            .expect("valid default Web-to-Lead url"),
            oid: String::new(),
            lead_source: "Website".to_string(),
            custom_fields: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub region: String,
    pub from: String,
    pub notify_to: Vec<String>,
    pub send_customer_ack: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            region: "ap-south-1".to_string(),
            from: "no-reply@example.com".to_string(),
            notify_to: Vec::new(),
            send_customer_ack: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub enabled: bool,
    pub endpoint: Option<Url>,
    pub api_key: String,
    pub sender_id: String,
    /// `{code}` and `{minutes}` are substituted.
    pub template: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: String::new(),
            sender_id: "EVSTOR".to_string(),
            template: "{code} is your verification code. It expires in {minutes} minutes."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub base_url: Url,
    pub checkout_url: Url,
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
    /// Booking amount in minor units (paise).
    pub booking_amount: i64,
    pub reuse_window_secs: u64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://api.razorpay.com/").expect("valid default gateway url"),
            checkout_url: Url::parse("https://checkout.razorpay.com/v1/checkout.js")
                .expect("valid default checkout url"),
            key_id: String::new(),
            key_secret: String::new(),
            currency: "INR".to_string(),
            booking_amount: 99_900,
            reuse_window_secs: 900,
        }
    }
}
