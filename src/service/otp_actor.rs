use crate::config::OtpConfig;
use crate::error::StoreError;
use crate::integrations::SmsSender;
use crate::types::otp::OtpPurpose;
use crate::types::phone::Phone;

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

type OtpKey = (Phone, OtpPurpose);

#[derive(Debug, Clone)]
pub struct OtpSettings {
    pub ttl: Duration,
    pub max_attempts: u32,
    pub resend_interval: Duration,
    pub max_sends_per_hour: NonZeroU32,
    pub token_ttl: Duration,
    pub sweep_interval: Duration,
}

impl From<&OtpConfig> for OtpSettings {
    fn from(cfg: &OtpConfig) -> Self {
        Self {
            ttl: Duration::from_secs(cfg.ttl_secs.max(1)),
            max_attempts: cfg.max_attempts.max(1),
            resend_interval: Duration::from_secs(cfg.resend_interval_secs),
            max_sends_per_hour: NonZeroU32::new(cfg.max_sends_per_hour).unwrap_or(NonZeroU32::MIN),
            token_ttl: Duration::from_secs(cfg.token_ttl_secs.max(1)),
            sweep_interval: Duration::from_secs(cfg.sweep_interval_secs.max(1)),
        }
    }
}

/// A freshly generated code, handed back to the caller for delivery.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub code: String,
    pub ttl: Duration,
    pub resend_after: Duration,
}

#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub token: String,
    pub ttl: Duration,
}

/// Messages handled by the OTP actor.
pub enum OtpMessage {
    /// Generate (or replace) the code for a phone/purpose, subject to throttling.
    Issue(Phone, OtpPurpose, RpcReplyPort<Result<IssuedCode, StoreError>>),
    /// Drop a code whose delivery failed and lift its cooldown.
    Revoke(Phone, OtpPurpose),
    /// Check a submitted code; success yields a single-use verification token.
    Verify(
        Phone,
        OtpPurpose,
        String,
        RpcReplyPort<Result<VerifiedToken, StoreError>>,
    ),
    /// Consume a verification token; replies whether it was valid for the phone/purpose.
    Redeem(String, Phone, OtpPurpose, RpcReplyPort<bool>),
    /// Drop expired codes, tokens and cooldowns.
    Sweep,
}

struct PendingCode {
    code: String,
    expires_at: Instant,
    attempts: u32,
}

struct IssuedToken {
    phone: Phone,
    purpose: OtpPurpose,
    expires_at: Instant,
}

struct OtpState {
    settings: OtpSettings,
    pending: HashMap<OtpKey, PendingCode>,
    last_sent: HashMap<OtpKey, Instant>,
    tokens: HashMap<String, IssuedToken>,
    hourly: DefaultKeyedRateLimiter<Phone>,
}

struct OtpActor;

#[ractor::async_trait]
impl Actor for OtpActor {
    type Msg = OtpMessage;
    type State = OtpState;
    type Arguments = OtpSettings;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        settings: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!(
            ttl_secs = settings.ttl.as_secs(),
            max_attempts = settings.max_attempts,
            max_sends_per_hour = settings.max_sends_per_hour.get(),
            "OtpActor started"
        );
        let hourly = RateLimiter::keyed(Quota::per_hour(settings.max_sends_per_hour));
        Ok(OtpState {
            settings,
            pending: HashMap::new(),
            last_sent: HashMap::new(),
            tokens: HashMap::new(),
            hourly,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            OtpMessage::Issue(phone, purpose, rp) => {
                let _ = rp.send(state.issue(phone, purpose, Instant::now()));
            }
            OtpMessage::Revoke(phone, purpose) => state.revoke(phone, purpose),
            OtpMessage::Verify(phone, purpose, code, rp) => {
                let _ = rp.send(state.verify(phone, purpose, &code, Instant::now()));
            }
            OtpMessage::Redeem(token, phone, purpose, rp) => {
                let _ = rp.send(state.redeem(&token, &phone, purpose, Instant::now()));
            }
            OtpMessage::Sweep => state.sweep(Instant::now()),
        }
        Ok(())
    }
}

impl OtpState {
    fn issue(
        &mut self,
        phone: Phone,
        purpose: OtpPurpose,
        now: Instant,
    ) -> Result<IssuedCode, StoreError> {
        let key = (phone, purpose);
        if let Some(sent) = self.last_sent.get(&key) {
            let elapsed = now.saturating_duration_since(*sent);
            if elapsed < self.settings.resend_interval {
                let wait = self.settings.resend_interval - elapsed;
                return Err(StoreError::OtpThrottled {
                    retry_after_secs: wait.as_secs().max(1),
                });
            }
        }
        if let Err(not_until) = self.hourly.check_key(&key.0) {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            warn!(phone = %key.0, wait_secs = wait.as_secs(), "hourly OTP send cap reached");
            return Err(StoreError::OtpThrottled {
                retry_after_secs: ceil_secs(wait),
            });
        }

        let code = generate_code();
        self.pending.insert(
            key.clone(),
            PendingCode {
                code: code.clone(),
                expires_at: now + self.settings.ttl,
                attempts: 0,
            },
        );
        self.last_sent.insert(key, now);
        Ok(IssuedCode {
            code,
            ttl: self.settings.ttl,
            resend_after: self.settings.resend_interval,
        })
    }

    /// Undo a send whose delivery failed. The hourly slot stays spent.
    fn revoke(&mut self, phone: Phone, purpose: OtpPurpose) {
        let key = (phone, purpose);
        self.pending.remove(&key);
        self.last_sent.remove(&key);
        debug!(phone = %key.0, purpose = %key.1, "OTP revoked");
    }

    fn verify(
        &mut self,
        phone: Phone,
        purpose: OtpPurpose,
        code: &str,
        now: Instant,
    ) -> Result<VerifiedToken, StoreError> {
        let key = (phone, purpose);
        let Some(pending) = self.pending.get_mut(&key) else {
            return Err(StoreError::OtpNotRequested);
        };
        if now >= pending.expires_at {
            self.pending.remove(&key);
            return Err(StoreError::OtpExpired);
        }

        let matches = bool::from(pending.code.as_bytes().ct_eq(code.trim().as_bytes()));
        if !matches {
            pending.attempts += 1;
            if pending.attempts >= self.settings.max_attempts {
                self.pending.remove(&key);
                warn!(phone = %key.0, purpose = %key.1, "OTP burned after repeated mismatches");
                return Err(StoreError::OtpAttemptsExceeded);
            }
            return Err(StoreError::OtpMismatch {
                remaining: self.settings.max_attempts - pending.attempts,
            });
        }

        self.pending.remove(&key);
        let (phone, purpose) = key;
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.tokens.insert(
            token.clone(),
            IssuedToken {
                phone,
                purpose,
                expires_at: now + self.settings.token_ttl,
            },
        );
        Ok(VerifiedToken {
            token,
            ttl: self.settings.token_ttl,
        })
    }

    fn redeem(&mut self, token: &str, phone: &Phone, purpose: OtpPurpose, now: Instant) -> bool {
        let Some(issued) = self.tokens.get(token) else {
            return false;
        };
        if now >= issued.expires_at {
            self.tokens.remove(token);
            return false;
        }
        if issued.phone != *phone || issued.purpose != purpose {
            return false;
        }
        self.tokens.remove(token);
        true
    }

    fn sweep(&mut self, now: Instant) {
        let before = self.pending.len() + self.tokens.len();
        self.pending.retain(|_, p| p.expires_at > now);
        self.tokens.retain(|_, t| t.expires_at > now);
        let resend = self.settings.resend_interval;
        self.last_sent
            .retain(|_, sent| now.saturating_duration_since(*sent) < resend);
        self.hourly.retain_recent();
        let after = self.pending.len() + self.tokens.len();
        if before != after {
            debug!(dropped = before - after, "OTP sweep");
        }
    }
}

fn ceil_secs(wait: Duration) -> u64 {
    (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1)
}

fn generate_code() -> String {
    // v4 uuids carry 122 random bits from the OS rng
    format!("{:06}", uuid::Uuid::new_v4().as_u128() % 1_000_000)
}

/// Handle for interacting with the OTP actor.
#[derive(Clone)]
pub struct OtpHandle {
    actor: ActorRef<OtpMessage>,
    sms: Arc<dyn SmsSender>,
}

impl OtpHandle {
    /// Issue a code and deliver it by SMS. A failed delivery revokes the code.
    pub async fn send(&self, phone: &Phone, purpose: OtpPurpose) -> Result<IssuedCode, StoreError> {
        let issued = ractor::call!(self.actor, OtpMessage::Issue, phone.clone(), purpose)
            .map_err(|e| StoreError::RactorError(format!("Issue RPC failed: {e}")))??;

        if let Err(e) = self.sms.send_otp(phone, &issued.code, issued.ttl).await {
            warn!(phone = %phone, error = %e, "OTP delivery failed; revoking");
            let _ = ractor::cast!(self.actor, OtpMessage::Revoke(phone.clone(), purpose));
            return Err(e);
        }
        info!(phone = %phone, purpose = %purpose, "OTP sent");
        Ok(issued)
    }

    pub async fn verify(
        &self,
        phone: &Phone,
        purpose: OtpPurpose,
        code: &str,
    ) -> Result<VerifiedToken, StoreError> {
        ractor::call!(
            self.actor,
            OtpMessage::Verify,
            phone.clone(),
            purpose,
            code.to_string()
        )
        .map_err(|e| StoreError::RactorError(format!("Verify RPC failed: {e}")))?
    }

    /// Consume a verification token; `OtpRequired` if absent, `OtpInvalidToken` if not redeemable.
    pub async fn redeem(
        &self,
        token: Option<&str>,
        phone: &Phone,
        purpose: OtpPurpose,
    ) -> Result<(), StoreError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(StoreError::OtpRequired)?;
        let ok = ractor::call!(
            self.actor,
            OtpMessage::Redeem,
            token.to_string(),
            phone.clone(),
            purpose
        )
        .map_err(|e| StoreError::RactorError(format!("Redeem RPC failed: {e}")))?;
        if ok { Ok(()) } else { Err(StoreError::OtpInvalidToken) }
    }
}

/// Spawn the OTP actor plus its periodic sweeper and return a handle.
pub async fn spawn(settings: OtpSettings, sms: Arc<dyn SmsSender>) -> Result<OtpHandle, StoreError> {
    let sweep_every = settings.sweep_interval;
    let (actor, _jh) = Actor::spawn(None, OtpActor, settings)
        .await
        .map_err(|e| StoreError::RactorError(format!("failed to spawn OtpActor: {e}")))?;

    let sweeper = actor.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if ractor::cast!(sweeper, OtpMessage::Sweep).is_err() {
                break;
            }
        }
    });

    Ok(OtpHandle { actor, sms })
}
