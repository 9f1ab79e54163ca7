use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use chrono::Utc;
use headers::Authorization;
use headers::authorization::Bearer;
use subtle::ConstantTimeEq;
use time::Duration;

use crate::error::StoreError;
use crate::router::StoreState;

pub const SESSION_COOKIE: &str = "admin_session";

/// Constant-time comparison against the configured admin key.
/// An empty configured key never matches.
pub fn key_matches(candidate: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(candidate.as_bytes().ct_eq(expected.as_bytes()))
}

/// Session cookie carrying its own expiry as a unix timestamp.
/// The jar encrypts it, so the value cannot be forged or extended client-side.
pub fn session_cookie(ttl_secs: u64, secure: bool) -> Cookie<'static> {
    let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
    let expires_at = Utc::now().timestamp().saturating_add(ttl);
    Cookie::build((SESSION_COOKIE, expires_at.to_string()))
        .path("/admin")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(Duration::seconds(ttl))
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/admin").build()
}

pub fn session_is_live(jar: &PrivateCookieJar<Key>, now: i64) -> bool {
    jar.get(SESSION_COOKIE)
        .and_then(|c| c.value().parse::<i64>().ok())
        .is_some_and(|expires_at| expires_at > now)
}

/// Guards every admin route. Accepts either
/// - `Authorization: Bearer <admin_key>`
/// - a live `admin_session` private cookie issued by `/admin/login`
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

impl FromRequestParts<StoreState> for RequireAdmin {
    type Rejection = StoreError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &StoreState,
    ) -> Result<Self, Self::Rejection> {
        if let Ok(TypedHeader(Authorization(bearer))) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
            && key_matches(bearer.token(), &state.config.basic.admin_key)
        {
            return Ok(Self);
        }

        let jar = PrivateCookieJar::<Key>::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        if session_is_live(&jar, Utc::now().timestamp()) {
            return Ok(Self);
        }
        Err(StoreError::Unauthorized)
    }
}
