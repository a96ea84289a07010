use axum::http::HeaderValue;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{SecurityConfig, MAX_TOKEN_TTL_HOURS};

pub const SESSION_COOKIE: &str = "token";

/// Session token claims: the caller's identity payload plus issue/expiry times
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub identity: Map<String, Value>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(mut identity: Map<String, Value>, ttl_hours: i64) -> Self {
        let ttl_hours = ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS);
        // Reserved claims are always server-assigned
        identity.remove("exp");
        identity.remove("iat");

        let now = Utc::now();
        let exp = (now + Duration::hours(ttl_hours)).timestamp();

        Self {
            identity,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("Invalid cookie value")]
    InvalidCookie,
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    let header = Header::default();

    encode(&header, claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

fn cookie_attributes(security: &SecurityConfig) -> String {
    let mut attrs = String::from("Path=/; HttpOnly");
    if security.secure_cookies {
        attrs.push_str("; Secure");
    }
    if security.cross_site_cookies {
        attrs.push_str("; SameSite=None");
    } else {
        attrs.push_str("; SameSite=Strict");
    }
    attrs
}

/// `Set-Cookie` value carrying a freshly issued token.
pub fn session_cookie(token: &str, security: &SecurityConfig) -> Result<HeaderValue, JwtError> {
    let max_age = security.token_ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS) * 60 * 60;
    let cookie = format!(
        "{}={}; Max-Age={}; {}",
        SESSION_COOKIE,
        token,
        max_age,
        cookie_attributes(security)
    );
    HeaderValue::from_str(&cookie).map_err(|_| JwtError::InvalidCookie)
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn cleared_session_cookie(security: &SecurityConfig) -> Result<HeaderValue, JwtError> {
    let cookie = format!(
        "{}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; {}",
        SESSION_COOKIE,
        cookie_attributes(security)
    );
    HeaderValue::from_str(&cookie).map_err(|_| JwtError::InvalidCookie)
}
