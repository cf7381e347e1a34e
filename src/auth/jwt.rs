//! Unverified session-token inspection.
//!
//! Tokens here are capabilities bound to a channel that was already
//! authenticated with a wallet signature, so the embedded claims are read
//! without checking the issuer's signature. Anything that fails to decode is
//! treated as expired.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;

use crate::error::{BotError, Result};

/// Tokens with less than this many seconds of validity left are treated as
/// expired, so a claim never races its own session expiry mid-flight.
pub const FRESHNESS_MARGIN_SECS: i64 = 180;

/// Claims carried by portal-issued tokens. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<serde_json::Value>,
    #[serde(default, rename = "ethAddress")]
    pub eth_address: Option<String>,
}

/// Decode the payload segment of a JWT without signature verification
pub fn decode_claims(token: &str) -> Result<TokenClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next()) {
        (Some(_header), Some(payload)) if !payload.is_empty() => payload,
        _ => {
            return Err(BotError::TokenDecode(
                "token does not have a payload segment".to_string(),
            ))
        }
    };

    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| BotError::TokenDecode(format!("payload is not base64url: {}", e)))?;

    serde_json::from_slice(&raw)
        .map_err(|e| BotError::TokenDecode(format!("payload is not valid claims JSON: {}", e)))
}

/// Whether the token still has more than the safety margin of validity left.
///
/// Fails closed: any decode error reads as "not fresh".
pub fn is_fresh(token: &str) -> bool {
    is_fresh_at(token, Utc::now().timestamp())
}

/// Freshness check against an explicit unix timestamp
pub fn is_fresh_at(token: &str, now_ts: i64) -> bool {
    match decode_claims(token) {
        Ok(claims) => claims.exp - now_ts > FRESHNESS_MARGIN_SECS,
        Err(_) => false,
    }
}
