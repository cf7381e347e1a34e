//! HTTP client for the portal: identity provider (terminal3) and the
//! application backend (testnet). One instance per wallet, since the application
//! bearer is wallet-local state.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::PortalConfig;
use crate::error::{BotError, Result};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36 Edg/136.0.0.0";

/// Identity-exchange request body
#[derive(Debug, Serialize)]
pub struct ConnectPayload {
    pub message: String,
    pub signature: String,
    pub wallet: String,
    pub chain_id: String,
    pub attributed_client_id: u32,
    pub method: String,
    pub recaptcha_token: String,
}

/// `{data: {token}}` envelope shared by connect and loginAndRegister
#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    data: Option<TokenData>,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: Option<String>,
}

/// Daily reward availability probe
#[derive(Debug, Clone, Deserialize)]
pub struct DailyCheck {
    pub message: Option<String>,
    pub available: Option<bool>,
    pub amount: Option<serde_json::Value>,
    pub next_daily_award: Option<serde_json::Value>,
}

/// Daily reward claim response
#[derive(Debug, Clone, Deserialize)]
pub struct DailyClaim {
    pub message: Option<String>,
    pub daily_claimed: Option<bool>,
    pub amount: Option<serde_json::Value>,
    pub available: Option<bool>,
}

/// Raw result of probing the authorization endpoint with redirects disabled
#[derive(Debug, Clone)]
pub struct AuthorizeProbe {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

/// Per-wallet portal session
pub struct PortalClient {
    http: Client,
    /// Navigation client with redirects disabled, for the authorize probe
    nav: Client,
    config: PortalConfig,
    app_token: Option<String>,
}

impl PortalClient {
    pub fn new(config: PortalConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);

        let http = Client::builder()
            .default_headers(api_headers(&config))
            .timeout(timeout)
            .build()?;

        let nav = Client::builder()
            .default_headers(nav_headers(&config))
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            nav,
            config,
            app_token: None,
        })
    }

    /// Install the application bearer used by reward calls
    pub fn set_app_token(&mut self, token: &str) {
        self.app_token = Some(token.to_string());
    }

    pub fn app_token(&self) -> Option<&str> {
        self.app_token.as_deref()
    }

    // ==================== Identity provider ====================

    /// Exchange a signed challenge (+ captcha proof) for a session token
    pub async fn connect(&self, payload: &ConnectPayload) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/user/v3/connect", self.config.identity_url))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BotError::Auth(format!(
                "connect rejected ({}): {}",
                status,
                snippet(&text)
            )));
        }

        let envelope: TokenEnvelope = serde_json::from_str(&text)
            .map_err(|e| BotError::Auth(format!("connect response is not JSON: {}", e)))?;

        envelope
            .data
            .and_then(|d| d.token)
            .ok_or_else(|| BotError::Auth("no session token in connect response".to_string()))
    }

    /// Hit the authorization endpoint without following redirects and hand
    /// back everything a code-extraction strategy might need
    pub async fn authorize_probe(&self, session_token: &str) -> Result<AuthorizeProbe> {
        let response = self
            .nav
            .get(format!("{}/v1/openidc/authorize", self.config.identity_url))
            .query(&[
                ("client_id", self.config.oauth_client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid"),
                ("state", "t3"),
                ("token", session_token),
            ])
            .send()
            .await?;

        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        debug!(%status, has_location = location.is_some(), "authorize probe");
        Ok(AuthorizeProbe {
            status,
            location,
            body,
        })
    }

    /// Direct token exchange against the authorization server
    pub async fn exchange_token(&self, session_token: &str) -> Result<Option<String>> {
        let response = self
            .nav
            .post(format!("{}/v1/openidc/token", self.config.identity_url))
            .json(&json!({
                "grant_type": "authorization_code",
                "client_id": self.config.oauth_client_id,
                "token": session_token,
            }))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Ok(None);
        }

        let token: AccessTokenResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(_) => return Ok(None),
        };
        Ok(token.access_token)
    }

    // ==================== Application backend ====================

    /// Exchange an authorization code for the application bearer
    pub async fn login_and_register(&self, code: &str) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/api/user/loginAndRegister", self.config.base_url))
            .json(&json!({ "code": code }))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BotError::Auth(format!(
                "loginAndRegister rejected ({}): {}",
                status,
                snippet(&text)
            )));
        }

        let envelope: TokenEnvelope = serde_json::from_str(&text)
            .map_err(|e| BotError::Auth(format!("loginAndRegister response is not JSON: {}", e)))?;

        envelope
            .data
            .and_then(|d| d.token)
            .ok_or_else(|| BotError::Auth("no application token in login response".to_string()))
    }

    /// Probe today's reward availability
    pub async fn daily_check(&self) -> Result<DailyCheck> {
        let text = self.reward_call("api/rewards/daily/check").await?;
        serde_json::from_str(&text)
            .map_err(|e| BotError::Claim(format!("check response is not JSON: {}", e)))
    }

    /// Attempt today's claim. Transport errors bubble as `Http` (retryable);
    /// a body that is not the expected JSON is a terminal `Claim` error.
    pub async fn daily_claim(&self) -> Result<DailyClaim> {
        let text = self.reward_call("api/rewards/daily/claim").await?;
        serde_json::from_str(&text)
            .map_err(|e| BotError::Claim(format!("claim response is not JSON: {}", e)))
    }

    async fn reward_call(&self, path: &str) -> Result<String> {
        let token = self
            .app_token
            .as_deref()
            .ok_or_else(|| BotError::Auth("no application token for reward call".to_string()))?;

        let response = self
            .http
            .post(format!("{}/{}", self.config.base_url, path))
            .header("authorization", format!("Bearer {}", token))
            .header("token", token)
            .json(&json!({}))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BotError::Claim(format!(
                "{} rejected ({}): {}",
                path,
                status,
                snippet(&text)
            )));
        }

        Ok(text)
    }
}

fn api_headers(config: &PortalConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
    if let Ok(origin) = HeaderValue::from_str(&config.base_url) {
        headers.insert(ORIGIN, origin);
    }
    if let Ok(referer) = HeaderValue::from_str(&format!("{}/", config.base_url)) {
        headers.insert(REFERER, referer);
    }
    headers
}

fn nav_headers(config: &PortalConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
    if let Ok(referer) = HeaderValue::from_str(&format!("{}/", config.base_url)) {
        headers.insert(REFERER, referer);
    }
    headers
}

fn snippet(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        assert_eq!(snippet(&long).len(), 200);
        assert_eq!(snippet("short"), "short");
    }

    #[test]
    fn claim_response_parses_wire_shape() {
        let parsed: DailyClaim = serde_json::from_str(
            r#"{"message":"ok","daily_claimed":true,"amount":10,"available":false}"#,
        )
        .unwrap();
        assert_eq!(parsed.daily_claimed, Some(true));
        assert_eq!(parsed.available, Some(false));
    }

    #[test]
    fn claim_response_tolerates_missing_fields() {
        let parsed: DailyClaim = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert_eq!(parsed.daily_claimed, None);
        assert_eq!(parsed.available, None);
    }
}
