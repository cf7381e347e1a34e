//! Session establishment: the four-step login handshake.
//!
//! Challenge signing, captcha proof, identity exchange, then an OAuth-style
//! authorization-code hop. Nothing is persisted on a failure path: the
//! caller writes both tokens to the store only after the whole handshake
//! succeeds.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::adapters::capsolver::CaptchaSolver;
use crate::adapters::portal::{AuthorizeProbe, ConnectPayload, PortalClient};
use crate::config::PortalConfig;
use crate::error::{BotError, Result};
use crate::signing::Wallet;

use super::siwe::SiweChallenge;

/// Both bearers produced by a successful handshake, persisted as a unit
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub session_token: String,
    pub app_token: String,
}

/// Everything a code-extraction strategy may consult
pub struct AuthorizeContext<'a> {
    pub portal: &'a PortalClient,
    pub session_token: &'a str,
    pub probe: &'a AuthorizeProbe,
}

/// One way of teasing an authorization code out of the authorization server.
///
/// Strategies run in order; the first non-empty result wins, and exhausting
/// the whole chain is a hard authentication failure.
#[async_trait]
pub trait CodeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn extract(&self, ctx: &AuthorizeContext<'_>) -> Result<Option<String>>;
}

/// Read the code from the redirect Location header
struct RedirectLocation;

#[async_trait]
impl CodeStrategy for RedirectLocation {
    fn name(&self) -> &'static str {
        "redirect-location"
    }

    async fn extract(&self, ctx: &AuthorizeContext<'_>) -> Result<Option<String>> {
        if !ctx.probe.status.is_redirection() {
            return Ok(None);
        }
        Ok(ctx
            .probe
            .location
            .as_deref()
            .and_then(extract_code_param))
    }
}

/// Ask the token endpoint directly for an access token
struct DirectTokenExchange;

#[async_trait]
impl CodeStrategy for DirectTokenExchange {
    fn name(&self) -> &'static str {
        "token-exchange"
    }

    async fn extract(&self, ctx: &AuthorizeContext<'_>) -> Result<Option<String>> {
        ctx.portal.exchange_token(ctx.session_token).await
    }
}

/// Scrape a code embedded in the returned HTML
struct HtmlEmbeddedCode;

#[async_trait]
impl CodeStrategy for HtmlEmbeddedCode {
    fn name(&self) -> &'static str {
        "html-embedded"
    }

    async fn extract(&self, ctx: &AuthorizeContext<'_>) -> Result<Option<String>> {
        Ok(extract_code_param(&ctx.probe.body))
    }
}

/// Pull the value of the first `code=` parameter out of a URL or HTML blob
pub fn extract_code_param(text: &str) -> Option<String> {
    let start = text.find("code=")? + "code=".len();
    let code: String = text[start..]
        .chars()
        .take_while(|c| !matches!(c, '&' | '"' | '\'' | '<' | ' ' | '\n'))
        .collect();

    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// Runs the login handshake for one wallet
pub struct SessionEstablisher<'a> {
    captcha: &'a CaptchaSolver,
    config: &'a PortalConfig,
}

impl<'a> SessionEstablisher<'a> {
    pub fn new(captcha: &'a CaptchaSolver, config: &'a PortalConfig) -> Self {
        Self { captcha, config }
    }

    fn strategies() -> Vec<Box<dyn CodeStrategy>> {
        vec![
            Box::new(RedirectLocation),
            Box::new(DirectTokenExchange),
            Box::new(HtmlEmbeddedCode),
        ]
    }

    /// Run the full handshake, returning both tokens.
    ///
    /// Step order is fixed: sign, captcha, connect, authorize. Each step
    /// depends on the previous one's output, and a failure anywhere aborts
    /// the whole establishment.
    pub async fn establish(&self, portal: &PortalClient, wallet: &Wallet) -> Result<SessionTokens> {
        let address = wallet.address_string();

        // Step 1: challenge construction and signing
        let challenge = SiweChallenge::for_portal(self.config, &address)?;
        let signature = wallet.sign_message(&challenge.to_message()).await?;
        debug!(%address, nonce = %challenge.nonce, "challenge signed");

        // Step 2: captcha proof
        let recaptcha_token = self.captcha.solve().await?;

        // Step 3: identity exchange
        let payload = ConnectPayload {
            message: challenge.to_payload()?,
            signature,
            wallet: address.clone(),
            chain_id: self.config.chain_id.to_string(),
            attributed_client_id: 1,
            method: "wallet".to_string(),
            recaptcha_token,
        };
        let session_token = portal.connect(&payload).await?;
        info!(%address, "wallet sign-in accepted");

        // Step 4: authorization-code exchange
        let probe = portal.authorize_probe(&session_token).await?;
        let ctx = AuthorizeContext {
            portal,
            session_token: &session_token,
            probe: &probe,
        };

        let mut code = None;
        for strategy in Self::strategies() {
            match strategy.extract(&ctx).await {
                Ok(Some(found)) => {
                    debug!(%address, strategy = strategy.name(), "authorization code extracted");
                    code = Some(found);
                    break;
                }
                Ok(None) => continue,
                // A strategy failing does not doom the chain
                Err(e) => warn!(%address, strategy = strategy.name(), error = %e, "strategy failed"),
            }
        }

        let code = code.ok_or_else(|| {
            BotError::Auth("all authorization-code extraction strategies exhausted".to_string())
        })?;

        let app_token = portal.login_and_register(&code).await?;
        info!(%address, "application login succeeded");

        Ok(SessionTokens {
            session_token,
            app_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn code_is_read_from_redirect_url() {
        let location = "https://testnet.humanity.org/dashboard?code=abc123&state=t3";
        assert_eq!(extract_code_param(location).as_deref(), Some("abc123"));
    }

    #[test]
    fn code_is_read_from_html() {
        let html = r#"<a href="/dashboard?code=xYz9&state=t3">continue</a>"#;
        assert_eq!(extract_code_param(html).as_deref(), Some("xYz9"));
    }

    #[test]
    fn missing_or_empty_code_yields_none() {
        assert_eq!(extract_code_param("no code here"), None);
        assert_eq!(extract_code_param("?code=&state=t3"), None);
    }

    #[test]
    fn code_stops_at_first_delimiter() {
        assert_eq!(
            extract_code_param("code=first&code=second").as_deref(),
            Some("first")
        );
    }

    #[tokio::test]
    async fn redirect_strategy_ignores_non_redirect_status() {
        let probe = AuthorizeProbe {
            status: StatusCode::OK,
            location: Some("https://x/dashboard?code=abc".to_string()),
            body: String::new(),
        };
        // Context without network use: only the probe is consulted
        let config = crate::config::PortalConfig {
            base_url: "https://testnet.humanity.org".to_string(),
            identity_url: "https://terminal3.humanity.org".to_string(),
            oauth_client_id: "client".to_string(),
            redirect_uri: "https://testnet.humanity.org/dashboard".to_string(),
            chain_id: 7080969,
            timeout_secs: 30,
        };
        let portal = PortalClient::new(config).unwrap();
        let ctx = AuthorizeContext {
            portal: &portal,
            session_token: "tok",
            probe: &probe,
        };

        assert_eq!(RedirectLocation.extract(&ctx).await.unwrap(), None);

        let probe = AuthorizeProbe {
            status: StatusCode::FOUND,
            ..probe
        };
        let ctx = AuthorizeContext {
            portal: &portal,
            session_token: "tok",
            probe: &probe,
        };
        assert_eq!(
            RedirectLocation.extract(&ctx).await.unwrap().as_deref(),
            Some("abc")
        );
    }
}
