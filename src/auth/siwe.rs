//! Sign-in-with-Ethereum challenge construction.
//!
//! The portal accepts an EIP-4361-shaped message; the same fields are also
//! submitted as a JSON document alongside the signature.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use url::Url;

use crate::config::PortalConfig;
use crate::error::{BotError, Result};

/// Case-sensitive alphanumeric characters in a login nonce
pub const NONCE_LENGTH: usize = 17;

const STATEMENT: &str = "Connect to Humanity";
const SIWE_VERSION: &str = "1";

/// One sign-in challenge, ready to be rendered and signed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiweChallenge {
    pub domain: String,
    pub address: String,
    pub statement: String,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: String,
}

impl SiweChallenge {
    /// Build a challenge for the configured portal and the given wallet address
    pub fn for_portal(cfg: &PortalConfig, address: &str) -> Result<Self> {
        let url = Url::parse(&cfg.base_url)
            .map_err(|e| BotError::Auth(format!("invalid portal base URL: {}", e)))?;
        let domain = url
            .host_str()
            .ok_or_else(|| BotError::Auth("portal base URL has no host".to_string()))?
            .to_string();

        Ok(Self {
            domain,
            address: address.to_string(),
            statement: STATEMENT.to_string(),
            uri: cfg.base_url.clone(),
            version: SIWE_VERSION.to_string(),
            chain_id: cfg.chain_id,
            nonce: generate_nonce(),
            issued_at: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        })
    }

    /// Render the personal-sign message text
    pub fn to_message(&self) -> String {
        format!(
            "{domain} wants you to sign in with your Ethereum account:\n\
             {address}\n\n\
             {statement}\n\n\
             URI: {uri}\n\
             Version: {version}\n\
             Chain ID: {chain_id}\n\
             Nonce: {nonce}\n\
             Issued At: {issued_at}",
            domain = self.domain,
            address = self.address,
            statement = self.statement,
            uri = self.uri,
            version = self.version,
            chain_id = self.chain_id,
            nonce = self.nonce,
            issued_at = self.issued_at,
        )
    }

    /// Render the JSON document submitted next to the signature
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Random login nonce from a cryptographically secure source
pub fn generate_nonce() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}
