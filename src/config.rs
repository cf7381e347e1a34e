use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub captcha: CaptchaConfig,
    pub runner: RunnerConfig,
    pub database: DatabaseConfig,
    pub onchain: OnchainConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Portal (identity provider + application backend) endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    /// Application backend base URL
    #[serde(default = "default_portal_base")]
    pub base_url: String,
    /// Identity provider (terminal3) base URL
    #[serde(default = "default_identity_base")]
    pub identity_url: String,
    /// OAuth client id used by the authorization-code flow
    #[serde(default = "default_oauth_client_id")]
    pub oauth_client_id: String,
    /// Redirect URI registered for the OAuth client
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Chain id sent with the sign-in message
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_portal_base() -> String {
    "https://testnet.humanity.org".to_string()
}

fn default_identity_base() -> String {
    "https://terminal3.humanity.org".to_string()
}

fn default_oauth_client_id() -> String {
    "8Lr7zhdHSPWqLcEZaVDLeq7xYP4qAfyT".to_string()
}

fn default_redirect_uri() -> String {
    "https://testnet.humanity.org/dashboard".to_string()
}

fn default_chain_id() -> u64 {
    7080969
}

fn default_http_timeout() -> u64 {
    30
}

/// Captcha solver service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Solver API key (required for the portal flow)
    #[serde(default)]
    pub api_key: String,
    /// Solver base URL
    #[serde(default = "default_captcha_base")]
    pub base_url: String,
    /// reCAPTCHA site key of the target page
    #[serde(default = "default_site_key")]
    pub site_key: String,
    /// Page the captcha is solved for
    #[serde(default = "default_portal_base")]
    pub page_url: String,
    /// Page action reported to the solver
    #[serde(default = "default_captcha_action")]
    pub action: String,
    /// Seconds between result polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_captcha_base() -> String {
    "https://api.capsolver.com".to_string()
}

fn default_site_key() -> String {
    "6LenESAqAAAAAL9ZymIB_A4Y03U3s3cPhBYKfcnU".to_string()
}

fn default_captcha_action() -> String {
    "LOGIN".to_string()
}

fn default_poll_interval() -> u64 {
    1
}

/// Batch runner configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Maximum wallets processed in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// File with one private key per line
    #[serde(default = "default_keys_file")]
    pub keys_file: String,
    /// Directory for outcome logs
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_concurrency() -> usize {
    3
}

fn default_keys_file() -> String {
    "data/private_keys.txt".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite://data/accounts.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// On-chain claimer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OnchainConfig {
    /// Testnet RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Rewards contract address
    #[serde(default = "default_rewards_contract")]
    pub contract_address: String,
    /// Worker pool size
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Whether to wait for the transaction receipt
    #[serde(default = "default_true")]
    pub wait_for_receipt: bool,
    /// Receipt wait timeout in seconds
    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout_secs: u64,
    /// Sleep between claim cycles in seconds
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
}

fn default_rpc_url() -> String {
    "https://rpc.testnet.humanity.org".to_string()
}

fn default_rewards_contract() -> String {
    "0xa18f6FCB2Fd4884436d10610E69DB7BFa1bFe8C7".to_string()
}

fn default_workers() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_receipt_timeout() -> u64 {
    15
}

fn default_cycle_interval() -> u64 {
    6 * 60 * 60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("runner.concurrency", 3)?
            .set_default("database.max_connections", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("HUMANITY_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (HUMANITY_CAPTCHA__API_KEY, etc.)
            .add_source(
                Environment::with_prefix("HUMANITY")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.runner.concurrency == 0 {
            errors.push("runner.concurrency must be at least 1".to_string());
        }

        if self.runner.concurrency > crate::MAX_CONCURRENCY {
            errors.push(format!(
                "runner.concurrency must not exceed {}",
                crate::MAX_CONCURRENCY
            ));
        }

        if self.onchain.workers == 0 {
            errors.push("onchain.workers must be at least 1".to_string());
        }

        if self.onchain.wait_for_receipt
            && self.onchain.receipt_timeout_secs < crate::MIN_RECEIPT_TIMEOUT_SECS
        {
            errors.push(format!(
                "onchain.receipt_timeout_secs must be at least {}",
                crate::MIN_RECEIPT_TIMEOUT_SECS
            ));
        }

        if self.captcha.poll_interval_secs == 0 {
            errors.push("captcha.poll_interval_secs must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            portal: PortalConfig {
                base_url: default_portal_base(),
                identity_url: default_identity_base(),
                oauth_client_id: default_oauth_client_id(),
                redirect_uri: default_redirect_uri(),
                chain_id: default_chain_id(),
                timeout_secs: default_http_timeout(),
            },
            captcha: CaptchaConfig {
                api_key: "test-key".to_string(),
                base_url: default_captcha_base(),
                site_key: default_site_key(),
                page_url: default_portal_base(),
                action: default_captcha_action(),
                poll_interval_secs: default_poll_interval(),
            },
            runner: RunnerConfig {
                concurrency: 3,
                keys_file: default_keys_file(),
                data_dir: default_data_dir(),
            },
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
            },
            onchain: OnchainConfig {
                rpc_url: default_rpc_url(),
                contract_address: default_rewards_contract(),
                workers: 3,
                wait_for_receipt: true,
                receipt_timeout_secs: 15,
                cycle_interval_secs: default_cycle_interval(),
            },
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut cfg = base_config();
        cfg.runner.concurrency = 0;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("concurrency")));
    }

    #[test]
    fn short_receipt_timeout_is_rejected() {
        let mut cfg = base_config();
        cfg.onchain.receipt_timeout_secs = 2;
        let errors = cfg.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("receipt_timeout_secs")));
    }
}
