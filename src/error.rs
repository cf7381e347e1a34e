use thiserror::Error;

/// Main error type for the claim bot
#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Captcha error: {0}")]
    Captcha(String),

    #[error("Token decode error: {0}")]
    TokenDecode(String),

    // Claim errors
    #[error("Claim error: {0}")]
    Claim(String),

    // Crypto/signing errors
    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Signature error: {0}")]
    Signature(String),

    // On-chain errors
    #[error("Chain error: {0}")]
    Chain(String),

    #[error("Address parsing error: {0}")]
    AddressParsing(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for BotError
pub type Result<T> = std::result::Result<T, BotError>;

impl BotError {
    /// Whether this error is a transient transport failure worth retrying.
    ///
    /// Only network timeouts and connection failures qualify. Malformed
    /// responses, auth failures and store errors are terminal for the attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            BotError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_network_errors_are_not_retryable() {
        assert!(!BotError::Claim("bad json".into()).is_retryable());
        assert!(!BotError::Auth("no token".into()).is_retryable());
        assert!(!BotError::TokenDecode("garbage".into()).is_retryable());
        assert!(!BotError::Cancelled.is_retryable());
    }
}
