use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use zeroize::Zeroize;

use crate::error::{BotError, Result};

/// Wallet for signing the sign-in challenge and on-chain claim transactions.
///
/// # Security
/// The private key hex passes through construction only; the intermediate
/// buffer is zeroized so memory dumps cannot recover it from this type.
#[derive(Clone)]
pub struct Wallet {
    inner: PrivateKeySigner,
}

impl Wallet {
    /// Create a wallet from a private key hex string (0x prefix optional)
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let mut secure_key = private_key.trim().trim_start_matches("0x").to_string();

        let result = secure_key
            .parse::<PrivateKeySigner>()
            .map_err(|e| BotError::Wallet(format!("Invalid private key: {}", e)));

        secure_key.zeroize();

        Ok(Self { inner: result? })
    }

    /// Checksummed wallet address
    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Checksummed wallet address as a string (storage key)
    pub fn address_string(&self) -> String {
        self.inner.address().to_string()
    }

    /// Sign a message with the standard personal-message scheme
    /// (EIP-191 prefix + keccak + ECDSA), returning a 0x-prefixed hex signature
    pub async fn sign_message(&self, message: &str) -> Result<String> {
        let signature = self
            .inner
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| BotError::Signature(format!("Failed to sign message: {}", e)))?;

        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }

    /// The underlying signer, for building an on-chain provider wallet
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.inner
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known hardhat test key, never funded
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn address_is_derived_from_key() {
        let wallet = Wallet::from_private_key(TEST_KEY).unwrap();
        assert_eq!(
            wallet.address_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn prefix_is_optional() {
        let with = Wallet::from_private_key(TEST_KEY).unwrap();
        let without = Wallet::from_private_key(TEST_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(with.address(), without.address());
    }

    #[test]
    fn garbage_key_is_rejected() {
        assert!(Wallet::from_private_key("0xnothex").is_err());
    }

    #[tokio::test]
    async fn signature_is_65_byte_hex() {
        let wallet = Wallet::from_private_key(TEST_KEY).unwrap();
        let sig = wallet.sign_message("hello").await.unwrap();
        assert!(sig.starts_with("0x"));
        assert_eq!(sig.len(), 2 + 65 * 2);
    }
}
