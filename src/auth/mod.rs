pub mod jwt;
pub mod session;
pub mod siwe;

pub use jwt::{decode_claims, is_fresh, TokenClaims};
pub use session::{CodeStrategy, SessionEstablisher, SessionTokens};
pub use siwe::SiweChallenge;
