pub mod capsolver;
pub mod portal;
pub mod store;

pub use capsolver::CaptchaSolver;
pub use portal::{AuthorizeProbe, ConnectPayload, DailyCheck, DailyClaim, PortalClient};
pub use store::AccountStore;
