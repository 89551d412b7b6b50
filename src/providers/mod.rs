//! Wallet provider integration.
//!
//! Each configured host is a Tradersroom web office deployment. The tracker
//! logs in with the account's credentials and reads the deposit wallets listed
//! under the account's payment methods.

pub mod host;
pub mod tradersroom;
pub mod types;

pub use host::{HostAction, ProviderHost};
pub use tradersroom::TradersroomClient;
pub use types::{Credentials, ProviderError, ProviderResult, WalletListing, WalletProvider};
