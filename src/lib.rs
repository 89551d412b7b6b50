//! Wallet tracker library.
//!
//! Discovers deposit wallets registered with Tradersroom providers, polls
//! their on-chain history and announces every new transaction in a Telegram
//! chat exactly once.

pub mod blockchain;
pub mod config;
pub mod lifecycle;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod providers;
pub mod resilience;
pub mod storage;

pub use config::TrackerConfig;
pub use lifecycle::Shutdown;
pub use pipeline::Pipeline;
