//! Chain explorer integration subsystem.
//!
//! # Data Flow
//! ```text
//! Wallet address
//!     → address.rs (classify into a chain, explorer links)
//!     → source.rs (pick the chain's TransactionSource)
//!     → bitcoin.rs / tron.rs / ethereum.rs (explorer APIs)
//!     → client.rs (shared HTTP client with timeouts and retries)
//! ```
//!
//! # Constraints
//! - Every explorer call has a timeout
//! - Amounts are integers in the token's smallest unit
//! - API keys never appear in logs

pub mod address;
pub mod bitcoin;
pub mod client;
pub mod ethereum;
pub mod source;
pub mod tron;
pub mod types;

pub use address::classify;
pub use client::ExplorerClient;
pub use source::{ChainSources, TransactionSource};
pub use types::{BlockchainError, BlockchainResult, ChainTag, RawTransaction, TokenInfo};
