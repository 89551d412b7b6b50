//! Chain-specific types and error definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::resilience::retries::{is_retryable_status, Retryable};

/// Chains the tracker knows how to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainTag {
    Bitcoin,
    Tron,
    Ethereum,
}

impl ChainTag {
    /// Name stored alongside tokens and shown in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainTag::Bitcoin => "Bitcoin",
            ChainTag::Tron => "Tron",
            ChainTag::Ethereum => "Ethereum",
        }
    }
}

impl std::fmt::Display for ChainTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainTag {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bitcoin" => Ok(ChainTag::Bitcoin),
            "Tron" => Ok(ChainTag::Tron),
            "Ethereum" => Ok(ChainTag::Ethereum),
            other => Err(BlockchainError::UnknownChain(other.to_string())),
        }
    }
}

/// Identity of the asset a transaction moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Contract address, or a pseudo-address for the chain's native coin.
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub chain: ChainTag,
    /// Number of decimal places in the smallest unit (0..=18).
    pub decimals: u8,
}

impl TokenInfo {
    /// The native coin of `chain`.
    pub fn native(chain: ChainTag) -> Self {
        let (address, symbol, name, decimals) = match chain {
            ChainTag::Bitcoin => ("bitcoin", "BTC", "Bitcoin", 8),
            ChainTag::Tron => ("tron", "TRX", "Tronix", 6),
            ChainTag::Ethereum => ("ethereum", "ETH", "Ether", 18),
        };
        Self {
            address: address.to_string(),
            symbol: symbol.to_string(),
            name: name.to_string(),
            chain,
            decimals,
        }
    }
}

/// A transaction as reported by a chain explorer, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub hash: String,
    /// Sending address.
    pub from_address: String,
    pub token: TokenInfo,
    /// Recipient and amount in the token's smallest unit.
    pub amounts: Vec<(String, u128)>,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

/// Errors that can occur while talking to chain explorers.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Explorer answered with a non-success status.
    #[error("explorer returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Explorer response did not have the expected shape.
    #[error("malformed explorer response: {0}")]
    Decode(String),

    /// JSON-RPC call failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Explorer reported an API-level error.
    #[error("explorer API error: {0}")]
    Api(String),

    /// Stored chain name is not one we know.
    #[error("unknown chain '{0}'")]
    UnknownChain(String),
}

impl From<reqwest::Error> for BlockchainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BlockchainError::Decode(e.to_string())
        } else {
            BlockchainError::Http(e.to_string())
        }
    }
}

impl Retryable for BlockchainError {
    fn is_transient(&self) -> bool {
        match self {
            BlockchainError::Http(_) => true,
            BlockchainError::Status { status, .. } => reqwest::StatusCode::from_u16(*status)
                .map(is_retryable_status)
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;
