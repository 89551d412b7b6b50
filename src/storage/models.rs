//! Persisted records.

use chrono::{DateTime, Utc};

use crate::blockchain::types::TokenInfo;
use crate::providers::ProviderHost;

/// A deposit wallet discovered under a provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    pub address: String,
    pub host: ProviderHost,
    /// Payment method name shown by the provider.
    pub name: String,
    pub refreshed_at: DateTime<Utc>,
}

/// Result of an insert guarded by a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same key already existed; nothing was written.
    Duplicate,
}

/// A stored transaction joined with its wallet, token and amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetails {
    pub hash: String,
    pub wallet: Wallet,
    pub from_address: String,
    pub token: TokenInfo,
    /// Recipient and amount in the token's smallest unit.
    pub amounts: Vec<(String, u128)>,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}
