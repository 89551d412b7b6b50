//! Per-chain transaction sources.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::blockchain::types::{BlockchainResult, ChainTag, RawTransaction};

/// A chain explorer that can list a wallet's recent transactions.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Fetch the most recent page of transactions touching `address`.
    async fn fetch_transactions(&self, address: &str) -> BlockchainResult<Vec<RawTransaction>>;
}

/// Transaction sources keyed by chain.
#[derive(Clone, Default)]
pub struct ChainSources {
    sources: HashMap<ChainTag, Arc<dyn TransactionSource>>,
}

impl ChainSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the source for `chain`, replacing any previous one.
    pub fn with(mut self, chain: ChainTag, source: Arc<dyn TransactionSource>) -> Self {
        self.sources.insert(chain, source);
        self
    }

    pub fn get(&self, chain: ChainTag) -> Option<&Arc<dyn TransactionSource>> {
        self.sources.get(&chain)
    }
}

impl std::fmt::Debug for ChainSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainSources")
            .field("chains", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}
