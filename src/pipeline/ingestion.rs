//! Transaction ingestion stage.
//!
//! # Responsibilities
//! - Wait for the first complete wallet discovery
//! - Sweep every stored wallet once per poll period
//! - Validate and normalize explorer data before it reaches storage
//! - Forward hashes of newly stored transactions to the notifier
//!
//! A wallet's first sweep only backfills history. Hashes are forwarded only
//! when the wallet already had stored transactions before the sweep, so a new
//! wallet never floods the chat with its past.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::blockchain::address::classify;
use crate::blockchain::types::RawTransaction;
use crate::blockchain::ChainSources;
use crate::lifecycle::Readiness;
use crate::observability::metrics;
use crate::pipeline::PipelineError;
use crate::providers::ProviderHost;
use crate::resilience::RateLimiter;
use crate::storage::{InsertOutcome, Storage, Wallet};

const MAX_DECIMALS: u8 = 18;

/// Sweeps start a little late; a wallet polled one period ago is still due.
const POLL_SLACK: Duration = Duration::from_millis(500);

pub struct IngestionStage {
    storage: Storage,
    sources: ChainSources,
    readiness: Readiness,
    limiter: Arc<RateLimiter>,
    poll_periods: HashMap<ProviderHost, Duration>,
    default_poll_period: Duration,
    last_polled: HashMap<String, Instant>,
    tx: mpsc::UnboundedSender<String>,
}

impl IngestionStage {
    pub fn new(
        storage: Storage,
        sources: ChainSources,
        readiness: Readiness,
        limiter: Arc<RateLimiter>,
        poll_periods: HashMap<ProviderHost, Duration>,
        default_poll_period: Duration,
        tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            storage,
            sources,
            readiness,
            limiter,
            poll_periods,
            default_poll_period,
            last_polled: HashMap::new(),
            tx,
        }
    }

    pub async fn run(mut self) -> Result<(), PipelineError> {
        tracing::info!("Ingestion waiting for wallet discovery");
        self.readiness.wait().await;
        tracing::info!("Starting transaction ingestion");

        loop {
            self.limiter.acquire().await;
            let forwarded = self.sweep().await?;
            tracing::debug!(forwarded, "Sweep finished");
        }
    }

    /// Poll every wallet that is due. Returns the number of forwarded hashes.
    pub async fn sweep(&mut self) -> Result<usize, PipelineError> {
        let started = Instant::now();
        let wallets = self.storage.list_wallets().await?;
        let mut forwarded = 0;

        for wallet in wallets {
            if !self.is_due(&wallet, started) {
                continue;
            }
            self.last_polled.insert(wallet.address.clone(), started);
            forwarded += self.ingest_wallet(&wallet).await?;
        }

        Ok(forwarded)
    }

    fn is_due(&self, wallet: &Wallet, now: Instant) -> bool {
        let period = self
            .poll_periods
            .get(&wallet.host)
            .copied()
            .unwrap_or(self.default_poll_period);
        match self.last_polled.get(&wallet.address) {
            Some(last) => now.duration_since(*last) + POLL_SLACK >= period,
            None => true,
        }
    }

    async fn ingest_wallet(&self, wallet: &Wallet) -> Result<usize, PipelineError> {
        let Some(chain) = classify(&wallet.address) else {
            tracing::warn!(wallet = %wallet.address, provider = %wallet.host, "Unrecognized wallet address, skipping");
            return Ok(0);
        };
        let Some(source) = self.sources.get(chain) else {
            tracing::warn!(wallet = %wallet.address, chain = %chain, "No explorer configured for chain");
            return Ok(0);
        };

        let raw = match source.fetch_transactions(&wallet.address).await {
            Ok(raw) => raw,
            Err(e) => {
                metrics::record_fetch_failure(chain);
                tracing::warn!(wallet = %wallet.address, chain = %chain, error = %e, "Fetching transactions failed");
                return Ok(0);
            }
        };

        let transactions = normalize(raw);
        if transactions.is_empty() {
            return Ok(0);
        }

        // Read before inserting: an empty history means this batch is backfill.
        let marker = self
            .storage
            .latest_transaction_timestamp(&wallet.address)
            .await?;
        let outcomes = self
            .storage
            .insert_transactions(&wallet.address, transactions)
            .await?;

        let mut forwarded = 0;
        for (hash, outcome) in outcomes {
            match outcome {
                InsertOutcome::Inserted => {
                    metrics::record_transaction_inserted();
                    if marker.is_some() {
                        tracing::info!(wallet = %wallet.address, hash = %hash, "New transaction");
                        self.tx
                            .send(hash)
                            .map_err(|_| PipelineError::ChannelClosed("transaction hashes"))?;
                        forwarded += 1;
                    } else {
                        tracing::debug!(wallet = %wallet.address, hash = %hash, "Backfilled transaction");
                    }
                }
                InsertOutcome::Duplicate => metrics::record_transaction_duplicate(),
            }
        }

        Ok(forwarded)
    }
}

/// Validate explorer output and shape it for storage.
///
/// Invalid transactions are dropped with a warning, repeated recipients are
/// merged, repeated hashes keep their first occurrence, and the result is
/// ordered oldest first.
pub fn normalize(raw: Vec<RawTransaction>) -> Vec<RawTransaction> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for mut tx in raw {
        if let Err(reason) = validate(&tx) {
            tracing::warn!(hash = %tx.hash, reason, "Skipping invalid transaction");
            continue;
        }
        match merge_amounts(std::mem::take(&mut tx.amounts)) {
            Some(amounts) if !amounts.is_empty() => tx.amounts = amounts,
            Some(_) => {
                tracing::debug!(hash = %tx.hash, "Skipping transaction without recipients");
                continue;
            }
            None => {
                tracing::warn!(hash = %tx.hash, "Skipping transaction with overflowing amount");
                continue;
            }
        }
        if !seen.insert(tx.hash.clone()) {
            continue;
        }
        out.push(tx);
    }

    out.sort_by_key(|tx| tx.timestamp);
    out
}

fn validate(tx: &RawTransaction) -> Result<(), &'static str> {
    if tx.hash.is_empty() {
        return Err("empty hash");
    }
    if tx.from_address.is_empty() {
        return Err("empty sender");
    }
    if tx.token.address.is_empty() || tx.token.symbol.is_empty() {
        return Err("incomplete token");
    }
    if tx.token.decimals > MAX_DECIMALS {
        return Err("token decimals out of range");
    }
    Ok(())
}

/// Sum amounts per recipient, keeping first-seen order. `None` on overflow.
fn merge_amounts(amounts: Vec<(String, u128)>) -> Option<Vec<(String, u128)>> {
    let mut merged: Vec<(String, u128)> = Vec::with_capacity(amounts.len());
    for (to, amount) in amounts {
        if to.is_empty() {
            continue;
        }
        match merged.iter_mut().find(|(existing, _)| *existing == to) {
            Some((_, total)) => *total = total.checked_add(amount)?,
            None => merged.push((to, amount)),
        }
    }
    Some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::{ChainTag, TokenInfo};

    fn tx(hash: &str, timestamp: i64, amounts: Vec<(&str, u128)>) -> RawTransaction {
        RawTransaction {
            hash: hash.to_string(),
            from_address: "sender".to_string(),
            token: TokenInfo::native(ChainTag::Bitcoin),
            amounts: amounts.into_iter().map(|(a, v)| (a.to_string(), v)).collect(),
            timestamp,
        }
    }

    #[test]
    fn test_normalize_sorts_oldest_first() {
        let out = normalize(vec![tx("c", 30, vec![("x", 1)]), tx("a", 10, vec![("x", 1)]), tx("b", 20, vec![("x", 1)])]);
        let hashes: Vec<_> = out.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, ["a", "b", "c"]);
    }

    #[test]
    fn test_normalize_merges_recipients() {
        let out = normalize(vec![tx("a", 1, vec![("x", 5), ("y", 1), ("x", 7), ("", 9)])]);
        assert_eq!(out[0].amounts, vec![("x".to_string(), 12), ("y".to_string(), 1)]);
    }

    #[test]
    fn test_normalize_drops_invalid() {
        let mut bad_decimals = tx("d", 1, vec![("x", 1)]);
        bad_decimals.token.decimals = 19;
        let overflow = tx("o", 1, vec![("x", u128::MAX), ("x", 1)]);
        let out = normalize(vec![
            tx("", 1, vec![("x", 1)]),
            bad_decimals,
            overflow,
            tx("empty", 1, vec![]),
            tx("ok", 1, vec![("x", 1)]),
            tx("ok", 2, vec![("x", 1)]),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].hash, "ok");
        assert_eq!(out[0].timestamp, 1);
    }
}
