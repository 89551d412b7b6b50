//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tracker_transactions_inserted_total` (counter): newly stored transactions
//! - `tracker_transactions_duplicate_total` (counter): already-known hashes seen again
//! - `tracker_fetch_failures_total` (counter): explorer failures by chain
//! - `tracker_notifications_sent_total` (counter): delivered messages
//! - `tracker_notifications_throttled_total` (counter): flood-control responses
//! - `tracker_wallets_upserted_total` (counter): wallet upserts by provider

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::blockchain::types::ChainTag;
use crate::providers::ProviderHost;

/// Install the Prometheus recorder and its HTTP scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_transaction_inserted() {
    metrics::counter!("tracker_transactions_inserted_total").increment(1);
}

pub fn record_transaction_duplicate() {
    metrics::counter!("tracker_transactions_duplicate_total").increment(1);
}

pub fn record_fetch_failure(chain: ChainTag) {
    metrics::counter!("tracker_fetch_failures_total", "chain" => chain.as_str()).increment(1);
}

pub fn record_notification_sent() {
    metrics::counter!("tracker_notifications_sent_total").increment(1);
}

pub fn record_notification_throttled() {
    metrics::counter!("tracker_notifications_throttled_total").increment(1);
}

pub fn record_wallets_upserted(host: ProviderHost, count: usize) {
    metrics::counter!("tracker_wallets_upserted_total", "provider" => host.as_str())
        .increment(count as u64);
}
