//! Wallet discovery stage.
//!
//! Every provider runs its own loop: log in, list wallets, upsert them, then
//! sleep until the listing goes stale. Login failures are logged and treated
//! as "no wallets this round". Once each provider has finished its first pass
//! the readiness gate opens for ingestion.

use chrono::{DateTime, Utc};
use futures_util::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::lifecycle::Readiness;
use crate::observability::metrics;
use crate::pipeline::PipelineError;
use crate::providers::{ProviderHost, WalletProvider};
use crate::resilience::RateLimiter;
use crate::storage::{Storage, Wallet};

/// One configured provider account.
#[derive(Clone)]
pub struct ProviderSlot {
    pub host: ProviderHost,
    pub email: String,
    pub password: String,
    pub refresh_period: Duration,
    pub client: Arc<dyn WalletProvider>,
}

impl std::fmt::Debug for ProviderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSlot")
            .field("host", &self.host)
            .field("email", &self.email)
            .field("refresh_period", &self.refresh_period)
            .finish_non_exhaustive()
    }
}

pub struct DiscoveryStage {
    providers: Vec<(ProviderSlot, Arc<RateLimiter>)>,
    storage: Storage,
    readiness: Readiness,
}

impl DiscoveryStage {
    pub fn new(
        providers: Vec<(ProviderSlot, Arc<RateLimiter>)>,
        storage: Storage,
        readiness: Readiness,
    ) -> Self {
        Self {
            providers,
            storage,
            readiness,
        }
    }

    /// Run every provider loop until one of them fails.
    pub async fn run(self) -> Result<(), PipelineError> {
        tracing::info!(providers = self.providers.len(), "Starting wallet discovery");
        if self.providers.is_empty() {
            tracing::warn!("No providers configured, discovery idle");
            self.readiness.arrive();
            std::future::pending::<()>().await;
        }

        let loops = self.providers.iter().map(|(slot, limiter)| {
            provider_loop(slot, limiter, &self.storage, &self.readiness)
        });
        try_join_all(loops).await?;
        Ok(())
    }
}

async fn provider_loop(
    slot: &ProviderSlot,
    limiter: &RateLimiter,
    storage: &Storage,
    readiness: &Readiness,
) -> Result<(), PipelineError> {
    let mut arrived = false;

    loop {
        let last = storage.last_refreshed_at(slot.host).await?;
        if is_stale(last, Utc::now(), slot.refresh_period) {
            refresh_provider(slot, limiter, storage).await?;
        } else {
            tracing::debug!(provider = %slot.host, "Wallet listing still fresh");
        }

        if !arrived {
            readiness.arrive();
            arrived = true;
        }

        let last = storage.last_refreshed_at(slot.host).await?;
        let pause = time_until_stale(last, Utc::now(), slot.refresh_period);
        tracing::debug!(provider = %slot.host, sleep = ?pause, "Discovery sleeping");
        tokio::time::sleep(pause).await;
    }
}

/// Log in to one provider and upsert every wallet it lists.
///
/// Returns the number of wallets stored. Provider failures yield zero and
/// listing entries without a name or address are skipped.
pub async fn refresh_provider(
    slot: &ProviderSlot,
    limiter: &RateLimiter,
    storage: &Storage,
) -> Result<usize, PipelineError> {
    limiter.acquire().await;

    let credentials = match slot.client.authenticate(&slot.email, &slot.password).await {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::warn!(provider = %slot.host, email = %slot.email, error = %e, "Login failed");
            return Ok(0);
        }
    };

    let listing = match slot.client.list_wallets(&credentials).await {
        Ok(listing) => listing,
        Err(e) => {
            tracing::warn!(provider = %slot.host, error = %e, "Wallet listing failed");
            return Ok(0);
        }
    };

    let refreshed_at = Utc::now();
    let mut count = 0;
    for (name, address) in listing {
        let (name, address) = (name.trim().to_string(), address.trim().to_string());
        if name.is_empty() || address.is_empty() {
            tracing::warn!(provider = %slot.host, name = %name, address = %address, "Skipping incomplete wallet entry");
            continue;
        }
        let wallet = Wallet {
            address,
            host: slot.host,
            name,
            refreshed_at,
        };
        tracing::debug!(provider = %slot.host, wallet = %wallet.address, name = %wallet.name, "Upserting wallet");
        storage.upsert_wallet(&wallet).await?;
        count += 1;
    }

    metrics::record_wallets_upserted(slot.host, count);
    tracing::info!(provider = %slot.host, count, "Wallets refreshed");
    Ok(count)
}

fn elapsed_since(last: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - last).to_std().unwrap_or(Duration::ZERO)
}

fn is_stale(last: Option<DateTime<Utc>>, now: DateTime<Utc>, period: Duration) -> bool {
    match last {
        Some(last) => elapsed_since(last, now) >= period,
        None => true,
    }
}

fn time_until_stale(last: Option<DateTime<Utc>>, now: DateTime<Utc>, period: Duration) -> Duration {
    match last {
        Some(last) => period.saturating_sub(elapsed_since(last, now)),
        None => period,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_staleness() {
        let period = Duration::from_secs(600);
        assert!(is_stale(None, at(1000), period));
        assert!(!is_stale(Some(at(1000)), at(1599), period));
        assert!(is_stale(Some(at(1000)), at(1600), period));
    }

    #[test]
    fn test_sleep_is_clamped() {
        let period = Duration::from_secs(600);
        assert_eq!(time_until_stale(None, at(0), period), period);
        assert_eq!(time_until_stale(Some(at(1000)), at(1100), period), Duration::from_secs(500));
        assert_eq!(time_until_stale(Some(at(1000)), at(5000), period), Duration::ZERO);
        // A refresh time in the future counts as just refreshed.
        assert_eq!(time_until_stale(Some(at(2000)), at(1000), period), period);
    }
}
