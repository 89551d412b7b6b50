//! Shared fakes and fixtures for pipeline integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wallet_tracker::blockchain::types::{BlockchainError, BlockchainResult, ChainTag, RawTransaction, TokenInfo};
use wallet_tracker::blockchain::TransactionSource;
use wallet_tracker::notify::{NotificationSink, NotifyError, NotifyResult};
use wallet_tracker::providers::{
    Credentials, ProviderError, ProviderHost, ProviderResult, WalletListing, WalletProvider,
};
use wallet_tracker::storage::{Storage, Wallet};

pub const BTC_WALLET: &str = "1BoatSLRmtKNngkpXEieup2Xp4ZYcXJm6c";
pub const BTC_SENDER: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";
pub const TRON_WALLET: &str = "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7";

/// A migrated in-memory database.
pub fn storage() -> Storage {
    let storage = Storage::open_in_memory().unwrap();
    storage.migrate().unwrap();
    storage
}

pub async fn add_wallet(storage: &Storage, address: &str, host: ProviderHost) {
    storage
        .upsert_wallet(&Wallet {
            address: address.to_string(),
            host,
            name: "Deposit".to_string(),
            refreshed_at: Utc::now(),
        })
        .await
        .unwrap();
}

/// A native Bitcoin payment of `amount` satoshi to `to`.
pub fn btc_tx(hash: &str, to: &str, amount: u128, timestamp: i64) -> RawTransaction {
    RawTransaction {
        hash: hash.to_string(),
        from_address: BTC_SENDER.to_string(),
        token: TokenInfo::native(ChainTag::Bitcoin),
        amounts: vec![(to.to_string(), amount)],
        timestamp,
    }
}

/// Explorer fake serving whatever history was last set per address.
#[derive(Default)]
pub struct FakeSource {
    history: Mutex<HashMap<String, Vec<RawTransaction>>>,
    failing: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl FakeSource {
    pub fn set(&self, address: &str, transactions: Vec<RawTransaction>) {
        self.history
            .lock()
            .unwrap()
            .insert(address.to_string(), transactions);
    }

    pub fn push(&self, address: &str, transaction: RawTransaction) {
        self.history
            .lock()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push(transaction);
    }

    pub fn fail(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl TransactionSource for FakeSource {
    async fn fetch_transactions(&self, address: &str) -> BlockchainResult<Vec<RawTransaction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.failing.lock().unwrap() {
            return Err(BlockchainError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self
            .history
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_default())
    }
}

/// Chat fake that records every message it accepts.
///
/// The first `throttle_first` sends are answered with flood control.
pub struct FakeSink {
    pub sent: Mutex<Vec<(i64, String, String)>>,
    attempts: AtomicUsize,
    throttle_first: usize,
    retry_after: Duration,
    reject: bool,
}

impl FakeSink {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            throttle_first: 0,
            retry_after: Duration::ZERO,
            reject: false,
        }
    }

    pub fn throttling(times: usize, retry_after: Duration) -> Self {
        Self {
            throttle_first: times,
            retry_after,
            ..Self::new()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::new()
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for FakeSink {
    async fn send(&self, chat_id: i64, text: &str, link_url: &str) -> NotifyResult<i64> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.throttle_first {
            return Err(NotifyError::Throttled {
                retry_after: self.retry_after,
            });
        }
        if self.reject {
            return Err(NotifyError::Api("Bad Request: chat not found".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((chat_id, text.to_string(), link_url.to_string()));
        Ok(sent.len() as i64)
    }
}

/// Provider fake with a fixed listing.
pub struct FakeProvider {
    pub listing: WalletListing,
    pub reject_login: bool,
    pub logins: AtomicUsize,
}

impl FakeProvider {
    pub fn with_wallets(wallets: &[(&str, &str)]) -> Self {
        Self {
            listing: wallets
                .iter()
                .map(|(name, address)| (name.to_string(), address.to_string()))
                .collect(),
            reject_login: false,
            logins: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject_login: true,
            ..Self::with_wallets(&[])
        }
    }
}

#[async_trait]
impl WalletProvider for FakeProvider {
    async fn authenticate(&self, email: &str, _password: &str) -> ProviderResult<Credentials> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.reject_login {
            return Err(ProviderError::LoginRejected(format!("bad password for {}", email)));
        }
        Ok(Credentials {
            auth_token: "token".to_string(),
            user_id: Some("42".to_string()),
        })
    }

    async fn list_wallets(&self, credentials: &Credentials) -> ProviderResult<WalletListing> {
        assert_eq!(credentials.auth_token, "token");
        Ok(self.listing.clone())
    }
}

pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
