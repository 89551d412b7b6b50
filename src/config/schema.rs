//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tracker.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::providers::ProviderHost;

/// Root configuration for the wallet tracker.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TrackerConfig {
    /// Wallet providers to discover addresses from.
    pub providers: Vec<ProviderConfig>,

    /// Wallet discovery settings.
    pub discovery: DiscoveryConfig,

    /// Transaction polling settings.
    pub ingestion: IngestionConfig,

    /// Chain explorer endpoints.
    pub explorers: ExplorerConfig,

    /// Retry configuration for outbound HTTP calls.
    pub retries: RetryConfig,

    /// Notification channel settings.
    pub telegram: TelegramConfig,

    /// Storage settings.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl TrackerConfig {
    /// How long a provider's wallet listing stays fresh.
    pub fn refresh_period(&self, provider: &ProviderConfig) -> Duration {
        Duration::from_secs(
            provider
                .refresh_period_secs
                .unwrap_or(self.discovery.refresh_period_secs),
        )
    }

    /// Minimum time between two polls of the same provider's wallets.
    pub fn poll_period(&self, provider: &ProviderConfig) -> Duration {
        Duration::from_secs(
            provider
                .poll_period_secs
                .unwrap_or(self.ingestion.poll_period_secs),
        )
    }

    /// Look up the configuration for a provider host.
    pub fn provider(&self, host: ProviderHost) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.host == host)
    }
}

/// Credentials and overrides for one wallet provider.
#[derive(Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider host.
    pub host: ProviderHost,

    /// Login email.
    pub email: String,

    /// Login password. Never logged.
    pub password: String,

    /// Override for `discovery.refresh_period_secs`.
    #[serde(default)]
    pub refresh_period_secs: Option<u64>,

    /// Override for `ingestion.poll_period_secs`.
    #[serde(default)]
    pub poll_period_secs: Option<u64>,

    /// Extra headers sent with every login and listing request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("host", &self.host)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("refresh_period_secs", &self.refresh_period_secs)
            .field("poll_period_secs", &self.poll_period_secs)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Wallet discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Period between wallet listings of the same provider, in seconds.
    pub refresh_period_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            refresh_period_secs: 600,
        }
    }
}

/// Transaction ingestion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Period between sweeps, in seconds.
    pub poll_period_secs: u64,

    /// Maximum transactions requested per wallet per sweep.
    pub page_limit: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            poll_period_secs: 60,
            page_limit: 200,
        }
    }
}

/// Chain explorer endpoints.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// blockchain.info compatible API base URL.
    pub bitcoin_url: String,

    /// TronGrid API base URL.
    pub tron_url: String,

    /// Etherscan compatible API URL.
    pub etherscan_url: String,

    /// Etherscan API key. Never logged.
    pub etherscan_api_key: String,

    /// Ethereum JSON-RPC endpoint used to resolve token metadata.
    pub ethereum_rpc_url: String,

    /// Number of ERC-20 token descriptions kept in memory.
    pub token_cache_size: usize,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            bitcoin_url: "https://blockchain.info".to_string(),
            tron_url: "https://api.trongrid.io".to_string(),
            etherscan_url: "https://api.etherscan.io/api".to_string(),
            etherscan_api_key: String::new(),
            ethereum_rpc_url: "https://eth.llamarpc.com".to_string(),
            token_cache_size: 1024,
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for ExplorerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorerConfig")
            .field("bitcoin_url", &self.bitcoin_url)
            .field("tron_url", &self.tron_url)
            .field("etherscan_url", &self.etherscan_url)
            .field("ethereum_rpc_url", &self.ethereum_rpc_url)
            .field("token_cache_size", &self.token_cache_size)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per call (including the first).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// Telegram notification configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token. Never logged.
    pub bot_token: String,

    /// Chat that receives transaction messages.
    pub chat_id: i64,

    /// Bot API base URL.
    pub api_url: String,

    /// Minimum time between two messages in milliseconds.
    pub delivery_period_ms: u64,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: 0,
            api_url: "https://api.telegram.org".to_string(),
            delivery_period_ms: 1000,
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_url", &self.api_url)
            .field("delivery_period_ms", &self.delivery_period_ms)
            .finish()
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "wallet-tracker.db".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: TrackerConfig = toml::from_str(
            r#"
            [[providers]]
            host = "whitetrade.net"
            email = "user@example.com"
            password = "secret"

            [telegram]
            bot_token = "123:abc"
            chat_id = -100200300
            "#,
        )
        .unwrap();

        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].host, ProviderHost::Whitetrade);
        assert_eq!(config.ingestion.poll_period_secs, 60);
        assert_eq!(config.telegram.delivery_period_ms, 1000);
        assert_eq!(config.refresh_period(&config.providers[0]), Duration::from_secs(600));
    }

    #[test]
    fn test_provider_overrides() {
        let config: TrackerConfig = toml::from_str(
            r#"
            [discovery]
            refresh_period_secs = 900

            [[providers]]
            host = "fianit.net"
            email = "a@b.c"
            password = "x"
            refresh_period_secs = 120
            poll_period_secs = 300
            headers = { "User-Agent" = "Mozilla/5.0" }

            [[providers]]
            host = "benefort.org"
            email = "a@b.c"
            password = "y"
            "#,
        )
        .unwrap();

        let fianit = config.provider(ProviderHost::Fianit).unwrap();
        let benefort = config.provider(ProviderHost::Benefort).unwrap();
        assert_eq!(config.refresh_period(fianit), Duration::from_secs(120));
        assert_eq!(config.poll_period(fianit), Duration::from_secs(300));
        assert_eq!(config.refresh_period(benefort), Duration::from_secs(900));
        assert_eq!(config.poll_period(benefort), Duration::from_secs(60));
        assert_eq!(fianit.headers.get("User-Agent").map(String::as_str), Some("Mozilla/5.0"));
        assert!(benefort.headers.is_empty());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = TrackerConfig::default();
        config.telegram.bot_token = "123:super-secret".to_string();
        config.providers.push(ProviderConfig {
            host: ProviderHost::Whitetrade,
            email: "user@example.com".to_string(),
            password: "hunter2".to_string(),
            refresh_period_secs: None,
            poll_period_secs: None,
            headers: [("Cookie".to_string(), "session=topsecret".to_string())].into(),
        });

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("user@example.com"));
    }
}
