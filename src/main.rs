//! Wallet tracker
//!
//! Watches provider deposit wallets and posts new transactions to Telegram.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌───────────┐   wallets   ┌───────────┐  new hashes  ┌──────────────┐
//!   │ discovery │────────────▶│ ingestion │─────────────▶│ notification │──▶ Telegram
//!   └─────┬─────┘  readiness  └─────┬─────┘    (mpsc)    └──────┬───────┘
//!         │                         │                           │
//!    providers                 explorers                        │
//!   (Tradersroom)        (BTC / TRON / ETH)                     │
//!         │                         │                           │
//!         └────────────────┬────────┴───────────────────────────┘
//!                          ▼
//!                   SQLite (storage)
//! ```

use anyhow::Context;
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use wallet_tracker::blockchain::bitcoin::BitcoinExplorer;
use wallet_tracker::blockchain::ethereum::{EthereumExplorer, RpcTokenMetadata};
use wallet_tracker::blockchain::tron::TronExplorer;
use wallet_tracker::blockchain::{ChainSources, ChainTag, ExplorerClient};
use wallet_tracker::config::loader::read_config;
use wallet_tracker::config::validation::validate_config;
use wallet_tracker::config::{ConfigError, TrackerConfig};
use wallet_tracker::lifecycle::signals::shutdown_signal;
use wallet_tracker::lifecycle::Shutdown;
use wallet_tracker::notify::TelegramNotifier;
use wallet_tracker::observability::{logging, metrics};
use wallet_tracker::pipeline::{Pipeline, PipelineSettings, ProviderSlot, RateLimiters};
use wallet_tracker::providers::TradersroomClient;
use wallet_tracker::resilience::Backoff;
use wallet_tracker::storage::Storage;

#[derive(Parser, Debug)]
#[command(name = "wallet-tracker")]
#[command(about = "Announce new deposit wallet transactions in a Telegram chat", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "TRACKER_CONFIG", default_value = "wallet-tracker.toml")]
    config: PathBuf,

    /// SQLite database path.
    #[arg(long = "database-url", env = "TRACKER_DATABASE")]
    database: Option<String>,

    /// Telegram bot token.
    #[arg(long, env = "TRACKER_BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// Chat that receives transaction messages.
    #[arg(long, env = "TRACKER_CHAT_ID", allow_negative_numbers = true)]
    chat_id: Option<i64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TRACKER_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut TrackerConfig) {
        if let Some(path) = &self.database {
            config.storage.path = path.clone();
        }
        if let Some(token) = &self.bot_token {
            config.telegram.bot_token = token.clone();
        }
        if let Some(chat_id) = self.chat_id {
            config.telegram.chat_id = chat_id;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = read_config(&cli.config)
        .with_context(|| format!("Failed to read {}", cli.config.display()))?;
    cli.apply(&mut config);

    logging::init_logging(&config.observability.log_level);
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!(
        providers = config.providers.len(),
        storage = %config.storage.path,
        chat_id = config.telegram.chat_id,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .context("Invalid metrics address")?;
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
    }

    let storage = Storage::open(&config.storage.path)
        .with_context(|| format!("Failed to open database {}", config.storage.path))?;
    storage.migrate().context("Database migration failed")?;

    let pipeline = build_pipeline(&config, storage)?;

    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.trigger();
        });
    }

    tracing::info!("wallet-tracker started");
    pipeline.run(shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_pipeline(config: &TrackerConfig, storage: Storage) -> anyhow::Result<Pipeline> {
    let backoff = Backoff::from(&config.retries);
    let timeout = Duration::from_secs(config.explorers.timeout_secs);
    let explorers = &config.explorers;
    let page_limit = config.ingestion.page_limit;

    let client = ExplorerClient::new(timeout, backoff)?;
    let metadata = Arc::new(RpcTokenMetadata::new(
        &explorers.ethereum_rpc_url,
        explorers.token_cache_size,
        timeout,
    )?);
    let sources = ChainSources::new()
        .with(
            ChainTag::Bitcoin,
            Arc::new(BitcoinExplorer::new(client.clone(), &explorers.bitcoin_url, page_limit)),
        )
        .with(
            ChainTag::Tron,
            Arc::new(TronExplorer::new(client.clone(), &explorers.tron_url, page_limit)),
        )
        .with(
            ChainTag::Ethereum,
            Arc::new(EthereumExplorer::new(
                client,
                &explorers.etherscan_url,
                &explorers.etherscan_api_key,
                page_limit,
                metadata,
            )),
        );

    let mut providers = Vec::with_capacity(config.providers.len());
    let mut poll_periods = HashMap::new();
    for provider in &config.providers {
        let client =
            TradersroomClient::new_with_headers(provider.host, timeout, backoff, &provider.headers)?;
        providers.push(ProviderSlot {
            host: provider.host,
            email: provider.email.clone(),
            password: provider.password.clone(),
            refresh_period: config.refresh_period(provider),
            client: Arc::new(client),
        });
        poll_periods.insert(provider.host, config.poll_period(provider));
    }

    let sink = Arc::new(TelegramNotifier::new(
        &config.telegram.api_url,
        &config.telegram.bot_token,
        Duration::from_secs(config.telegram.timeout_secs),
    )?);

    let settings = PipelineSettings {
        chat_id: config.telegram.chat_id,
        default_poll_period: Duration::from_secs(config.ingestion.poll_period_secs),
        poll_periods,
    };

    Ok(Pipeline::new(
        storage,
        providers,
        sources,
        sink,
        RateLimiters::from_config(config),
        settings,
    ))
}
