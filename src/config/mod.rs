//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → command line / environment overrides (main.rs)
//!     → validation.rs (semantic checks)
//!     → TrackerConfig (validated, immutable)
//!     → handed to each pipeline stage at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets are redacted from Debug output

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::TrackerConfig;
pub use schema::{
    DiscoveryConfig, ExplorerConfig, IngestionConfig, ObservabilityConfig, ProviderConfig,
    RetryConfig, StorageConfig, TelegramConfig,
};
