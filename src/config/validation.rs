//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (periods > 0, cache size > 0)
//! - Check credentials and URLs are present and well formed
//! - Detect duplicate provider entries and malformed provider headers
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TrackerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use reqwest::header::{HeaderName, HeaderValue};
use std::collections::HashSet;
use url::Url;

use crate::config::schema::TrackerConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &TrackerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.providers.is_empty() {
        errors.push(ValidationError::new("providers", "at least one provider is required"));
    }

    let mut seen = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        let field = format!("providers[{}]", i);
        if !seen.insert(provider.host) {
            errors.push(ValidationError::new(&field, format!("duplicate provider host {}", provider.host)));
        }
        if provider.email.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.email", field), "must not be empty"));
        }
        if provider.password.is_empty() {
            errors.push(ValidationError::new(format!("{}.password", field), "must not be empty"));
        }
        if provider.refresh_period_secs == Some(0) {
            errors.push(ValidationError::new(format!("{}.refresh_period_secs", field), "must be positive"));
        }
        if provider.poll_period_secs == Some(0) {
            errors.push(ValidationError::new(format!("{}.poll_period_secs", field), "must be positive"));
        }
        for (name, value) in &provider.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
                errors.push(ValidationError::new(format!("{}.headers", field), format!("invalid header '{}'", name)));
            }
        }
    }

    if config.discovery.refresh_period_secs == 0 {
        errors.push(ValidationError::new("discovery.refresh_period_secs", "must be positive"));
    }
    if config.ingestion.poll_period_secs == 0 {
        errors.push(ValidationError::new("ingestion.poll_period_secs", "must be positive"));
    }
    if config.ingestion.page_limit == 0 {
        errors.push(ValidationError::new("ingestion.page_limit", "must be positive"));
    }

    for (field, value) in [
        ("explorers.bitcoin_url", &config.explorers.bitcoin_url),
        ("explorers.tron_url", &config.explorers.tron_url),
        ("explorers.etherscan_url", &config.explorers.etherscan_url),
        ("explorers.ethereum_rpc_url", &config.explorers.ethereum_rpc_url),
        ("telegram.api_url", &config.telegram.api_url),
    ] {
        if let Err(e) = Url::parse(value) {
            errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e)));
        }
    }
    if config.explorers.token_cache_size == 0 {
        errors.push(ValidationError::new("explorers.token_cache_size", "must be positive"));
    }
    if config.explorers.timeout_secs == 0 {
        errors.push(ValidationError::new("explorers.timeout_secs", "must be positive"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new("retries.base_delay_ms", "must not exceed max_delay_ms"));
    }

    if config.telegram.bot_token.is_empty() {
        errors.push(ValidationError::new("telegram.bot_token", "must not be empty"));
    }
    if config.telegram.chat_id == 0 {
        errors.push(ValidationError::new("telegram.chat_id", "must be set"));
    }
    if config.telegram.delivery_period_ms == 0 {
        errors.push(ValidationError::new("telegram.delivery_period_ms", "must be positive"));
    }

    if config.storage.path.trim().is_empty() {
        errors.push(ValidationError::new("storage.path", "must not be empty"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ProviderConfig;
    use crate::providers::ProviderHost;

    fn valid_config() -> TrackerConfig {
        let mut config = TrackerConfig::default();
        config.providers.push(ProviderConfig {
            host: ProviderHost::Whitetrade,
            email: "user@example.com".to_string(),
            password: "secret".to_string(),
            refresh_period_secs: None,
            poll_period_secs: None,
            headers: Default::default(),
        });
        config.telegram.bot_token = "123:abc".to_string();
        config.telegram.chat_id = 42;
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_all_errors_are_reported() {
        let mut config = valid_config();
        config.telegram.bot_token.clear();
        config.ingestion.poll_period_secs = 0;
        config.explorers.tron_url = "not a url".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"telegram.bot_token"));
        assert!(fields.contains(&"ingestion.poll_period_secs"));
        assert!(fields.contains(&"explorers.tron_url"));
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let mut config = valid_config();
        let duplicate = config.providers[0].clone();
        config.providers.push(duplicate);

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("duplicate")));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let mut config = valid_config();
        config.providers[0].headers.insert("User-Agent".to_string(), "tracker/1.0".to_string());
        assert!(validate_config(&config).is_ok());

        config.providers[0].headers.insert("bad header".to_string(), "x".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "providers[0].headers");
    }

    #[test]
    fn test_no_providers_rejected() {
        let mut config = valid_config();
        config.providers.clear();
        assert!(validate_config(&config).is_err());
    }
}
