//! Wallet provider types and error definitions.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::resilience::retries::{is_retryable_status, Retryable};

/// Session obtained from a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub auth_token: String,
    pub user_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Wallet display name to address.
pub type WalletListing = BTreeMap<String, String>;

/// An account holder of deposit wallets.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Log in and obtain a session.
    async fn authenticate(&self, email: &str, password: &str) -> ProviderResult<Credentials>;

    /// List the deposit wallets visible to the session.
    async fn list_wallets(&self, credentials: &Credentials) -> ProviderResult<WalletListing>;
}

/// Errors that can occur while talking to a wallet provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Login was answered but no session was issued.
    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("unknown provider host '{0}'")]
    UnknownHost(String),

    #[error("invalid request header {0}")]
    InvalidHeader(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Http(e.to_string())
        }
    }
}

impl Retryable for ProviderError {
    fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(_) => true,
            ProviderError::Status { status, .. } => reqwest::StatusCode::from_u16(*status)
                .map(is_retryable_status)
                .unwrap_or(false),
            _ => false,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
