//! HTTP client for the Tradersroom web office API shared by all provider hosts.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::blockchain::client::{truncate, ERROR_BODY_LIMIT};
use crate::providers::host::{HostAction, ProviderHost};
use crate::providers::types::{
    Credentials, ProviderError, ProviderResult, WalletListing, WalletProvider,
};
use crate::resilience::backoff::Backoff;
use crate::resilience::retries::with_retries;

static STRONG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<strong>(.+?)</strong>").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

#[derive(Debug, Deserialize)]
struct LoginResponse {
    values: Option<LoginValues>,
}

#[derive(Debug, Deserialize)]
struct LoginValues {
    auth_token: Option<String>,
    user_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    values: Vec<PaymentGroup>,
}

#[derive(Debug, Deserialize)]
struct PaymentGroup {
    #[serde(default)]
    method: Vec<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
struct PaymentMethod {
    name: String,
    #[serde(default)]
    merchant_description: String,
}

/// Client for one provider host.
#[derive(Clone)]
pub struct TradersroomClient {
    http: Client,
    host: ProviderHost,
    base_url: String,
    backoff: Backoff,
}

impl TradersroomClient {
    pub fn new(host: ProviderHost, timeout: Duration, backoff: Backoff) -> ProviderResult<Self> {
        Self::new_with_headers(host, timeout, backoff, &BTreeMap::new())
    }

    /// Like [`TradersroomClient::new`], sending `headers` on every request.
    pub fn new_with_headers(
        host: ProviderHost,
        timeout: Duration,
        backoff: Backoff,
        headers: &BTreeMap<String, String>,
    ) -> ProviderResult<Self> {
        let mut defaults = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProviderError::InvalidHeader(format!("{}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProviderError::InvalidHeader(format!("{}: {}", name, e)))?;
            defaults.insert(name, value);
        }

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(defaults)
            .build()
            .map_err(|e| ProviderError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            host,
            base_url: host.base_url(),
            backoff,
        })
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn host(&self) -> ProviderHost {
        self.host
    }

    async fn check(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Status {
            status: status.as_u16(),
            body: truncate(body, ERROR_BODY_LIMIT),
        })
    }
}

#[async_trait]
impl WalletProvider for TradersroomClient {
    async fn authenticate(&self, email: &str, password: &str) -> ProviderResult<Credentials> {
        tracing::debug!(provider = %self.host, email = %email, "Logging in");

        let url = format!("{}/api/v_2/page/Login", self.base_url);
        let form = [
            ("savePassword", "true"),
            ("user_email", email),
            ("password", password),
            ("key", self.host.key(HostAction::Login)),
            ("rand_param", self.host.rand_param(HostAction::Login)),
            ("languages", "en"),
        ];

        let (url, form) = (&url, &form);
        let response: LoginResponse = with_retries(&self.backoff, url, move || async move {
            let response = self
                .http
                .post(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .form(form)
                .send()
                .await?;
            Ok::<_, ProviderError>(Self::check(response).await?.json::<LoginResponse>().await?)
        })
        .await?;

        let values = response
            .values
            .ok_or_else(|| ProviderError::LoginRejected(format!("no session for {}", email)))?;
        let auth_token = values
            .auth_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ProviderError::LoginRejected(format!("no auth token for {}", email)))?;
        let user_id = values.user_id.and_then(|id| match id {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        tracing::info!(provider = %self.host, email = %email, "Logged in");
        Ok(Credentials { auth_token, user_id })
    }

    async fn list_wallets(&self, credentials: &Credentials) -> ProviderResult<WalletListing> {
        let url = format!(
            "{}/api/v_2/payments/GetPaymentSystemsUnitedByGroups",
            self.base_url
        );
        let mut query = vec![
            ("auth_token", credentials.auth_token.as_str()),
            ("key", self.host.key(HostAction::FetchWallets)),
            ("languages", "en"),
            ("rand_param", self.host.rand_param(HostAction::FetchWallets)),
            ("type", "in"),
        ];
        if let Some(user_id) = credentials.user_id.as_deref() {
            query.push(("user_id", user_id));
        }

        let (url, query) = (&url, &query);
        let response: ListingResponse = with_retries(&self.backoff, url, move || async move {
            let response = self
                .http
                .get(url)
                .header(reqwest::header::ACCEPT, "application/json")
                .query(query)
                .send()
                .await?;
            Ok::<_, ProviderError>(Self::check(response).await?.json::<ListingResponse>().await?)
        })
        .await?;

        let group = response
            .values
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no payment groups".to_string()))?;

        let mut wallets = WalletListing::new();
        for method in group.method {
            match extract_address(&method.merchant_description) {
                Some(address) => {
                    wallets.insert(method.name, address);
                }
                None => {
                    tracing::debug!(provider = %self.host, method = %method.name, "No address in payment method");
                }
            }
        }

        tracing::info!(provider = %self.host, count = wallets.len(), "Listed wallets");
        Ok(wallets)
    }
}

impl std::fmt::Debug for TradersroomClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradersroomClient")
            .field("host", &self.host)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Pull the wallet address out of a payment method description.
fn extract_address(description: &str) -> Option<String> {
    let inner = STRONG.captures(description)?.get(1)?.as_str();
    let address = TAG.replace_all(inner, "").trim().to_string();
    (!address.is_empty()).then_some(address)
}
