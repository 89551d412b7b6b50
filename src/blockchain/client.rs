//! Explorer HTTP client with timeout and retry handling.
//!
//! # Responsibilities
//! - Own the shared `reqwest::Client` used by every chain fetcher
//! - Enforce the configured request timeout
//! - Retry transient failures with backoff
//! - Turn non-success statuses into typed errors

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::blockchain::types::{BlockchainError, BlockchainResult};
use crate::resilience::backoff::Backoff;
use crate::resilience::retries::with_retries;

/// Maximum number of response body bytes echoed into error messages.
pub(crate) const ERROR_BODY_LIMIT: usize = 512;

/// HTTP client shared by the chain explorers.
#[derive(Clone)]
pub struct ExplorerClient {
    http: Client,
    backoff: Backoff,
    timeout: Duration,
}

impl ExplorerClient {
    /// Create a new explorer client.
    pub fn new(timeout: Duration, backoff: Backoff) -> BlockchainResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BlockchainError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            backoff,
            timeout,
        })
    }

    /// GET `url` with `query` and decode the JSON body.
    pub async fn get_json<T>(&self, url: &str, query: &[(&str, String)]) -> BlockchainResult<T>
    where
        T: DeserializeOwned,
    {
        with_retries(&self.backoff, url, move || async move {
            let response = self
                .http
                .get(url)
                .query(query)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(url = %url, status = %status, "Explorer request failed");
                return Err(BlockchainError::Status {
                    status: status.as_u16(),
                    body: truncate(body, ERROR_BODY_LIMIT),
                });
            }

            Ok(response.json::<T>().await?)
        })
        .await
    }
}

impl std::fmt::Debug for ExplorerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorerClient")
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.backoff.max_attempts)
            .finish()
    }
}

pub(crate) fn truncate(mut body: String, limit: usize) -> String {
    if body.len() > limit {
        let mut end = limit;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ExplorerClient {
        ExplorerClient::new(
            Duration::from_secs(5),
            Backoff {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_json_decodes_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let value: serde_json::Value = client()
            .get_json(&format!("{}/ping", server.uri()), &[("limit", "5".to_string())])
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .expect(3)
            .mount(&server)
            .await;

        let result: BlockchainResult<serde_json::Value> =
            client().get_json(&server.uri(), &[]).await;
        assert!(matches!(result, Err(BlockchainError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result: BlockchainResult<serde_json::Value> =
            client().get_json(&server.uri(), &[]).await;
        assert!(matches!(result, Err(BlockchainError::Status { status: 404, .. })));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo".to_string(), 2), "h");
        assert_eq!(truncate("abc".to_string(), 10), "abc");
    }
}
