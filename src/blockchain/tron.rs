//! Tron TRC-20 transfer history via the TronGrid API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::blockchain::client::ExplorerClient;
use crate::blockchain::source::TransactionSource;
use crate::blockchain::types::{BlockchainResult, ChainTag, RawTransaction, TokenInfo};

#[derive(Debug, Deserialize)]
struct Trc20Response {
    #[serde(default)]
    data: Vec<Trc20Transfer>,
}

#[derive(Debug, Deserialize)]
struct Trc20Transfer {
    transaction_id: String,
    token_info: Trc20TokenInfo,
    /// Milliseconds since the epoch.
    block_timestamp: i64,
    from: String,
    to: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct Trc20TokenInfo {
    symbol: String,
    address: String,
    decimals: u8,
    name: String,
}

/// TronGrid client.
#[derive(Debug, Clone)]
pub struct TronExplorer {
    client: ExplorerClient,
    base_url: String,
    limit: u32,
}

impl TronExplorer {
    pub fn new(client: ExplorerClient, base_url: impl Into<String>, limit: u32) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limit,
        }
    }
}

#[async_trait]
impl TransactionSource for TronExplorer {
    async fn fetch_transactions(&self, address: &str) -> BlockchainResult<Vec<RawTransaction>> {
        tracing::debug!(wallet = %address, "Fetching TRON transactions");

        let url = format!("{}/v1/accounts/{}/transactions/trc20", self.base_url, address);
        let response: Trc20Response = self
            .client
            .get_json(&url, &[("limit", self.limit.to_string())])
            .await?;

        let transactions: Vec<_> = response.data.into_iter().filter_map(convert).collect();

        tracing::info!(wallet = %address, count = transactions.len(), "Fetched TRON transactions");
        Ok(transactions)
    }
}

fn convert(transfer: Trc20Transfer) -> Option<RawTransaction> {
    let amount = match transfer.value.parse::<u128>() {
        Ok(amount) => amount,
        Err(e) => {
            tracing::warn!(
                hash = %transfer.transaction_id,
                value = %transfer.value,
                error = %e,
                "Skipping TRC-20 transfer with unparsable value"
            );
            return None;
        }
    };

    Some(RawTransaction {
        hash: transfer.transaction_id,
        from_address: transfer.from,
        token: TokenInfo {
            address: transfer.token_info.address,
            symbol: transfer.token_info.symbol,
            name: transfer.token_info.name,
            chain: ChainTag::Tron,
            decimals: transfer.token_info.decimals,
        },
        amounts: vec![(transfer.to, amount)],
        timestamp: transfer.block_timestamp / 1000,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::Backoff;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "TLa2f6VPqDgRE67v1736s7bJ8Ray5wYjU7";
    const USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    #[tokio::test]
    async fn test_fetch_parses_trc20_transfers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/accounts/{}/transactions/trc20", WALLET)))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {
                        "transaction_id": "t1",
                        "token_info": {"symbol": "USDT", "address": USDT, "decimals": 6, "name": "Tether USD"},
                        "block_timestamp": 1700000000123i64,
                        "from": "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf",
                        "to": WALLET,
                        "type": "Transfer",
                        "value": "2500000"
                    },
                    {
                        "transaction_id": "t2",
                        "token_info": {"symbol": "USDT", "address": USDT, "decimals": 6, "name": "Tether USD"},
                        "block_timestamp": 1700000000999i64,
                        "from": WALLET,
                        "to": "TXYZopYRdj2D9XRtbG411XZZ3kM5VkAeBf",
                        "value": "-1"
                    }
                ],
                "success": true
            })))
            .mount(&server)
            .await;

        let client = ExplorerClient::new(Duration::from_secs(5), Backoff::default()).unwrap();
        let explorer = TronExplorer::new(client, server.uri(), 50);
        let txs = explorer.fetch_transactions(WALLET).await.unwrap();

        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].hash, "t1");
        assert_eq!(txs[0].timestamp, 1_700_000_000);
        assert_eq!(txs[0].token.address, USDT);
        assert_eq!(txs[0].token.decimals, 6);
        assert_eq!(txs[0].amounts, vec![(WALLET.to_string(), 2_500_000)]);
    }
}
