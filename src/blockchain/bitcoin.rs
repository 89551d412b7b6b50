//! Bitcoin transaction history via the blockchain.info `rawaddr` API.

use async_trait::async_trait;
use serde::Deserialize;

use crate::blockchain::client::ExplorerClient;
use crate::blockchain::source::TransactionSource;
use crate::blockchain::types::{BlockchainResult, ChainTag, RawTransaction, TokenInfo};

#[derive(Debug, Deserialize)]
struct RawAddrResponse {
    #[serde(default)]
    txs: Vec<BtcTx>,
}

#[derive(Debug, Deserialize)]
struct BtcTx {
    hash: String,
    time: i64,
    #[serde(default)]
    inputs: Vec<BtcInput>,
    #[serde(default)]
    out: Vec<BtcOutput>,
}

#[derive(Debug, Deserialize)]
struct BtcInput {
    prev_out: Option<BtcOutput>,
}

#[derive(Debug, Deserialize)]
struct BtcOutput {
    addr: Option<String>,
    #[serde(default)]
    value: u64,
}

/// Bitcoin explorer client.
#[derive(Debug, Clone)]
pub struct BitcoinExplorer {
    client: ExplorerClient,
    base_url: String,
    limit: u32,
}

impl BitcoinExplorer {
    pub fn new(client: ExplorerClient, base_url: impl Into<String>, limit: u32) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limit,
        }
    }
}

#[async_trait]
impl TransactionSource for BitcoinExplorer {
    async fn fetch_transactions(&self, address: &str) -> BlockchainResult<Vec<RawTransaction>> {
        tracing::debug!(wallet = %address, "Fetching BTC transactions");

        let url = format!("{}/rawaddr/{}", self.base_url, address);
        let response: RawAddrResponse = self
            .client
            .get_json(&url, &[("limit", self.limit.to_string()), ("offset", "0".to_string())])
            .await?;

        let transactions: Vec<_> = response.txs.into_iter().filter_map(convert).collect();

        tracing::info!(wallet = %address, count = transactions.len(), "Fetched BTC transactions");
        Ok(transactions)
    }
}

fn convert(tx: BtcTx) -> Option<RawTransaction> {
    // Coinbase transactions have no previous output to attribute.
    let Some(from_address) = tx
        .inputs
        .iter()
        .find_map(|input| input.prev_out.as_ref().and_then(|out| out.addr.clone()))
    else {
        tracing::debug!(hash = %tx.hash, "Skipping BTC transaction without sender");
        return None;
    };

    let amounts: Vec<_> = tx
        .out
        .into_iter()
        .filter_map(|out| out.addr.map(|addr| (addr, u128::from(out.value))))
        .collect();

    Some(RawTransaction {
        hash: tx.hash,
        from_address,
        token: TokenInfo::native(ChainTag::Bitcoin),
        amounts,
        timestamp: tx.time,
    })
}
