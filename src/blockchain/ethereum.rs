//! Ethereum transaction history via Etherscan, with ERC-20 decoding.
//!
//! Plain value transfers map to the native ETH token. Calls to an ERC-20
//! `transfer(address,uint256)` are decoded from calldata, and the token's
//! `symbol()`, `name()` and `decimals()` are read over JSON-RPC the first time
//! a contract is seen. Metadata is kept in a bounded LRU cache.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, FixedBytes};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::{sol_data, SolCall, SolType};
use async_trait::async_trait;
use lru::LruCache;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::blockchain::client::ExplorerClient;
use crate::blockchain::source::TransactionSource;
use crate::blockchain::types::{
    BlockchainError, BlockchainResult, ChainTag, RawTransaction, TokenInfo,
};

sol! {
    function transfer(address to, uint256 amount) returns (bool);
    function symbol() returns (string);
    function name() returns (string);
    function decimals() returns (uint8);
}

/// Resolves ERC-20 contract metadata.
#[async_trait]
pub trait TokenMetadata: Send + Sync {
    async fn token_info(&self, contract: Address) -> BlockchainResult<TokenInfo>;
}

/// ERC-20 metadata read over JSON-RPC and cached per contract.
pub struct RpcTokenMetadata {
    provider: Arc<dyn Provider + Send + Sync>,
    cache: Mutex<LruCache<Address, TokenInfo>>,
    timeout_duration: Duration,
}

impl RpcTokenMetadata {
    pub fn new(rpc_url: &str, cache_size: usize, timeout_duration: Duration) -> BlockchainResult<Self> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e| BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", rpc_url, e)))?;
        let provider = Arc::new(ProviderBuilder::new().connect_http(url)) as Arc<dyn Provider + Send + Sync>;
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            provider,
            cache: Mutex::new(LruCache::new(capacity)),
            timeout_duration,
        })
    }

    async fn eth_call(&self, contract: Address, calldata: Vec<u8>) -> BlockchainResult<Bytes> {
        let request = TransactionRequest::default()
            .with_to(contract)
            .with_input(calldata);

        timeout(self.timeout_duration, self.provider.call(request))
            .await
            .map_err(|_| BlockchainError::Rpc(format!("eth_call to {} timed out", contract)))?
            .map_err(|e| BlockchainError::Rpc(e.to_string()))
    }

    async fn read_string(&self, contract: Address, calldata: Vec<u8>) -> BlockchainResult<String> {
        let output = self.eth_call(contract, calldata).await?;
        decode_string(&output)
    }

    async fn fetch(&self, contract: Address) -> BlockchainResult<TokenInfo> {
        let symbol = self.read_string(contract, symbolCall {}.abi_encode()).await?;
        let name = self.read_string(contract, nameCall {}.abi_encode()).await?;
        let output = self.eth_call(contract, decimalsCall {}.abi_encode()).await?;
        let decimals = <sol_data::Uint<8> as SolType>::abi_decode(&output)
            .map_err(|e| BlockchainError::Decode(format!("decimals() of {}: {}", contract, e)))?;

        Ok(TokenInfo {
            address: contract.to_string().to_lowercase(),
            symbol,
            name,
            chain: ChainTag::Ethereum,
            decimals,
        })
    }
}

#[async_trait]
impl TokenMetadata for RpcTokenMetadata {
    async fn token_info(&self, contract: Address) -> BlockchainResult<TokenInfo> {
        if let Some(info) = self.cache.lock().await.get(&contract) {
            return Ok(info.clone());
        }

        let info = self.fetch(contract).await?;
        tracing::debug!(contract = %contract, symbol = %info.symbol, "Resolved ERC-20 metadata");
        self.cache.lock().await.put(contract, info.clone());
        Ok(info)
    }
}

impl std::fmt::Debug for RpcTokenMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcTokenMetadata")
            .field("timeout", &self.timeout_duration)
            .finish_non_exhaustive()
    }
}

/// Decode an ABI string, falling back to the legacy `bytes32` encoding.
fn decode_string(output: &[u8]) -> BlockchainResult<String> {
    if let Ok(s) = <sol_data::String as SolType>::abi_decode(output) {
        return Ok(s);
    }
    let raw = <sol_data::FixedBytes<32> as SolType>::abi_decode(output)
        .map_err(|e| BlockchainError::Decode(format!("token string: {}", e)))?;
    Ok(bytes32_to_string(&raw))
}

fn bytes32_to_string(raw: &FixedBytes<32>) -> String {
    let end = raw.iter().position(|b| *b == 0).unwrap_or(32);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    message: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EtherscanTx {
    hash: String,
    time_stamp: String,
    from: String,
    #[serde(default)]
    to: String,
    value: String,
    #[serde(default)]
    is_error: String,
    #[serde(default)]
    input: String,
}

/// Etherscan-backed Ethereum explorer.
#[derive(Clone)]
pub struct EthereumExplorer {
    client: ExplorerClient,
    base_url: String,
    api_key: String,
    limit: u32,
    metadata: Arc<dyn TokenMetadata>,
}

impl EthereumExplorer {
    pub fn new(
        client: ExplorerClient,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        limit: u32,
        metadata: Arc<dyn TokenMetadata>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            limit,
            metadata,
        }
    }

    async fn convert(&self, tx: EtherscanTx) -> BlockchainResult<Option<RawTransaction>> {
        if tx.is_error == "1" {
            return Ok(None);
        }

        let timestamp = tx
            .time_stamp
            .parse::<i64>()
            .map_err(|e| BlockchainError::Decode(format!("timeStamp '{}': {}", tx.time_stamp, e)))?;
        let from_address = tx.from.to_lowercase();

        if tx.input.is_empty() || tx.input == "0x" {
            let value = tx
                .value
                .parse::<u128>()
                .map_err(|e| BlockchainError::Decode(format!("value '{}': {}", tx.value, e)))?;
            if value == 0 || tx.to.is_empty() {
                return Ok(None);
            }
            return Ok(Some(RawTransaction {
                hash: tx.hash,
                from_address,
                token: TokenInfo::native(ChainTag::Ethereum),
                amounts: vec![(tx.to.to_lowercase(), value)],
                timestamp,
            }));
        }

        let input: Bytes = match tx.input.parse() {
            Ok(input) => input,
            Err(_) => return Ok(None),
        };
        if !input.starts_with(&transferCall::SELECTOR) {
            return Ok(None);
        }
        let call = transferCall::abi_decode(&input)
            .map_err(|e| BlockchainError::Decode(format!("transfer calldata of {}: {}", tx.hash, e)))?;
        let amount = u128::try_from(call.amount)
            .map_err(|_| BlockchainError::Decode(format!("transfer amount of {} exceeds u128", tx.hash)))?;

        let contract: Address = tx
            .to
            .parse()
            .map_err(|e| BlockchainError::Decode(format!("contract '{}': {}", tx.to, e)))?;
        let token = self.metadata.token_info(contract).await?;

        Ok(Some(RawTransaction {
            hash: tx.hash,
            from_address,
            token,
            amounts: vec![(call.to.to_string().to_lowercase(), amount)],
            timestamp,
        }))
    }
}

#[async_trait]
impl TransactionSource for EthereumExplorer {
    async fn fetch_transactions(&self, address: &str) -> BlockchainResult<Vec<RawTransaction>> {
        tracing::debug!(wallet = %address, "Fetching ETH transactions");

        let response: EtherscanResponse = self
            .client
            .get_json(
                &self.base_url,
                &[
                    ("module", "account".to_string()),
                    ("action", "txlist".to_string()),
                    ("address", address.to_string()),
                    ("sort", "desc".to_string()),
                    ("page", "1".to_string()),
                    ("offset", self.limit.to_string()),
                    ("apikey", self.api_key.clone()),
                ],
            )
            .await?;

        let items: Vec<EtherscanTx> = match response.result {
            serde_json::Value::Array(_) => serde_json::from_value(response.result)
                .map_err(|e| BlockchainError::Decode(e.to_string()))?,
            serde_json::Value::String(reason) if response.status != "1" => {
                return Err(BlockchainError::Api(format!("{}: {}", response.message, reason)));
            }
            other => {
                return Err(BlockchainError::Decode(format!("unexpected result: {}", other)));
            }
        };

        let mut transactions = Vec::with_capacity(items.len());
        for item in items {
            let hash = item.hash.clone();
            match self.convert(item).await {
                Ok(Some(tx)) => transactions.push(tx),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(wallet = %address, hash = %hash, error = %e, "Skipping unreadable ETH transaction");
                }
            }
        }

        tracing::info!(wallet = %address, count = transactions.len(), "Fetched ETH transactions");
        Ok(transactions)
    }
}

impl std::fmt::Debug for EthereumExplorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthereumExplorer")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("limit", &self.limit)
            .finish()
    }
}
