//! EVM JSON-RPC client: chain head and log queries over plain HTTP.

use std::time::Duration;

use alloy_primitives::B256;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::store::canonical_address;

/// Read access to an EVM-compatible chain.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    /// Logs matching `filter` in the inclusive range `[from_block, to_block]`.
    async fn get_logs(&self, filter: &LogFilter, from_block: u64, to_block: u64)
        -> Result<Vec<RawLog>>;
}

/// Contract addresses and signature topics a pipeline subscribes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub addresses: Vec<String>,
    /// Accepted values for `topics[0]`; empty means any.
    pub topic0: Vec<B256>,
}

impl LogFilter {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    fn to_params(&self, from_block: u64, to_block: u64) -> Value {
        let mut filter = json!({
            "address": self.addresses,
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
        });

        if !self.topic0.is_empty() {
            let topics: Vec<String> = self
                .topic0
                .iter()
                .map(|t| format!("0x{}", hex::encode(t)))
                .collect();
            filter["topics"] = json!([topics]);
        }

        json!([filter])
    }
}

/// A log as returned by `eth_getLogs`, with the address canonicalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: String,
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    address: String,
    topics: Vec<String>,
    data: String,
    block_number: Option<String>,
    log_index: Option<String>,
    transaction_hash: Option<String>,
    #[serde(default)]
    removed: bool,
}

impl TryFrom<RpcLog> for RawLog {
    type Error = anyhow::Error;

    fn try_from(log: RpcLog) -> Result<Self> {
        let topics = log
            .topics
            .iter()
            .map(|t| t.parse::<B256>().with_context(|| format!("invalid topic {}", t)))
            .collect::<Result<Vec<_>>>()?;

        let data = hex::decode(log.data.trim_start_matches("0x")).context("invalid log data")?;

        let block_number = log
            .block_number
            .as_deref()
            .ok_or_else(|| anyhow!("pending log without block number"))
            .and_then(parse_quantity)?;

        let log_index = log.log_index.as_deref().map(parse_quantity).transpose()?.unwrap_or(0);

        Ok(RawLog {
            address: canonical_address(&log.address),
            topics,
            data,
            block_number,
            log_index,
            transaction_hash: log.transaction_hash.unwrap_or_default(),
            removed: log.removed,
        })
    }
}

/// Parses a JSON-RPC hex quantity such as `0x1f4`.
pub fn parse_quantity(value: &str) -> Result<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| anyhow!("quantity {} is missing 0x prefix", value))?;
    if digits.is_empty() {
        return Err(anyhow!("empty quantity"));
    }
    u64::from_str_radix(digits, 16).with_context(|| format!("invalid quantity {}", value))
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Clone)]
pub struct EvmRpcClient {
    http: Client,
    rpc_url: String,
}

impl EvmRpcClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
        })
    }

    async fn rpc_call<T: for<'de> Deserialize<'de>>(&self, method: &str, params: Value) -> Result<T> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("failed to call {}", method))?;

        let status = resp.status();
        let rpc_resp: RpcResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("failed to parse {} response json", method))?;

        if let Some(err) = rpc_resp.error {
            return Err(anyhow!("EVM RPC error {}: {}", err.code, err.message));
        }

        rpc_resp
            .result
            .ok_or_else(|| anyhow!("empty {} response (status: {})", method, status))
    }
}

#[async_trait]
impl ChainProvider for EvmRpcClient {
    async fn block_number(&self) -> Result<u64> {
        let quantity: String = self.rpc_call("eth_blockNumber", json!([])).await?;
        parse_quantity(&quantity)
    }

    async fn get_logs(
        &self,
        filter: &LogFilter,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>> {
        let logs: Vec<RpcLog> = self
            .rpc_call("eth_getLogs", filter.to_params(from_block, to_block))
            .await?;

        logs.into_iter().map(RawLog::try_from).collect()
    }
}
