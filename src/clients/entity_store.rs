//! Client for the external append-only entity store that backs the
//! leaderboard cache.
//!
//! Entities are opaque byte payloads tagged with string annotations and
//! expiring after a number of blocks (BTL). Reads go straight to the store's
//! JSON-RPC endpoint; creates and deletes need a signed transaction and are
//! handed to a relay service.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::evm_rpc::parse_quantity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub key: String,
    pub value: String,
}

impl Annotation {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewEntity {
    pub data: Vec<u8>,
    /// Blocks to live, counted from the block the entity is created in.
    pub btl: u64,
    pub string_annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityResult {
    pub key: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    pub expires_at_block: u64,
    pub string_annotations: Vec<Annotation>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    /// Returns the new entity key.
    async fn create_entity(&self, entity: NewEntity) -> Result<String>;

    /// Annotation query such as `type = "leaderboard"`.
    async fn query_entities(&self, query: &str) -> Result<Vec<EntityResult>>;

    async fn entity_metadata(&self, key: &str) -> Result<EntityMetadata>;

    async fn delete_entity(&self, key: &str) -> Result<()>;
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

#[derive(Debug, Deserialize)]
struct RpcQueryResult {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcEntityMetadata {
    expires_at_block: Value,
    #[serde(default)]
    string_annotations: Option<Vec<Annotation>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayCreateRequest<'a> {
    data: String,
    btl: u64,
    string_annotations: &'a [Annotation],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayCreateResponse {
    entity_key: String,
}

/// Golem-Base style entity store: `golembase_*` reads plus a write relay.
#[derive(Clone)]
pub struct GolemEntityClient {
    http: Client,
    rpc_url: String,
    relay_url: String,
}

impl GolemEntityClient {
    pub fn new(
        rpc_url: impl Into<String>,
        relay_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            rpc_url: rpc_url.into(),
            relay_url: relay_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn rpc_call<T: for<'de> Deserialize<'de>>(&self, method: &str, params: Value) -> Result<T> {
        self.rpc_call_optional(method, params)
            .await?
            .ok_or_else(|| anyhow!("empty {} response", method))
    }

    /// Like `rpc_call`, but a `null` result is `None` rather than an error.
    async fn rpc_call_optional<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let rpc_resp: RpcResponse<T> = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("failed to call {}", method))?
            .json()
            .await
            .with_context(|| format!("failed to parse {} response json", method))?;

        if let Some(err) = rpc_resp.error {
            bail!("entity store RPC error {}: {}", err.code, err.message);
        }

        Ok(rpc_resp.result)
    }
}

/// Block numbers come back either as JSON numbers or hex quantities.
fn block_from_value(value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| anyhow!("invalid block number {}", n)),
        Value::String(s) => parse_quantity(s).or_else(|_| {
            s.parse::<u64>()
                .with_context(|| format!("invalid block number {}", s))
        }),
        other => Err(anyhow!("invalid block number {}", other)),
    }
}

#[async_trait]
impl EntityStore for GolemEntityClient {
    async fn block_number(&self) -> Result<u64> {
        let quantity: String = self.rpc_call("eth_blockNumber", json!([])).await?;
        parse_quantity(&quantity)
    }

    async fn create_entity(&self, entity: NewEntity) -> Result<String> {
        let body = RelayCreateRequest {
            data: BASE64.encode(&entity.data),
            btl: entity.btl,
            string_annotations: &entity.string_annotations,
        };

        let resp = self
            .http
            .post(format!("{}/entities", self.relay_url))
            .json(&body)
            .send()
            .await
            .context("Failed to send create request to relay")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("relay rejected create ({}): {}", status, text);
        }

        let created: RelayCreateResponse = resp
            .json()
            .await
            .context("Failed to parse relay create response")?;

        Ok(created.entity_key)
    }

    async fn query_entities(&self, query: &str) -> Result<Vec<EntityResult>> {
        let results: Option<Vec<RpcQueryResult>> = self
            .rpc_call_optional("golembase_queryEntities", json!([query]))
            .await?;

        results
            .unwrap_or_default()
            .into_iter()
            .map(|r| {
                let data = BASE64
                    .decode(r.value.as_bytes())
                    .with_context(|| format!("invalid payload for entity {}", r.key))?;
                Ok(EntityResult { key: r.key, data })
            })
            .collect()
    }

    async fn entity_metadata(&self, key: &str) -> Result<EntityMetadata> {
        let meta: RpcEntityMetadata = self
            .rpc_call("golembase_getEntityMetaData", json!([key]))
            .await?;

        Ok(EntityMetadata {
            expires_at_block: block_from_value(&meta.expires_at_block)?,
            string_annotations: meta.string_annotations.unwrap_or_default(),
        })
    }

    async fn delete_entity(&self, key: &str) -> Result<()> {
        let resp = self
            .http
            .delete(format!("{}/entities/{}", self.relay_url, key))
            .send()
            .await
            .context("Failed to send delete request to relay")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("relay rejected delete of {} ({}): {}", key, status, text);
        }

        Ok(())
    }
}

/// Parses `key = "value" && key2 = "value2"` into equality clauses.
fn parse_query(query: &str) -> Result<Vec<(String, String)>> {
    query
        .split("&&")
        .map(|clause| {
            let (key, value) = clause
                .split_once('=')
                .ok_or_else(|| anyhow!("unsupported query clause: {}", clause.trim()))?;
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| anyhow!("query value must be quoted: {}", value))?;
            Ok((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

#[derive(Debug, Clone)]
struct StoredEntity {
    data: Vec<u8>,
    annotations: Vec<Annotation>,
    expires_at_block: u64,
}

/// In-process entity store with a manually driven block height.
///
/// Expired entities stay queryable until deleted, so expiry handling is the
/// caller's job exactly as with a lagging remote store.
#[derive(Default)]
pub struct MemoryEntityStore {
    head: AtomicU64,
    next_key: AtomicU64,
    entities: Mutex<BTreeMap<String, StoredEntity>>,
}

impl MemoryEntityStore {
    pub fn new(head: u64) -> Self {
        Self {
            head: AtomicU64::new(head),
            ..Default::default()
        }
    }

    pub fn set_block_number(&self, block: u64) {
        self.head.store(block, Ordering::SeqCst);
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.head.fetch_add(blocks, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entities().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entities(&self) -> MutexGuard<'_, BTreeMap<String, StoredEntity>> {
        self.entities.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn create_entity(&self, entity: NewEntity) -> Result<String> {
        let n = self.next_key.fetch_add(1, Ordering::SeqCst) + 1;
        let key = format!("0x{:064x}", n);
        let expires_at_block = self.head.load(Ordering::SeqCst) + entity.btl;

        self.entities().insert(
            key.clone(),
            StoredEntity {
                data: entity.data,
                annotations: entity.string_annotations,
                expires_at_block,
            },
        );

        Ok(key)
    }

    async fn query_entities(&self, query: &str) -> Result<Vec<EntityResult>> {
        let clauses = parse_query(query)?;

        Ok(self
            .entities()
            .iter()
            .filter(|(_, e)| {
                clauses.iter().all(|(k, v)| {
                    e.annotations
                        .iter()
                        .any(|a| &a.key == k && &a.value == v)
                })
            })
            .map(|(key, e)| EntityResult {
                key: key.clone(),
                data: e.data.clone(),
            })
            .collect())
    }

    async fn entity_metadata(&self, key: &str) -> Result<EntityMetadata> {
        self.entities()
            .get(key)
            .map(|e| EntityMetadata {
                expires_at_block: e.expires_at_block,
                string_annotations: e.annotations.clone(),
            })
            .ok_or_else(|| anyhow!("entity {} not found", key))
    }

    async fn delete_entity(&self, key: &str) -> Result<()> {
        self.entities()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| anyhow!("entity {} not found", key))
    }
}
