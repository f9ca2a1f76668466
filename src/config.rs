use anyhow::{anyhow, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{indexer, leaderboard};
use crate::db::models::Network;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("LOG_FORMAT must be text or json, got {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub log_format: LogFormat,

    // Database
    pub database_url: String,
    pub db_max_connections: u32,

    // Quest-action pipeline
    pub quest_network: Network,
    pub quest_rpc_url: String,
    pub quest_start_block: u64,

    // Claim pipeline
    pub claim_network: Network,
    pub claim_rpc_url: String,
    pub claim_start_block: u64,
    pub claimer_contract_address: String,

    // Indexer
    pub max_blocks_per_batch: u64,
    pub indexer_poll_interval_ms: u64,
    pub rpc_timeout_secs: u64,
    pub enable_indexer: bool,

    // Entity store (leaderboard cache)
    pub entity_store_rpc_url: String,
    pub entity_store_relay_url: String,
    pub leaderboard_btl_blocks: u64,
    pub leaderboard_top_k: usize,
}

/// Settings for one ingestion pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub network: Network,
    pub rpc_url: String,
    pub start_block: u64,
    pub max_blocks_per_batch: u64,
    pub poll_interval: Duration,
    pub rpc_timeout: Duration,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} is invalid ({}): {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

fn parse_network(key: &str, default: Network) -> Result<Network> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<Network>()
            .map_err(|e| anyhow!("{}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            // Server
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("PORT must be a valid u16")?,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            log_format: var_or("LOG_FORMAT", "text").parse()?,

            // Database
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 10)?,

            // Quest-action pipeline
            quest_network: parse_network("QUEST_NETWORK", Network::Zetachain)?,
            quest_rpc_url: var_or("QUEST_RPC_URL", indexer::DEFAULT_QUEST_RPC_URL),
            quest_start_block: parse_var("QUEST_START_BLOCK", 0)?,

            // Claim pipeline
            claim_network: parse_network("CLAIM_NETWORK", Network::Arbitrum)?,
            claim_rpc_url: var_or("CLAIM_RPC_URL", indexer::DEFAULT_CLAIM_RPC_URL),
            claim_start_block: parse_var("CLAIM_START_BLOCK", 0)?,
            claimer_contract_address: env::var("CLAIMER_CONTRACT_ADDRESS")
                .context("CLAIMER_CONTRACT_ADDRESS must be set")?,

            // Indexer
            max_blocks_per_batch: parse_var(
                "MAX_BLOCKS_PER_BATCH",
                indexer::DEFAULT_MAX_BLOCKS_PER_BATCH,
            )?,
            indexer_poll_interval_ms: parse_var(
                "INDEXER_POLL_INTERVAL_MS",
                indexer::DEFAULT_POLL_INTERVAL_MS,
            )?,
            rpc_timeout_secs: parse_var("RPC_TIMEOUT_SECS", indexer::DEFAULT_RPC_TIMEOUT_SECS)?,
            enable_indexer: var_or("ENABLE_INDEXER", "false").trim().eq_ignore_ascii_case("true"),

            // Entity store
            entity_store_rpc_url: var_or(
                "ENTITY_STORE_RPC_URL",
                leaderboard::DEFAULT_ENTITY_STORE_RPC_URL,
            ),
            entity_store_relay_url: var_or("ENTITY_STORE_RELAY_URL", "http://localhost:8787"),
            leaderboard_btl_blocks: parse_var(
                "LEADERBOARD_BTL_BLOCKS",
                leaderboard::DEFAULT_BTL_BLOCKS,
            )?,
            leaderboard_top_k: parse_var("LEADERBOARD_TOP_K", leaderboard::DEFAULT_TOP_K)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.quest_network == self.claim_network {
            return Err(anyhow!(
                "QUEST_NETWORK and CLAIM_NETWORK must differ, both are {}",
                self.quest_network
            ));
        }
        if self.max_blocks_per_batch == 0 {
            return Err(anyhow!("MAX_BLOCKS_PER_BATCH must be positive"));
        }
        if self.leaderboard_top_k == 0 {
            return Err(anyhow!("LEADERBOARD_TOP_K must be positive"));
        }
        Ok(())
    }

    fn pipeline(&self, network: Network, rpc_url: &str, start_block: u64) -> PipelineConfig {
        PipelineConfig {
            network,
            rpc_url: rpc_url.to_string(),
            start_block,
            max_blocks_per_batch: self.max_blocks_per_batch,
            poll_interval: Duration::from_millis(self.indexer_poll_interval_ms),
            rpc_timeout: Duration::from_secs(self.rpc_timeout_secs),
        }
    }

    pub fn quest_pipeline(&self) -> PipelineConfig {
        self.pipeline(self.quest_network, &self.quest_rpc_url, self.quest_start_block)
    }

    pub fn claim_pipeline(&self) -> PipelineConfig {
        self.pipeline(self.claim_network, &self.claim_rpc_url, self.claim_start_block)
    }
}
