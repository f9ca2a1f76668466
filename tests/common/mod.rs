//! Shared fixtures for integration tests: a scripted chain and log builders.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolEvent};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use quest_indexer::clients::{ChainProvider, LogFilter, RawLog};
use quest_indexer::config::PipelineConfig;
use quest_indexer::db::models::Network;

sol! {
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }

    interface IQuestClaimer {
        event Claimed(
            string questId,
            address indexed user,
            address indexed token,
            uint256 amount,
            uint256 timestamp
        );
    }
}

pub const TOKEN: &str = "0x00000000000000000000000000000000000000aa";
pub const CLAIMER: &str = "0x00000000000000000000000000000000000000cc";

pub fn address(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn wallet(address: Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

pub fn pipeline(network: Network, start_block: u64) -> PipelineConfig {
    PipelineConfig {
        network,
        rpc_url: "http://unused".to_string(),
        start_block,
        max_blocks_per_batch: 500,
        poll_interval: Duration::from_millis(10),
        rpc_timeout: Duration::from_secs(5),
    }
}

fn raw_log(contract: &str, topics: Vec<B256>, data: Vec<u8>, block: u64, log_index: u64) -> RawLog {
    RawLog {
        address: contract.to_lowercase(),
        topics,
        data,
        block_number: block,
        log_index,
        transaction_hash: format!("0x{:060x}{:04x}", block, log_index),
        removed: false,
    }
}

pub fn transfer_log(token: &str, from: Address, to: Address, value: u64, block: u64) -> RawLog {
    let event = IERC20::Transfer {
        from,
        to,
        value: U256::from(value),
    };
    raw_log(
        token,
        vec![
            IERC20::Transfer::SIGNATURE_HASH,
            from.into_word(),
            to.into_word(),
        ],
        event.encode_data(),
        block,
        0,
    )
}

pub fn claimed_log(quest_id: &str, user: Address, amount: u64, block: u64, log_index: u64) -> RawLog {
    let token = address(0x70);
    let event = IQuestClaimer::Claimed {
        questId: quest_id.to_string(),
        user,
        token,
        amount: U256::from(amount),
        timestamp: U256::from(1_700_000_000u64),
    };
    raw_log(
        CLAIMER,
        vec![
            IQuestClaimer::Claimed::SIGNATURE_HASH,
            user.into_word(),
            token.into_word(),
        ],
        event.encode_data(),
        block,
        log_index,
    )
}

/// In-memory chain: a settable head, a fixed log set, and a failure switch.
#[derive(Default)]
pub struct ScriptedProvider {
    head: AtomicU64,
    logs: Mutex<Vec<RawLog>>,
    failing: AtomicBool,
    get_logs_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(head: u64) -> Self {
        let provider = Self::default();
        provider.set_head(head);
        provider
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn push_log(&self, log: RawLog) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get_logs_calls(&self) -> usize {
        self.get_logs_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainProvider for ScriptedProvider {
    async fn block_number(&self) -> Result<u64> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_logs(&self, filter: &LogFilter, from_block: u64, to_block: u64) -> Result<Vec<RawLog>> {
        self.get_logs_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }

        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.block_number >= from_block && log.block_number <= to_block)
            .filter(|log| filter.addresses.contains(&log.address))
            .filter(|log| {
                filter.topic0.is_empty()
                    || log.topics.first().map_or(false, |t| filter.topic0.contains(t))
            })
            .cloned()
            .collect())
    }
}
