use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::types::RawLog;
use crate::clients::{ChainProvider, LogFilter};
use crate::error::{QuestError, Result};

/// Half-open block range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub from: u64,
    pub to: u64,
}

/// Next range to scan, or `None` while the cursor sits at the unconfirmed tip.
pub fn plan_range(cursor: u64, head: u64, max_batch: u64) -> Option<ScanRange> {
    let tip = head.saturating_sub(1);
    if cursor >= tip {
        return None;
    }

    Some(ScanRange {
        from: cursor,
        to: tip.min(cursor.saturating_add(max_batch.max(1))),
    })
}

pub struct EventFetcher {
    provider: Arc<dyn ChainProvider>,
    max_batch: u64,
    timeout: Duration,
}

impl EventFetcher {
    pub fn new(provider: Arc<dyn ChainProvider>, max_batch: u64, timeout: Duration) -> Self {
        Self {
            provider,
            max_batch: max_batch.max(1),
            timeout,
        }
    }

    pub fn max_batch(&self) -> u64 {
        self.max_batch
    }

    async fn bounded<T>(
        &self,
        what: &str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(QuestError::Provider(format!("{} failed: {:#}", what, e))),
            Err(_) => Err(QuestError::Provider(format!(
                "{} timed out after {:?}",
                what, self.timeout
            ))),
        }
    }

    pub async fn head_block(&self) -> Result<u64> {
        self.bounded("eth_blockNumber", self.provider.block_number())
            .await
    }

    /// Logs in `[from_block, min(to_block_cap, from_block + max_batch))`,
    /// ordered by block then log index. Re-orged logs are dropped.
    pub async fn fetch_logs(
        &self,
        filter: &LogFilter,
        from_block: u64,
        to_block_cap: u64,
    ) -> Result<Vec<RawLog>> {
        let end = to_block_cap.min(from_block.saturating_add(self.max_batch));
        if filter.is_empty() || from_block >= end {
            return Ok(Vec::new());
        }

        debug!(
            "Fetching logs for {} contracts in [{}, {})",
            filter.addresses.len(),
            from_block,
            end
        );

        let mut logs = self
            .bounded(
                "eth_getLogs",
                self.provider.get_logs(filter, from_block, end - 1),
            )
            .await?;

        logs.retain(|log| !log.removed);
        logs.sort_by_key(|log| (log.block_number, log.log_index));

        debug!("Fetched {} logs", logs.len());
        Ok(logs)
    }
}
