use std::sync::Arc;

use tracing::debug;

use crate::db::models::Network;
use crate::error::Result;
use crate::store::QuestStore;

/// Per-network scan checkpoint.
///
/// The stored value is the next block to scan: everything below it has been
/// processed.
pub struct CursorManager {
    store: Arc<dyn QuestStore>,
    network: Network,
    start_block: u64,
}

impl CursorManager {
    pub fn new(store: Arc<dyn QuestStore>, network: Network, start_block: u64) -> Self {
        Self {
            store,
            network,
            start_block,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Load cursor from the store, falling back to the configured start block
    pub async fn load_cursor(&self) -> Result<u64> {
        match self.store.load_cursor(self.network).await? {
            Some(block) => {
                debug!("Loaded cursor for {}: {}", self.network, block);
                Ok(block.max(self.start_block))
            }
            None => {
                debug!(
                    "No cursor found for {}, starting from block {}",
                    self.network, self.start_block
                );
                Ok(self.start_block)
            }
        }
    }

    /// Save cursor. The store ignores values behind the current one.
    pub async fn save_cursor(&self, block: u64) -> Result<()> {
        self.store.upsert_cursor(self.network, block).await?;
        debug!("Saved cursor for {}: {}", self.network, block);
        Ok(())
    }
}
