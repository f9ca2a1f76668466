use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clients::entity_store::{Annotation, EntityStore, NewEntity};
use crate::constants::leaderboard::{snapshot_query, ENTITY_TYPE_KEY, ENTITY_TYPE_VALUE};
use crate::db::models::BalanceStats;
use crate::error::{QuestError, Result};
use crate::store::QuestStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub wallet_address: String,
    pub balance: String,
    pub rank: u32,
    pub last_updated: i64,
}

/// Immutable ranked view stored as one entity. Superseded, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardSnapshot {
    pub entries: Vec<LeaderboardEntry>,
    pub total_users: usize,
    /// Milliseconds since the epoch.
    pub last_calculated: i64,
    pub valid_until_block: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPosition {
    pub rank: u32,
    pub balance: String,
    pub total_users: usize,
}

fn entity_error(e: anyhow::Error) -> QuestError {
    QuestError::EntityStore(format!("{:#}", e))
}

/// Cache-aside leaderboard over the balance table, persisted in the entity
/// store with a block-height expiry.
pub struct LeaderboardCache {
    store: Arc<dyn QuestStore>,
    entities: Arc<dyn EntityStore>,
    btl_blocks: u64,
    top_k: usize,
    last_calculated: AtomicI64,
}

impl LeaderboardCache {
    pub fn new(
        store: Arc<dyn QuestStore>,
        entities: Arc<dyn EntityStore>,
        btl_blocks: u64,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            entities,
            btl_blocks,
            top_k,
            last_calculated: AtomicI64::new(0),
        }
    }

    /// Wall-clock milliseconds, bumped so consecutive snapshots never share
    /// a timestamp.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last_calculated.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self.last_calculated.compare_exchange(
                prev,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(current) => prev = current,
            }
        }
    }

    /// Top users by balance, highest first, ties broken by user id.
    pub async fn calculate(&self) -> Result<Vec<LeaderboardEntry>> {
        let ranked = self.store.ranked_balances(self.top_k).await?;
        let now = Utc::now().timestamp_millis();

        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(i, row)| LeaderboardEntry {
                user_id: row.user_id,
                wallet_address: row.wallet_address,
                balance: row.balance,
                rank: i as u32 + 1,
                last_updated: now,
            })
            .collect())
    }

    /// Writes the snapshot as a new tagged entity. Returns its key.
    pub async fn store(&self, snapshot: &LeaderboardSnapshot) -> Result<String> {
        let data = serde_json::to_vec(snapshot)
            .map_err(|e| QuestError::Internal(format!("failed to encode leaderboard: {}", e)))?;

        let key = self
            .entities
            .create_entity(NewEntity {
                data,
                btl: self.btl_blocks,
                string_annotations: vec![Annotation::new(ENTITY_TYPE_KEY, ENTITY_TYPE_VALUE)],
            })
            .await
            .map_err(entity_error)?;

        info!(
            entity_key = %key,
            entries = snapshot.entries.len(),
            valid_until_block = snapshot.valid_until_block,
            "Stored leaderboard snapshot"
        );
        Ok(key)
    }

    /// Most recently calculated snapshot in the store, expired or not.
    pub async fn latest(&self) -> Result<Option<LeaderboardSnapshot>> {
        let results = self
            .entities
            .query_entities(&snapshot_query())
            .await
            .map_err(entity_error)?;

        let latest = results
            .iter()
            .filter_map(|r| match serde_json::from_slice::<LeaderboardSnapshot>(&r.data) {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(entity_key = %r.key, "Skipping undecodable leaderboard: {}", e);
                    None
                }
            })
            .max_by_key(|s| s.last_calculated);

        Ok(latest)
    }

    /// Recomputes, stores and returns a fresh snapshot.
    pub async fn refresh(&self) -> Result<LeaderboardSnapshot> {
        let entries = self.calculate().await?;
        let head = self.entities.block_number().await.map_err(entity_error)?;

        let snapshot = LeaderboardSnapshot {
            total_users: entries.len(),
            entries,
            last_calculated: self.next_timestamp(),
            valid_until_block: head + self.btl_blocks,
        };

        self.store(&snapshot).await?;
        Ok(snapshot)
    }

    pub async fn get(&self, force_refresh: bool) -> Result<LeaderboardSnapshot> {
        if !force_refresh {
            match self.latest().await {
                Ok(Some(cached)) => {
                    let head = self.entities.block_number().await.map_err(entity_error)?;
                    if head < cached.valid_until_block {
                        debug!(head, valid_until_block = cached.valid_until_block, "Leaderboard cache hit");
                        return Ok(cached);
                    }
                    debug!(head, "Cached leaderboard expired, recalculating");
                }
                Ok(None) => debug!("No cached leaderboard, calculating"),
                Err(e) => warn!("Failed to read cached leaderboard: {}", e),
            }
        }

        self.refresh().await
    }

    /// Deletes snapshots whose expiry block has passed. Returns how many
    /// were deleted.
    pub async fn cleanup(&self) -> Result<usize> {
        let results = self
            .entities
            .query_entities(&snapshot_query())
            .await
            .map_err(entity_error)?;
        if results.is_empty() {
            return Ok(0);
        }

        let head = self.entities.block_number().await.map_err(entity_error)?;
        let mut cleaned = 0;

        for result in &results {
            let metadata = match self.entities.entity_metadata(&result.key).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(entity_key = %result.key, "Failed to read leaderboard metadata: {:#}", e);
                    continue;
                }
            };

            if head > metadata.expires_at_block {
                match self.entities.delete_entity(&result.key).await {
                    Ok(()) => {
                        cleaned += 1;
                        debug!(entity_key = %result.key, "Deleted expired leaderboard");
                    }
                    Err(e) => {
                        warn!(entity_key = %result.key, "Failed to delete leaderboard: {:#}", e)
                    }
                }
            }
        }

        info!("Cleaned up {} expired leaderboards", cleaned);
        Ok(cleaned)
    }

    /// Position inside the current top-K only; anyone below is not ranked.
    pub async fn user_position(&self, user_id: Uuid) -> Result<Option<UserPosition>> {
        let leaderboard = self.get(false).await?;

        Ok(leaderboard
            .entries
            .iter()
            .find(|e| e.user_id == user_id)
            .map(|e| UserPosition {
                rank: e.rank,
                balance: e.balance.clone(),
                total_users: leaderboard.total_users,
            }))
    }

    pub async fn stats(&self) -> Result<BalanceStats> {
        self.store.balance_stats().await
    }
}
