use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::LogHandler;
use crate::clients::LogFilter;
use crate::constants::indexer::PIPELINE_QUEST_ACTIONS;
use crate::db::models::QuestStatus;
use crate::error::Result;
use crate::indexer::decoder::{decode_erc20_transfer, decode_nft_transfer, transfer_topic};
use crate::indexer::matcher::QuestIndex;
use crate::indexer::types::{EventOutcome, RawLog, SkipReason};
use crate::indexer::validator::{erc20_matches, nft_matches};
use crate::services::quest_state::QuestStateMachine;
use crate::store::QuestStore;

/// Moves a user's quest to `claim` when a transfer on the quest's contract
/// satisfies its expectation.
pub struct QuestActionHandler {
    store: Arc<dyn QuestStore>,
    state_machine: QuestStateMachine,
}

impl QuestActionHandler {
    pub fn new(store: Arc<dyn QuestStore>) -> Self {
        Self {
            state_machine: QuestStateMachine::new(store.clone()),
            store,
        }
    }
}

#[async_trait]
impl LogHandler for QuestActionHandler {
    type Snapshot = QuestIndex;

    fn name(&self) -> &'static str {
        PIPELINE_QUEST_ACTIONS
    }

    async fn prepare(&self) -> Result<(LogFilter, QuestIndex)> {
        let quests = self.store.active_quests().await?;
        let index = QuestIndex::build(&quests);
        debug!("Indexed {} of {} active quests", index.len(), quests.len());

        let filter = LogFilter {
            addresses: index.addresses(),
            topic0: vec![transfer_topic()],
        };
        Ok((filter, index))
    }

    async fn handle(&self, index: &QuestIndex, log: &RawLog) -> Result<EventOutcome> {
        let Some(quest) = index.lookup(&log.address) else {
            return Ok(EventOutcome::Skipped(SkipReason::UnknownContract));
        };

        // (from, to, matched)
        let decoded = if quest.quest_type.is_erc20() {
            decode_erc20_transfer(log).map(|t| {
                let matched = erc20_matches(&quest.expectation, &t);
                (t.from, t.to, matched)
            })
        } else {
            decode_nft_transfer(log).map(|t| {
                let matched = nft_matches(&quest.expectation, &t);
                (t.from, t.to, matched)
            })
        };

        let Some((from, to, matched)) = decoded else {
            return Ok(EventOutcome::Skipped(SkipReason::Undecodable));
        };
        if !matched {
            return Ok(EventOutcome::Mismatch);
        }

        let wallet = if quest.quest_type.is_send() { from } else { to };

        match self
            .state_machine
            .advance(quest.quest_id, &wallet, QuestStatus::InProgress, QuestStatus::Claim)
            .await
        {
            Ok(user_id) => {
                info!(
                    quest_id = %quest.quest_id,
                    user_id = %user_id,
                    block = log.block_number,
                    tx_hash = %log.transaction_hash,
                    "Quest condition met, ready to claim"
                );
                Ok(EventOutcome::Advanced)
            }
            Err(e) if e.is_not_found() => Ok(EventOutcome::Skipped(SkipReason::UserNotFound)),
            Err(e) => Err(e),
        }
    }
}
