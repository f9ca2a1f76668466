use std::sync::Arc;

use async_trait::async_trait;
use num_bigint::BigUint;
use tracing::{info, warn};
use uuid::Uuid;

use super::LogHandler;
use crate::clients::LogFilter;
use crate::constants::indexer::PIPELINE_CLAIMS;
use crate::db::models::{NewClaimRecord, QuestStatus};
use crate::error::{QuestError, Result};
use crate::indexer::decoder::{claimed_topic, decode_claimed};
use crate::indexer::types::{ClaimedEvent, EventOutcome, RawLog, SkipReason};
use crate::services::quest_state::QuestStateMachine;
use crate::store::{canonical_address, QuestStore, StoreTx};

/// Reconciles claimer `Claimed` events: completes the quest, records the
/// claim and credits the user's balance in one transaction.
pub struct ClaimHandler {
    store: Arc<dyn QuestStore>,
    claimer_address: String,
}

impl ClaimHandler {
    pub fn new(store: Arc<dyn QuestStore>, claimer_address: &str) -> Self {
        Self {
            store,
            claimer_address: canonical_address(claimer_address),
        }
    }

    pub async fn reconcile(&self, claim: &ClaimedEvent, tx_hash: &str) -> Result<EventOutcome> {
        let mut tx = self.store.begin().await?;

        let Some(user) = tx.find_user_by_wallet(&claim.user).await? else {
            warn!(wallet = %claim.user, quest_id = %claim.quest_id, "Claim for unknown user");
            return Ok(EventOutcome::Skipped(SkipReason::UserNotFound));
        };

        if tx
            .find_user_quest(user.id, claim.quest_id, QuestStatus::Claim)
            .await?
            .is_none()
        {
            warn!(
                user_id = %user.id,
                quest_id = %claim.quest_id,
                "Claim for quest not awaiting claim"
            );
            return Ok(EventOutcome::Skipped(SkipReason::QuestNotInClaim));
        }

        QuestStateMachine::advance_in(
            tx.as_mut(),
            claim.quest_id,
            &claim.user,
            QuestStatus::Claim,
            QuestStatus::Completed,
        )
        .await?;

        let amount = claim.amount.to_string();
        let timestamp = claim
            .timestamp
            .to_string()
            .parse::<i64>()
            .map_err(|_| QuestError::Decode(format!("claim timestamp {} out of range", claim.timestamp)))?;

        tx.insert_claim(&NewClaimRecord {
            user_id: user.id,
            quest_id: claim.quest_id,
            amount: amount.clone(),
            token: claim.token.clone(),
            timestamp,
            tx_hash: tx_hash.to_string(),
        })
        .await?;

        let balance = credit_balance(tx.as_mut(), user.id, &amount).await?;
        tx.commit().await?;

        info!(
            user_id = %user.id,
            quest_id = %claim.quest_id,
            amount = %amount,
            balance = %balance,
            tx_hash = %tx_hash,
            "Claim reconciled"
        );
        Ok(EventOutcome::Advanced)
    }
}

/// Adds `amount` to the user's balance with a compare-and-swap on the value
/// read. Returns the new balance.
pub async fn credit_balance(tx: &mut dyn StoreTx, user_id: Uuid, amount: &str) -> Result<String> {
    let amount: BigUint = amount
        .parse()
        .map_err(|_| QuestError::Decode(format!("invalid claim amount {}", amount)))?;

    let conflict = |detail: String| QuestError::OptimisticLockConflict {
        entity: "user_balance",
        detail,
    };

    match tx.balance(user_id).await? {
        None => {
            let new = amount.to_string();
            if tx.insert_balance(user_id, &new).await? == 0 {
                return Err(conflict(format!("balance row for {} created concurrently", user_id)));
            }
            Ok(new)
        }
        Some(current) => {
            let previous: BigUint = current.parse().map_err(|_| {
                QuestError::Internal(format!("stored balance {:?} for {} is not an integer", current, user_id))
            })?;
            let new = (previous + amount).to_string();
            if tx.update_balance(user_id, &current, &new).await? == 0 {
                return Err(conflict(format!(
                    "balance for {} changed from {} during credit",
                    user_id, current
                )));
            }
            Ok(new)
        }
    }
}

#[async_trait]
impl LogHandler for ClaimHandler {
    type Snapshot = ();

    fn name(&self) -> &'static str {
        PIPELINE_CLAIMS
    }

    async fn prepare(&self) -> Result<(LogFilter, ())> {
        let filter = LogFilter {
            addresses: vec![self.claimer_address.clone()],
            topic0: vec![claimed_topic()],
        };
        Ok((filter, ()))
    }

    async fn handle(&self, _: &(), log: &RawLog) -> Result<EventOutcome> {
        if log.address != self.claimer_address {
            return Ok(EventOutcome::Skipped(SkipReason::UnknownContract));
        }

        let Some(claim) = decode_claimed(log) else {
            return Ok(EventOutcome::Skipped(SkipReason::Undecodable));
        };

        self.reconcile(&claim, &log.transaction_hash).await
    }
}
