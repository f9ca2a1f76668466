use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::db::models::QuestStatus;
use crate::error::{QuestError, Result};
use crate::store::{QuestStore, StoreTx};

/// Forward-only quest status transitions guarded by compare-and-swap.
///
/// Every transition is a single conditional update on the current status;
/// zero affected rows means another writer got there first, or the row was
/// never in the expected state.
#[derive(Clone)]
pub struct QuestStateMachine {
    store: Arc<dyn QuestStore>,
}

impl QuestStateMachine {
    pub fn new(store: Arc<dyn QuestStore>) -> Self {
        Self { store }
    }

    /// Runs the transition in its own transaction. Returns the user id.
    pub async fn advance(
        &self,
        quest_id: Uuid,
        wallet_address: &str,
        from: QuestStatus,
        to: QuestStatus,
    ) -> Result<Uuid> {
        let mut tx = self.store.begin().await?;
        let user_id = Self::advance_in(tx.as_mut(), quest_id, wallet_address, from, to).await?;
        tx.commit().await?;
        Ok(user_id)
    }

    /// Runs the transition inside a caller-managed transaction.
    pub async fn advance_in(
        tx: &mut dyn StoreTx,
        quest_id: Uuid,
        wallet_address: &str,
        from: QuestStatus,
        to: QuestStatus,
    ) -> Result<Uuid> {
        if !from.can_advance_to(to) {
            return Err(QuestError::InvalidTransition { from, to });
        }

        let user = tx
            .find_user_by_wallet(wallet_address)
            .await?
            .ok_or_else(|| QuestError::UserNotFound(wallet_address.to_string()))?;

        let rows = tx.update_quest_status(quest_id, user.id, from, to).await?;
        if rows == 0 {
            return Err(QuestError::OptimisticLockConflict {
                entity: "user_quest",
                detail: format!(
                    "quest {} for user {} is not in status {}",
                    quest_id, user.id, from
                ),
            });
        }

        debug!(
            quest_id = %quest_id,
            user_id = %user.id,
            "Quest status {} -> {}",
            from,
            to
        );
        Ok(user.id)
    }
}
