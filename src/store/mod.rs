//! Persistence seams for the ingestion core.
//!
//! Every component talks to storage through [`QuestStore`] and the
//! transactional [`StoreTx`] unit of work, so the same code runs against
//! Postgres ([`postgres::PgStore`]) and the in-process [`memory::MemoryStore`].
//!
//! Status and balance writes are conditional: they return the number of rows
//! affected and callers turn a zero into an optimistic lock conflict.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::models::{
    BalanceStats, Network, NewClaimRecord, QuestDefinition, QuestStatus, RankedBalance, User,
    UserQuest,
};
use crate::error::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait QuestStore: Send + Sync {
    /// Last processed block for `network`, `None` before the first cycle.
    async fn load_cursor(&self, network: Network) -> Result<Option<u64>>;

    /// Insert-or-update. Never moves an existing cursor backwards.
    async fn upsert_cursor(&self, network: Network, block: u64) -> Result<()>;

    /// Non-deleted quests, oldest first.
    async fn active_quests(&self) -> Result<Vec<QuestDefinition>>;

    async fn begin(&self) -> Result<Box<dyn StoreTx>>;

    /// Non-deleted users ranked by balance descending, user id ascending.
    async fn ranked_balances(&self, limit: usize) -> Result<Vec<RankedBalance>>;

    async fn balance_stats(&self) -> Result<BalanceStats>;
}

/// A unit of work. Dropping it without [`StoreTx::commit`] rolls back.
#[async_trait]
pub trait StoreTx: Send {
    /// Case-insensitive wallet match against non-deleted users.
    async fn find_user_by_wallet(&mut self, wallet: &str) -> Result<Option<User>>;

    async fn find_user_quest(
        &mut self,
        user_id: Uuid,
        quest_id: Uuid,
        status: QuestStatus,
    ) -> Result<Option<UserQuest>>;

    /// `SET status = to WHERE quest_id AND user_id AND status = from`.
    async fn update_quest_status(
        &mut self,
        quest_id: Uuid,
        user_id: Uuid,
        from: QuestStatus,
        to: QuestStatus,
    ) -> Result<u64>;

    async fn insert_claim(&mut self, record: &NewClaimRecord) -> Result<()>;

    async fn balance(&mut self, user_id: Uuid) -> Result<Option<String>>;

    /// Creates the balance row. Returns 0 when a row already exists.
    async fn insert_balance(&mut self, user_id: Uuid, balance: &str) -> Result<u64>;

    /// `SET balance = new WHERE user_id AND balance = expected`.
    async fn update_balance(&mut self, user_id: Uuid, expected: &str, new: &str) -> Result<u64>;

    async fn commit(&mut self) -> Result<()>;
}

/// Canonical form for contract and wallet addresses.
pub fn canonical_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}
