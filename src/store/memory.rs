//! In-process [`QuestStore`] used by tests and local runs.
//!
//! Writes apply immediately under a mutex and are journaled; an uncommitted
//! transaction replays its journal backwards when dropped. Conditional
//! updates are evaluated against live state, so two concurrent transactions
//! race exactly like two database sessions do under read-committed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use num_bigint::BigUint;
use num_traits::Zero;
use uuid::Uuid;

use super::{canonical_address, QuestStore, StoreTx};
use crate::db::models::{
    BalanceStats, Network, NewClaimRecord, QuestDefinition, QuestStatus, QuestType, RankedBalance,
    User, UserQuest,
};
use crate::error::Result;

#[derive(Debug, Clone)]
struct MemoryUser {
    id: Uuid,
    wallet_address: String,
    deleted: bool,
}

#[derive(Debug, Clone)]
struct MemoryQuest {
    definition: QuestDefinition,
    deleted: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    cursors: HashMap<Network, u64>,
    users: Vec<MemoryUser>,
    quests: Vec<MemoryQuest>,
    user_quests: HashMap<(Uuid, Uuid), (Uuid, QuestStatus)>,
    balances: HashMap<Uuid, String>,
    claims: Vec<NewClaimRecord>,
}

enum Undo {
    Status { key: (Uuid, Uuid), previous: QuestStatus },
    Balance { user_id: Uuid, previous: Option<String> },
    Claim(NewClaimRecord),
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_user(&self, wallet_address: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state().users.push(MemoryUser {
            id,
            wallet_address: wallet_address.to_string(),
            deleted: false,
        });
        id
    }

    pub fn delete_user(&self, user_id: Uuid) {
        if let Some(user) = self.state().users.iter_mut().find(|u| u.id == user_id) {
            user.deleted = true;
        }
    }

    pub fn add_quest(
        &self,
        quest_type: QuestType,
        contract_address: &str,
        from_address: Option<&str>,
        to_address: Option<&str>,
        amount: Option<&str>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.state().quests.push(MemoryQuest {
            definition: QuestDefinition {
                id,
                quest_type,
                contract_address: contract_address.to_string(),
                from_address: from_address.map(str::to_string),
                to_address: to_address.map(str::to_string),
                amount: amount.map(str::to_string),
                created_at: Utc::now(),
            },
            deleted: false,
        });
        id
    }

    pub fn delete_quest(&self, quest_id: Uuid) {
        if let Some(quest) = self
            .state()
            .quests
            .iter_mut()
            .find(|q| q.definition.id == quest_id)
        {
            quest.deleted = true;
        }
    }

    /// Quest-start action: creates the user-quest row in `in_progress`.
    pub fn start_quest(&self, user_id: Uuid, quest_id: Uuid) {
        self.state()
            .user_quests
            .entry((user_id, quest_id))
            .or_insert((Uuid::new_v4(), QuestStatus::InProgress));
    }

    pub fn set_balance(&self, user_id: Uuid, balance: &str) {
        self.state().balances.insert(user_id, balance.to_string());
    }

    pub fn quest_status(&self, user_id: Uuid, quest_id: Uuid) -> Option<QuestStatus> {
        self.state()
            .user_quests
            .get(&(user_id, quest_id))
            .map(|(_, status)| *status)
    }

    pub fn user_balance(&self, user_id: Uuid) -> Option<String> {
        self.state().balances.get(&user_id).cloned()
    }

    pub fn claims(&self) -> Vec<NewClaimRecord> {
        self.state().claims.clone()
    }

    pub fn cursor(&self, network: Network) -> Option<u64> {
        self.state().cursors.get(&network).copied()
    }
}

fn parse_balance(balance: &str) -> BigUint {
    balance.parse::<BigUint>().unwrap_or_else(|_| BigUint::zero())
}

#[async_trait]
impl QuestStore for MemoryStore {
    async fn load_cursor(&self, network: Network) -> Result<Option<u64>> {
        Ok(self.cursor(network))
    }

    async fn upsert_cursor(&self, network: Network, block: u64) -> Result<()> {
        let mut state = self.state();
        let cursor = state.cursors.entry(network).or_insert(block);
        *cursor = (*cursor).max(block);
        Ok(())
    }

    async fn active_quests(&self) -> Result<Vec<QuestDefinition>> {
        Ok(self
            .state()
            .quests
            .iter()
            .filter(|q| !q.deleted)
            .map(|q| q.definition.clone())
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            state: self.state.clone(),
            undo: Vec::new(),
            finished: false,
        }))
    }

    async fn ranked_balances(&self, limit: usize) -> Result<Vec<RankedBalance>> {
        let state = self.state();
        let mut ranked: Vec<(BigUint, RankedBalance)> = state
            .users
            .iter()
            .filter(|u| !u.deleted)
            .map(|u| {
                let balance = state
                    .balances
                    .get(&u.id)
                    .cloned()
                    .unwrap_or_else(|| "0".to_string());
                (
                    parse_balance(&balance),
                    RankedBalance {
                        user_id: u.id,
                        wallet_address: u.wallet_address.clone(),
                        balance,
                    },
                )
            })
            .collect();

        ranked.sort_by(|(a, ra), (b, rb)| b.cmp(a).then_with(|| ra.user_id.cmp(&rb.user_id)));

        Ok(ranked.into_iter().take(limit).map(|(_, r)| r).collect())
    }

    async fn balance_stats(&self) -> Result<BalanceStats> {
        let state = self.state();
        let live: Vec<&MemoryUser> = state.users.iter().filter(|u| !u.deleted).collect();
        let total: BigUint = live
            .iter()
            .filter_map(|u| state.balances.get(&u.id))
            .map(|b| parse_balance(b))
            .sum();
        let average = if live.is_empty() {
            BigUint::zero()
        } else {
            &total / BigUint::from(live.len())
        };

        Ok(BalanceStats {
            total_users: live.len() as i64,
            total_balance: total.to_string(),
            average_balance: average.to_string(),
        })
    }
}

pub struct MemoryTx {
    state: Arc<Mutex<MemoryState>>,
    undo: Vec<Undo>,
    finished: bool,
}

impl MemoryTx {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_user_by_wallet(&mut self, wallet: &str) -> Result<Option<User>> {
        let wallet = canonical_address(wallet);
        Ok(self
            .state()
            .users
            .iter()
            .find(|u| !u.deleted && canonical_address(&u.wallet_address) == wallet)
            .map(|u| User {
                id: u.id,
                wallet_address: u.wallet_address.clone(),
            }))
    }

    async fn find_user_quest(
        &mut self,
        user_id: Uuid,
        quest_id: Uuid,
        status: QuestStatus,
    ) -> Result<Option<UserQuest>> {
        Ok(self
            .state()
            .user_quests
            .get(&(user_id, quest_id))
            .filter(|(_, current)| *current == status)
            .map(|(id, current)| UserQuest {
                id: *id,
                user_id,
                quest_id,
                status: *current,
            }))
    }

    async fn update_quest_status(
        &mut self,
        quest_id: Uuid,
        user_id: Uuid,
        from: QuestStatus,
        to: QuestStatus,
    ) -> Result<u64> {
        let key = (user_id, quest_id);
        let updated = {
            let mut state = self.state();
            match state.user_quests.get_mut(&key) {
                Some((_, status)) if *status == from => {
                    *status = to;
                    true
                }
                _ => false,
            }
        };

        if !updated {
            return Ok(0);
        }
        self.undo.push(Undo::Status { key, previous: from });
        Ok(1)
    }

    async fn insert_claim(&mut self, record: &NewClaimRecord) -> Result<()> {
        self.state().claims.push(record.clone());
        self.undo.push(Undo::Claim(record.clone()));
        Ok(())
    }

    async fn balance(&mut self, user_id: Uuid) -> Result<Option<String>> {
        Ok(self.state().balances.get(&user_id).cloned())
    }

    async fn insert_balance(&mut self, user_id: Uuid, balance: &str) -> Result<u64> {
        let inserted = {
            let mut state = self.state();
            if state.balances.contains_key(&user_id) {
                false
            } else {
                state.balances.insert(user_id, balance.to_string());
                true
            }
        };

        if !inserted {
            return Ok(0);
        }
        self.undo.push(Undo::Balance { user_id, previous: None });
        Ok(1)
    }

    async fn update_balance(&mut self, user_id: Uuid, expected: &str, new: &str) -> Result<u64> {
        let updated = {
            let mut state = self.state();
            match state.balances.get_mut(&user_id) {
                Some(current) if current == expected => {
                    *current = new.to_string();
                    true
                }
                _ => false,
            }
        };

        if !updated {
            return Ok(0);
        }
        self.undo.push(Undo::Balance {
            user_id,
            previous: Some(expected.to_string()),
        });
        Ok(1)
    }

    async fn commit(&mut self) -> Result<()> {
        self.undo.clear();
        self.finished = true;
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.finished || self.undo.is_empty() {
            return;
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for undo in self.undo.drain(..).rev() {
            match undo {
                Undo::Status { key, previous } => {
                    if let Some((_, status)) = state.user_quests.get_mut(&key) {
                        *status = previous;
                    }
                }
                Undo::Balance { user_id, previous } => match previous {
                    Some(balance) => {
                        state.balances.insert(user_id, balance);
                    }
                    None => {
                        state.balances.remove(&user_id);
                    }
                },
                Undo::Claim(record) => {
                    if let Some(pos) = state.claims.iter().rposition(|c| *c == record) {
                        state.claims.remove(pos);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cursor_never_moves_backwards() {
        let store = MemoryStore::new();
        store.upsert_cursor(Network::Arbitrum, 100).await.unwrap();
        store.upsert_cursor(Network::Arbitrum, 90).await.unwrap();
        assert_eq!(store.load_cursor(Network::Arbitrum).await.unwrap(), Some(100));
        assert_eq!(store.load_cursor(Network::Zetachain).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_uncommitted_tx_rolls_back() {
        let store = MemoryStore::new();
        let user = store.add_user("0xAbC");
        let quest = store.add_quest(QuestType::SendErc20, "0xtoken", None, None, None);
        store.start_quest(user, quest);
        store.set_balance(user, "10");

        {
            let mut tx = store.begin().await.unwrap();
            let n = tx
                .update_quest_status(quest, user, QuestStatus::InProgress, QuestStatus::Claim)
                .await
                .unwrap();
            assert_eq!(n, 1);
            assert_eq!(tx.update_balance(user, "10", "15").await.unwrap(), 1);
        }

        assert_eq!(store.quest_status(user, quest), Some(QuestStatus::InProgress));
        assert_eq!(store.user_balance(user).as_deref(), Some("10"));
    }

    #[tokio::test]
    async fn test_committed_tx_persists() {
        let store = MemoryStore::new();
        let user = store.add_user("0xabc");

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.insert_balance(user, "7").await.unwrap(), 1);
        assert_eq!(tx.insert_balance(user, "8").await.unwrap(), 0);
        tx.commit().await.unwrap();
        drop(tx);

        assert_eq!(store.user_balance(user).as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_wallet_lookup_is_case_insensitive() {
        let store = MemoryStore::new();
        let user = store.add_user("0xAbCdEf");

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_user_by_wallet("0xABCDEF").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user));
    }

    #[tokio::test]
    async fn test_ranked_balances_order_and_tie_break() {
        let store = MemoryStore::new();
        let a = store.add_user("0xa");
        let b = store.add_user("0xb");
        let c = store.add_user("0xc");
        let deleted = store.add_user("0xd");
        store.set_balance(a, "5");
        store.set_balance(b, "100");
        store.set_balance(c, "5");
        store.set_balance(deleted, "1000");
        store.delete_user(deleted);

        let ranked = store.ranked_balances(10).await.unwrap();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].user_id, b);

        let (first, second) = if a < c { (a, c) } else { (c, a) };
        assert_eq!(ranked[1].user_id, first);
        assert_eq!(ranked[2].user_id, second);
    }

    #[tokio::test]
    async fn test_balance_stats() {
        let store = MemoryStore::new();
        let a = store.add_user("0xa");
        let _b = store.add_user("0xb");
        store.set_balance(a, "7");

        let stats = store.balance_stats().await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.total_balance, "7");
        assert_eq!(stats.average_balance, "3");
    }
}
