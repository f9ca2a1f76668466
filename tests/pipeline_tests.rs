mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use quest_indexer::db::models::{
    BalanceStats, Network, QuestDefinition, QuestStatus, QuestType, RankedBalance,
};
use quest_indexer::error::{QuestError, Result as StoreResult};
use quest_indexer::indexer::handlers::{ClaimHandler, QuestActionHandler};
use quest_indexer::indexer::Indexer;
use quest_indexer::services::QuestStateMachine;
use quest_indexer::store::{MemoryStore, QuestStore, StoreTx};

fn quest_indexer(
    store: &MemoryStore,
    provider: &Arc<ScriptedProvider>,
    start_block: u64,
) -> Indexer<QuestActionHandler> {
    let store = Arc::new(store.clone());
    Indexer::new(
        QuestActionHandler::new(store.clone()),
        provider.clone(),
        store,
        &pipeline(Network::Zetachain, start_block),
    )
}

fn claim_indexer(store: &MemoryStore, provider: &Arc<ScriptedProvider>) -> Indexer<ClaimHandler> {
    let store = Arc::new(store.clone());
    Indexer::new(
        ClaimHandler::new(store.clone(), CLAIMER),
        provider.clone(),
        store,
        &pipeline(Network::Arbitrum, 0),
    )
}

#[tokio::test]
async fn test_transfer_then_claim_completes_quest() {
    let store = MemoryStore::new();
    let alice = address(0xa1);
    let shop = address(0x5b);
    let user = store.add_user(&wallet(alice));
    let quest = store.add_quest(QuestType::SendErc20, TOKEN, None, Some(&wallet(shop)), Some("1000"));
    store.start_quest(user, quest);

    let zeta = Arc::new(ScriptedProvider::new(502));
    zeta.push_log(transfer_log(TOKEN, alice, shop, 1000, 500));
    let report = quest_indexer(&store, &zeta, 490).run_cycle().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(store.quest_status(user, quest), Some(QuestStatus::Claim));
    assert!(store.cursor(Network::Zetachain).unwrap() >= 500);

    let arb = Arc::new(ScriptedProvider::new(60));
    arb.push_log(claimed_log(&quest.to_string(), alice, 1000, 50, 0));
    let claims = claim_indexer(&store, &arb);
    let report = claims.run_cycle().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(store.quest_status(user, quest), Some(QuestStatus::Completed));
    assert_eq!(store.user_balance(user).as_deref(), Some("1000"));
    let records = store.claims();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].quest_id, quest);
    assert_eq!(records[0].amount, "1000");

    // a replayed claim must not credit twice
    arb.set_head(100);
    arb.push_log(claimed_log(&quest.to_string(), alice, 1000, 70, 0));
    let report = claims.run_cycle().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(store.user_balance(user).as_deref(), Some("1000"));
    assert_eq!(store.claims().len(), 1);
}

#[tokio::test]
async fn test_failed_log_does_not_abort_batch() {
    let store = MemoryStore::new();
    let alice = address(0xa1);
    let bob = address(0xb0);
    let shop = address(0x5b);
    let alice_id = store.add_user(&wallet(alice));
    let bob_id = store.add_user(&wallet(bob));
    let quest = store.add_quest(QuestType::SendErc20, TOKEN, None, Some(&wallet(shop)), None);
    store.start_quest(alice_id, quest);

    let provider = Arc::new(ScriptedProvider::new(20));
    // bob never started the quest, so the conditional update finds no row
    provider.push_log(transfer_log(TOKEN, bob, shop, 5, 10));
    provider.push_log(transfer_log(TOKEN, alice, shop, 5, 11));

    let report = quest_indexer(&store, &provider, 0).run_cycle().await.unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.cursor, 19);
    assert_eq!(store.quest_status(alice_id, quest), Some(QuestStatus::Claim));
    assert_eq!(store.quest_status(bob_id, quest), None);
    assert_eq!(store.cursor(Network::Zetachain), Some(19));
}

#[tokio::test]
async fn test_provider_failure_keeps_cursor() {
    let store = MemoryStore::new();
    let shop = address(0x5b);
    store.add_quest(QuestType::SendErc20, TOKEN, None, Some(&wallet(shop)), None);

    let provider = Arc::new(ScriptedProvider::new(50));
    provider.set_failing(true);
    let indexer = quest_indexer(&store, &provider, 0);

    assert!(indexer.run_cycle().await.is_err());
    assert_eq!(store.cursor(Network::Zetachain), None);

    provider.set_failing(false);
    let report = indexer.run_cycle().await.unwrap();
    assert_eq!(report.cursor, 49);
    assert_eq!(store.cursor(Network::Zetachain), Some(49));
}

#[tokio::test]
async fn test_idle_at_chain_tip() {
    let store = MemoryStore::new();
    store.add_quest(QuestType::ReceiveNft, TOKEN, None, None, None);

    let provider = Arc::new(ScriptedProvider::new(11));
    let report = quest_indexer(&store, &provider, 10).run_cycle().await.unwrap();

    assert_eq!(report.range, None);
    assert_eq!(report.cursor, 10);
    assert_eq!(provider.get_logs_calls(), 0);
    assert_eq!(store.cursor(Network::Zetachain), None);
}

#[tokio::test]
async fn test_cursor_advances_in_capped_batches() {
    let store = MemoryStore::new();
    store.add_quest(QuestType::ReceiveNft, TOKEN, None, None, None);

    let provider = Arc::new(ScriptedProvider::new(2_000));
    let indexer = quest_indexer(&store, &provider, 0);

    let mut previous = 0;
    for _ in 0..3 {
        let report = indexer.run_cycle().await.unwrap();
        let range = report.range.unwrap();
        assert_eq!(range.from, previous);
        assert_eq!(range.to - range.from, 500);
        assert!(report.cursor > previous);
        previous = report.cursor;
    }
    assert_eq!(store.cursor(Network::Zetachain), Some(1_500));
}

#[tokio::test]
async fn test_sequential_claims_accumulate() {
    let store = MemoryStore::new();
    let alice = address(0xa1);
    let user = store.add_user(&wallet(alice));
    let first = store.add_quest(QuestType::ReceiveErc20, TOKEN, None, None, None);
    let second = store.add_quest(QuestType::SendNft, TOKEN, None, None, None);

    let machine = QuestStateMachine::new(Arc::new(store.clone()));
    for quest in [first, second] {
        store.start_quest(user, quest);
        machine
            .advance(quest, &wallet(alice), QuestStatus::InProgress, QuestStatus::Claim)
            .await
            .unwrap();
    }

    let provider = Arc::new(ScriptedProvider::new(40));
    provider.push_log(claimed_log(&second.to_string(), alice, 2_500, 30, 1));
    provider.push_log(claimed_log(&first.to_string(), alice, 1_000, 30, 0));

    let report = claim_indexer(&store, &provider).run_cycle().await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(store.user_balance(user).as_deref(), Some("3500"));
    let records = store.claims();
    assert_eq!(records.len(), 2);
    // processed in (block, log index) order
    assert_eq!(records[0].quest_id, first);
    assert_eq!(records[1].quest_id, second);
}

#[tokio::test]
async fn test_polling_loop_keeps_running() {
    let store = MemoryStore::new();
    store.add_quest(QuestType::ReceiveNft, TOKEN, None, None, None);

    let provider = Arc::new(ScriptedProvider::new(100));
    provider.set_failing(true);
    let indexer = quest_indexer(&store, &provider, 0);

    let provider_switch = provider.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        provider_switch.set_failing(false);
    });

    // start() never returns; failed cycles must not stop it
    let stopped = tokio::time::timeout(Duration::from_millis(400), indexer.start()).await;
    assert!(stopped.is_err());
    assert_eq!(store.cursor(Network::Zetachain), Some(99));
}

#[tokio::test]
async fn test_deleted_quest_leaves_filter_next_cycle() {
    let store = MemoryStore::new();
    let alice = address(0xa1);
    let shop = address(0x5b);
    let user = store.add_user(&wallet(alice));
    let quest = store.add_quest(QuestType::SendErc20, TOKEN, None, Some(&wallet(shop)), None);
    store.start_quest(user, quest);

    let provider = Arc::new(ScriptedProvider::new(20));
    let indexer = quest_indexer(&store, &provider, 0);
    indexer.run_cycle().await.unwrap();
    assert_eq!(provider.get_logs_calls(), 1);

    store.delete_quest(quest);
    provider.set_head(40);
    provider.push_log(transfer_log(TOKEN, alice, shop, 5, 25));

    let report = indexer.run_cycle().await.unwrap();
    assert_eq!(report.fetched, 0);
    assert_eq!(report.cursor, 39);
    assert_eq!(provider.get_logs_calls(), 1);
    assert_eq!(store.quest_status(user, quest), Some(QuestStatus::InProgress));
}

#[tokio::test]
async fn test_new_quest_is_picked_up_next_cycle() {
    let store = MemoryStore::new();
    let alice = address(0xa1);
    let shop = address(0x5b);
    let user = store.add_user(&wallet(alice));

    let provider = Arc::new(ScriptedProvider::new(20));
    let indexer = quest_indexer(&store, &provider, 0);
    let report = indexer.run_cycle().await.unwrap();
    assert_eq!(report.fetched, 0);
    assert_eq!(provider.get_logs_calls(), 0);

    let quest = store.add_quest(QuestType::SendErc20, TOKEN, None, Some(&wallet(shop)), None);
    store.start_quest(user, quest);
    provider.set_head(40);
    provider.push_log(transfer_log(TOKEN, alice, shop, 5, 25));

    let report = indexer.run_cycle().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(store.quest_status(user, quest), Some(QuestStatus::Claim));
}

/// Cursor store that refuses to save one particular block.
struct FlakyCursorStore {
    inner: MemoryStore,
    fail_at: u64,
}

#[async_trait]
impl QuestStore for FlakyCursorStore {
    async fn load_cursor(&self, network: Network) -> StoreResult<Option<u64>> {
        self.inner.load_cursor(network).await
    }

    async fn upsert_cursor(&self, network: Network, block: u64) -> StoreResult<()> {
        if block == self.fail_at {
            return Err(QuestError::Internal("cursor table locked".to_string()));
        }
        self.inner.upsert_cursor(network, block).await
    }

    async fn active_quests(&self) -> StoreResult<Vec<QuestDefinition>> {
        self.inner.active_quests().await
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        self.inner.begin().await
    }

    async fn ranked_balances(&self, limit: usize) -> StoreResult<Vec<RankedBalance>> {
        self.inner.ranked_balances(limit).await
    }

    async fn balance_stats(&self) -> StoreResult<BalanceStats> {
        self.inner.balance_stats().await
    }
}

#[tokio::test]
async fn test_failed_mid_batch_cursor_save_continues_batch() {
    let store = MemoryStore::new();
    let alice = address(0xa1);
    let bob = address(0xb0);
    let shop = address(0x5b);
    let alice_id = store.add_user(&wallet(alice));
    let bob_id = store.add_user(&wallet(bob));
    let quest = store.add_quest(QuestType::SendErc20, TOKEN, None, Some(&wallet(shop)), None);
    store.start_quest(alice_id, quest);
    store.start_quest(bob_id, quest);

    let provider = Arc::new(ScriptedProvider::new(20));
    provider.push_log(transfer_log(TOKEN, alice, shop, 5, 10));
    provider.push_log(transfer_log(TOKEN, bob, shop, 5, 11));

    let cursor_store = Arc::new(FlakyCursorStore {
        inner: store.clone(),
        fail_at: 10,
    });
    let indexer = Indexer::new(
        QuestActionHandler::new(Arc::new(store.clone())),
        provider.clone(),
        cursor_store,
        &pipeline(Network::Zetachain, 0),
    );

    let report = indexer.run_cycle().await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.cursor, 19);
    assert_eq!(store.quest_status(bob_id, quest), Some(QuestStatus::Claim));
    assert_eq!(store.cursor(Network::Zetachain), Some(19));
}
