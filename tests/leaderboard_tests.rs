use std::sync::Arc;

use quest_indexer::clients::MemoryEntityStore;
use quest_indexer::services::LeaderboardCache;
use quest_indexer::store::MemoryStore;
use uuid::Uuid;

fn cache(store: &MemoryStore, entities: &Arc<MemoryEntityStore>) -> LeaderboardCache {
    LeaderboardCache::new(Arc::new(store.clone()), entities.clone(), 30, 25)
}

/// Users with balances 1..=n, returned lowest balance first.
fn seed_users(store: &MemoryStore, n: usize) -> Vec<Uuid> {
    (1..=n)
        .map(|i| {
            let user = store.add_user(&format!("0x{:040x}", i));
            store.set_balance(user, &(i * 100).to_string());
            user
        })
        .collect()
}

#[tokio::test]
async fn test_cached_snapshot_is_reused_until_forced() {
    let store = MemoryStore::new();
    seed_users(&store, 3);
    let entities = Arc::new(MemoryEntityStore::new(1_000));
    let cache = cache(&store, &entities);

    let first = cache.get(false).await.unwrap();
    let second = cache.get(false).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(entities.len(), 1);

    let forced = cache.get(true).await.unwrap();
    assert_ne!(forced.last_calculated, first.last_calculated);
    assert_eq!(entities.len(), 2);

    // the newest snapshot wins on the next read
    assert_eq!(cache.get(false).await.unwrap(), forced);
}

#[tokio::test]
async fn test_ranking_is_capped_at_top_k() {
    let store = MemoryStore::new();
    let users = seed_users(&store, 26);
    let entities = Arc::new(MemoryEntityStore::new(1));
    let cache = cache(&store, &entities);

    let snapshot = cache.get(false).await.unwrap();
    assert_eq!(snapshot.entries.len(), 25);
    assert_eq!(snapshot.total_users, 25);
    assert_eq!(snapshot.entries[0].user_id, users[25]);
    assert_eq!(snapshot.entries[0].balance, "2600");

    let top = cache.user_position(users[25]).await.unwrap().unwrap();
    assert_eq!(top.rank, 1);
    assert_eq!(top.balance, "2600");

    let last = cache.user_position(users[1]).await.unwrap().unwrap();
    assert_eq!(last.rank, 25);

    assert_eq!(cache.user_position(users[0]).await.unwrap(), None);
    assert_eq!(cache.user_position(Uuid::new_v4()).await.unwrap(), None);
}

#[tokio::test]
async fn test_equal_balances_rank_by_user_id() {
    let store = MemoryStore::new();
    let a = store.add_user("0xa");
    let b = store.add_user("0xb");
    store.set_balance(a, "500");
    store.set_balance(b, "500");

    let entities = Arc::new(MemoryEntityStore::new(1));
    let snapshot = cache(&store, &entities).refresh().await.unwrap();

    let expected: Vec<Uuid> = if a < b { vec![a, b] } else { vec![b, a] };
    let actual: Vec<Uuid> = snapshot.entries.iter().map(|e| e.user_id).collect();
    assert_eq!(actual, expected);
    assert_eq!(snapshot.entries[1].rank, 2);
}

#[tokio::test]
async fn test_cleanup_deletes_only_expired() {
    let store = MemoryStore::new();
    seed_users(&store, 2);
    let entities = Arc::new(MemoryEntityStore::new(100));
    let cache = cache(&store, &entities);

    cache.refresh().await.unwrap(); // expires at 130
    entities.set_block_number(120);
    cache.refresh().await.unwrap(); // expires at 150

    assert_eq!(cache.cleanup().await.unwrap(), 0);

    entities.set_block_number(131);
    assert_eq!(cache.cleanup().await.unwrap(), 1);
    assert_eq!(entities.len(), 1);

    entities.advance_blocks(100);
    assert_eq!(cache.cleanup().await.unwrap(), 1);
    assert!(entities.is_empty());
    assert_eq!(cache.cleanup().await.unwrap(), 0);
}

#[tokio::test]
async fn test_stats_cover_all_users() {
    let store = MemoryStore::new();
    seed_users(&store, 4);
    let entities = Arc::new(MemoryEntityStore::new(1));

    let stats = cache(&store, &entities).stats().await.unwrap();
    assert_eq!(stats.total_users, 4);
    assert_eq!(stats.total_balance, "1000");
    assert_eq!(stats.average_balance, "250");
}
