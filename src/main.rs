use quest_indexer::api::{self, AppState};
use quest_indexer::clients::GolemEntityClient;
use quest_indexer::config::Config;
use quest_indexer::db::{create_pool, run_migrations};
use quest_indexer::indexer::spawn_pipelines;
use quest_indexer::services::LeaderboardCache;
use quest_indexer::store::{PgStore, QuestStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = Config::from_env()?;
    quest_indexer::init_tracing(config.log_format);

    info!("Starting quest indexer API...");

    // Setup database
    let db = create_pool(&config.database_url, config.db_max_connections).await?;
    info!("Database connected");

    // Run migrations
    run_migrations(&db).await?;
    info!("Migrations completed");

    let store: Arc<dyn QuestStore> = Arc::new(PgStore::new(db));

    let entities = GolemEntityClient::new(
        &config.entity_store_rpc_url,
        &config.entity_store_relay_url,
        Duration::from_secs(config.rpc_timeout_secs),
    )?;
    let leaderboard = Arc::new(LeaderboardCache::new(
        store.clone(),
        Arc::new(entities),
        config.leaderboard_btl_blocks,
        config.leaderboard_top_k,
    ));

    // Start ingestion pipelines (if enabled)
    if config.enable_indexer {
        info!("Indexer is ENABLED in API server");
        spawn_pipelines(&config, store.clone())?;
    } else {
        info!("Indexer is DISABLED - run quest-indexer binary separately");
    }

    let state = Arc::new(AppState { leaderboard });
    let app = api::router(state, &config.cors_origins);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
