use quest_indexer::config::Config;
use quest_indexer::db::{create_pool, run_migrations};
use quest_indexer::indexer::spawn_pipelines;
use quest_indexer::store::{PgStore, QuestStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = Config::from_env()?;
    quest_indexer::init_tracing(config.log_format);

    tracing::info!("Starting quest indexer service");

    // Setup database
    let db = create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connected");

    // Run migrations
    run_migrations(&db).await?;
    tracing::info!("Migrations completed");

    let store: Arc<dyn QuestStore> = Arc::new(PgStore::new(db));
    let handles = spawn_pipelines(&config, store)?;
    tracing::info!("Started {} pipelines", handles.len());

    // Pipelines run until the process is stopped
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    for handle in handles {
        handle.abort();
    }

    Ok(())
}
