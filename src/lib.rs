pub mod api;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod indexer;
pub mod services;
pub mod store;

use config::LogFormat;

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quest_indexer=info,tower_http=info".into());

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}
