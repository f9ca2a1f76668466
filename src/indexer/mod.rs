pub mod cursor;
pub mod decoder;
pub mod event_fetcher;
pub mod handlers;
pub mod matcher;
pub mod metrics;
pub mod types;
pub mod validator;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::clients::{ChainProvider, EvmRpcClient};
use crate::config::{Config, PipelineConfig};
use crate::error::Result;
use crate::store::QuestStore;
use cursor::CursorManager;
use event_fetcher::{plan_range, EventFetcher, ScanRange};
use handlers::{ClaimHandler, LogHandler, QuestActionHandler};
use types::{EventOutcome, SkipReason};

/// Tally of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Scanned range, `None` when the cursor was already at the tip.
    pub range: Option<ScanRange>,
    pub head: u64,
    pub fetched: usize,
    pub processed: usize,
    pub skipped: usize,
    pub mismatched: usize,
    pub failed: usize,
    /// Cursor after the cycle.
    pub cursor: u64,
}

/// One ingestion pipeline: cursor, scanner and a log handler driven by a
/// sequential polling loop.
pub struct Indexer<H: LogHandler> {
    handler: H,
    event_fetcher: EventFetcher,
    cursor_manager: CursorManager,
    poll_interval: Duration,
}

impl<H: LogHandler> Indexer<H> {
    pub fn new(
        handler: H,
        provider: Arc<dyn ChainProvider>,
        store: Arc<dyn QuestStore>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            handler,
            event_fetcher: EventFetcher::new(
                provider,
                config.max_blocks_per_batch,
                config.rpc_timeout,
            ),
            cursor_manager: CursorManager::new(store, config.network, config.start_block),
            poll_interval: config.poll_interval,
        }
    }

    pub fn name(&self) -> &'static str {
        self.handler.name()
    }

    /// Runs cycles forever. The next cycle starts one poll interval after
    /// the previous one finished, whatever its result.
    pub async fn start(&self) {
        let pipeline = self.name();
        info!(
            pipeline,
            network = %self.cursor_manager.network(),
            "Starting indexer pipeline"
        );

        loop {
            let started = Instant::now();

            match self.run_cycle().await {
                Ok(report) => {
                    self::metrics::record_cycle(pipeline, &report, started.elapsed());
                    if report.fetched > 0 {
                        info!(
                            pipeline,
                            processed = report.processed,
                            skipped = report.skipped,
                            mismatched = report.mismatched,
                            failed = report.failed,
                            cursor = report.cursor,
                            "Processed {} logs",
                            report.fetched
                        );
                    }
                }
                Err(e) => {
                    self::metrics::record_cycle_error(pipeline, started.elapsed());
                    error!(pipeline, "Indexer cycle failed: {}", e);
                    // Continue processing on next tick
                }
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Scans one capped range past the cursor and processes its logs.
    ///
    /// Provider and store failures abort the cycle before the final cursor
    /// save. Handler errors and failed mid-batch cursor saves are logged per
    /// log and never abort the batch.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let pipeline = self.name();
        let cursor = self.cursor_manager.load_cursor().await?;
        let head = self.event_fetcher.head_block().await?;

        let mut report = CycleReport {
            head,
            cursor,
            ..Default::default()
        };

        let Some(range) = plan_range(cursor, head, self.event_fetcher.max_batch()) else {
            debug!(pipeline, cursor, head, "At chain tip, nothing to scan");
            return Ok(report);
        };
        report.range = Some(range);

        let (filter, snapshot) = self.handler.prepare().await?;
        let logs = self
            .event_fetcher
            .fetch_logs(&filter, range.from, range.to)
            .await?;
        report.fetched = logs.len();

        let mut last_seen = cursor;
        for log in &logs {
            match self.handler.handle(&snapshot, log).await {
                Ok(outcome) => {
                    match outcome {
                        EventOutcome::Advanced => report.processed += 1,
                        EventOutcome::Mismatch => report.mismatched += 1,
                        EventOutcome::Skipped(reason) => {
                            report.skipped += 1;
                            if reason != SkipReason::UnknownContract {
                                debug!(
                                    pipeline,
                                    block = log.block_number,
                                    tx_hash = %log.transaction_hash,
                                    log_index = log.log_index,
                                    reason = %reason,
                                    "Skipped log"
                                );
                            }
                        }
                    }

                    if log.block_number != last_seen {
                        match self.cursor_manager.save_cursor(log.block_number).await {
                            Ok(()) => last_seen = log.block_number,
                            // the end-of-range save below still has to succeed
                            Err(e) => warn!(
                                pipeline,
                                block = log.block_number,
                                "Failed to save mid-batch cursor: {}",
                                e
                            ),
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        pipeline,
                        block = log.block_number,
                        tx_hash = %log.transaction_hash,
                        log_index = log.log_index,
                        "Failed to process log: {}",
                        e
                    );
                    // Continue processing other logs
                }
            }
        }

        // forward progress even for empty ranges
        self.cursor_manager.save_cursor(range.to).await?;
        report.cursor = range.to;

        Ok(report)
    }
}

pub fn quest_action_indexer(
    config: &PipelineConfig,
    store: Arc<dyn QuestStore>,
) -> anyhow::Result<Indexer<QuestActionHandler>> {
    let provider = EvmRpcClient::new(config.rpc_url.clone(), config.rpc_timeout)?;
    Ok(Indexer::new(
        QuestActionHandler::new(store.clone()),
        Arc::new(provider),
        store,
        config,
    ))
}

pub fn claim_indexer(
    config: &PipelineConfig,
    claimer_address: &str,
    store: Arc<dyn QuestStore>,
) -> anyhow::Result<Indexer<ClaimHandler>> {
    let provider = EvmRpcClient::new(config.rpc_url.clone(), config.rpc_timeout)?;
    Ok(Indexer::new(
        ClaimHandler::new(store.clone(), claimer_address),
        Arc::new(provider),
        store,
        config,
    ))
}

/// Spawns both ingestion pipelines as independent background tasks.
pub fn spawn_pipelines(
    config: &Config,
    store: Arc<dyn QuestStore>,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let quests = quest_action_indexer(&config.quest_pipeline(), store.clone())?;
    let claims = claim_indexer(
        &config.claim_pipeline(),
        &config.claimer_contract_address,
        store,
    )?;

    Ok(vec![
        tokio::spawn(async move { quests.start().await }),
        tokio::spawn(async move { claims.start().await }),
    ])
}
