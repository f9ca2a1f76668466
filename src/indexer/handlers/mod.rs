pub mod claim;
pub mod quest_action;

use async_trait::async_trait;

use crate::clients::LogFilter;
use crate::error::Result;
use crate::indexer::types::{EventOutcome, RawLog};

pub use claim::ClaimHandler;
pub use quest_action::QuestActionHandler;

/// Per-pipeline log processing.
///
/// `prepare` runs once per cycle and captures whatever registry state the
/// cycle works against; `handle` sees that same snapshot for every log.
#[async_trait]
pub trait LogHandler: Send + Sync {
    type Snapshot: Send + Sync;

    /// Label used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn prepare(&self) -> Result<(LogFilter, Self::Snapshot)>;

    async fn handle(&self, snapshot: &Self::Snapshot, log: &RawLog) -> Result<EventOutcome>;
}
