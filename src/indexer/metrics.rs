use std::time::Duration;

use metrics::{counter, gauge, histogram};

use super::CycleReport;

pub const EVENTS_TOTAL: &str = "quest_indexer_events_total";
pub const CYCLES_TOTAL: &str = "quest_indexer_cycles_total";
pub const CYCLE_DURATION_SECONDS: &str = "quest_indexer_cycle_duration_seconds";
pub const CURSOR_BLOCK: &str = "quest_indexer_cursor_block";

pub fn record_cycle(pipeline: &'static str, report: &CycleReport, elapsed: Duration) {
    let result = if report.range.is_some() { "ok" } else { "idle" };
    counter!(CYCLES_TOTAL, "pipeline" => pipeline, "result" => result).increment(1);
    histogram!(CYCLE_DURATION_SECONDS, "pipeline" => pipeline).record(elapsed.as_secs_f64());
    gauge!(CURSOR_BLOCK, "pipeline" => pipeline).set(report.cursor as f64);

    for (outcome, count) in [
        ("processed", report.processed),
        ("skipped", report.skipped),
        ("mismatched", report.mismatched),
        ("failed", report.failed),
    ] {
        if count > 0 {
            counter!(EVENTS_TOTAL, "pipeline" => pipeline, "outcome" => outcome)
                .increment(count as u64);
        }
    }
}

pub fn record_cycle_error(pipeline: &'static str, elapsed: Duration) {
    counter!(CYCLES_TOTAL, "pipeline" => pipeline, "result" => "error").increment(1);
    histogram!(CYCLE_DURATION_SECONDS, "pipeline" => pipeline).record(elapsed.as_secs_f64());
}
