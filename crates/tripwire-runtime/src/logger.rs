//! Detail and summary record logging
//!
//! Record lines are an output of the engine, not diagnostics: they go through
//! the [`RecordLogger`] collaborator. Diagnostic logging stays on `tracing`.
//! Line formats are fixed, tab-separated, with RFC3339 nanosecond timestamps
//! and 9-fractional-digit durations.

use chrono::SecondsFormat;
use std::sync::Mutex;
use tripwire_core::record::format_duration;
use tripwire_core::result::{ExecutionResult, QueryResult, SummaryRecord};
use tripwire_core::InputRecord;

/// Execution-detail line: start time, seq, rule, classification, content
/// reference, code, wall/system/user durations.
pub fn exec_detail_line(record: &InputRecord, result: &ExecutionResult) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        result.started_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        result.seq,
        result.rule,
        result.classification.as_str(),
        record.content_ref,
        result.code,
        format_duration(result.wall),
        format_duration(result.system),
        format_duration(result.user),
    )
}

/// Query-detail line: start time, seq, rule, classification, content
/// reference, state code, rows affected, wall/query durations.
pub fn query_detail_line(record: &InputRecord, result: &QueryResult) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        result.started_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        result.seq,
        result.rule,
        result.classification.as_str(),
        record.content_ref,
        result.state,
        result.rows_affected,
        format_duration(result.wall),
        format_duration(result.query),
    )
}

/// Summary line: start time, content reference, ok count, fault count, wall
/// duration, seq.
pub fn summary_line(summary: &SummaryRecord) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        summary.started_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
        summary.content_ref,
        summary.ok_count,
        summary.fault_count,
        format_duration(summary.wall),
        summary.seq,
    )
}

/// Sink for detail and summary record lines
pub trait RecordLogger: Send + Sync {
    fn exec_detail(&self, record: &InputRecord, result: &ExecutionResult);
    fn query_detail(&self, record: &InputRecord, result: &QueryResult);
    fn summary(&self, summary: &SummaryRecord);
}

/// Logger emitting record lines on dedicated tracing targets
#[derive(Debug, Default)]
pub struct TracingLogger;

impl RecordLogger for TracingLogger {
    fn exec_detail(&self, record: &InputRecord, result: &ExecutionResult) {
        tracing::info!(target: "tripwire::detail", "{}", exec_detail_line(record, result));
    }

    fn query_detail(&self, record: &InputRecord, result: &QueryResult) {
        tracing::info!(target: "tripwire::detail", "{}", query_detail_line(record, result));
    }

    fn summary(&self, summary: &SummaryRecord) {
        tracing::info!(target: "tripwire::summary", "{}", summary_line(summary));
    }
}

/// In-memory logger for tests
#[derive(Debug, Default)]
pub struct MemoryLogger {
    details: Mutex<Vec<String>>,
    summaries: Mutex<Vec<SummaryRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn details(&self) -> Vec<String> {
        self.details.lock().unwrap().clone()
    }

    pub fn summaries(&self) -> Vec<SummaryRecord> {
        self.summaries.lock().unwrap().clone()
    }
}

impl RecordLogger for MemoryLogger {
    fn exec_detail(&self, record: &InputRecord, result: &ExecutionResult) {
        self.details
            .lock()
            .unwrap()
            .push(exec_detail_line(record, result));
    }

    fn query_detail(&self, record: &InputRecord, result: &QueryResult) {
        self.details
            .lock()
            .unwrap()
            .push(query_detail_line(record, result));
    }

    fn summary(&self, summary: &SummaryRecord) {
        self.summaries.lock().unwrap().push(summary.clone());
    }
}
