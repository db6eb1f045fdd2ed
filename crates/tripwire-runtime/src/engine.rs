//! Engine: validated records through worker networks
//!
//! Each worker owns one full compiled network instance; workers share nothing
//! but the bounded executor pools and the record logger. Raw lines are
//! dispatched round-robin; each worker validates its lines, assigns a
//! per-worker sequence number and drives its cursor chain in lock-step with
//! Reduce.

use crate::config::EngineConfig;
use crate::cursor::Cursor;
use crate::error::{Result, RuntimeError};
use crate::exec::{ProcessExecutor, ProcessPool, SqlExecutor, SqlPool};
use crate::flow::{build_network, NetworkHandle};
use crate::logger::RecordLogger;
use std::sync::Arc;
use tokio::sync::mpsc;
use tripwire_compiler::FlowPlan;
use tripwire_core::InputRecord;

/// External collaborators shared by all workers
#[derive(Clone)]
pub struct Collaborators {
    pub process: Arc<dyn ProcessExecutor>,
    pub sql: Arc<dyn SqlExecutor>,
    pub logger: Arc<dyn RecordLogger>,
}

/// Counters accumulated over one engine run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Validated records that entered a network
    pub records: u64,
    /// Lines rejected by validation
    pub rejected: u64,
    /// Summaries emitted (equals `records` on a clean run)
    pub summaries: u64,
    pub ok_total: u64,
    pub fault_total: u64,
}

impl EngineStats {
    fn merge(&mut self, other: EngineStats) {
        self.records += other.records;
        self.rejected += other.rejected;
        self.summaries += other.summaries;
        self.ok_total += other.ok_total;
        self.fault_total += other.fault_total;
    }
}

pub struct Engine {
    plan: FlowPlan,
    collaborators: Collaborators,
    config: EngineConfig,
}

impl Engine {
    pub fn new(plan: FlowPlan, collaborators: Collaborators, config: EngineConfig) -> Engine {
        Engine {
            plan,
            collaborators,
            config,
        }
    }

    /// Drive every line from `source` through the worker networks; returns
    /// once the source closes and all in-flight records are reduced.
    pub async fn run(self, mut source: mpsc::Receiver<String>) -> Result<EngineStats> {
        self.config.validate()?;
        let process = ProcessPool::new(self.collaborators.process.clone(), self.config.process_slots);
        let sql = SqlPool::new(self.collaborators.sql.clone(), self.config.sql_slots);

        // build all networks before accepting a single line; build failures
        // are startup-fatal
        let mut workers = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            let network = build_network(
                &self.plan,
                process.clone(),
                sql.clone(),
                self.collaborators.logger.clone(),
                self.config.channel_capacity,
            )?;
            let (line_tx, line_rx) = mpsc::channel::<String>(self.config.channel_capacity);
            let logger = self.collaborators.logger.clone();
            let handle = tokio::spawn(run_worker(id, network, logger, line_rx));
            workers.push((line_tx, handle));
        }
        tracing::info!(workers = self.config.workers, rules = self.plan.rule_count(), "engine started");

        let mut next = 0usize;
        while let Some(line) = source.recv().await {
            // a closed worker channel means the worker panicked; surface it
            // at join below
            if workers[next].0.send(line).await.is_err() {
                break;
            }
            next = (next + 1) % workers.len();
        }

        let mut stats = EngineStats::default();
        for (line_tx, handle) in workers {
            drop(line_tx);
            match handle.await {
                Ok(worker_stats) => stats.merge(worker_stats),
                Err(e) => return Err(RuntimeError::WorkerFailed(e.to_string())),
            }
        }
        tracing::info!(
            records = stats.records,
            rejected = stats.rejected,
            ok = stats.ok_total,
            fault = stats.fault_total,
            "engine drained"
        );
        Ok(stats)
    }
}

async fn run_worker(
    id: usize,
    network: NetworkHandle,
    logger: Arc<dyn RecordLogger>,
    mut lines: mpsc::Receiver<String>,
) -> EngineStats {
    let NetworkHandle {
        mut head,
        confluence,
        mut summary_rx,
        tasks,
    } = network;
    let mut stats = EngineStats::default();
    let mut seq = 0u64;

    while let Some(line) = lines.recv().await {
        let record = match InputRecord::parse(&line) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(worker = id, error = %e, "rejected input line");
                stats.rejected += 1;
                continue;
            }
        };
        seq += 1;
        stats.records += 1;

        let (next_head, cursor) = Cursor::chain(seq, Arc::new(record));
        head.answer(confluence, Some(cursor)).await;

        let summary = match summary_rx.recv().await {
            Some(summary) => summary,
            None => panic!("worker {id}: summary stream closed mid-record (seq {seq})"),
        };
        if summary.seq != seq {
            panic!(
                "worker {id}: summary sequence desynchronization, got {} expected {seq}",
                summary.seq
            );
        }
        logger.summary(&summary);
        stats.summaries += 1;
        stats.ok_total += u64::from(summary.ok_count);
        stats.fault_total += u64::from(summary.fault_count);

        next_head.resolve();
        head = next_head;
    }

    head.answer(confluence, None).await;
    for task in tasks {
        if let Err(e) = task.await {
            panic!("worker {id}: stage task failed: {e}");
        }
    }
    tracing::debug!(worker = id, records = stats.records, "worker drained");
    stats
}
