//! Flow builder: plan to running stage network
//!
//! Builds exactly one stage per distinct node, memoized by [`NodeId`], in
//! dependency order; a node with more than one consumer gets a fan-out stage
//! sized by the plan's demand count. Rule result streams always fan out to
//! dependents + 1, the extra branch feeding the detail-logging path into the
//! fan-in and Reduce. Every prepared branch must be taken exactly once;
//! leftovers fail the build.

use crate::cursor::{bootstrap, ChainHead, CursorFollower, CursorLink};
use crate::exec::{ProcessPool, SqlPool};
use crate::logger::RecordLogger;
use crate::stage::{
    run_args, run_compare, run_const, run_detail, run_fanout, run_field, run_invoke, run_logic,
    run_reduce, run_rule_output, spawn_fanin, ArgVector, Rx, Tx, RuleInvoker,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tripwire_compiler::{CompileError, FlowPlan};
use tripwire_core::result::{RuleResult, SummaryRecord};
use tripwire_core::tree::{Node, NodeId, RuleKind};
use tripwire_core::{Truth, Value};

type Result<T> = std::result::Result<T, CompileError>;

/// A fully wired, already spawned worker network
pub(crate) struct NetworkHandle {
    pub(crate) head: ChainHead,
    /// Number of cursor followers in the network, fixed at build time
    pub(crate) confluence: usize,
    pub(crate) summary_rx: mpsc::Receiver<SummaryRecord>,
    pub(crate) tasks: Vec<JoinHandle<()>>,
}

pub(crate) fn build_network(
    plan: &FlowPlan,
    process: ProcessPool,
    sql: SqlPool,
    logger: Arc<dyn RecordLogger>,
    channel_capacity: usize,
) -> Result<NetworkHandle> {
    let (head, link) = bootstrap();
    let mut builder = FlowBuilder {
        plan,
        capacity: channel_capacity.max(1),
        link,
        confluence: 0,
        tasks: Vec::new(),
        value_taps: HashMap::new(),
        truth_taps: HashMap::new(),
        args_taps: HashMap::new(),
        result_taps: HashMap::new(),
        built: HashSet::new(),
        process,
        sql,
        logger,
    };
    let summary_rx = builder.build()?;
    builder.check_consumed()?;
    Ok(NetworkHandle {
        head,
        confluence: builder.confluence,
        summary_rx,
        tasks: builder.tasks,
    })
}

struct FlowBuilder<'a> {
    plan: &'a FlowPlan,
    capacity: usize,
    link: CursorLink,
    confluence: usize,
    tasks: Vec<JoinHandle<()>>,
    value_taps: HashMap<usize, Vec<Rx<Value>>>,
    truth_taps: HashMap<usize, Vec<Rx<Truth>>>,
    args_taps: HashMap<usize, Vec<Rx<ArgVector>>>,
    result_taps: HashMap<String, Vec<Rx<RuleResult>>>,
    built: HashSet<usize>,
    process: ProcessPool,
    sql: SqlPool,
    logger: Arc<dyn RecordLogger>,
}

impl FlowBuilder<'_> {
    fn build(&mut self) -> Result<mpsc::Receiver<SummaryRecord>> {
        let mut merged_inputs = Vec::new();

        for &idx in &self.plan.order {
            let rule = self.plan.program.rules[idx].clone();

            self.ensure_node(rule.args)?;
            if let Some(pred) = rule.predicate {
                self.ensure_node(pred)?;
            }
            let predicate = match rule.predicate {
                Some(pred) => Some(self.take_truth(pred)?),
                None => None,
            };
            let args = self.take_args(rule.args)?;

            let invoker = match rule.kind {
                RuleKind::Command { path, accepted } => RuleInvoker::Command {
                    path,
                    accepted,
                    pool: self.process.clone(),
                },
                RuleKind::QueryRow { statement, schema } => RuleInvoker::QueryRow {
                    statement,
                    schema,
                    pool: self.sql.clone(),
                },
                RuleKind::QueryExec { statements } => RuleInvoker::QueryExec {
                    statements,
                    transactional: false,
                    pool: self.sql.clone(),
                },
                RuleKind::QueryExecTx { statements } => RuleInvoker::QueryExec {
                    statements,
                    transactional: true,
                    pool: self.sql.clone(),
                },
            };

            let branches = self.plan.rule_branches(&rule.name);
            let (result_tx, mut branch_rxs) = self.wire::<RuleResult>(branches);
            let follower = self.follower();
            self.tasks.push(tokio::spawn(run_invoke(
                follower,
                rule.name.clone(),
                invoker,
                predicate,
                args,
                result_tx,
            )));

            // one branch always feeds the detail-logging path
            let detail_in = match branch_rxs.pop() {
                Some(rx) => rx,
                None => {
                    return Err(CompileError::Internal(format!(
                        "rule '{}' declared zero fan-out branches",
                        rule.name
                    )))
                }
            };
            let (detail_tx, detail_rx) = mpsc::channel(self.capacity);
            let follower = self.follower();
            self.tasks.push(tokio::spawn(run_detail(
                follower,
                detail_in,
                self.logger.clone(),
                detail_tx,
            )));
            merged_inputs.push(detail_rx);

            self.result_taps
                .entry(rule.name)
                .or_default()
                .extend(branch_rxs);
        }

        let (merged_tx, merged_rx) = mpsc::channel(self.capacity);
        self.tasks.extend(spawn_fanin(merged_inputs, merged_tx));

        let (summary_tx, summary_rx) = mpsc::channel(self.capacity);
        let follower = self.follower();
        self.tasks.push(tokio::spawn(run_reduce(
            follower,
            merged_rx,
            self.plan.rule_count(),
            summary_tx,
        )));
        Ok(summary_rx)
    }

    fn ensure_node(&mut self, id: NodeId) -> Result<()> {
        if !self.built.insert(id.0) {
            return Ok(());
        }
        let demand = self.plan.node_demand(id);
        match self.plan.program.node(id).clone() {
            Node::Const(value) => {
                let (tx, rxs) = self.wire::<Value>(demand);
                let follower = self.follower();
                self.tasks.push(tokio::spawn(run_const(follower, value, tx)));
                self.value_taps.insert(id.0, rxs);
            }
            Node::Field(field) => {
                let (tx, rxs) = self.wire::<Value>(demand);
                let follower = self.follower();
                self.tasks.push(tokio::spawn(run_field(follower, field, tx)));
                self.value_taps.insert(id.0, rxs);
            }
            Node::RuleOutput { rule, proj } => {
                let input = self.take_result(&rule)?;
                let (tx, rxs) = self.wire::<Value>(demand);
                let follower = self.follower();
                self.tasks
                    .push(tokio::spawn(run_rule_output(follower, input, proj, tx)));
                self.value_taps.insert(id.0, rxs);
            }
            Node::Compare { input, op, constant } => {
                self.ensure_node(input)?;
                let input = self.take_value(input)?;
                let (tx, rxs) = self.wire::<Truth>(demand);
                let follower = self.follower();
                self.tasks
                    .push(tokio::spawn(run_compare(follower, input, op, constant, tx)));
                self.truth_taps.insert(id.0, rxs);
            }
            Node::Logic { op, left, right } => {
                self.ensure_node(left)?;
                self.ensure_node(right)?;
                let left = self.take_truth(left)?;
                let right = self.take_truth(right)?;
                let (tx, rxs) = self.wire::<Truth>(demand);
                let follower = self.follower();
                self.tasks
                    .push(tokio::spawn(run_logic(follower, op, left, right, tx)));
                self.truth_taps.insert(id.0, rxs);
            }
            Node::Args { parts, len } => {
                for &(_, part) in &parts {
                    self.ensure_node(part)?;
                }
                let mut inputs = Vec::with_capacity(parts.len());
                for (position, part) in parts {
                    inputs.push((position, self.take_value(part)?));
                }
                let (tx, rxs) = self.wire::<ArgVector>(demand);
                let follower = self.follower();
                self.tasks
                    .push(tokio::spawn(run_args(follower, inputs, len, tx)));
                self.args_taps.insert(id.0, rxs);
            }
        }
        Ok(())
    }

    fn follower(&mut self) -> CursorFollower {
        self.confluence += 1;
        CursorFollower::new(&self.link)
    }

    /// Channel plumbing for one stage output with `demand` consumers; a
    /// fan-out stage is inserted when more than one branch is needed.
    fn wire<T: Clone + Send + 'static>(&mut self, demand: usize) -> (Tx<T>, Vec<Rx<T>>) {
        let demand = demand.max(1);
        let (tx, rx) = mpsc::channel(self.capacity);
        if demand == 1 {
            return (tx, vec![rx]);
        }
        let mut outs = Vec::with_capacity(demand);
        let mut rxs = Vec::with_capacity(demand);
        for _ in 0..demand {
            let (branch_tx, branch_rx) = mpsc::channel(self.capacity);
            outs.push(branch_tx);
            rxs.push(branch_rx);
        }
        let follower = self.follower();
        self.tasks.push(tokio::spawn(run_fanout(follower, rx, outs)));
        (tx, rxs)
    }

    fn take_value(&mut self, id: NodeId) -> Result<Rx<Value>> {
        self.value_taps
            .get_mut(&id.0)
            .and_then(Vec::pop)
            .ok_or_else(|| CompileError::Internal(format!("value node {} not built", id.0)))
    }

    fn take_truth(&mut self, id: NodeId) -> Result<Rx<Truth>> {
        self.truth_taps
            .get_mut(&id.0)
            .and_then(Vec::pop)
            .ok_or_else(|| CompileError::Internal(format!("truth node {} not built", id.0)))
    }

    fn take_args(&mut self, id: NodeId) -> Result<Rx<ArgVector>> {
        self.args_taps
            .get_mut(&id.0)
            .and_then(Vec::pop)
            .ok_or_else(|| CompileError::Internal(format!("args node {} not built", id.0)))
    }

    fn take_result(&mut self, rule: &str) -> Result<Rx<RuleResult>> {
        self.result_taps
            .get_mut(rule)
            .and_then(Vec::pop)
            .ok_or_else(|| {
                CompileError::Internal(format!("result stream of rule '{rule}' not built"))
            })
    }

    fn check_consumed(&self) -> Result<()> {
        for (&id, taps) in &self.value_taps {
            if !taps.is_empty() {
                return Err(CompileError::UnconsumedBranch(format!("value node {id}")));
            }
        }
        for (&id, taps) in &self.truth_taps {
            if !taps.is_empty() {
                return Err(CompileError::UnconsumedBranch(format!("truth node {id}")));
            }
        }
        for (&id, taps) in &self.args_taps {
            if !taps.is_empty() {
                return Err(CompileError::UnconsumedBranch(format!("args node {id}")));
            }
        }
        for (rule, taps) in &self.result_taps {
            if !taps.is_empty() {
                return Err(CompileError::UnconsumedBranch(format!("rule '{rule}'")));
            }
        }
        Ok(())
    }
}
