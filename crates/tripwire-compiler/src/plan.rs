//! Flow planning
//!
//! Runs every static pass in order and produces the [`FlowPlan`] the runtime
//! flow builder consumes: the dependency-ordered rule list plus demand counts
//! that size every fan-out before a single stage exists.

use crate::error::Result;
use crate::order::{rule_dependencies, toposort};
use crate::symbols::SymbolTable;
use crate::typecheck::TypeChecker;
use std::collections::{HashMap, HashSet};
use tripwire_core::tree::{Node, NodeId, Program};

/// Everything the runtime needs to instantiate one worker network
#[derive(Debug, Clone)]
pub struct FlowPlan {
    pub program: Program,
    /// Rule indices in dependency order
    pub order: Vec<usize>,
    node_demand: HashMap<usize, usize>,
    rule_demand: HashMap<String, usize>,
}

impl FlowPlan {
    /// Number of consumers of a node's output.
    pub fn node_demand(&self, id: NodeId) -> usize {
        self.node_demand.get(&id.0).copied().unwrap_or(0)
    }

    /// Declared fan-out width of a rule's result stream: one branch per
    /// dependent projection plus the detail-logging branch.
    pub fn rule_branches(&self, rule: &str) -> usize {
        self.rule_demand.get(rule).copied().unwrap_or(1)
    }

    pub fn rule_count(&self) -> usize {
        self.program.rules.len()
    }
}

/// Compile a validated program into a flow plan.
///
/// Fails on duplicate definitions, self-references, dependency cycles,
/// references to undefined rules, and type errors; all before any record is
/// processed.
pub fn compile(program: Program) -> Result<FlowPlan> {
    let symbols = SymbolTable::build(&program)?;
    let deps = rule_dependencies(&program, &symbols)?;
    let order = toposort(&program, &deps)?;
    TypeChecker::new(&program, &symbols).check()?;

    let (node_demand, rule_demand) = count_demand(&program);
    Ok(FlowPlan {
        program,
        order,
        node_demand,
        rule_demand,
    })
}

/// Count consumers per node and dependent projections per rule.
///
/// Each *reference* to a node is one consumer (a logic node using the same
/// operand twice needs two branches); each distinct `RuleOutput` node
/// consumes one branch of the referenced rule's result stream.
fn count_demand(program: &Program) -> (HashMap<usize, usize>, HashMap<String, usize>) {
    let mut node_demand: HashMap<usize, usize> = HashMap::new();
    let mut rule_demand: HashMap<String, usize> =
        program.rules.iter().map(|r| (r.name.clone(), 1)).collect();
    let mut expanded: HashSet<usize> = HashSet::new();
    let mut stack: Vec<NodeId> = Vec::new();

    for rule in &program.rules {
        stack.push(rule.args);
        stack.extend(rule.predicate);
        *node_demand.entry(rule.args.0).or_insert(0) += 1;
        if let Some(pred) = rule.predicate {
            *node_demand.entry(pred.0).or_insert(0) += 1;
        }
    }

    while let Some(id) = stack.pop() {
        if !expanded.insert(id.0) {
            continue;
        }
        match program.node(id) {
            Node::Const(_) | Node::Field(_) => {}
            Node::RuleOutput { rule, .. } => {
                *rule_demand.entry(rule.clone()).or_insert(1) += 1;
            }
            Node::Compare { input, .. } => {
                *node_demand.entry(input.0).or_insert(0) += 1;
                stack.push(*input);
            }
            Node::Logic { left, right, .. } => {
                for operand in [*left, *right] {
                    *node_demand.entry(operand.0).or_insert(0) += 1;
                    stack.push(operand);
                }
            }
            Node::Args { parts, .. } => {
                for &(_, part) in parts {
                    *node_demand.entry(part.0).or_insert(0) += 1;
                    stack.push(part);
                }
            }
        }
    }

    (node_demand, rule_demand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripwire_core::tree::{CompareOp, ProgramBuilder, RecordField, ResultProjection};
    use tripwire_core::Value;

    #[test]
    fn test_shared_node_demand() {
        let mut b = ProgramBuilder::new();
        let verb = b.field(RecordField::Verb);
        let is_get = b.compare(verb, CompareOp::Eq, Value::Str("get".into()));
        let args_a = b.args(vec![verb]);
        let args_b = b.args(vec![verb]);
        b.command_rule("a", "/bin/true", vec![0], args_a, Some(is_get));
        b.command_rule("b", "/bin/true", vec![0], args_b, Some(is_get));
        let plan = compile(b.finish()).unwrap();

        // verb feeds the comparison and both argument vectors
        assert_eq!(plan.node_demand(verb), 3);
        // the shared predicate feeds both rules
        assert_eq!(plan.node_demand(is_get), 2);
    }

    #[test]
    fn test_rule_branch_counts() {
        let mut b = ProgramBuilder::new();
        let args_c = b.args(vec![]);
        b.command_rule("probe", "/usr/bin/probe", vec![0], args_c, None);
        let code = b.rule_output("probe", ResultProjection::ExitCode);
        let pred = b.compare(code, CompareOp::Eq, Value::Int(0));
        let args_q = b.args(vec![code]);
        b.query_exec_rule("audit", vec!["INSERT".into()], args_q, Some(pred));
        let plan = compile(b.finish()).unwrap();

        // one dependent projection node plus the detail branch
        assert_eq!(plan.rule_branches("probe"), 2);
        assert_eq!(plan.rule_branches("audit"), 1);
        assert_eq!(plan.rule_count(), 2);
    }

    #[test]
    fn test_order_in_plan() {
        let mut b = ProgramBuilder::new();
        let args_c = b.args(vec![]);
        b.command_rule("probe", "/usr/bin/probe", vec![0], args_c, None);
        let code = b.rule_output("probe", ResultProjection::ExitCode);
        let args_q = b.args(vec![code]);
        b.query_exec_rule("audit", vec!["INSERT".into()], args_q, None);
        let plan = compile(b.finish()).unwrap();

        let names: Vec<&str> = plan
            .order
            .iter()
            .map(|&i| plan.program.rules[i].name.as_str())
            .collect();
        let probe = names.iter().position(|&n| n == "probe").unwrap();
        let audit = names.iter().position(|&n| n == "audit").unwrap();
        assert!(probe < audit);
    }
}
