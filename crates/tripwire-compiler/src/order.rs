//! Dependency extraction and topological ordering
//!
//! A rule depends on every rule whose outcome its predicate or argument
//! vector projects from. Kahn's algorithm orders the rules so that each is
//! compiled after everything it depends on; unreferenced rules are included
//! as roots so side-effecting rules with no dependents still fire.

use crate::error::{CompileError, Result};
use crate::symbols::SymbolTable;
use std::collections::{BTreeSet, VecDeque};
use tripwire_core::tree::{Node, NodeId, Program};

/// Per-rule dependency sets (indices into `program.rules`).
///
/// Rejects references to undefined rules and explicit self-references; a
/// rule depending on itself is a configuration error, never "trivially
/// satisfied".
pub fn rule_dependencies(
    program: &Program,
    symbols: &SymbolTable,
) -> Result<Vec<BTreeSet<usize>>> {
    let mut deps = Vec::with_capacity(program.rules.len());
    for (index, rule) in program.rules.iter().enumerate() {
        let mut set = BTreeSet::new();
        let mut roots = vec![rule.args];
        if let Some(pred) = rule.predicate {
            roots.push(pred);
        }
        for referenced in referenced_rules(program, &roots) {
            let other = symbols
                .index_of(&referenced)
                .ok_or_else(|| CompileError::UndefinedRule(referenced.clone()))?;
            if other == index {
                return Err(CompileError::SelfReference(rule.name.clone()));
            }
            set.insert(other);
        }
        deps.push(set);
    }
    Ok(deps)
}

/// Names of rules whose outputs are reachable from the given nodes.
fn referenced_rules(program: &Program, roots: &[NodeId]) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut referenced = BTreeSet::new();
    let mut stack: Vec<NodeId> = roots.to_vec();
    while let Some(id) = stack.pop() {
        if !seen.insert(id.0) {
            continue;
        }
        match program.node(id) {
            Node::Const(_) | Node::Field(_) => {}
            Node::RuleOutput { rule, .. } => {
                referenced.insert(rule.clone());
            }
            Node::Compare { input, .. } => stack.push(*input),
            Node::Logic { left, right, .. } => {
                stack.push(*left);
                stack.push(*right);
            }
            Node::Args { parts, .. } => stack.extend(parts.iter().map(|(_, id)| *id)),
        }
    }
    referenced
}

/// Kahn's algorithm over the rule dependency graph.
///
/// Returns rule indices in an order where every rule follows its
/// dependencies. Ties among simultaneously-ready rules fall back to
/// definition order, but nothing downstream may rely on that choice.
pub fn toposort(program: &Program, deps: &[BTreeSet<usize>]) -> Result<Vec<usize>> {
    let n = program.rules.len();
    let mut in_degree: Vec<usize> = deps.iter().map(|d| d.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (rule, rule_deps) in deps.iter().enumerate() {
        for &dep in rule_deps {
            dependents[dep].push(rule);
        }
    }

    let mut ready: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(rule) = ready.pop_front() {
        order.push(rule);
        for &dependent in &dependents[rule] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push_back(dependent);
            }
        }
    }

    if order.len() < n {
        let stuck = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| program.rules[i].name.clone())
            .collect();
        return Err(CompileError::Cycle(stuck));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tripwire_core::tree::{CompareOp, ProgramBuilder, ResultProjection};
    use tripwire_core::Value;

    fn program_with_edge(from: &str, to: &str) -> Program {
        // `from` depends on `to` via an exit-code projection in its predicate
        let mut b = ProgramBuilder::new();
        let args_to = b.args(vec![]);
        b.command_rule(to, "/bin/true", vec![0], args_to, None);
        let out = b.rule_output(to, ResultProjection::ExitCode);
        let pred = b.compare(out, CompareOp::Eq, Value::Int(0));
        let args_from = b.args(vec![]);
        b.command_rule(from, "/bin/true", vec![0], args_from, Some(pred));
        b.finish()
    }

    #[test]
    fn test_order_respects_edges() {
        let program = program_with_edge("late", "early");
        let symbols = SymbolTable::build(&program).unwrap();
        let deps = rule_dependencies(&program, &symbols).unwrap();
        let order = toposort(&program, &deps).unwrap();

        let pos = |name: &str| {
            order
                .iter()
                .position(|&i| program.rules[i].name == name)
                .unwrap()
        };
        assert!(pos("early") < pos("late"));
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut b = ProgramBuilder::new();
        let out = b.rule_output("loner", ResultProjection::ExitCode);
        let pred = b.compare(out, CompareOp::Eq, Value::Int(0));
        let args = b.args(vec![]);
        b.command_rule("loner", "/bin/true", vec![0], args, Some(pred));
        let program = b.finish();

        let symbols = SymbolTable::build(&program).unwrap();
        assert!(matches!(
            rule_dependencies(&program, &symbols),
            Err(CompileError::SelfReference(name)) if name == "loner"
        ));
    }

    #[test]
    fn test_cycle_rejected() {
        let mut b = ProgramBuilder::new();
        let out_b = b.rule_output("b", ResultProjection::ExitCode);
        let pred_a = b.compare(out_b, CompareOp::Eq, Value::Int(0));
        let args_a = b.args(vec![]);
        b.command_rule("a", "/bin/true", vec![0], args_a, Some(pred_a));
        let out_a = b.rule_output("a", ResultProjection::ExitCode);
        let pred_b = b.compare(out_a, CompareOp::Eq, Value::Int(0));
        let args_b = b.args(vec![]);
        b.command_rule("b", "/bin/true", vec![0], args_b, Some(pred_b));
        let program = b.finish();

        let symbols = SymbolTable::build(&program).unwrap();
        let deps = rule_dependencies(&program, &symbols).unwrap();
        match toposort(&program, &deps) {
            Err(CompileError::Cycle(stuck)) => {
                assert_eq!(stuck.len(), 2);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_undefined_reference_rejected() {
        let mut b = ProgramBuilder::new();
        let out = b.rule_output("ghost", ResultProjection::ExitCode);
        let pred = b.compare(out, CompareOp::Eq, Value::Int(0));
        let args = b.args(vec![]);
        b.command_rule("a", "/bin/true", vec![0], args, Some(pred));
        let program = b.finish();

        let symbols = SymbolTable::build(&program).unwrap();
        assert!(matches!(
            rule_dependencies(&program, &symbols),
            Err(CompileError::UndefinedRule(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_unreferenced_rules_included() {
        let mut b = ProgramBuilder::new();
        for name in ["solo1", "solo2", "solo3"] {
            let args = b.args(vec![]);
            b.command_rule(name, "/bin/true", vec![0], args, None);
        }
        let program = b.finish();
        let symbols = SymbolTable::build(&program).unwrap();
        let deps = rule_dependencies(&program, &symbols).unwrap();
        let order = toposort(&program, &deps).unwrap();
        assert_eq!(order.len(), 3);
    }
}
