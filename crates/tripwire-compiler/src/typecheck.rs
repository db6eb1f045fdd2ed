//! Static typing of expression trees
//!
//! Every node gets a static type before any record is processed: value nodes
//! carry a [`ValueType`], comparison and logic nodes are truth-valued, and
//! argument vectors are their own kind. Comparisons against a constant of a
//! different type, truth operands that are not truth-valued, and malformed
//! argument vectors are all startup failures.

use crate::error::{CompileError, Result};
use crate::symbols::SymbolTable;
use std::collections::HashMap;
use tripwire_core::tree::{
    Node, NodeId, Program, ResultProjection, RuleDef, RuleKind,
};
use tripwire_core::types::ValueType;

/// Static type of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Value(ValueType),
    Truth,
    Args,
}

/// Type checker for one program
pub struct TypeChecker<'p> {
    program: &'p Program,
    symbols: &'p SymbolTable,
    memo: HashMap<usize, NodeType>,
}

impl<'p> TypeChecker<'p> {
    pub fn new(program: &'p Program, symbols: &'p SymbolTable) -> Self {
        TypeChecker {
            program,
            symbols,
            memo: HashMap::new(),
        }
    }

    /// Check every rule of the program.
    pub fn check(&mut self) -> Result<()> {
        for rule in &self.program.rules {
            self.check_rule(rule)?;
        }
        Ok(())
    }

    fn check_rule(&mut self, rule: &RuleDef) -> Result<()> {
        match self.node_type(rule.args)? {
            NodeType::Args => {}
            other => {
                return Err(CompileError::TypeError(format!(
                    "arguments of rule '{}' must be an argument vector, found {other:?}",
                    rule.name
                )))
            }
        }
        self.check_arg_positions(rule)?;

        if let Some(pred) = rule.predicate {
            match self.node_type(pred)? {
                NodeType::Truth => {}
                other => {
                    return Err(CompileError::TypeError(format!(
                        "predicate of rule '{}' must be truth-valued, found {other:?}",
                        rule.name
                    )))
                }
            }
        }
        Ok(())
    }

    fn check_arg_positions(&mut self, rule: &RuleDef) -> Result<()> {
        let (parts, len) = match self.program.node(rule.args) {
            Node::Args { parts, len } => (parts, *len),
            _ => unreachable!("checked above"),
        };
        let mut written = vec![false; len];
        for &(position, part) in parts {
            if position >= len {
                return Err(CompileError::TypeError(format!(
                    "argument position {position} of rule '{}' is out of range (len {len})",
                    rule.name
                )));
            }
            if written[position] {
                return Err(CompileError::DuplicateArgPosition {
                    rule: rule.name.clone(),
                    position,
                });
            }
            written[position] = true;
            match self.node_type(part)? {
                NodeType::Value(_) => {}
                other => {
                    return Err(CompileError::TypeError(format!(
                        "argument part of rule '{}' must be value-typed, found {other:?}",
                        rule.name
                    )))
                }
            }
        }
        if let Some(position) = written.iter().position(|w| !w) {
            return Err(CompileError::MissingArgPosition {
                rule: rule.name.clone(),
                position,
            });
        }
        Ok(())
    }

    /// Static type of a node, memoized by identity.
    pub fn node_type(&mut self, id: NodeId) -> Result<NodeType> {
        if let Some(t) = self.memo.get(&id.0) {
            return Ok(*t);
        }
        let t = match self.program.node(id) {
            Node::Const(value) => {
                let vt = value.value_type().ok_or_else(|| {
                    CompileError::TypeError("null constants are not allowed".to_string())
                })?;
                NodeType::Value(vt)
            }
            Node::Field(field) => NodeType::Value(field.value_type()),
            Node::RuleOutput { rule, proj } => {
                let referenced = self.symbols.resolve(self.program, rule)?;
                NodeType::Value(projection_type(referenced, *proj)?)
            }
            Node::Compare {
                input,
                op: _,
                constant,
            } => {
                let input_type = match self.node_type(*input)? {
                    NodeType::Value(vt) => vt,
                    other => {
                        return Err(CompileError::TypeError(format!(
                            "comparison input must be value-typed, found {other:?}"
                        )))
                    }
                };
                let constant_type = constant.value_type().ok_or_else(|| {
                    CompileError::TypeError("comparison against null is not allowed".to_string())
                })?;
                if input_type != constant_type {
                    return Err(CompileError::TypeError(format!(
                        "comparison operand types differ: {input_type:?} vs {constant_type:?}"
                    )));
                }
                NodeType::Truth
            }
            Node::Logic { left, right, .. } => {
                for operand in [*left, *right] {
                    match self.node_type(operand)? {
                        NodeType::Truth => {}
                        other => {
                            return Err(CompileError::TypeError(format!(
                                "logic operand must be truth-valued, found {other:?}"
                            )))
                        }
                    }
                }
                NodeType::Truth
            }
            Node::Args { .. } => NodeType::Args,
        };
        self.memo.insert(id.0, t);
        Ok(t)
    }
}

/// Type of a projection out of the referenced rule's result.
fn projection_type(rule: &RuleDef, proj: ResultProjection) -> Result<ValueType> {
    let invalid = || {
        CompileError::TypeError(format!(
            "projection {proj:?} is not defined for rule '{}'",
            rule.name
        ))
    };
    match (&rule.kind, proj) {
        (_, ResultProjection::Classification) => Ok(ValueType::Str),
        (RuleKind::Command { .. }, ResultProjection::ExitCode) => Ok(ValueType::Int),
        (RuleKind::Command { .. }, ResultProjection::Output) => Ok(ValueType::Str),
        (RuleKind::QueryRow { .. }, ResultProjection::StateCode)
        | (RuleKind::QueryExec { .. }, ResultProjection::StateCode)
        | (RuleKind::QueryExecTx { .. }, ResultProjection::StateCode) => Ok(ValueType::Str),
        (RuleKind::QueryRow { .. }, ResultProjection::RowsAffected)
        | (RuleKind::QueryExec { .. }, ResultProjection::RowsAffected)
        | (RuleKind::QueryExecTx { .. }, ResultProjection::RowsAffected) => Ok(ValueType::Uint),
        (RuleKind::QueryRow { schema, .. }, ResultProjection::Column(i)) => schema
            .get(i)
            .map(|c| c.value_type())
            .ok_or_else(|| {
                CompileError::TypeError(format!(
                    "rule '{}' declares {} result columns, column {i} requested",
                    rule.name,
                    schema.len()
                ))
            }),
        _ => Err(invalid()),
    }
}
