//! Immutable program builder
//!
//! All implicit-cast and reparenting decisions belong to the configuration
//! front end; once `finish` returns, the tree is never mutated again. Sharing
//! a subtree means reusing the `NodeId` the builder returned for it.

use super::{
    ColumnType, CompareOp, LogicOp, Node, NodeId, Program, RecordField, ResultProjection, RuleDef,
    RuleKind,
};
use crate::types::Value;

/// Builder for a [`Program`]
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    nodes: Vec<Node>,
    rules: Vec<RuleDef>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn constant(&mut self, value: Value) -> NodeId {
        self.push(Node::Const(value))
    }

    pub fn field(&mut self, field: RecordField) -> NodeId {
        self.push(Node::Field(field))
    }

    pub fn rule_output(&mut self, rule: &str, proj: ResultProjection) -> NodeId {
        self.push(Node::RuleOutput {
            rule: rule.to_string(),
            proj,
        })
    }

    pub fn compare(&mut self, input: NodeId, op: CompareOp, constant: Value) -> NodeId {
        self.push(Node::Compare {
            input,
            op,
            constant,
        })
    }

    pub fn and(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.push(Node::Logic {
            op: LogicOp::And,
            left,
            right,
        })
    }

    pub fn or(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.push(Node::Logic {
            op: LogicOp::Or,
            left,
            right,
        })
    }

    /// Argument vector with parts in positional order.
    pub fn args(&mut self, parts: Vec<NodeId>) -> NodeId {
        let len = parts.len();
        self.push(Node::Args {
            parts: parts.into_iter().enumerate().collect(),
            len,
        })
    }

    /// Argument vector with explicit positions.
    pub fn args_at(&mut self, parts: Vec<(usize, NodeId)>, len: usize) -> NodeId {
        self.push(Node::Args { parts, len })
    }

    pub fn command_rule(
        &mut self,
        name: &str,
        path: &str,
        accepted: Vec<i32>,
        args: NodeId,
        predicate: Option<NodeId>,
    ) {
        self.rules.push(RuleDef {
            name: name.to_string(),
            kind: RuleKind::Command {
                path: path.to_string(),
                accepted,
            },
            args,
            predicate,
        });
    }

    pub fn query_row_rule(
        &mut self,
        name: &str,
        statement: &str,
        schema: Vec<ColumnType>,
        args: NodeId,
        predicate: Option<NodeId>,
    ) {
        self.rules.push(RuleDef {
            name: name.to_string(),
            kind: RuleKind::QueryRow {
                statement: statement.to_string(),
                schema,
            },
            args,
            predicate,
        });
    }

    pub fn query_exec_rule(
        &mut self,
        name: &str,
        statements: Vec<String>,
        args: NodeId,
        predicate: Option<NodeId>,
    ) {
        self.rules.push(RuleDef {
            name: name.to_string(),
            kind: RuleKind::QueryExec { statements },
            args,
            predicate,
        });
    }

    pub fn query_exec_tx_rule(
        &mut self,
        name: &str,
        statements: Vec<String>,
        args: NodeId,
        predicate: Option<NodeId>,
    ) {
        self.rules.push(RuleDef {
            name: name.to_string(),
            kind: RuleKind::QueryExecTx { statements },
            args,
            predicate,
        });
    }

    pub fn finish(self) -> Program {
        Program {
            nodes: self.nodes,
            rules: self.rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_shared_subtree() {
        let mut b = ProgramBuilder::new();
        let verb = b.field(RecordField::Verb);
        let is_get = b.compare(verb, CompareOp::Eq, Value::Str("get".into()));
        let args_a = b.args(vec![verb]);
        let args_b = b.args(vec![verb]);
        b.command_rule("a", "/bin/true", vec![0], args_a, Some(is_get));
        b.command_rule("b", "/bin/true", vec![0], args_b, Some(is_get));

        let program = b.finish();
        assert_eq!(program.rules.len(), 2);
        // the predicate node is shared, not duplicated
        assert_eq!(program.rules[0].predicate, program.rules[1].predicate);
        assert!(matches!(program.node(verb), Node::Field(RecordField::Verb)));
    }

    #[test]
    fn test_args_positions() {
        let mut b = ProgramBuilder::new();
        let c = b.constant(Value::Str("x".into()));
        let id = b.args(vec![c, c]);
        let program = b.finish();
        match program.node(id) {
            Node::Args { parts, len } => {
                assert_eq!(*len, 2);
                assert_eq!(parts, &vec![(0, c), (1, c)]);
            }
            other => panic!("expected Args, got {other:?}"),
        }
    }
}
