//! Rule expression tree
//!
//! The configuration front end (external to this workspace) produces a
//! validated [`Program`]: an arena of expression nodes plus the rule
//! definitions that reference them. Node kinds form a closed tagged union;
//! sharing a subtree between rules means sharing a [`NodeId`], and the flow
//! builder compiles each distinct node exactly once.

mod builder;

pub use builder::ProgramBuilder;

use crate::record::InputRecord;
use crate::types::{Value, ValueType};
use crate::Truth;
use serde::{Deserialize, Serialize};

/// Index of a node in a [`Program`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// A field of the validated input record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordField {
    Timestamp,
    Origin,
    Verb,
    ContentRef,
    History,
    Size,
    Duration,
}

impl RecordField {
    /// Static type of the projected value.
    pub fn value_type(self) -> ValueType {
        match self {
            RecordField::Timestamp => ValueType::Time,
            RecordField::Size => ValueType::Uint,
            RecordField::Duration => ValueType::Dur,
            _ => ValueType::Str,
        }
    }

    /// Project this field out of a record.
    pub fn extract(self, record: &InputRecord) -> Value {
        match self {
            RecordField::Timestamp => Value::Time(record.timestamp),
            RecordField::Origin => Value::Str(record.origin.clone()),
            RecordField::Verb => Value::Str(record.verb.as_str().to_string()),
            RecordField::ContentRef => Value::Str(record.content_ref.to_string()),
            RecordField::History => Value::Str(record.history.as_str().to_string()),
            RecordField::Size => Value::Uint(record.size),
            RecordField::Duration => Value::Dur(record.duration),
        }
    }
}

/// A projection out of another rule's result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultProjection {
    /// Process exit code (command rules)
    ExitCode,
    /// Classification name: "ok", "err", "signal" or "nostart"
    Classification,
    /// Captured process output (command rules)
    Output,
    /// Rows affected (query rules)
    RowsAffected,
    /// Five-character state code (query rules)
    StateCode,
    /// Positional result column (row-query rules)
    Column(usize),
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Evaluate `input op constant`. A null input yields `Truth::Null`; the
    /// operand types are equal by construction (the compiler rejects
    /// mismatched comparisons before any record is processed).
    pub fn eval(self, input: &Value, constant: &Value) -> Truth {
        if input.is_null() {
            return Truth::Null;
        }
        let ordering = input
            .partial_cmp_same_type(constant)
            .unwrap_or_else(|| panic!("comparison operand type mismatch: {input:?} vs {constant:?}"));
        let decided = match self {
            CompareOp::Eq => ordering.is_eq(),
            CompareOp::Ne => ordering.is_ne(),
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Le => ordering.is_le(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Ge => ordering.is_ge(),
        };
        decided.into()
    }
}

/// Logical connective over two truth-valued operands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicOp {
    And,
    Or,
}

/// One expression-tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Replay a compile-time constant for every cursor
    Const(Value),
    /// Project a field out of the input record
    Field(RecordField),
    /// Project a value out of another rule's result; `Null` when that rule
    /// was unresolved or did not fire
    RuleOutput { rule: String, proj: ResultProjection },
    /// Compare an upstream value against a compile-time constant
    Compare {
        input: NodeId,
        op: CompareOp,
        constant: Value,
    },
    /// Combine two truth-valued operands
    Logic {
        op: LogicOp,
        left: NodeId,
        right: NodeId,
    },
    /// Assemble a positional argument vector; `len` slots, each written by
    /// exactly one part
    Args {
        parts: Vec<(usize, NodeId)>,
        len: usize,
    },
}

/// Declared type of a row-query result column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    Int,
    Text,
}

impl ColumnType {
    pub fn value_type(self) -> ValueType {
        match self {
            ColumnType::Bool => ValueType::Bool,
            ColumnType::Int => ValueType::Int,
            ColumnType::Text => ValueType::Str,
        }
    }
}

/// What a rule invokes when its predicate holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleKind {
    /// Run an external process; exit codes in `accepted` count as ok
    Command { path: String, accepted: Vec<i32> },
    /// Run one statement, fetch at most one row with the declared schema
    QueryRow {
        statement: String,
        schema: Vec<ColumnType>,
    },
    /// Run statements for effect
    QueryExec { statements: Vec<String> },
    /// Run statements for effect inside one transaction
    QueryExecTx { statements: Vec<String> },
}

impl RuleKind {
    pub fn is_command(&self) -> bool {
        matches!(self, RuleKind::Command { .. })
    }
}

/// One rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    pub name: String,
    pub kind: RuleKind,
    /// Argument-vector node (always an [`Node::Args`])
    pub args: NodeId,
    /// Truth-valued predicate node; `None` means the rule always fires
    pub predicate: Option<NodeId>,
}

/// A validated expression tree plus rule definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub nodes: Vec<Node>,
    pub rules: Vec<RuleDef>,
}

impl Program {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_eval() {
        assert_eq!(
            CompareOp::Eq.eval(&Value::Uint(3), &Value::Uint(3)),
            Truth::True
        );
        assert_eq!(
            CompareOp::Lt.eval(&Value::Int(5), &Value::Int(3)),
            Truth::False
        );
        assert_eq!(
            CompareOp::Ge.eval(&Value::Str("b".into()), &Value::Str("a".into())),
            Truth::True
        );
    }

    #[test]
    fn test_compare_null_input() {
        assert_eq!(
            CompareOp::Eq.eval(&Value::Null, &Value::Uint(3)),
            Truth::Null
        );
        assert_eq!(
            CompareOp::Ne.eval(&Value::Null, &Value::Uint(3)),
            Truth::Null
        );
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn test_compare_mismatched_types_panics() {
        CompareOp::Eq.eval(&Value::Uint(3), &Value::Int(3));
    }

    #[test]
    fn test_record_field_types() {
        assert_eq!(RecordField::Size.value_type(), ValueType::Uint);
        assert_eq!(RecordField::Verb.value_type(), ValueType::Str);
        assert_eq!(RecordField::Timestamp.value_type(), ValueType::Time);
    }
}
