//! Runtime value types for Tripwire expressions
//!
//! The `Value` enum represents every value that can travel between compiled
//! stages: record field projections, rule-result projections, and compile-time
//! constants. `Null` models SQL NULL and propagates through projections from
//! unresolved or not-fired rule results.

use crate::record::format_duration;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null value (unresolved / not-fired projections)
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed integer (process exit codes and the like)
    Int(i64),
    /// Unsigned integer (sizes, row counts)
    Uint(u64),
    /// String value
    Str(String),
    /// Point in time
    Time(DateTime<Utc>),
    /// Elapsed time
    Dur(Duration),
}

/// Static type of a non-null value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Bool,
    Int,
    Uint,
    Str,
    Time,
    Dur,
}

impl Value {
    /// The static type of this value; `None` for `Null`.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ValueType::Bool),
            Value::Int(_) => Some(ValueType::Int),
            Value::Uint(_) => Some(ValueType::Uint),
            Value::Str(_) => Some(ValueType::Str),
            Value::Time(_) => Some(ValueType::Time),
            Value::Dur(_) => Some(ValueType::Dur),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render this value as a positional argument for a process or SQL
    /// invocation. Callers must not pass `Null`; a null element nulls the
    /// whole argument vector before rendering ever happens.
    pub fn to_arg_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Uint(u) => u.to_string(),
            Value::Str(s) => s.clone(),
            Value::Time(t) => t.to_rfc3339_opts(SecondsFormat::Nanos, true),
            Value::Dur(d) => format_duration(*d),
        }
    }

    /// Ordering between two values of the same type. `None` when either side
    /// is null or the types differ.
    pub fn partial_cmp_same_type(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Uint(a), Value::Uint(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            (Value::Time(a), Value::Time(b)) => a.partial_cmp(b),
            (Value::Dur(a), Value::Dur(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Null.value_type(), None);
        assert_eq!(Value::Bool(true).value_type(), Some(ValueType::Bool));
        assert_eq!(Value::Int(-3).value_type(), Some(ValueType::Int));
        assert_eq!(Value::Uint(7).value_type(), Some(ValueType::Uint));
        assert_eq!(
            Value::Str("x".to_string()).value_type(),
            Some(ValueType::Str)
        );
    }

    #[test]
    fn test_arg_rendering() {
        assert_eq!(Value::Int(-42).to_arg_string(), "-42");
        assert_eq!(Value::Uint(42).to_arg_string(), "42");
        assert_eq!(Value::Bool(false).to_arg_string(), "false");
        assert_eq!(Value::Str("abc".to_string()).to_arg_string(), "abc");
        assert_eq!(
            Value::Dur(Duration::new(1, 500_000_000)).to_arg_string(),
            "1.500000000"
        );
    }

    #[test]
    fn test_same_type_ordering() {
        assert_eq!(
            Value::Uint(1).partial_cmp_same_type(&Value::Uint(2)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Str("b".to_string()).partial_cmp_same_type(&Value::Str("a".to_string())),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Int(1).partial_cmp_same_type(&Value::Uint(1)), None);
        assert_eq!(Value::Null.partial_cmp_same_type(&Value::Int(1)), None);
    }

    #[test]
    fn test_value_serde() {
        let val = Value::Uint(1024);
        let json = serde_json::to_string(&val).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(val, back);
    }
}
