//! Four-valued truth logic
//!
//! Predicates over asynchronously-arriving operands need more than SQL's
//! three-valued logic: while one operand of an AND/OR is still in flight the
//! combined result may already be decided (FALSE decides an AND, TRUE decides
//! an OR). `Pending` models the not-yet-available operand; it never travels on
//! a channel, it only exists inside the logic stage between operand arrivals.

use serde::{Deserialize, Serialize};

/// A truth value in four-valued logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Truth {
    True,
    False,
    /// SQL NULL: the operand resolved to an unknown value
    Null,
    /// The operand has not arrived yet
    Pending,
}

impl Truth {
    /// Whether this value is final (anything but `Pending`).
    pub fn is_decided(self) -> bool {
        self != Truth::Pending
    }

    /// Logical AND.
    ///
    /// FALSE on either side decides FALSE even against a pending peer; NULL
    /// dominates PENDING and TRUE but loses to FALSE; TRUE requires both
    /// sides resolved.
    pub fn and(self, other: Truth) -> Truth {
        use Truth::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (Null, _) | (_, Null) => Null,
            (Pending, _) | (_, Pending) => Pending,
            (True, True) => True,
        }
    }

    /// Logical OR, the mirror of [`Truth::and`]: TRUE short-circuits, NULL
    /// dominates PENDING and FALSE.
    pub fn or(self, other: Truth) -> Truth {
        use Truth::*;
        match (self, other) {
            (True, _) | (_, True) => True,
            (Null, _) | (_, Null) => Null,
            (Pending, _) | (_, Pending) => Pending,
            (False, False) => False,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Truth::True => "true",
            Truth::False => "false",
            Truth::Null => "null",
            Truth::Pending => "pending",
        }
    }
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Truth::{self, *};

    const ALL: [Truth; 4] = [True, False, Null, Pending];

    fn and_table(a: Truth, b: Truth) -> Truth {
        match (a, b) {
            (False, _) | (_, False) => False,
            (Null, True) | (True, Null) | (Null, Null) => Null,
            (Null, Pending) | (Pending, Null) => Null,
            (True, True) => True,
            _ => Pending,
        }
    }

    fn or_table(a: Truth, b: Truth) -> Truth {
        match (a, b) {
            (True, _) | (_, True) => True,
            (Null, False) | (False, Null) | (Null, Null) => Null,
            (Null, Pending) | (Pending, Null) => Null,
            (False, False) => False,
            _ => Pending,
        }
    }

    #[test]
    fn test_and_all_sixteen_pairs() {
        for a in ALL {
            for b in ALL {
                assert_eq!(a.and(b), and_table(a, b), "and({a:?}, {b:?})");
            }
        }
    }

    #[test]
    fn test_or_all_sixteen_pairs() {
        for a in ALL {
            for b in ALL {
                assert_eq!(a.or(b), or_table(a, b), "or({a:?}, {b:?})");
            }
        }
    }

    #[test]
    fn test_short_circuit_against_pending_peer() {
        // FALSE decides an AND and TRUE decides an OR while the other
        // operand is still in flight.
        assert_eq!(False.and(Pending), False);
        assert_eq!(Pending.and(False), False);
        assert_eq!(True.or(Pending), True);
        assert_eq!(Pending.or(True), True);
        // TRUE does not decide an AND, FALSE does not decide an OR.
        assert_eq!(True.and(Pending), Pending);
        assert_eq!(False.or(Pending), Pending);
    }

    #[test]
    fn test_null_dominates_pending() {
        assert_eq!(Null.and(Pending), Null);
        assert_eq!(Null.or(Pending), Null);
    }

    #[test]
    fn test_commutative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(a.and(b), b.and(a));
                assert_eq!(a.or(b), b.or(a));
            }
        }
    }
}
