//! Rule symbol table
//!
//! Built once before any other compilation pass and read-only afterwards.

use crate::error::{CompileError, Result};
use std::collections::HashMap;
use tripwire_core::tree::{Program, RuleDef};

/// Rule name to definition index, built once per program
#[derive(Debug)]
pub struct SymbolTable {
    by_name: HashMap<String, usize>,
}

impl SymbolTable {
    /// Build the table, rejecting duplicate definitions.
    pub fn build(program: &Program) -> Result<SymbolTable> {
        let mut by_name = HashMap::with_capacity(program.rules.len());
        for (index, rule) in program.rules.iter().enumerate() {
            if by_name.insert(rule.name.clone(), index).is_some() {
                return Err(CompileError::DuplicateRule(rule.name.clone()));
            }
        }
        Ok(SymbolTable { by_name })
    }

    /// Definition index for a rule name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Resolve a rule reference or report it as undefined.
    pub fn resolve<'p>(&self, program: &'p Program, name: &str) -> Result<&'p RuleDef> {
        self.index_of(name)
            .map(|i| &program.rules[i])
            .ok_or_else(|| CompileError::UndefinedRule(name.to_string()))
    }
}
