use std::collections::BTreeMap;

use crate::constants::DEFAULT_VALUE;
use crate::directive::{Directive, parse_command};

/// Mapping from variable name to value, rebuilt from scratch on every
/// recompute. Keys are kept sorted so rendered output is stable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariableStore {
    vars: BTreeMap<String, f64>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.vars.clear();
    }

    /// Apply a mutation directive. A missing variable starts at the default
    /// before the operator runs. Retrievals never change state.
    /// Returns whether the mapping was mutated.
    pub fn apply(&mut self, directive: &Directive) -> bool {
        let Directive::Mutation { name, op, operand } = directive else {
            return false;
        };
        let slot = self.vars.entry(name.clone()).or_insert(DEFAULT_VALUE);
        *slot = op.eval(*slot, *operand);
        true
    }

    /// Parse and apply one raw command. Malformed commands are logged and
    /// dropped without touching the mapping.
    pub fn execute(&mut self, command: &str) -> bool {
        match parse_command(command) {
            Ok(directive) => self.apply(&directive),
            Err(rejection) => {
                rejection.log(command);
                false
            }
        }
    }

    /// Current value, or the default for a variable never set.
    pub fn get(&self, name: &str) -> f64 {
        self.value(name).unwrap_or(DEFAULT_VALUE)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.vars.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Text form of a value as it is spliced into a message: integral values
/// carry no fractional part (`3`, not `3.0`).
pub fn format_value(value: f64) -> String {
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        // collapses -0
        return "0".to_string();
    }
    value.to_string()
}
