//! Operator registry: dotted name to operator lookup.
//!
//! The registry is a table built once and then shared read-only. Names are
//! `module.function` (e.g. `misc.noop`); resolution is a single lookup.

use super::error::{CsetError, Result};
use super::operator::Operator;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

static BUILTIN: LazyLock<OperatorRegistry> = LazyLock::new(|| {
    let mut builder = OperatorRegistry::builder();
    crate::operators::register_builtin(&mut builder);
    builder.build()
});

/// Builder used to register operators before execution.
#[derive(Default)]
pub struct OperatorRegistryBuilder {
    operators: HashMap<String, Operator>,
}

impl OperatorRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator.
    ///
    /// Panics on a duplicate name or an operator without parameters, since
    /// the pipeline value could not be bound to it.
    pub fn register(&mut self, operator: Operator) -> &mut Self {
        let name = operator.name().to_string();
        if operator.signature().first_param().is_none() {
            panic!("operator {} declares no parameters", name);
        }
        if self.operators.contains_key(&name) {
            panic!("duplicate operator registered: {}", name);
        }
        self.operators.insert(name, operator);
        self
    }

    pub fn build(self) -> OperatorRegistry {
        OperatorRegistry {
            operators: self.operators,
        }
    }
}

/// Immutable registry used during recipe execution.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    operators: HashMap<String, Operator>,
}

impl OperatorRegistry {
    pub fn builder() -> OperatorRegistryBuilder {
        OperatorRegistryBuilder::new()
    }

    /// The process-wide registry of builtin operators.
    pub fn builtin() -> &'static OperatorRegistry {
        &BUILTIN
    }

    /// Resolve a dotted operator name.
    pub fn get_operator(&self, dotted_name: &str) -> Result<&Operator> {
        self.operators
            .get(dotted_name)
            .ok_or_else(|| CsetError::UnknownOperator(dotted_name.to_string()))
    }

    /// All operator names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Operator module names, sorted and deduplicated.
    pub fn modules(&self) -> Vec<&str> {
        self.operators
            .keys()
            .filter_map(|name| name.split_once('.').map(|(module, _)| module))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Resolve a dotted name in the builtin registry.
pub fn get_operator(dotted_name: &str) -> Result<&'static Operator> {
    OperatorRegistry::builtin().get_operator(dotted_name)
}
