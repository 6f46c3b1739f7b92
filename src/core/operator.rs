//! Operator descriptors and argument binding.
//!
//! Every operator declares its parameters up front. The first declared
//! parameter receives the pipeline value unless a recipe names it explicitly.

use super::error::OperatorError;
use super::metadata::RunContext;
use super::types::Value;
use indexmap::IndexMap;
use serde_yaml_ng::Value as Node;
use std::fmt;
use thiserror::Error;

/// Operator entry point.
pub type OperatorFn = fn(Args, &RunContext) -> Result<Value, OperatorError>;

/// A declared operator parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub required: bool,
}

impl Param {
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// Declared parameter list of an operator.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    /// Parameters in declaration order
    pub params: &'static [Param],

    /// Accept arguments beyond the declared parameters
    pub extra_kwargs: bool,
}

impl Signature {
    /// Name of the parameter that receives the pipeline value.
    pub fn first_param(&self) -> Option<&'static str> {
        self.params.first().map(|p| p.name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }
}

/// A named, registered operator.
#[derive(Clone)]
pub struct Operator {
    name: String,
    signature: Signature,
    func: OperatorFn,
}

impl Operator {
    pub fn new(name: impl Into<String>, params: &'static [Param], func: OperatorFn) -> Self {
        Self {
            name: name.into(),
            signature: Signature {
                params,
                extra_kwargs: false,
            },
            func,
        }
    }

    /// Allow arguments that are not declared parameters.
    pub fn with_extra_kwargs(mut self) -> Self {
        self.signature.extra_kwargs = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Invoke the operator with fully bound arguments.
    pub fn call(&self, args: Args, ctx: &RunContext) -> Result<Value, OperatorError> {
        (self.func)(args, ctx)
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self
            .signature
            .params
            .iter()
            .map(|p| {
                if p.required {
                    p.name.to_string()
                } else {
                    format!("{}=None", p.name)
                }
            })
            .collect();
        let extra = if self.signature.extra_kwargs {
            ", **kwargs"
        } else {
            ""
        };
        write!(f, "{}({}{})", self.name, params.join(", "), extra)
    }
}

// ============================================================================
// Arguments
// ============================================================================

/// Argument access error raised inside operators.
#[derive(Debug, Error)]
pub enum ArgError {
    #[error("missing argument '{0}'")]
    Missing(String),

    #[error("argument '{name}' must be {expected}, got {got}")]
    WrongType {
        name: String,
        expected: &'static str,
        got: &'static str,
    },
}

/// Bound keyword arguments for one operator call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: IndexMap<String, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Insert an argument ahead of all others.
    pub fn bind_first(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.shift_insert(0, name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Remove and return an argument, failing if it is absent.
    pub fn take(&mut self, name: &str) -> Result<Value, ArgError> {
        self.values
            .shift_remove(name)
            .ok_or_else(|| ArgError::Missing(name.to_string()))
    }

    /// Borrow an argument that must be a literal.
    pub fn literal(&self, name: &str) -> Result<&Node, ArgError> {
        match self.values.get(name) {
            Some(Value::Literal(node)) => Ok(node),
            Some(other) => Err(ArgError::WrongType {
                name: name.to_string(),
                expected: "a literal value",
                got: other.kind(),
            }),
            None => Err(ArgError::Missing(name.to_string())),
        }
    }

    /// Optional string argument; absent or null gives `None`.
    pub fn opt_str(&self, name: &str) -> Result<Option<&str>, ArgError> {
        match self.values.get(name) {
            None | Some(Value::Literal(Node::Null)) | Some(Value::Nothing) => Ok(None),
            Some(Value::Literal(Node::String(s))) => Ok(Some(s)),
            Some(other) => Err(ArgError::WrongType {
                name: name.to_string(),
                expected: "a string",
                got: other.kind(),
            }),
        }
    }

    /// Optional boolean argument; absent or null gives `None`.
    pub fn opt_bool(&self, name: &str) -> Result<Option<bool>, ArgError> {
        match self.values.get(name) {
            None | Some(Value::Literal(Node::Null)) | Some(Value::Nothing) => Ok(None),
            Some(Value::Literal(Node::Bool(b))) => Ok(Some(*b)),
            Some(other) => Err(ArgError::WrongType {
                name: name.to_string(),
                expected: "a boolean",
                got: other.kind(),
            }),
        }
    }
}
