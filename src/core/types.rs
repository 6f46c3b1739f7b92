//! Recipe, step, and pipeline value types.
//!
//! The parsed YAML tree is kept as [`serde_yaml_ng::Value`] (mapping,
//! sequence, or scalar) until it has been validated and templated, then it is
//! converted into the typed [`Recipe`] / [`Step`] structure the executor walks.

use indexmap::IndexMap;
use serde_yaml_ng::Value as Node;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Template variable name → value.
pub type Variables = IndexMap<String, Node>;

/// Key that marks a mapping as a step.
pub const OPERATOR_KEY: &str = "operator";

/// Key holding the ordered step list of a recipe.
pub const STEPS_KEY: &str = "steps";

// ============================================================================
// Recipe
// ============================================================================

/// A parsed, validated recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    /// Top-level steps, executed in order (never empty)
    pub steps: Vec<Step>,

    /// Every other top-level key in document order (title, description, ...)
    pub metadata: IndexMap<String, Node>,
}

impl Recipe {
    /// Recipe title, if it has a string one.
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Node::as_str)
    }

    /// Recipe description, if it has a string one.
    pub fn description(&self) -> Option<&str> {
        self.metadata.get("description").and_then(Node::as_str)
    }
}

// ============================================================================
// Steps
// ============================================================================

/// One operator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Dotted operator name (e.g. `misc.noop`)
    pub operator: String,

    /// Named arguments in document order
    pub args: IndexMap<String, Argument>,
}

/// A step argument: a literal value or a nested step whose result is used.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Literal(Node),
    Step(Box<Step>),
}

impl Step {
    /// Number of steps in this subtree, including this one.
    pub fn count(&self) -> usize {
        1 + self
            .args
            .values()
            .map(|a| match a {
                Argument::Step(s) => s.count(),
                Argument::Literal(_) => 0,
            })
            .sum::<usize>()
    }
}

// ============================================================================
// Pipeline values
// ============================================================================

/// Value threaded between steps and passed as operator arguments.
#[derive(Clone, Default)]
pub enum Value {
    /// No value yet (input to the first step)
    #[default]
    Nothing,

    /// Plain data: numbers, strings, sequences, mappings
    Literal(Node),

    /// Operator-specific payload the engine does not interpret
    Handle(Handle),
}

impl Value {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }

    /// Short description of the variant for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Nothing => "nothing",
            Self::Literal(Node::Null) => "null",
            Self::Literal(Node::Bool(_)) => "bool",
            Self::Literal(Node::Number(_)) => "number",
            Self::Literal(Node::String(_)) => "string",
            Self::Literal(Node::Sequence(_)) => "sequence",
            Self::Literal(Node::Mapping(_)) => "mapping",
            Self::Literal(Node::Tagged(_)) => "tagged",
            Self::Handle(h) => h.type_name(),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Self::Literal(node)
    }
}

impl From<Handle> for Value {
    fn from(handle: Handle) -> Self {
        Self::Handle(handle)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nothing, Self::Nothing) => true,
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Handle(a), Self::Handle(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => write!(f, "Nothing"),
            Self::Literal(n) => f.debug_tuple("Literal").field(n).finish(),
            Self::Handle(h) => write!(f, "Handle({})", h.type_name()),
        }
    }
}

/// Shared, type-erased operator payload.
#[derive(Clone)]
pub struct Handle {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Handle {
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(payload),
        }
    }

    /// Borrow the payload as `T`, if that is its type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether both handles share the same payload.
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

// ============================================================================
// Rendering helper
// ============================================================================

/// Render a node as text for string interpolation.
///
/// Scalars render plainly; sequences and mappings render as flow JSON.
pub fn node_to_string(val: &Node) -> String {
    match val {
        Node::String(s) => s.clone(),
        Node::Number(n) => n.to_string(),
        Node::Bool(b) => b.to_string(),
        Node::Null => "null".to_string(),
        Node::Tagged(t) => node_to_string(&t.value),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{:?}", other)),
    }
}
