//! Error taxonomy for recipe parsing, operator resolution, and recipe runs.

use std::path::PathBuf;
use thiserror::Error;

/// Error type returned by operator functions.
///
/// Operators are opaque to the engine, so their failures are boxed and
/// propagated without being wrapped in additional context.
pub type OperatorError = Box<dyn std::error::Error + Send + Sync>;

/// Recipe engine error.
#[derive(Debug, Error)]
pub enum CsetError {
    /// Recipe source is neither a readable document path nor UTF-8 text.
    #[error("invalid recipe input: {0}")]
    InvalidInputType(String),

    /// The YAML document could not be parsed.
    #[error("recipe is not valid YAML: {0}")]
    InvalidRecipeSyntax(#[from] serde_yaml_ng::Error),

    /// The parsed document is not a mapping (or has a non-string key).
    #[error("recipe must be a mapping: {0}")]
    InvalidRecipeShape(String),

    /// No `steps` key at the top level.
    #[error("recipe must contain a 'steps' key")]
    MissingSteps,

    /// `steps` is not a sequence, or it is empty.
    #[error("recipe must have at least 1 step")]
    EmptySteps,

    /// A step is not a mapping with a string `operator` key.
    #[error("invalid step: {0}")]
    InvalidStep(String),

    /// A `$VAR` placeholder was left without a value.
    #[error("variable without a value: {0:?}")]
    UnboundVariable(String),

    /// Dotted operator name does not resolve to a registered operator.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// Recipe passes an argument the operator does not declare.
    #[error("operator '{operator}' got an unexpected argument '{argument}'")]
    UnexpectedArgument { operator: String, argument: String },

    /// A required operator parameter was neither given nor bound implicitly.
    #[error("operator '{operator}' is missing required argument '{argument}'")]
    MissingArgument { operator: String, argument: String },

    /// Output directory path exists and is a regular file.
    #[error("output directory is a file: {}", .0.display())]
    OutputIsFile(PathBuf),

    /// Malformed `--KEY=value` recipe variable option.
    #[error("invalid recipe variable option: {0}")]
    InvalidVariableOption(String),

    /// `meta.json` could not be (de)serialised.
    #[error("run metadata error in {}: {message}", path.display())]
    Metadata { path: PathBuf, message: String },

    /// Output archive could not be written.
    #[error("cannot write archive {}: {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Filesystem error with the path involved.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure raised by an operator, surfaced unmodified.
    #[error(transparent)]
    Operator(OperatorError),
}

impl CsetError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CsetError>;
