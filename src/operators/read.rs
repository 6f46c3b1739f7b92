//! Read operators: load data files into the pipeline.

use crate::core::error::OperatorError;
use crate::core::metadata::RunContext;
use crate::core::operator::{ArgError, Args, Operator, Param};
use crate::core::registry::OperatorRegistryBuilder;
use crate::core::types::Value;
use serde_yaml_ng::Value as Node;
use std::path::PathBuf;
use tracing::debug;

const READ_JSON: &[Param] = &[Param::required("file_paths")];

pub fn register(builder: &mut OperatorRegistryBuilder) {
    builder.register(Operator::new("read.read_json", READ_JSON, read_json));
}

/// Path or glob patterns from a string or a list of strings.
fn patterns(args: &Args, name: &str) -> Result<Vec<String>, ArgError> {
    let wrong_type = |node: &Node| ArgError::WrongType {
        name: name.to_string(),
        expected: "a path or list of paths",
        got: Value::Literal(node.clone()).kind(),
    };
    match args.literal(name)? {
        Node::String(s) => Ok(vec![s.clone()]),
        Node::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(|| wrong_type(item)))
            .collect(),
        other => Err(wrong_type(other)),
    }
}

/// Expand patterns into matching files, each pattern's matches sorted.
fn expand(patterns: &[String]) -> Result<Vec<PathBuf>, OperatorError> {
    let mut files = Vec::new();
    for pattern in patterns {
        let mut matches: Vec<PathBuf> = glob::glob(pattern)?
            .collect::<Result<_, glob::GlobError>>()?;
        matches.retain(|p| p.is_file());
        matches.sort();
        debug!(pattern = %pattern, matches = matches.len(), "expanded input pattern");
        files.extend(matches);
    }
    Ok(files)
}

/// Load JSON files. One match returns its value; several return a list.
fn read_json(args: Args, _ctx: &RunContext) -> Result<Value, OperatorError> {
    let patterns = patterns(&args, "file_paths")?;
    let files = expand(&patterns)?;
    if files.is_empty() {
        return Err(format!("no files found matching {}", patterns.join(", ")).into());
    }

    let mut loaded = Vec::with_capacity(files.len());
    for path in &files {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        let json: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| format!("invalid JSON in {}: {}", path.display(), e))?;
        loaded.push(serde_yaml_ng::to_value(json)?);
    }

    if loaded.len() == 1 {
        Ok(Value::Literal(loaded.remove(0)))
    } else {
        Ok(Value::Literal(Node::Sequence(loaded)))
    }
}
