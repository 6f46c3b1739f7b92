//! `$VARIABLE` substitution over a parsed recipe tree.
//!
//! Only values are templated, never mapping keys. A string that is exactly
//! `$NAME` is replaced by the variable's typed value; a placeholder embedded
//! in a longer string is interpolated as text.

use super::error::{CsetError, Result};
use super::types::{node_to_string, Variables};
use regex::Regex;
use serde_yaml_ng::{Mapping, Value as Node};
use std::sync::LazyLock;

/// `$` followed by an uppercase letter or underscore.
static UNBOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[A-Z_]").expect("placeholder pattern is valid"));

/// Substitute variables throughout a recipe tree.
pub fn template_variables(node: Node, variables: &Variables) -> Result<Node> {
    match node {
        Node::Mapping(map) => {
            let mut templated = Mapping::with_capacity(map.len());
            for (key, value) in map {
                templated.insert(key, template_variables(value, variables)?);
            }
            Ok(Node::Mapping(templated))
        }
        Node::Sequence(seq) => seq
            .into_iter()
            .map(|item| template_variables(item, variables))
            .collect::<Result<Vec<_>>>()
            .map(Node::Sequence),
        Node::String(s) => replace_template_variable(&s, variables),
        other => Ok(other),
    }
}

/// Substitute variables in a single string leaf.
pub fn replace_template_variable(s: &str, variables: &Variables) -> Result<Node> {
    if let Some(value) = s.strip_prefix('$').and_then(|name| variables.get(name)) {
        return Ok(value.clone());
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match longest_prefix_variable(after, variables) {
            Some((name, value)) => {
                result.push_str(&node_to_string(value));
                rest = &after[name.len()..];
            }
            None => {
                result.push('$');
                rest = after;
            }
        }
    }
    result.push_str(rest);

    if UNBOUND.is_match(&result) {
        return Err(CsetError::UnboundVariable(result));
    }
    Ok(Node::String(result))
}

/// The longest variable name that `text` starts with.
fn longest_prefix_variable<'a>(
    text: &str,
    variables: &'a Variables,
) -> Option<(&'a str, &'a Node)> {
    variables
        .iter()
        .filter(|(name, _)| !name.is_empty() && text.starts_with(name.as_str()))
        .max_by_key(|(name, _)| name.len())
        .map(|(name, value)| (name.as_str(), value))
}
