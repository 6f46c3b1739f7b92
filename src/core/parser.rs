//! Recipe parsing and validation.
//!
//! Parses a recipe YAML document and validates its structural constraints:
//! - The document must be a mapping
//! - It must contain a non-empty `steps` sequence
//! - Every step must be a mapping with a string `operator`
//! - Custom YAML tags are rejected
//!
//! Variable substitution runs on the validated tree before it is converted
//! into a typed [`Recipe`].

use super::error::{CsetError, Result};
use super::template::template_variables;
use super::types::*;
use indexmap::IndexMap;
use serde_yaml_ng::Value as Node;
use std::path::{Path, PathBuf};

/// Where a recipe document comes from.
#[derive(Debug, Clone)]
pub enum RecipeSource {
    /// Path to a YAML file on disk
    Path(PathBuf),
    /// Literal YAML text
    Text(String),
    /// Raw document bytes (e.g. read from stdin), must be UTF-8
    Bytes(Vec<u8>),
}

impl From<&Path> for RecipeSource {
    fn from(p: &Path) -> Self {
        Self::Path(p.to_path_buf())
    }
}

impl From<PathBuf> for RecipeSource {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<&str> for RecipeSource {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RecipeSource {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Parse and validate a recipe, substituting `variables` when given.
pub fn parse_recipe(
    source: impl Into<RecipeSource>,
    variables: Option<&Variables>,
) -> Result<Recipe> {
    let tree = parse_recipe_tree(source, variables)?;
    recipe_from_tree(tree)
}

/// Parse and validate a recipe, returning the (templated) YAML tree.
pub fn parse_recipe_tree(
    source: impl Into<RecipeSource>,
    variables: Option<&Variables>,
) -> Result<Node> {
    let text = read_source(source.into())?;
    let tree: Node = serde_yaml_ng::from_str(&text)?;
    reject_tags(&tree)?;
    validate_shape(&tree)?;
    match variables {
        Some(vars) => template_variables(tree, vars),
        None => Ok(tree),
    }
}

fn read_source(source: RecipeSource) -> Result<String> {
    match source {
        RecipeSource::Text(text) => Ok(text),
        RecipeSource::Bytes(bytes) => String::from_utf8(bytes)
            .map_err(|e| CsetError::InvalidInputType(format!("recipe is not UTF-8 text: {}", e))),
        RecipeSource::Path(path) => {
            let meta = std::fs::metadata(&path).map_err(|e| CsetError::io(&path, e))?;
            if !meta.is_file() {
                return Err(CsetError::InvalidInputType(format!(
                    "{} is not a file",
                    path.display()
                )));
            }
            std::fs::read_to_string(&path).map_err(|e| CsetError::io(&path, e))
        }
    }
}

/// Reject custom tags anywhere in the document.
fn reject_tags(node: &Node) -> Result<()> {
    match node {
        Node::Tagged(tagged) => Err(CsetError::InvalidRecipeSyntax(
            <serde_yaml_ng::Error as serde::de::Error>::custom(format!(
                "custom tag {} is not allowed",
                tagged.tag
            )),
        )),
        Node::Mapping(map) => map.iter().try_for_each(|(key, value)| {
            reject_tags(key)?;
            reject_tags(value)
        }),
        Node::Sequence(seq) => seq.iter().try_for_each(reject_tags),
        _ => Ok(()),
    }
}

/// Check the document is a mapping with a non-empty `steps` sequence.
fn validate_shape(tree: &Node) -> Result<()> {
    let map = match tree {
        Node::Mapping(map) => map,
        other => {
            return Err(CsetError::InvalidRecipeShape(format!(
                "got {}",
                node_kind(other)
            )))
        }
    };
    match map.get(STEPS_KEY) {
        None => Err(CsetError::MissingSteps),
        Some(Node::Sequence(steps)) if !steps.is_empty() => Ok(()),
        Some(_) => Err(CsetError::EmptySteps),
    }
}

/// Convert a validated tree into a typed recipe.
pub fn recipe_from_tree(tree: Node) -> Result<Recipe> {
    validate_shape(&tree)?;
    let Node::Mapping(map) = tree else {
        return Err(CsetError::InvalidRecipeShape("got non-mapping".to_string()));
    };

    let mut steps = Vec::new();
    let mut metadata = IndexMap::new();
    for (key, value) in map {
        let key = match key {
            Node::String(k) => k,
            other => {
                return Err(CsetError::InvalidRecipeShape(format!(
                    "top-level key {:?} is not a string",
                    other
                )))
            }
        };
        if key == STEPS_KEY {
            if let Node::Sequence(seq) = value {
                for (i, node) in seq.into_iter().enumerate() {
                    steps.push(step_from_node(node, &format!("steps[{}]", i))?);
                }
            }
        } else {
            metadata.insert(key, value);
        }
    }

    Ok(Recipe { steps, metadata })
}

/// Whether a node is a step definition (a mapping with an `operator` key).
pub fn is_step_node(node: &Node) -> bool {
    matches!(node, Node::Mapping(map) if map.contains_key(OPERATOR_KEY))
}

fn step_from_node(node: Node, location: &str) -> Result<Step> {
    let Node::Mapping(map) = node else {
        return Err(CsetError::InvalidStep(format!(
            "{} must be a mapping, got {}",
            location,
            node_kind(&node)
        )));
    };

    let operator = match map.get(OPERATOR_KEY) {
        Some(Node::String(op)) => op.clone(),
        Some(other) => {
            return Err(CsetError::InvalidStep(format!(
                "{}.operator must be a string, got {}",
                location,
                node_kind(other)
            )))
        }
        None => {
            return Err(CsetError::InvalidStep(format!(
                "{} has no operator",
                location
            )))
        }
    };

    let mut args = IndexMap::new();
    for (key, value) in map {
        let key = match key {
            Node::String(k) => k,
            other => {
                return Err(CsetError::InvalidStep(format!(
                    "{} has non-string argument name {:?}",
                    location, other
                )))
            }
        };
        if key == OPERATOR_KEY {
            continue;
        }
        let arg = if is_step_node(&value) {
            let nested = step_from_node(value, &format!("{}.{}", location, key))?;
            Argument::Step(Box::new(nested))
        } else {
            Argument::Literal(value)
        };
        args.insert(key, arg);
    }

    Ok(Step { operator, args })
}

fn node_kind(node: &Node) -> &'static str {
    match node {
        Node::Null => "null",
        Node::Bool(_) => "bool",
        Node::Number(_) => "number",
        Node::String(_) => "string",
        Node::Sequence(_) => "sequence",
        Node::Mapping(_) => "mapping",
        Node::Tagged(_) => "tagged value",
    }
}
