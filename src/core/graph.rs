//! Graphviz DOT rendering of a recipe's step graph.

use super::types::*;

/// Render a recipe as a DOT digraph.
///
/// Top-level steps are chained in execution order; nested steps point at the
/// step that consumes them, with the edge labelled by argument name. With
/// `details`, literal arguments are listed under the operator name.
pub fn recipe_to_dot(recipe: &Recipe, details: bool) -> String {
    let mut graph = DotGraph::default();
    let mut previous: Option<String> = None;
    for step in &recipe.steps {
        let id = graph.add_step(step, details);
        if let Some(prev) = previous {
            graph.edges.push(format!("  \"{}\" -> \"{}\";", prev, id));
        }
        previous = Some(id);
    }

    let mut out = String::new();
    out.push_str("digraph recipe {\n");
    out.push_str("  node [shape=box];\n");
    if let Some(title) = recipe.title() {
        out.push_str(&format!("  label=\"{}\";\n", escape_dot(title)));
    }
    for node in &graph.nodes {
        out.push_str(node);
        out.push('\n');
    }
    for edge in &graph.edges {
        out.push_str(edge);
        out.push('\n');
    }
    out.push_str("}\n");
    out
}

#[derive(Default)]
struct DotGraph {
    nodes: Vec<String>,
    edges: Vec<String>,
}

impl DotGraph {
    /// Add `step` and its nested steps, returning the step's node id.
    fn add_step(&mut self, step: &Step, details: bool) -> String {
        let id = format!("step{}", self.nodes.len());
        let slot = self.nodes.len();
        self.nodes.push(String::new());

        let mut label = escape_dot(&step.operator);
        for (key, arg) in &step.args {
            match arg {
                Argument::Step(nested) => {
                    let child = self.add_step(nested, details);
                    self.edges.push(format!(
                        "  \"{}\" -> \"{}\" [label=\"{}\"];",
                        child,
                        id,
                        escape_dot(key)
                    ));
                }
                Argument::Literal(node) if details => {
                    label.push_str(&format!(
                        "\\n{}: {}",
                        escape_dot(key),
                        escape_dot(&node_to_string(node))
                    ));
                }
                Argument::Literal(_) => {}
            }
        }
        self.nodes[slot] = format!("  \"{}\" [label=\"{}\"];", id, label);
        id
    }
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
