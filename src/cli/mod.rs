//! CLI subcommands: bake, parse, graph, operators.

use crate::core::error::{CsetError, Result as CsetResult};
use crate::core::graph::recipe_to_dot;
use crate::core::parser::{self, RecipeSource};
use crate::core::registry::OperatorRegistry;
use crate::core::runner::{self, BakeOptions};
use crate::core::types::Variables;
use clap::Subcommand;
use regex::Regex;
use serde_yaml_ng::Value as Node;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static VARIABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("variable name pattern is valid"));

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a recipe, writing outputs into a directory
    Bake {
        /// Recipe file (`-` reads stdin)
        #[arg(short, long)]
        recipe: PathBuf,

        /// Output directory (created if missing)
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Plot style file recorded for plotting operators
        #[arg(long)]
        style_file: Option<PathBuf>,

        /// Plot resolution in dots per inch
        #[arg(long)]
        plot_resolution: Option<u32>,

        /// Skip writing intermediate data
        #[arg(long)]
        skip_write: bool,

        /// Template variables: -- --KEY=value ...
        #[arg(last = true)]
        variables: Vec<String>,
    },

    /// Validate a recipe and print it with variables substituted
    Parse {
        /// Recipe file (`-` reads stdin)
        #[arg(short, long)]
        recipe: PathBuf,

        /// Template variables: -- --KEY=value ...
        #[arg(last = true)]
        variables: Vec<String>,
    },

    /// Render a recipe's step graph as Graphviz DOT
    Graph {
        /// Recipe file (`-` reads stdin)
        #[arg(short, long)]
        recipe: PathBuf,

        /// Write DOT to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Include literal arguments in node labels
        #[arg(long)]
        details: bool,

        /// Template variables: -- --KEY=value ...
        #[arg(last = true)]
        variables: Vec<String>,
    },

    /// List available operators and their parameters
    Operators,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Bake {
            recipe,
            output_dir,
            style_file,
            plot_resolution,
            skip_write,
            variables,
        } => {
            let options = BakeOptions {
                variables: Some(parse_variable_options(&variables).map_err(|e| e.to_string())?),
                style_file,
                plot_resolution,
                skip_write: skip_write.then_some(true),
            };
            cmd_bake(&recipe, &output_dir, &options)
        }
        Commands::Parse { recipe, variables } => cmd_parse(&recipe, &variables),
        Commands::Graph {
            recipe,
            output,
            details,
            variables,
        } => cmd_graph(&recipe, output.as_deref(), details, &variables),
        Commands::Operators => cmd_operators(OperatorRegistry::builtin()),
    }
}

/// Parse `--KEY=value` / `--KEY value` pairs into template variables.
///
/// Values are read as YAML, so `42` is an integer and `[a, b]` a list.
pub fn parse_variable_options(options: &[String]) -> CsetResult<Variables> {
    let mut variables = Variables::new();
    let mut iter = options.iter();
    while let Some(option) = iter.next() {
        let Some(body) = option.strip_prefix("--") else {
            return Err(CsetError::InvalidVariableOption(option.clone()));
        };
        let (key, raw) = match body.split_once('=') {
            Some((key, raw)) => (key, raw.to_string()),
            None => match iter.next() {
                Some(raw) => (body, raw.clone()),
                None => return Err(CsetError::InvalidVariableOption(option.clone())),
            },
        };
        if !VARIABLE_NAME.is_match(key) {
            return Err(CsetError::InvalidVariableOption(option.clone()));
        }
        variables.insert(key.to_string(), variable_value(&raw));
    }
    Ok(variables)
}

fn variable_value(raw: &str) -> Node {
    if raw.is_empty() {
        return Node::String(String::new());
    }
    serde_yaml_ng::from_str(raw).unwrap_or_else(|_| Node::String(raw.to_string()))
}

fn recipe_source(recipe: &Path) -> Result<RecipeSource, String> {
    if recipe == Path::new("-") {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .map_err(|e| format!("cannot read recipe from stdin: {}", e))?;
        Ok(RecipeSource::Bytes(bytes))
    } else {
        Ok(RecipeSource::Path(recipe.to_path_buf()))
    }
}

fn cmd_bake(recipe: &Path, output_dir: &Path, options: &BakeOptions) -> Result<(), String> {
    let source = recipe_source(recipe)?;
    let summary = runner::execute_recipe(source, output_dir, OperatorRegistry::builtin(), options)
        .map_err(|e| e.to_string())?;

    println!(
        "Baked {} step(s) into {} ({:.2}s)",
        summary.steps,
        summary.output_directory.display(),
        summary.duration.as_secs_f64()
    );
    println!("  Archive: {}", summary.archive.display());
    Ok(())
}

fn cmd_parse(recipe: &Path, variables: &[String]) -> Result<(), String> {
    let variables = parse_variable_options(variables).map_err(|e| e.to_string())?;
    let tree = parser::parse_recipe_tree(recipe_source(recipe)?, Some(&variables))
        .map_err(|e| e.to_string())?;
    let yaml = serde_yaml_ng::to_string(&tree).map_err(|e| e.to_string())?;
    print!("{}", yaml);
    Ok(())
}

fn cmd_graph(
    recipe: &Path,
    output: Option<&Path>,
    details: bool,
    variables: &[String],
) -> Result<(), String> {
    let variables = parse_variable_options(variables).map_err(|e| e.to_string())?;
    let parsed = parser::parse_recipe(recipe_source(recipe)?, Some(&variables))
        .map_err(|e| e.to_string())?;
    let dot = recipe_to_dot(&parsed, details);

    match output {
        Some(path) => {
            std::fs::write(path, &dot)
                .map_err(|e| format!("cannot write {}: {}", path.display(), e))?;
            println!("Wrote graph to {}", path.display());
        }
        None => print!("{}", dot),
    }
    Ok(())
}

fn cmd_operators(registry: &OperatorRegistry) -> Result<(), String> {
    for module in registry.modules() {
        println!("{}:", module);
        for name in registry.names() {
            if name.split_once('.').map(|(m, _)| m) == Some(module) {
                let operator = registry.get_operator(name).map_err(|e| e.to_string())?;
                println!("  {}", operator);
            }
        }
    }
    Ok(())
}
