//! End-to-end behaviour of the recipe engine through its public API.

use cset::core::archive::ARCHIVE_FILE;
use cset::core::error::{CsetError, OperatorError};
use cset::core::executor::execute_step;
use cset::core::metadata::{RunContext, META_FILE};
use cset::core::operator::{Args, Operator, Param};
use cset::core::parser::{parse_recipe, parse_recipe_tree, RecipeSource};
use cset::core::registry::{get_operator, OperatorRegistry};
use cset::core::runner::{execute_recipe, BakeOptions};
use cset::core::template::replace_template_variable;
use cset::core::types::{Argument, Value, Variables};
use cset::logging::LOG_FILE;
use serde_yaml_ng::Value as Node;
use std::io::Read;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Runs change the process working directory; keep them one at a time.
fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn node(yaml: &str) -> Node {
    serde_yaml_ng::from_str(yaml).unwrap()
}

fn vars(pairs: &[(&str, Node)]) -> Variables {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn ctx(dir: &Path) -> RunContext {
    RunContext::in_directory(dir)
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn steps_must_be_present_and_non_empty() {
    assert!(matches!(
        parse_recipe("title: nothing to do", None),
        Err(CsetError::MissingSteps)
    ));
    assert!(matches!(
        parse_recipe("steps: []", None),
        Err(CsetError::EmptySteps)
    ));
    let recipe = parse_recipe("steps: [{operator: misc.noop}]", None).unwrap();
    assert_eq!(recipe.steps.len(), 1);
}

#[test]
fn single_step_recipe_parses_arguments() {
    let recipe = parse_recipe(
        "steps:\n  - operator: misc.noop\n    test_argument: Banana",
        None,
    )
    .unwrap();
    assert_eq!(recipe.steps.len(), 1);
    let step = &recipe.steps[0];
    assert_eq!(step.operator, "misc.noop");
    assert_eq!(
        step.args["test_argument"],
        Argument::Literal(Node::String("Banana".into()))
    );
}

#[test]
fn substitution_preserves_exact_placeholder_type() {
    let tree = parse_recipe_tree(
        r#"{"steps": [{"operator": "misc.noop", "argument": "$VALUE"}]}"#,
        Some(&vars(&[("VALUE", Node::from(42))])),
    )
    .unwrap();
    assert_eq!(
        tree,
        node(r#"{"steps": [{"operator": "misc.noop", "argument": 42}]}"#)
    );
}

#[test]
fn embedded_placeholder_renders_as_text() {
    let vars = vars(&[("N", Node::from(42))]);
    assert_eq!(replace_template_variable("$N", &vars).unwrap(), Node::from(42));
    assert_eq!(
        replace_template_variable("count=$N", &vars).unwrap(),
        Node::String("count=42".into())
    );
}

#[test]
fn unbound_placeholder_is_rejected() {
    let template = "steps: [{operator: misc.noop, x: $UNDEFINED}]";
    let err = parse_recipe(template, Some(&Variables::new())).unwrap_err();
    assert!(matches!(err, CsetError::UnboundVariable(_)));

    let bound = vars(&[("UNDEFINED", Node::String("now defined".into()))]);
    parse_recipe(template, Some(&bound)).unwrap();
}

#[test]
fn recipe_from_file_and_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recipe.yaml");
    std::fs::write(&path, "title: From disk\nsteps: [{operator: misc.noop}]\n").unwrap();
    let from_file = parse_recipe(path.as_path(), None).unwrap();
    assert_eq!(from_file.title(), Some("From disk"));

    let from_bytes = parse_recipe(
        RecipeSource::Bytes(b"title: From disk\nsteps: [{operator: misc.noop}]\n".to_vec()),
        None,
    )
    .unwrap();
    assert_eq!(from_file, from_bytes);

    let err = parse_recipe(RecipeSource::Bytes(vec![0xff, 0xfe]), None).unwrap_err();
    assert!(matches!(err, CsetError::InvalidInputType(_)));
}

// ============================================================================
// Operators and execution
// ============================================================================

#[test]
fn noop_resolves_and_unknown_operator_fails() {
    let dir = tempfile::tempdir().unwrap();
    let noop = get_operator("misc.noop").unwrap();
    for input in ["1", "banana", "[1, {a: b}]", "~"] {
        let mut args = Args::new();
        args.insert("x", node(input));
        assert_eq!(noop.call(args, &ctx(dir.path())).unwrap(), Value::Literal(node(input)));
    }
    assert!(matches!(
        get_operator("nonexistent.operator"),
        Err(CsetError::UnknownOperator(_))
    ));
}

#[test]
fn identity_chain_threads_external_input() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = ctx(dir.path());
    let recipe = parse_recipe(
        "steps:\n  - operator: misc.noop\n  - operator: misc.noop\n",
        None,
    )
    .unwrap();
    let registry = OperatorRegistry::builtin();

    let input = Value::Literal(node("{field: air_temperature}"));
    let mut value = input.clone();
    for step in &recipe.steps {
        value = execute_step(step, &value, registry, &ctx).unwrap();
    }
    assert_eq!(value, input);
}

const DATA: &[Param] = &[Param::required("data")];

fn record_data(mut args: Args, _ctx: &RunContext) -> Result<Value, OperatorError> {
    Ok(args.take("data")?)
}

#[test]
fn explicit_argument_overrides_pipeline_value() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = OperatorRegistry::builder();
    builder.register(Operator::new("some.op", DATA, record_data));
    let registry = builder.build();

    let recipe = parse_recipe("steps: [{operator: some.op, data: explicit}]", None).unwrap();
    let out = execute_step(
        &recipe.steps[0],
        &Value::Literal(Node::String("implicit".into())),
        &registry,
        &ctx(dir.path()),
    )
    .unwrap();
    assert_eq!(out, Value::Literal(Node::String("explicit".into())));
}

// ============================================================================
// Recipe runs
// ============================================================================

#[test]
fn output_directory_that_is_a_file_is_rejected() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("occupied");
    std::fs::write(&file, "data").unwrap();

    let err = execute_recipe(
        "steps: [{operator: misc.noop}]",
        &file,
        OperatorRegistry::builtin(),
        &BakeOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CsetError::OutputIsFile(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert!(!dir.path().join(META_FILE).exists());
}

#[test]
fn run_writes_file_and_archives_it() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("output");
    let recipe = "\
title: Archive test
steps:
  - operator: write.write_json
    data: {value: 42}
    filename: result.json
  - operator: misc.noop
";
    let summary = execute_recipe(
        recipe,
        &out,
        OperatorRegistry::builtin(),
        &BakeOptions::default(),
    )
    .unwrap();

    assert!(out.join("result.json").is_file());
    assert!(out.join(LOG_FILE).is_file());
    assert_eq!(summary.output, Value::Literal(node("{value: 42}")));

    let mut archive =
        zip::ZipArchive::new(std::fs::File::open(out.join(ARCHIVE_FILE)).unwrap()).unwrap();
    let names: Vec<String> = archive.file_names().map(String::from).collect();
    assert!(names.contains(&"result.json".to_string()));
    assert!(names.contains(&META_FILE.to_string()));
    assert!(!names.iter().any(|n| n == ARCHIVE_FILE));

    let mut archived = String::new();
    archive
        .by_name("result.json")
        .unwrap()
        .read_to_string(&mut archived)
        .unwrap();
    assert_eq!(archived, std::fs::read_to_string(out.join("result.json")).unwrap());

    let meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join(META_FILE)).unwrap()).unwrap();
    assert_eq!(meta["title"], serde_json::json!("Archive test"));
    assert_eq!(meta["outputs"], serde_json::json!(["result.json"]));
}

#[test]
fn run_restores_working_directory_after_failure() {
    let _serial = serial();
    let before = std::env::current_dir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let err = execute_recipe(
        "steps: [{operator: misc.division, numerator: 1, denominator: 0}]",
        dir.path(),
        OperatorRegistry::builtin(),
        &BakeOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "division by zero");
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
fn read_then_write_pipeline() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.json");
    std::fs::write(&input, r#"{"name": "t2m", "units": "K", "history": "x"}"#).unwrap();
    let out = dir.path().join("out");

    let recipe = "\
steps:
  - operator: read.read_json
    file_paths: $INPUT
  - operator: misc.remove_attribute
    attribute: history
  - operator: write.write_json
    filename: cleaned.json
";
    let options = BakeOptions {
        variables: Some(vars(&[(
            "INPUT",
            Node::String(input.display().to_string()),
        )])),
        ..BakeOptions::default()
    };
    execute_recipe(recipe, &out, OperatorRegistry::builtin(), &options).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("cleaned.json")).unwrap())
            .unwrap();
    assert_eq!(written, serde_json::json!({"name": "t2m", "units": "K"}));
}
