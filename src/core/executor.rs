//! Step executor: runs steps and threads the pipeline value between them.
//!
//! For each step: nested steps are run first (with the same pipeline value)
//! and their results become arguments, then the operator is called. The
//! pipeline value is bound to the operator's first declared parameter unless
//! the recipe names that parameter itself.

use super::error::{CsetError, Result};
use super::metadata::RunContext;
use super::operator::{Args, Operator};
use super::registry::OperatorRegistry;
use super::types::*;
use std::time::Instant;
use tracing::{debug, info};

/// Execute a single step with the current pipeline value.
pub fn execute_step(
    step: &Step,
    pipeline_value: &Value,
    registry: &OperatorRegistry,
    ctx: &RunContext,
) -> Result<Value> {
    let operator = registry.get_operator(&step.operator)?;

    let mut args = Args::new();
    for (key, arg) in &step.args {
        let value = match arg {
            Argument::Step(nested) => {
                debug!(argument = %key, operator = %nested.operator, "running nested step");
                execute_step(nested, pipeline_value, registry, ctx)?
            }
            Argument::Literal(node) => Value::Literal(node.clone()),
        };
        args.insert(key.clone(), value);
    }

    bind_pipeline_value(operator, &mut args, pipeline_value);
    check_arguments(operator, &args)?;
    operator.call(args, ctx).map_err(CsetError::Operator)
}

/// Execute steps in order, each receiving the previous step's result.
pub fn execute_steps(
    steps: &[Step],
    registry: &OperatorRegistry,
    ctx: &RunContext,
) -> Result<Value> {
    let mut pipeline_value = Value::Nothing;
    for (i, step) in steps.iter().enumerate() {
        info!("Running step {}/{}: {}", i + 1, steps.len(), step.operator);
        let start = Instant::now();
        pipeline_value = execute_step(step, &pipeline_value, registry, ctx)?;
        debug!(
            operator = %step.operator,
            output = pipeline_value.kind(),
            seconds = start.elapsed().as_secs_f64(),
            "step finished"
        );
    }
    Ok(pipeline_value)
}

/// Bind the pipeline value to the first parameter unless given explicitly.
fn bind_pipeline_value(operator: &Operator, args: &mut Args, pipeline_value: &Value) {
    let Some(first) = operator.signature().first_param() else {
        return;
    };
    if args.contains(first) {
        debug!(operator = %operator.name(), parameter = first, "explicit argument overrides pipeline value");
    } else {
        args.bind_first(first, pipeline_value.clone());
    }
}

/// Reject undeclared arguments and unbound required parameters.
fn check_arguments(operator: &Operator, args: &Args) -> Result<()> {
    let signature = operator.signature();
    if !signature.extra_kwargs {
        if let Some(unexpected) = args.names().find(|name| !signature.declares(name)) {
            return Err(CsetError::UnexpectedArgument {
                operator: operator.name().to_string(),
                argument: unexpected.to_string(),
            });
        }
    }
    if let Some(missing) = signature
        .params
        .iter()
        .find(|p| p.required && !args.contains(p.name))
    {
        return Err(CsetError::MissingArgument {
            operator: operator.name().to_string(),
            argument: missing.name.to_string(),
        });
    }
    Ok(())
}
