//! Miscellaneous operators: identity, arithmetic, attribute removal.

use crate::core::error::OperatorError;
use crate::core::metadata::RunContext;
use crate::core::operator::{ArgError, Args, Operator, Param};
use crate::core::registry::OperatorRegistryBuilder;
use crate::core::types::Value;
use serde_yaml_ng::Value as Node;

const NOOP: &[Param] = &[Param::required("x")];
const ADDITION: &[Param] = &[Param::required("addend_1"), Param::required("addend_2")];
const SUBTRACTION: &[Param] = &[Param::required("minuend"), Param::required("subtrahend")];
const MULTIPLICATION: &[Param] = &[
    Param::required("multiplicand"),
    Param::required("multiplier"),
];
const DIVISION: &[Param] = &[Param::required("numerator"), Param::required("denominator")];
const REMOVE_ATTRIBUTE: &[Param] = &[Param::required("data"), Param::required("attribute")];

pub fn register(builder: &mut OperatorRegistryBuilder) {
    builder
        .register(Operator::new("misc.noop", NOOP, noop))
        .register(Operator::new("misc.addition", ADDITION, addition))
        .register(Operator::new("misc.subtraction", SUBTRACTION, subtraction))
        .register(Operator::new(
            "misc.multiplication",
            MULTIPLICATION,
            multiplication,
        ))
        .register(Operator::new("misc.division", DIVISION, division))
        .register(Operator::new(
            "misc.remove_attribute",
            REMOVE_ATTRIBUTE,
            remove_attribute,
        ));
}

/// Return the input unchanged.
fn noop(mut args: Args, _ctx: &RunContext) -> Result<Value, OperatorError> {
    Ok(args.take("x")?)
}

// ============================================================================
// Arithmetic
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Int(i) => Value::Literal(Node::from(i)),
            Number::Float(f) => Value::Literal(Node::from(f)),
        }
    }
}

fn number(args: &Args, name: &str) -> Result<Number, ArgError> {
    let node = args.literal(name)?;
    if let Some(i) = node.as_i64() {
        return Ok(Number::Int(i));
    }
    node.as_f64()
        .map(Number::Float)
        .ok_or_else(|| ArgError::WrongType {
            name: name.to_string(),
            expected: "a number",
            got: Value::Literal(node.clone()).kind(),
        })
}

/// Apply an integer op when both sides are integers, else a float op.
fn arithmetic(
    args: &Args,
    lhs: &str,
    rhs: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, OperatorError> {
    let (a, b) = (number(args, lhs)?, number(args, rhs)?);
    let out = match (a, b) {
        (Number::Int(x), Number::Int(y)) => Number::Int(
            int_op(x, y).ok_or_else(|| format!("integer overflow computing {} and {}", x, y))?,
        ),
        _ => Number::Float(float_op(a.as_f64(), b.as_f64())),
    };
    Ok(out.into())
}

fn addition(args: Args, _ctx: &RunContext) -> Result<Value, OperatorError> {
    arithmetic(&args, "addend_1", "addend_2", i64::checked_add, |a, b| a + b)
}

fn subtraction(args: Args, _ctx: &RunContext) -> Result<Value, OperatorError> {
    arithmetic(&args, "minuend", "subtrahend", i64::checked_sub, |a, b| a - b)
}

fn multiplication(args: Args, _ctx: &RunContext) -> Result<Value, OperatorError> {
    arithmetic(&args, "multiplicand", "multiplier", i64::checked_mul, |a, b| {
        a * b
    })
}

/// True division; the result is always a float.
fn division(args: Args, _ctx: &RunContext) -> Result<Value, OperatorError> {
    let numerator = number(&args, "numerator")?.as_f64();
    let denominator = number(&args, "denominator")?.as_f64();
    if denominator == 0.0 {
        return Err("division by zero".into());
    }
    Ok(Number::Float(numerator / denominator).into())
}

// ============================================================================
// Attributes
// ============================================================================

/// Remove one key, or each key of a list, from a mapping.
fn remove_attribute(mut args: Args, _ctx: &RunContext) -> Result<Value, OperatorError> {
    let keys: Vec<String> = match args.literal("attribute")? {
        Node::String(s) => vec![s.clone()],
        Node::Sequence(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| ArgError::WrongType {
                    name: "attribute".to_string(),
                    expected: "a string or list of strings",
                    got: Value::Literal(item.clone()).kind(),
                })
            })
            .collect::<Result<_, _>>()?,
        other => {
            return Err(ArgError::WrongType {
                name: "attribute".to_string(),
                expected: "a string or list of strings",
                got: Value::Literal(other.clone()).kind(),
            }
            .into())
        }
    };

    match args.take("data")? {
        Value::Literal(Node::Mapping(mut mapping)) => {
            for key in &keys {
                mapping.shift_remove(key.as_str());
            }
            Ok(Value::Literal(Node::Mapping(mapping)))
        }
        other => Err(ArgError::WrongType {
            name: "data".to_string(),
            expected: "a mapping",
            got: other.kind(),
        }
        .into()),
    }
}
