//! Core recipe engine: types, parsing, templating, operators, execution.

pub mod archive;
pub mod error;
pub mod executor;
pub mod graph;
pub mod metadata;
pub mod operator;
pub mod parser;
pub mod registry;
pub mod runner;
pub mod template;
pub mod types;
