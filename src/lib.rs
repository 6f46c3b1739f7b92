//! CSET: recipe execution engine for diagnostic pipelines.
//!
//! A recipe is a YAML document listing operator steps. Each step's result
//! becomes the implicit input of the next; the run writes its outputs,
//! `meta.json`, a log, and a diagnostic archive into one output directory.

pub mod cli;
pub mod core;
pub mod logging;
pub mod operators;
