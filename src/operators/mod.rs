//! Builtin operators, grouped by module (`misc`, `read`, `write`).
//!
//! Each module exposes `register`, adding its operators under
//! `module.function` names.

pub mod misc;
pub mod read;
pub mod write;

use crate::core::registry::OperatorRegistryBuilder;

/// Register every builtin operator.
pub fn register_builtin(builder: &mut OperatorRegistryBuilder) {
    misc::register(builder);
    read::register(builder);
    write::register(builder);
}
