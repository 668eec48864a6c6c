//! Lowering of the block graph to an AIR module.
//!
//! The module is produced as deterministic textual IR; the platform
//! shader compiler consumes it downstream.

mod builder;
mod emit;

pub use builder::{FunctionBuilder, ModuleBuilder};
pub use emit::{emit_program, EmitOptions};
