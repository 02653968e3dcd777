//! Recompile annotated regions of Rust sources into WGSL compute shaders,
//! one shader file per kernel.

pub mod api;
pub mod config;
pub mod diagnostic;
pub mod emit;
pub mod error;
pub mod extract;
pub mod graph;
pub mod layout;
pub mod runtime;
pub mod span;
pub mod system;
pub mod translate;
pub mod validate;

// Re-exports: keep the `rustsl::X` paths used by the CLI and tests short
pub use config::project;
pub use error::{Error, Result};

// Re-export public API: `rustsl::build()`, `rustsl::compile_sources()` etc.
pub use api::*;
