//! AST definitions for Ratus.
//!
//! This crate defines the abstract syntax tree built by the parser and walked
//! by the type checker and evaluator. Every node owns its children and carries
//! its source span; expressions and functions also carry a [`NodeId`] that
//! later stages use as a key into side tables.

mod ast;
mod expr;
mod types;

pub use ast::*;
pub use expr::*;
pub use types::*;
