//! Crate root: wires together the compilation pipeline for VSL.
//!
//! - `tokenizer` and `parser` turn source text into an owned [`ast::Node`] tree.
//! - `symbols` builds the global and per-function symbol tables, binds every
//!   identifier use and moves string literals into a [`strings::StringPool`].
//! - `simplify` folds constants and strength-reduces `*` and `/` by powers of two.
//! - `codegen` lowers the bound tree into x86-64 AT&T assembly with a
//!   synthesized `main` entry point.
//! - `session` carries the options and tables between those phases.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod session;
pub mod simplify;
pub mod strings;
pub mod symbols;
pub mod tokenizer;

pub use error::{CompileError, CompileResult};
pub use session::{Options, Session};

/// Compile VSL source into AT&T assembly.
pub fn compile(source: &str, options: &Options) -> CompileResult<String> {
  Session::new(*options).compile(source)
}
