//! Compilation context shared by the phases of a single run.
//!
//! A [`Session`] owns what binding produces (the global symbol table and
//! the string pool) so later phases and the table dump read it from one
//! place instead of from process-wide state.

use tracing::{debug, info};

use crate::ast::Node;
use crate::codegen;
use crate::error::CompileResult;
use crate::parser;
use crate::simplify;
use crate::strings::StringPool;
use crate::symbols::{self, SymbolTable};
use crate::tokenizer;

/// Knobs for a compilation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
  /// Run constant folding and strength reduction before code generation.
  pub simplify: bool,
  /// Keep the symbol tables around for [`Session::dump_tables`].
  pub dump_tables: bool,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      simplify: true,
      dump_tables: false,
    }
  }
}

impl Options {
  pub fn with_simplify(mut self, simplify: bool) -> Self {
    self.simplify = simplify;
    self
  }

  pub fn with_dump_tables(mut self, dump_tables: bool) -> Self {
    self.dump_tables = dump_tables;
    self
  }
}

#[derive(Debug, Default)]
pub struct Session {
  options: Options,
  globals: SymbolTable,
  strings: StringPool,
}

impl Session {
  pub fn new(options: Options) -> Self {
    Self {
      options,
      ..Self::default()
    }
  }

  pub fn globals(&self) -> &SymbolTable {
    &self.globals
  }

  pub fn strings(&self) -> &StringPool {
    &self.strings
  }

  /// Run every phase over `source`. Located errors come back rendered
  /// against `source`.
  pub fn compile(&mut self, source: &str) -> CompileResult<String> {
    self
      .run(source)
      .map_err(|err| err.in_source(source))
  }

  fn run(&mut self, source: &str) -> CompileResult<String> {
    let mut root = self.parse(source)?;
    self.bind(&mut root)?;
    let root = self.simplify(root);
    self.generate(&root)
  }

  pub fn parse(&self, source: &str) -> CompileResult<Node> {
    let tokens = tokenizer::tokenize(source)?;
    debug!(tokens = tokens.len(), "tokenized");
    let root = parser::parse(tokens, source)?;
    debug!(globals = root.children.len(), "parsed");
    Ok(root)
  }

  /// Bind `root`, replacing any tables from an earlier run.
  pub fn bind(&mut self, root: &mut Node) -> CompileResult<()> {
    let mut strings = StringPool::new();
    let globals = symbols::bind(root, &mut strings)?;
    debug!(
      globals = globals.len(),
      strings = strings.len(),
      "bound symbols"
    );
    self.globals = globals;
    self.strings = strings;
    Ok(())
  }

  /// Simplify `root` unless the options turned it off.
  pub fn simplify(&self, root: Node) -> Node {
    if !self.options.simplify {
      debug!("simplification disabled");
      return root;
    }
    simplify::simplify(root)
  }

  pub fn generate(&self, root: &Node) -> CompileResult<String> {
    let asm = codegen::generate(root, &self.globals, &self.strings)?;
    info!(bytes = asm.len(), "generated assembly");
    Ok(asm)
  }

  /// Symbol tables followed by the string pool.
  pub fn dump_tables(&self) -> String {
    format!("{}\n == STRING LIST == \n{}", self.globals, self.strings)
  }
}
