//! Shared error utilities used across the compilation pipeline.
//!
//! Front-end errors are rendered eagerly with a caret under the offending
//! byte. Semantic errors keep the byte offset of the node they were raised
//! for and can be upgraded to the same rendering once the source is at hand.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
  #[snafu(display("{position}: {message}\n{line}\n{marker}"))]
  WithLocation {
    position: String,
    line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("undefined symbol '{name}'"))]
  UndefinedSymbol { name: String, loc: usize },

  #[snafu(display("'{name}' is already declared in this scope"))]
  DuplicateSymbol { name: String, loc: usize },

  #[snafu(display("malformed declaration: {message}"))]
  MalformedDeclaration { message: String, loc: usize },

  #[snafu(display("'{name}' cannot be used here, expected {expected}"))]
  SymbolMisuse {
    name: String,
    expected: &'static str,
    loc: usize,
  },

  #[snafu(display("'{name}' takes {expected} argument(s) but {found} were given"))]
  ArityMismatch {
    name: String,
    expected: usize,
    found: usize,
    loc: usize,
  },

  #[snafu(display("program declares no function to use as entry point"))]
  MissingEntryPoint,

  #[snafu(display("identifier '{name}' reached code generation without a symbol"))]
  Unbound { name: String },

  #[snafu(display("cannot generate code for {what}"))]
  Unsupported { what: String },
}

impl CompileError {
  /// Construct an error anchored at a specific byte offset in the source.
  pub fn at(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let safe_loc = floor_char_boundary(source, loc.min(source.len()));
    let line_start = source[..safe_loc].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[safe_loc..]
      .find('\n')
      .map_or(source.len(), |i| safe_loc + i);
    let line_no = source[..line_start].matches('\n').count() + 1;
    let column = source[line_start..safe_loc].chars().count();
    Self::WithLocation {
      position: format!("{line_no}:{}", column + 1),
      line: source[line_start..line_end].to_string(),
      marker: format!("{}^", " ".repeat(column)),
      message: message.into(),
    }
  }

  /// Byte offset of the node a semantic error was raised for.
  pub fn loc(&self) -> Option<usize> {
    match self {
      Self::UndefinedSymbol { loc, .. }
      | Self::DuplicateSymbol { loc, .. }
      | Self::MalformedDeclaration { loc, .. }
      | Self::SymbolMisuse { loc, .. }
      | Self::ArityMismatch { loc, .. } => Some(*loc),
      _ => None,
    }
  }

  /// Render located semantic errors against the source they came from.
  pub fn in_source(self, source: &str) -> Self {
    match self.loc() {
      Some(loc) => Self::at(source, loc, self.to_string()),
      None => self,
    }
  }
}

fn floor_char_boundary(source: &str, mut idx: usize) -> usize {
  while !source.is_char_boundary(idx) {
    idx -= 1;
  }
  idx
}
