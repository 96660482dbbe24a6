//! Pool of string literals collected while binding.
//!
//! Every literal gets its own slot, identical text included, so a slot index
//! maps one-to-one onto an emitted `string{index}` label.

use std::fmt;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StringPool {
  strings: Vec<String>,
}

impl StringPool {
  pub fn new() -> Self {
    Self::default()
  }

  /// Take ownership of `text` and return its slot index.
  pub fn intern(&mut self, text: String) -> usize {
    self.strings.push(text);
    self.strings.len() - 1
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.strings.get(index).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.strings.len()
  }

  pub fn is_empty(&self) -> bool {
    self.strings.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
    self.strings.iter().map(String::as_str).enumerate()
  }
}

/// Quote `text` the way a `.asciz` directive expects it.
pub fn quote(text: &str) -> String {
  let mut quoted = String::with_capacity(text.len() + 2);
  quoted.push('"');
  for ch in text.chars() {
    match ch {
      '"' => quoted.push_str("\\\""),
      '\\' => quoted.push_str("\\\\"),
      '\n' => quoted.push_str("\\n"),
      '\t' => quoted.push_str("\\t"),
      _ => quoted.push(ch),
    }
  }
  quoted.push('"');
  quoted
}

/// `index: "text"` per slot, in insertion order.
impl fmt::Display for StringPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (index, text) in self.iter() {
      writeln!(f, "{index}: {}", quote(text))?;
    }
    Ok(())
  }
}
