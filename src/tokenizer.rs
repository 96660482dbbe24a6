//! Lexical analysis: turns VSL source text into a vector of tokens.
//!
//! The tokenizer knows nothing about grammar beyond keywords, operators,
//! literals and identifiers. Multi-character punctuators are matched before
//! single-character ones to avoid ambiguity.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Keyword,
  Ident,
  Num,
  Str,
  Eof,
}

pub const KEYWORDS: [&str; 7] = ["function", "is", "end", "begin", "var", "print", "return"];

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  /// Decoded contents of a string literal, without the quotes.
  pub text: Option<String>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  pub fn new(kind: TokenKind, loc: usize, len: usize) -> Self {
    Self {
      kind,
      value: None,
      text: None,
      loc,
      len,
    }
  }
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if input[i..].starts_with("//") {
      i = input[i..].find('\n').map_or(bytes.len(), |n| i + n);
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let value = input[start..i]
        .parse::<i64>()
        .map_err(|err| CompileError::at(input, start, format!("invalid number: {err}")))?;
      let mut token = Token::new(TokenKind::Num, start, i - start);
      token.value = Some(value);
      tokens.push(token);
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let kind = if KEYWORDS.contains(&&input[start..i]) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, start, i - start));
      continue;
    }

    if c == b'"' {
      let start = i;
      let (text, end) = read_string(input, start)?;
      let mut token = Token::new(TokenKind::Str, start, end - start);
      token.text = Some(text);
      tokens.push(token);
      i = end;
      continue;
    }

    if let Some(op) = [":=", "<<", ">>"]
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len()));
      i += op.len();
      continue;
    }

    if matches!(
      c,
      b'+' | b'-' | b'*' | b'/' | b'&' | b'(' | b')' | b'[' | b']' | b','
    ) {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::at(
      input,
      i,
      format!("invalid token: '{invalid_char}'"),
    ));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0));
  Ok(tokens)
}

/// Decode the string literal opening at `start`; returns the contents and
/// the offset just past the closing quote.
fn read_string(input: &str, start: usize) -> CompileResult<(String, usize)> {
  let mut text = String::new();
  let mut chars = input[start + 1..].char_indices();

  while let Some((offset, ch)) = chars.next() {
    let at = start + 1 + offset;
    match ch {
      '"' => return Ok((text, at + 1)),
      '\n' => break,
      '\\' => {
        let decoded = match chars.next() {
          Some((_, 'n')) => '\n',
          Some((_, 't')) => '\t',
          Some((_, '"')) => '"',
          Some((_, '\\')) => '\\',
          Some((_, other)) => {
            return Err(CompileError::at(
              input,
              at,
              format!("unknown escape sequence '\\{other}'"),
            ));
          }
          None => break,
        };
        text.push(decoded);
      }
      _ => text.push(ch),
    }
  }

  Err(CompileError::at(input, start, "unterminated string literal"))
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}
