//! Recursive-descent parser producing the VSL syntax tree.
//!
//! Globals and statements are dispatched on their leading keyword; the
//! expression grammar is a precedence-climbing ladder from `&` (loosest)
//! through shifts, additive and multiplicative operators down to unary minus.

use crate::ast::{Node, NodeKind, Operator};
use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Parse a whole program from the token stream.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Node> {
  let mut stream = TokenStream::new(tokens, source);
  let mut program = Node::leaf(NodeKind::Program, 0);

  while !stream.is_eof() {
    program.push(parse_global(&mut stream)?);
  }

  Ok(program)
}

fn parse_global(stream: &mut TokenStream) -> CompileResult<Node> {
  let loc = stream.loc();
  if stream.equal_keyword("var") {
    let decls = parse_decl_list(stream)?;
    return Ok(Node::new(NodeKind::GlobalDeclaration, loc, decls));
  }
  if stream.equal_keyword("function") {
    return parse_function(stream, loc);
  }
  Err(stream.unexpected("expected \"function\" or \"var\""))
}

fn parse_function(stream: &mut TokenStream, loc: usize) -> CompileResult<Node> {
  let name = parse_ident(stream)?;

  stream.skip("(")?;
  let mut params = Node::leaf(NodeKind::List, stream.loc());
  if !stream.equal(")") {
    loop {
      params.push(parse_ident(stream)?);
      if stream.equal(")") {
        break;
      }
      stream.skip(",")?;
    }
  }

  let body_loc = stream.loc();
  stream.skip_keyword("is")?;
  let body = parse_items(stream, body_loc)?;
  Ok(Node::new(NodeKind::Function, loc, vec![name, params, body]))
}

/// Declarations and statements up to the closing `end`, as a block.
fn parse_items(stream: &mut TokenStream, loc: usize) -> CompileResult<Node> {
  let mut block = Node::leaf(NodeKind::Block, loc);
  while !stream.equal_keyword("end") {
    if stream.is_eof() {
      return Err(stream.unexpected("expected \"end\""));
    }
    let item_loc = stream.loc();
    if stream.equal_keyword("var") {
      let decls = parse_decl_list(stream)?;
      block.push(Node::new(NodeKind::Declaration, item_loc, decls));
    } else {
      block.push(parse_stmt(stream)?);
    }
  }
  Ok(block)
}

fn parse_decl_list(stream: &mut TokenStream) -> CompileResult<Vec<Node>> {
  let mut decls = vec![parse_decl(stream)?];
  while stream.equal(",") {
    decls.push(parse_decl(stream)?);
  }
  Ok(decls)
}

fn parse_decl(stream: &mut TokenStream) -> CompileResult<Node> {
  let ident = parse_ident(stream)?;
  if stream.equal("[") {
    let size = parse_expr(stream)?;
    stream.skip("]")?;
    let loc = ident.loc;
    return Ok(Node::new(NodeKind::ArrayIndexing, loc, vec![ident, size]));
  }
  Ok(ident)
}

fn parse_stmt(stream: &mut TokenStream) -> CompileResult<Node> {
  let loc = stream.loc();

  if stream.equal_keyword("print") {
    let mut items = vec![parse_print_item(stream)?];
    while stream.equal(",") {
      items.push(parse_print_item(stream)?);
    }
    return Ok(Node::new(NodeKind::PrintStatement, loc, items));
  }

  if stream.equal_keyword("return") {
    let value = parse_expr(stream)?;
    return Ok(Node::new(NodeKind::ReturnStatement, loc, vec![value]));
  }

  if stream.equal_keyword("begin") {
    return parse_items(stream, loc);
  }

  if stream.peek_kind() != Some(TokenKind::Ident) {
    return Err(stream.unexpected("expected a statement"));
  }

  let target = parse_postfix(stream)?;
  if target.kind == NodeKind::FunctionCall {
    return Ok(target);
  }
  stream.skip(":=")?;
  let value = parse_expr(stream)?;
  Ok(Node::new(
    NodeKind::AssignmentStatement,
    loc,
    vec![target, value],
  ))
}

fn parse_print_item(stream: &mut TokenStream) -> CompileResult<Node> {
  if let Some((text, loc)) = stream.get_string() {
    return Ok(Node::leaf(NodeKind::StringData(text), loc));
  }
  parse_expr(stream)
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Node> {
  parse_binary_level(stream, 0)
}

/// Operator ladder, loosest first.
const LEVELS: [&[&str]; 4] = [&["&"], &["<<", ">>"], &["+", "-"], &["*", "/"]];

fn parse_binary_level(stream: &mut TokenStream, level: usize) -> CompileResult<Node> {
  let Some(ops) = LEVELS.get(level) else {
    return parse_unary(stream);
  };

  let mut node = parse_binary_level(stream, level + 1)?;
  loop {
    let loc = stream.loc();
    let Some(op) = ops
      .iter()
      .find(|op| stream.peek_punct() == Some(**op))
      .and_then(|op| Operator::from_symbol(op))
    else {
      break;
    };
    stream.skip(op.symbol())?;
    let rhs = parse_binary_level(stream, level + 1)?;
    node = Node::new(NodeKind::Expression(op), loc, vec![node, rhs]);
  }
  Ok(node)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Node> {
  let loc = stream.loc();
  if stream.equal("-") {
    let operand = parse_unary(stream)?;
    return Ok(Node::new(
      NodeKind::Expression(Operator::Sub),
      loc,
      vec![operand],
    ));
  }
  parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Node> {
  if stream.equal("(") {
    let node = parse_expr(stream)?;
    stream.skip(")")?;
    return Ok(node);
  }

  if stream.peek_kind() == Some(TokenKind::Ident) {
    return parse_postfix(stream);
  }

  let (value, loc) = stream.get_number()?;
  Ok(Node::leaf(NodeKind::Number(value), loc))
}

/// An identifier optionally followed by a call or an index.
fn parse_postfix(stream: &mut TokenStream) -> CompileResult<Node> {
  let ident = parse_ident(stream)?;
  let loc = ident.loc;

  if stream.equal("(") {
    let mut call = Node::new(NodeKind::FunctionCall, loc, vec![ident]);
    if !stream.equal(")") {
      loop {
        call.push(parse_expr(stream)?);
        if stream.equal(")") {
          break;
        }
        stream.skip(",")?;
      }
    }
    return Ok(call);
  }

  if stream.equal("[") {
    let index = parse_expr(stream)?;
    stream.skip("]")?;
    return Ok(Node::new(NodeKind::ArrayIndexing, loc, vec![ident, index]));
  }

  Ok(ident)
}

fn parse_ident(stream: &mut TokenStream) -> CompileResult<Node> {
  let (name, loc) = stream.get_ident()?;
  Ok(Node::leaf(NodeKind::Identifier(name), loc))
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn peek_kind(&self) -> Option<TokenKind> {
    self.peek().map(|token| token.kind)
  }

  fn peek_punct(&self) -> Option<&'a str> {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, self.source))
  }

  /// Byte offset of the current token.
  fn loc(&self) -> usize {
    self.peek().map_or(self.source.len(), |token| token.loc)
  }

  fn matches(&self, kind: TokenKind, text: &str) -> bool {
    self
      .peek()
      .is_some_and(|token| token.kind == kind && token_text(token, self.source) == text)
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if self.matches(TokenKind::Punctuator, op) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn equal_keyword(&mut self, keyword: &str) -> bool {
    if self.matches(TokenKind::Keyword, keyword) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      Err(self.unexpected(&format!("expected \"{s}\"")))
    }
  }

  fn skip_keyword(&mut self, keyword: &str) -> CompileResult<()> {
    if self.equal_keyword(keyword) {
      Ok(())
    } else {
      Err(self.unexpected(&format!("expected \"{keyword}\"")))
    }
  }

  /// Error pointing at the current token.
  fn unexpected(&self, expected: &str) -> CompileError {
    let got = describe_token(self.peek(), self.source);
    CompileError::at(
      self.source,
      self.loc(),
      format!("{expected}, but got \"{got}\""),
    )
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i64, usize)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| {
        CompileError::at(
          self.source,
          token.loc,
          "internal error: numeric token missing value",
        )
      })?;
      let loc = token.loc;
      self.pos += 1;
      return Ok((value, loc));
    }
    Err(self.unexpected("expected a number"))
  }

  /// Parse the current token as an identifier.
  fn get_ident(&mut self) -> CompileResult<(String, usize)> {
    if let Some(token) = self.peek()
      && token.kind == TokenKind::Ident
    {
      let ident = token_text(token, self.source).to_string();
      let loc = token.loc;
      self.pos += 1;
      return Ok((ident, loc));
    }
    Err(self.unexpected("expected an identifier"))
  }

  /// Consume a string literal if one is next.
  fn get_string(&mut self) -> Option<(String, usize)> {
    let token = self.peek().filter(|token| token.kind == TokenKind::Str)?;
    let found = (token.text.clone().unwrap_or_default(), token.loc);
    self.pos += 1;
    Some(found)
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
  }
}
