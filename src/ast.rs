//! Syntax tree shared by every stage after parsing.
//!
//! Nodes own their children outright. Binding decorates identifiers with a
//! [`SymbolRef`] and rewrites string literals into pool references in place;
//! the simplifier consumes subtrees and hands back replacements.

use std::fmt;

use crate::symbols::SymbolRef;

/// Operators that can head an [`NodeKind::Expression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
  Add,
  Sub,
  Mul,
  Div,
  Shl,
  Shr,
  And,
}

impl Operator {
  pub fn symbol(self) -> &'static str {
    match self {
      Operator::Add => "+",
      Operator::Sub => "-",
      Operator::Mul => "*",
      Operator::Div => "/",
      Operator::Shl => "<<",
      Operator::Shr => ">>",
      Operator::And => "&",
    }
  }

  pub fn from_symbol(symbol: &str) -> Option<Self> {
    let op = match symbol {
      "+" => Operator::Add,
      "-" => Operator::Sub,
      "*" => Operator::Mul,
      "/" => Operator::Div,
      "<<" => Operator::Shl,
      ">>" => Operator::Shr,
      "&" => Operator::And,
      _ => return None,
    };
    Some(op)
  }

  /// Whether `a op b == b op a`, which lets codegen skip the operand swap.
  pub fn is_commutative(self) -> bool {
    matches!(self, Operator::Add | Operator::Mul | Operator::And)
  }
}

impl fmt::Display for Operator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.symbol())
  }
}

/// Node tag together with the payload that tag carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
  Program,
  List,
  Function,
  Block,
  GlobalDeclaration,
  Declaration,
  ArrayIndexing,
  Expression(Operator),
  FunctionCall,
  AssignmentStatement,
  PrintStatement,
  ReturnStatement,
  Identifier(String),
  Number(i64),
  StringData(String),
  StringRef(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
  pub kind: NodeKind,
  pub children: Vec<Node>,
  /// Set once by the binder on identifier nodes.
  pub symbol: Option<SymbolRef>,
  /// Byte offset in the source the node was parsed from.
  pub loc: usize,
}

impl Node {
  pub fn new(kind: NodeKind, loc: usize, children: Vec<Node>) -> Self {
    Self {
      kind,
      children,
      symbol: None,
      loc,
    }
  }

  pub fn leaf(kind: NodeKind, loc: usize) -> Self {
    Self::new(kind, loc, Vec::new())
  }

  pub fn number(value: i64) -> Self {
    Self::leaf(NodeKind::Number(value), 0)
  }

  pub fn ident(name: impl Into<String>) -> Self {
    Self::leaf(NodeKind::Identifier(name.into()), 0)
  }

  pub fn expression(op: Operator, operands: Vec<Node>) -> Self {
    Self::new(NodeKind::Expression(op), 0, operands)
  }

  pub fn with_loc(mut self, loc: usize) -> Self {
    self.loc = loc;
    self
  }

  pub fn push(&mut self, child: Node) {
    self.children.push(child);
  }

  pub fn as_number(&self) -> Option<i64> {
    match self.kind {
      NodeKind::Number(value) => Some(value),
      _ => None,
    }
  }

  pub fn as_ident(&self) -> Option<&str> {
    match &self.kind {
      NodeKind::Identifier(name) => Some(name),
      _ => None,
    }
  }

  /// Depth-first walk over the subtree, parents before children.
  pub fn walk(&self, visit: &mut impl FnMut(&Node)) {
    visit(self);
    for child in &self.children {
      child.walk(visit);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn operator_symbols_round_trip() {
    for op in [
      Operator::Add,
      Operator::Sub,
      Operator::Mul,
      Operator::Div,
      Operator::Shl,
      Operator::Shr,
      Operator::And,
    ] {
      assert_eq!(Operator::from_symbol(op.symbol()), Some(op));
    }
    assert_eq!(Operator::from_symbol("%"), None);
  }

  #[test]
  fn walk_visits_in_preorder() {
    let tree = Node::expression(
      Operator::Add,
      vec![
        Node::ident("a"),
        Node::expression(Operator::Sub, vec![Node::number(1)]),
      ],
    );
    let mut seen = Vec::new();
    tree.walk(&mut |node| seen.push(node.kind.clone()));
    assert_eq!(
      seen,
      vec![
        NodeKind::Expression(Operator::Add),
        NodeKind::Identifier("a".into()),
        NodeKind::Expression(Operator::Sub),
        NodeKind::Number(1),
      ]
    );
  }
}
