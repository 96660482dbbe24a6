//! Bottom-up tree simplification: constant folding followed by peephole
//! strength reduction.
//!
//! Children are simplified before their parent is looked at, so a parent
//! only ever sees operands that are already as small as they will get.

use tracing::{trace, warn};

use crate::ast::{Node, NodeKind, Operator};

/// Simplify `node` and everything below it, returning the replacement.
pub fn simplify(mut node: Node) -> Node {
  node.children = node.children.into_iter().map(simplify).collect();
  let node = constant_fold(node);
  peephole(node)
}

/// Replace an expression whose operands are all literals by its value.
fn constant_fold(node: Node) -> Node {
  let NodeKind::Expression(op) = node.kind else {
    return node;
  };
  let Some(values) = node
    .children
    .iter()
    .map(Node::as_number)
    .collect::<Option<Vec<_>>>()
  else {
    return node;
  };

  match evaluate(op, &values) {
    Some(value) => {
      trace!(%op, ?values, value, "folded constant expression");
      Node::number(value).with_loc(node.loc)
    }
    None => node,
  }
}

/// Fold `values` under `op` the way the generated code would compute them.
/// `None` leaves the expression for run time: the operator is not foldable,
/// or the division would trap.
pub fn evaluate(op: Operator, values: &[i64]) -> Option<i64> {
  let (&first, rest) = values.split_first()?;
  match op {
    Operator::Add => Some(values.iter().fold(0, |acc, &v| acc.wrapping_add(v))),
    Operator::Mul => Some(values.iter().fold(1, |acc, &v| acc.wrapping_mul(v))),
    Operator::Sub if rest.is_empty() => Some(first.wrapping_neg()),
    Operator::Sub => Some(rest.iter().fold(first, |acc, &v| acc.wrapping_sub(v))),
    Operator::Div => rest.iter().try_fold(first, |acc, &v| {
      let quotient = acc.checked_div(v);
      if quotient.is_none() {
        warn!(dividend = acc, divisor = v, "division would trap, left unfolded");
      }
      quotient
    }),
    Operator::Shl if !rest.is_empty() => {
      Some(rest.iter().fold(first, |acc, &v| acc.wrapping_shl(v as u32)))
    }
    Operator::Shr if !rest.is_empty() => {
      Some(rest.iter().fold(first, |acc, &v| acc.wrapping_shr(v as u32)))
    }
    Operator::Shl | Operator::Shr | Operator::And => None,
  }
}

/// Rewrite `x * 2^k` to `x << k` and `x / 2^k` to `x >> k`; `x * 1` and
/// `x / 1` become `x`.
fn peephole(mut node: Node) -> Node {
  let NodeKind::Expression(op @ (Operator::Mul | Operator::Div)) = node.kind else {
    return node;
  };
  if node.children.len() != 2 {
    return node;
  }
  let Some(value) = node.children[1].as_number() else {
    return node;
  };
  if value <= 0 || value & (value - 1) != 0 {
    return node;
  }

  if value == 1 {
    trace!(%op, "dropped identity operand");
    return node.children.swap_remove(0);
  }

  let shift = i64::from(value.trailing_zeros());
  node.kind = NodeKind::Expression(match op {
    Operator::Mul => Operator::Shl,
    _ => Operator::Shr,
  });
  node.children[1].kind = NodeKind::Number(shift);
  trace!(%op, shift, "strength-reduced to shift");
  node
}
