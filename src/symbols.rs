//! Symbol tables and name binding.
//!
//! Binding runs in two passes over the tree. The global pass registers every
//! global variable, array and function (with its parameters) so that the
//! local pass can resolve forward references. The local pass walks each
//! function body with a stack of block scopes, declaring locals, attaching a
//! [`SymbolRef`] to every identifier use and moving string literals into the
//! [`StringPool`].

use std::collections::HashMap;
use std::fmt;
use std::mem;

use snafu::ensure;
use tracing::{debug, trace};

use crate::ast::{Node, NodeKind};
use crate::error::{
  ArityMismatchSnafu, CompileResult, DuplicateSymbolSnafu, MalformedDeclarationSnafu,
  SymbolMisuseSnafu, UndefinedSymbolSnafu,
};
use crate::strings::StringPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
  GlobalVar,
  GlobalArray { len: u64 },
  Function { arity: usize },
  Parameter,
  LocalVar,
}

impl SymbolKind {
  pub fn name(self) -> &'static str {
    match self {
      SymbolKind::GlobalVar => "GLOBAL_VAR",
      SymbolKind::GlobalArray { .. } => "GLOBAL_ARRAY",
      SymbolKind::Function { .. } => "FUNCTION",
      SymbolKind::Parameter => "PARAMETER",
      SymbolKind::LocalVar => "LOCAL_VAR",
    }
  }

  /// Kinds that name a single 8-byte value.
  pub fn is_scalar(self) -> bool {
    matches!(
      self,
      SymbolKind::GlobalVar | SymbolKind::Parameter | SymbolKind::LocalVar
    )
  }
}

/// Non-owning handle from a node to the symbol it was bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolRef {
  /// Sequence number in the global table.
  Global(usize),
  /// Sequence number in the local table of the function whose global
  /// sequence number is `function`.
  Local { function: usize, sequence: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
  pub name: String,
  pub kind: SymbolKind,
  /// Byte offset of the declaring node.
  pub decl_loc: usize,
  pub sequence: usize,
  /// Present only on `Function` symbols.
  pub locals: Option<SymbolTable>,
}

/// Ordered symbols; sequence numbers are positions and never change.
///
/// Names added with [`SymbolTable::insert`] form a single flat scope that
/// [`SymbolTable::lookup`] searches. Block-local names are added with
/// [`SymbolTable::push`] and are only reachable through the binder's scopes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SymbolTable {
  symbols: Vec<Symbol>,
  names: HashMap<String, usize>,
}

impl SymbolTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a symbol and register its name in the table scope.
  pub fn insert(&mut self, name: &str, kind: SymbolKind, decl_loc: usize) -> CompileResult<usize> {
    ensure!(
      !self.names.contains_key(name),
      DuplicateSymbolSnafu {
        name,
        loc: decl_loc
      }
    );
    let sequence = self.push(name, kind, decl_loc);
    self.names.insert(name.to_string(), sequence);
    Ok(sequence)
  }

  /// Append a symbol without making its name visible to [`SymbolTable::lookup`].
  pub fn push(&mut self, name: &str, kind: SymbolKind, decl_loc: usize) -> usize {
    let sequence = self.symbols.len();
    self.symbols.push(Symbol {
      name: name.to_string(),
      kind,
      decl_loc,
      sequence,
      locals: None,
    });
    sequence
  }

  pub fn lookup(&self, name: &str) -> Option<&Symbol> {
    self.names.get(name).map(|&sequence| &self.symbols[sequence])
  }

  pub fn get(&self, sequence: usize) -> Option<&Symbol> {
    self.symbols.get(sequence)
  }

  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
    self.symbols.iter()
  }

  /// Function symbols in declaration order.
  pub fn functions(&self) -> impl Iterator<Item = &Symbol> {
    self
      .symbols
      .iter()
      .filter(|symbol| matches!(symbol.kind, SymbolKind::Function { .. }))
  }

  pub fn param_count(&self) -> usize {
    self
      .symbols
      .iter()
      .filter(|symbol| symbol.kind == SymbolKind::Parameter)
      .count()
  }

  /// Follow a reference taken from a bound node. Must be called on the
  /// global table.
  pub fn resolve(&self, symbol: SymbolRef) -> Option<&Symbol> {
    match symbol {
      SymbolRef::Global(sequence) => self.get(sequence),
      SymbolRef::Local { function, sequence } => self.get(function)?.locals.as_ref()?.get(sequence),
    }
  }

  fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, nesting: usize) -> fmt::Result {
    for symbol in &self.symbols {
      writeln!(
        f,
        "{:indent$}{}: {}({})",
        "",
        symbol.sequence,
        symbol.kind.name(),
        symbol.name,
        indent = nesting * 4
      )?;
      if let Some(locals) = &symbol.locals {
        locals.fmt_nested(f, nesting + 1)?;
      }
    }
    Ok(())
  }
}

impl fmt::Display for SymbolTable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.fmt_nested(f, 0)
  }
}

/// Build the global table for `root`, binding every identifier in place and
/// moving string literals into `strings`.
pub fn bind(root: &mut Node, strings: &mut StringPool) -> CompileResult<SymbolTable> {
  let mut globals = SymbolTable::new();
  find_globals(&mut globals, root)?;
  debug!(symbols = globals.len(), "registered globals");
  bind_functions(&mut globals, root, strings)?;
  Ok(globals)
}

fn find_globals(globals: &mut SymbolTable, node: &mut Node) -> CompileResult<()> {
  match node.kind {
    NodeKind::GlobalDeclaration => {
      for declared in &mut node.children {
        declare_global(globals, declared)?;
      }
    }
    NodeKind::Function => declare_function(globals, node)?,
    _ => {
      for child in &mut node.children {
        find_globals(globals, child)?;
      }
    }
  }
  Ok(())
}

fn declare_global(globals: &mut SymbolTable, declared: &mut Node) -> CompileResult<()> {
  match &declared.kind {
    NodeKind::Identifier(name) => {
      let sequence = globals.insert(name, SymbolKind::GlobalVar, declared.loc)?;
      declared.symbol = Some(SymbolRef::Global(sequence));
    }
    NodeKind::ArrayIndexing => {
      let len = array_len(declared)?;
      let [ident, _] = declared.children.as_mut_slice() else {
        return MalformedDeclarationSnafu {
          message: "array declaration needs a name and a size",
          loc: declared.loc,
        }
        .fail();
      };
      let Some(name) = ident.as_ident() else {
        return MalformedDeclarationSnafu {
          message: "array name must be an identifier",
          loc: ident.loc,
        }
        .fail();
      };
      let sequence = globals.insert(name, SymbolKind::GlobalArray { len }, ident.loc)?;
      ident.symbol = Some(SymbolRef::Global(sequence));
    }
    other => {
      return MalformedDeclarationSnafu {
        message: format!("cannot declare {other:?}"),
        loc: declared.loc,
      }
      .fail();
    }
  }
  Ok(())
}

fn array_len(declared: &Node) -> CompileResult<u64> {
  match declared.children.get(1).and_then(Node::as_number) {
    Some(len) if len > 0 && (len as u64).checked_mul(8).is_some() => Ok(len as u64),
    Some(len) if len > 0 => MalformedDeclarationSnafu {
      message: format!("array of {len} elements does not fit in memory"),
      loc: declared.loc,
    }
    .fail(),
    Some(len) => MalformedDeclarationSnafu {
      message: format!("array size must be positive, got {len}"),
      loc: declared.loc,
    }
    .fail(),
    None => MalformedDeclarationSnafu {
      message: "array size must be an integer literal",
      loc: declared.loc,
    }
    .fail(),
  }
}

fn declare_function(globals: &mut SymbolTable, function: &mut Node) -> CompileResult<()> {
  let loc = function.loc;
  let [name_node, params, _body] = function.children.as_mut_slice() else {
    return MalformedDeclarationSnafu {
      message: "function needs a name, a parameter list and a body",
      loc,
    }
    .fail();
  };
  let Some(name) = name_node.as_ident().map(str::to_string) else {
    return MalformedDeclarationSnafu {
      message: "function name must be an identifier",
      loc: name_node.loc,
    }
    .fail();
  };

  let mut locals = SymbolTable::new();
  for param in &params.children {
    let Some(param_name) = param.as_ident() else {
      return MalformedDeclarationSnafu {
        message: "parameter must be an identifier",
        loc: param.loc,
      }
      .fail();
    };
    locals.insert(param_name, SymbolKind::Parameter, param.loc)?;
  }

  let arity = locals.len();
  let sequence = globals.insert(&name, SymbolKind::Function { arity }, loc)?;
  globals.symbols[sequence].locals = Some(locals);
  name_node.symbol = Some(SymbolRef::Global(sequence));
  for (index, param) in params.children.iter_mut().enumerate() {
    param.symbol = Some(SymbolRef::Local {
      function: sequence,
      sequence: index,
    });
  }
  trace!(function = name.as_str(), arity, "declared function");
  Ok(())
}

fn bind_functions(
  globals: &mut SymbolTable,
  node: &mut Node,
  strings: &mut StringPool,
) -> CompileResult<()> {
  if node.kind != NodeKind::Function {
    for child in &mut node.children {
      bind_functions(globals, child, strings)?;
    }
    return Ok(());
  }

  let Some(SymbolRef::Global(function)) = node.children.first().and_then(|name| name.symbol)
  else {
    return Ok(());
  };
  let Some(mut locals) = globals.symbols[function].locals.take() else {
    return Ok(());
  };

  let result = match node.children.get_mut(2) {
    Some(body) => {
      let mut binder = Binder {
        globals,
        locals: &mut locals,
        function,
        scopes: Vec::new(),
        strings,
      };
      binder.with_scope(|binder| binder.bind_node(body))
    }
    None => Ok(()),
  };

  debug!(
    function = globals.symbols[function].name.as_str(),
    symbols = locals.len(),
    "bound function body"
  );
  globals.symbols[function].locals = Some(locals);
  result
}

/// What a use site needs the named symbol to be.
#[derive(Debug, Clone, Copy)]
enum Usage {
  Value,
  Array,
  Call(usize),
}

struct Binder<'a> {
  globals: &'a SymbolTable,
  locals: &'a mut SymbolTable,
  function: usize,
  scopes: Vec<HashMap<String, usize>>,
  strings: &'a mut StringPool,
}

impl Binder<'_> {
  /// Run `bind` inside a fresh block scope; the scope is popped on every
  /// exit path.
  fn with_scope<T>(
    &mut self,
    bind: impl FnOnce(&mut Self) -> CompileResult<T>,
  ) -> CompileResult<T> {
    self.scopes.push(HashMap::new());
    let result = bind(self);
    self.scopes.pop();
    result
  }

  fn bind_node(&mut self, node: &mut Node) -> CompileResult<()> {
    if let NodeKind::StringData(text) = &mut node.kind {
      let index = self.strings.intern(mem::take(text));
      node.kind = NodeKind::StringRef(index);
      return Ok(());
    }

    match node.kind {
      NodeKind::Block => self.with_scope(|binder| binder.bind_children(node)),
      NodeKind::Declaration => {
        for declared in &mut node.children {
          self.declare_local(declared)?;
        }
        Ok(())
      }
      NodeKind::Identifier(_) => self.bind_use(node, Usage::Value),
      NodeKind::ArrayIndexing => {
        let [base, index] = node.children.as_mut_slice() else {
          return MalformedDeclarationSnafu {
            message: "array indexing needs a base and an index",
            loc: node.loc,
          }
          .fail();
        };
        self.bind_use(base, Usage::Array)?;
        self.bind_node(index)
      }
      NodeKind::FunctionCall => {
        let Some((callee, args)) = node.children.split_first_mut() else {
          return Ok(());
        };
        self.bind_use(callee, Usage::Call(args.len()))?;
        for arg in args {
          self.bind_node(arg)?;
        }
        Ok(())
      }
      _ => self.bind_children(node),
    }
  }

  fn bind_children(&mut self, node: &mut Node) -> CompileResult<()> {
    for child in &mut node.children {
      self.bind_node(child)?;
    }
    Ok(())
  }

  fn declare_local(&mut self, declared: &mut Node) -> CompileResult<()> {
    let Some(name) = declared.as_ident() else {
      return MalformedDeclarationSnafu {
        message: "only scalar variables can be declared inside a function",
        loc: declared.loc,
      }
      .fail();
    };
    let Some(scope) = self.scopes.last_mut() else {
      return MalformedDeclarationSnafu {
        message: "declaration outside of any block",
        loc: declared.loc,
      }
      .fail();
    };
    ensure!(
      !scope.contains_key(name),
      DuplicateSymbolSnafu {
        name,
        loc: declared.loc
      }
    );

    let sequence = self.locals.push(name, SymbolKind::LocalVar, declared.loc);
    scope.insert(name.to_string(), sequence);
    declared.symbol = Some(SymbolRef::Local {
      function: self.function,
      sequence,
    });
    Ok(())
  }

  fn bind_use(&mut self, node: &mut Node, usage: Usage) -> CompileResult<()> {
    let Some(name) = node.as_ident().map(str::to_string) else {
      return SymbolMisuseSnafu {
        name: format!("{:?}", node.kind),
        expected: "an identifier",
        loc: node.loc,
      }
      .fail();
    };

    let (symbol_ref, symbol) = self.lookup(&name).ok_or_else(|| {
      UndefinedSymbolSnafu {
        name: name.as_str(),
        loc: node.loc,
      }
      .build()
    })?;

    match (usage, symbol.kind) {
      (Usage::Value, kind) if kind.is_scalar() => {}
      (Usage::Array, SymbolKind::GlobalArray { .. }) => {}
      (Usage::Call(found), SymbolKind::Function { arity }) => ensure!(
        found == arity,
        ArityMismatchSnafu {
          name,
          expected: arity,
          found,
          loc: node.loc
        }
      ),
      (usage, _) => {
        let expected = match usage {
          Usage::Value => "a variable",
          Usage::Array => "an array",
          Usage::Call(_) => "a function",
        };
        return SymbolMisuseSnafu {
          name,
          expected,
          loc: node.loc,
        }
        .fail();
      }
    }

    node.symbol = Some(symbol_ref);
    Ok(())
  }

  /// Innermost block scope first, then parameters, then globals.
  fn lookup(&self, name: &str) -> Option<(SymbolRef, &Symbol)> {
    let local = self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(name).copied())
      .or_else(|| self.locals.lookup(name).map(|symbol| symbol.sequence));
    if let Some(sequence) = local {
      let symbol_ref = SymbolRef::Local {
        function: self.function,
        sequence,
      };
      return self.locals.get(sequence).map(|symbol| (symbol_ref, symbol));
    }
    self
      .globals
      .lookup(name)
      .map(|symbol| (SymbolRef::Global(symbol.sequence), symbol))
  }
}
