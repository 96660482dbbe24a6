//! Code generation: lower the bound, simplified tree into AT&T x86-64
//! assembly for the System V ABI.
//!
//! Expressions use a single accumulator: every expression leaves its value
//! in `%rax`, with `%rcx` as the scratch register for the other operand of a
//! binary operator. Every function pushes all its parameters and locals in
//! sequence order right after the prologue, so slot `s` always lives at
//! `-8*(s+1)(%rbp)` no matter how the value arrived.

use snafu::OptionExt;
use tracing::debug;

use crate::ast::{Node, NodeKind, Operator};
use crate::error::{CompileResult, MissingEntryPointSnafu, UnboundSnafu, UnsupportedSnafu};
use crate::strings::{StringPool, quote};
use crate::symbols::{Symbol, SymbolKind, SymbolTable};

/// Integer argument registers, in System V order.
pub const REGISTER_PARAMS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

const RUNTIME_SYMBOLS: [&str; 5] = ["printf", "putchar", "puts", "strtol", "exit"];

/// Emit the full assembly listing for a bound program.
pub fn generate(root: &Node, globals: &SymbolTable, strings: &StringPool) -> CompileResult<String> {
  let entry = globals.functions().next().context(MissingEntryPointSnafu)?;

  let mut generator = Generator {
    globals,
    asm: String::new(),
  };
  generator.emit_string_table(strings);
  generator.emit_global_storage()?;

  generator.directive(".text");
  let mut functions = Vec::new();
  collect_functions(root, &mut functions);
  for function in functions {
    generator.emit_function(function)?;
  }

  generator.emit_entry_point(entry);
  generator.emit_runtime_helpers();
  generator.emit_declarations();
  Ok(generator.asm)
}

fn collect_functions<'n>(node: &'n Node, out: &mut Vec<&'n Node>) {
  if node.kind == NodeKind::Function {
    out.push(node);
    return;
  }
  for child in &node.children {
    collect_functions(child, out);
  }
}

/// Label for a global variable, array or function. A bare `.` prefix would
/// turn `text` or `data` into the assembler's section symbols.
fn mangle(name: &str) -> String {
  format!(".V{name}")
}

fn return_label(function: &str) -> String {
  format!("{}.return", mangle(function))
}

fn slot(sequence: usize) -> String {
  format!("-{}(%rbp)", 8 * (sequence + 1))
}

/// The function currently being emitted.
struct Frame<'a> {
  name: &'a str,
}

struct Generator<'a> {
  globals: &'a SymbolTable,
  asm: String,
}

impl<'a> Generator<'a> {
  fn directive(&mut self, text: &str) {
    self.asm.push_str(text);
    self.asm.push('\n');
  }

  fn label(&mut self, name: &str) {
    self.asm.push_str(name);
    self.asm.push_str(":\n");
  }

  fn instr(&mut self, text: &str) {
    self.asm.push_str("    ");
    self.asm.push_str(text);
    self.asm.push('\n');
  }

  fn emit_string_table(&mut self, strings: &StringPool) {
    self.directive(".section .rodata");
    self.directive("intout: .asciz \"%ld\"");
    self.directive("strout: .asciz \"%s\"");
    self.directive("errout: .asciz \"Wrong number of arguments\"");
    for (index, text) in strings.iter() {
      self.directive(&format!("string{index}: .asciz {}", quote(text)));
    }
  }

  fn emit_global_storage(&mut self) -> CompileResult<()> {
    let globals = self.globals;
    self.directive(".section .bss");
    self.directive(".align 8");
    for symbol in globals.iter() {
      let bytes = match symbol.kind {
        SymbolKind::GlobalVar => 8,
        SymbolKind::GlobalArray { len } => {
          len.checked_mul(8).with_context(|| UnsupportedSnafu {
            what: format!("array {} of {len} elements", symbol.name),
          })?
        }
        _ => continue,
      };
      self.directive(&format!("{}: .zero {bytes}", mangle(&symbol.name)));
    }
    Ok(())
  }

  /// Look up the symbol a bound identifier node refers to.
  fn symbol_of(&self, node: &Node) -> CompileResult<&'a Symbol> {
    let name = || match &node.kind {
      NodeKind::Identifier(name) => name.clone(),
      other => format!("{other:?}"),
    };
    let symbol = node.symbol.with_context(|| UnboundSnafu { name: name() })?;
    self
      .globals
      .resolve(symbol)
      .with_context(|| UnboundSnafu { name: name() })
  }

  fn emit_function(&mut self, node: &Node) -> CompileResult<()> {
    let function = match node.children.first() {
      Some(name) => self.symbol_of(name)?,
      None => {
        return UnsupportedSnafu {
          what: "function without a name",
        }
        .fail();
      }
    };
    let locals = function.locals.as_ref().with_context(|| UnboundSnafu {
      name: function.name.as_str(),
    })?;
    debug!(
      function = function.name.as_str(),
      slots = locals.len(),
      "emitting function"
    );

    self.label(&mangle(&function.name));
    self.instr("pushq %rbp");
    self.instr("movq %rsp, %rbp");
    for symbol in locals.iter() {
      match symbol.kind {
        SymbolKind::Parameter if symbol.sequence < REGISTER_PARAMS.len() => {
          self.instr(&format!("pushq {}", REGISTER_PARAMS[symbol.sequence]));
        }
        SymbolKind::Parameter => {
          // Stack arguments sit above the return address and saved %rbp.
          let offset = 16 + 8 * (symbol.sequence - REGISTER_PARAMS.len());
          self.instr(&format!("pushq {offset}(%rbp)"));
        }
        _ => self.instr("pushq $0"),
      }
    }

    let frame = Frame {
      name: &function.name,
    };
    if let Some(body) = node.children.get(2) {
      self.emit_statement(body, &frame)?;
    }

    self.instr("movq $0, %rax");
    self.label(&return_label(frame.name));
    self.instr("movq %rbp, %rsp");
    self.instr("popq %rbp");
    self.instr("ret");
    Ok(())
  }

  fn emit_statement(&mut self, node: &Node, frame: &Frame) -> CompileResult<()> {
    match node.kind {
      NodeKind::Block | NodeKind::List => {
        for child in &node.children {
          self.emit_statement(child, frame)?;
        }
      }
      NodeKind::Declaration => {}
      NodeKind::AssignmentStatement => self.emit_assignment(node, frame)?,
      NodeKind::PrintStatement => self.emit_print(node, frame)?,
      NodeKind::ReturnStatement => {
        if let Some(value) = node.children.first() {
          self.emit_expression(value, frame)?;
        }
        self.instr(&format!("jmp {}", return_label(frame.name)));
      }
      _ => self.emit_expression(node, frame)?,
    }
    Ok(())
  }

  fn emit_assignment(&mut self, node: &Node, frame: &Frame) -> CompileResult<()> {
    let [target, value] = node.children.as_slice() else {
      return UnsupportedSnafu {
        what: "assignment without a target and a value",
      }
      .fail();
    };
    self.emit_expression(value, frame)?;

    match target.kind {
      NodeKind::Identifier(_) => {
        let symbol = self.symbol_of(target)?;
        match symbol.kind {
          SymbolKind::Parameter | SymbolKind::LocalVar => {
            self.instr(&format!("movq %rax, {}", slot(symbol.sequence)));
          }
          SymbolKind::GlobalVar => {
            self.instr(&format!("movq %rax, {}(%rip)", mangle(&symbol.name)));
          }
          _ => {
            return UnsupportedSnafu {
              what: format!("assignment to {}", symbol.name),
            }
            .fail();
          }
        }
      }
      NodeKind::ArrayIndexing => {
        self.instr("pushq %rax");
        self.emit_element_address(target, frame)?;
        self.instr("popq %rax");
        self.instr("movq %rax, (%rcx)");
      }
      _ => {
        return UnsupportedSnafu {
          what: format!("assignment to {:?}", target.kind),
        }
        .fail();
      }
    }
    Ok(())
  }

  fn emit_print(&mut self, node: &Node, frame: &Frame) -> CompileResult<()> {
    for item in &node.children {
      if let NodeKind::StringRef(index) = item.kind {
        self.instr("leaq strout(%rip), %rdi");
        self.instr(&format!("leaq string{index}(%rip), %rsi"));
      } else {
        self.emit_expression(item, frame)?;
        self.instr("movq %rax, %rsi");
        self.instr("leaq intout(%rip), %rdi");
      }
      self.instr("call safe_printf");
    }
    self.instr("movq $10, %rdi");
    self.instr("call safe_putchar");
    Ok(())
  }

  /// Leave the value of `node` in `%rax`.
  fn emit_expression(&mut self, node: &Node, frame: &Frame) -> CompileResult<()> {
    match &node.kind {
      NodeKind::Number(value) => {
        if i32::try_from(*value).is_ok() {
          self.instr(&format!("movq ${value}, %rax"));
        } else {
          self.instr(&format!("movabsq ${value}, %rax"));
        }
      }
      NodeKind::Identifier(_) => {
        let symbol = self.symbol_of(node)?;
        match symbol.kind {
          SymbolKind::Parameter | SymbolKind::LocalVar => {
            self.instr(&format!("movq {}, %rax", slot(symbol.sequence)));
          }
          SymbolKind::GlobalVar => {
            self.instr(&format!("movq {}(%rip), %rax", mangle(&symbol.name)));
          }
          SymbolKind::GlobalArray { .. } | SymbolKind::Function { .. } => {
            return UnsupportedSnafu {
              what: format!("{} used as a value", symbol.name),
            }
            .fail();
          }
        }
      }
      NodeKind::StringRef(index) => {
        self.instr(&format!("leaq string{index}(%rip), %rax"));
      }
      NodeKind::ArrayIndexing => {
        self.emit_element_address(node, frame)?;
        self.instr("movq (%rcx), %rax");
      }
      NodeKind::FunctionCall => self.emit_call(node, frame)?,
      NodeKind::Expression(op) => self.emit_operation(*op, &node.children, frame)?,
      other => {
        return UnsupportedSnafu {
          what: format!("{other:?} in expression position"),
        }
        .fail();
      }
    }
    Ok(())
  }

  fn emit_operation(&mut self, op: Operator, operands: &[Node], frame: &Frame) -> CompileResult<()> {
    let Some((first, rest)) = operands.split_first() else {
      return UnsupportedSnafu {
        what: format!("'{op}' without operands"),
      }
      .fail();
    };

    self.emit_expression(first, frame)?;
    if rest.is_empty() {
      if op == Operator::Sub {
        self.instr("negq %rax");
      }
      return Ok(());
    }

    for operand in rest {
      self.instr("pushq %rax");
      self.emit_expression(operand, frame)?;
      self.instr("popq %rcx");
      // Left operand in %rcx, right operand in %rax.
      if !op.is_commutative() {
        self.instr("xchgq %rax, %rcx");
      }
      match op {
        Operator::Add => self.instr("addq %rcx, %rax"),
        Operator::Mul => self.instr("imulq %rcx, %rax"),
        Operator::And => self.instr("andq %rcx, %rax"),
        Operator::Sub => self.instr("subq %rcx, %rax"),
        Operator::Div => {
          self.instr("cqto");
          self.instr("idivq %rcx");
        }
        Operator::Shl => self.instr("salq %cl, %rax"),
        Operator::Shr => self.instr("sarq %cl, %rax"),
      }
    }
    Ok(())
  }

  /// Compute the address of `base[index]` into `%rcx`; clobbers `%rax`.
  fn emit_element_address(&mut self, node: &Node, frame: &Frame) -> CompileResult<()> {
    let [base, index] = node.children.as_slice() else {
      return UnsupportedSnafu {
        what: "array indexing without a base and an index",
      }
      .fail();
    };
    let array = self.symbol_of(base)?;
    self.emit_expression(index, frame)?;
    self.instr(&format!("leaq {}(%rip), %rcx", mangle(&array.name)));
    self.instr("leaq (%rcx,%rax,8), %rcx");
    Ok(())
  }

  fn emit_call(&mut self, node: &Node, frame: &Frame) -> CompileResult<()> {
    let Some((callee, args)) = node.children.split_first() else {
      return UnsupportedSnafu {
        what: "call without a callee",
      }
      .fail();
    };
    let function = self.symbol_of(callee)?;

    // Right to left, so the first argument ends up on top of the stack.
    for arg in args.iter().rev() {
      self.emit_expression(arg, frame)?;
      self.instr("pushq %rax");
    }
    for register in REGISTER_PARAMS.iter().take(args.len()) {
      self.instr(&format!("popq {register}"));
    }
    self.instr(&format!("call {}", mangle(&function.name)));

    let stacked = args.len().saturating_sub(REGISTER_PARAMS.len());
    if stacked > 0 {
      self.instr(&format!("addq ${}, %rsp", 8 * stacked));
    }
    Ok(())
  }

  /// `main`: check the argument count, convert every argument with
  /// `strtol`, call the first VSL function and exit with its result.
  fn emit_entry_point(&mut self, entry: &Symbol) {
    let expected = match entry.kind {
      SymbolKind::Function { arity } => arity,
      _ => 0,
    };
    debug!(entry = entry.name.as_str(), expected, "emitting entry point");

    self.label("main");
    self.instr("pushq %rbp");
    self.instr("movq %rsp, %rbp");
    // argc counts the program name.
    self.instr("subq $1, %rdi");
    self.instr(&format!("cmpq ${expected}, %rdi"));
    self.instr("jne ABORT");

    if expected > 0 {
      // Walk argv from the last argument back to the first, pushing each
      // parsed value so the first argument ends on top.
      self.instr(&format!("addq ${}, %rsi", 8 * expected));
      self.instr("movq %rdi, %rcx");
      self.label("PARSE_ARGV");
      self.instr("pushq %rsi");
      self.instr("pushq %rcx");
      self.instr("movq (%rsi), %rdi");
      self.instr("movq $0, %rsi");
      self.instr("movq $10, %rdx");
      self.instr("call safe_strtol");
      self.instr("popq %rcx");
      self.instr("popq %rsi");
      self.instr("pushq %rax");
      self.instr("subq $8, %rsi");
      self.instr("loop PARSE_ARGV");
      for register in REGISTER_PARAMS.iter().take(expected) {
        self.instr(&format!("popq {register}"));
      }
    }

    self.instr(&format!("call {}", mangle(&entry.name)));
    self.instr("movq %rax, %rdi");
    self.instr("andq $-16, %rsp");
    self.instr("call exit@PLT");

    self.label("ABORT");
    self.instr("leaq errout(%rip), %rdi");
    self.instr("andq $-16, %rsp");
    self.instr("call puts@PLT");
    self.instr("movq $1, %rdi");
    self.instr("call exit@PLT");
  }

  /// Trampolines that realign the stack before entering libc; pushes made
  /// by VSL frames leave `%rsp` at any multiple of 8.
  fn emit_runtime_helpers(&mut self) {
    for (helper, target, varargs) in [
      ("safe_printf", "printf", true),
      ("safe_putchar", "putchar", false),
      ("safe_strtol", "strtol", false),
    ] {
      self.label(helper);
      self.instr("pushq %rbp");
      self.instr("movq %rsp, %rbp");
      self.instr("andq $-16, %rsp");
      if varargs {
        // No vector registers carry arguments.
        self.instr("movq $0, %rax");
      }
      self.instr(&format!("call {target}@PLT"));
      self.instr("movq %rbp, %rsp");
      self.instr("popq %rbp");
      self.instr("ret");
    }
  }

  fn emit_declarations(&mut self) {
    self.directive(".globl main");
    for symbol in RUNTIME_SYMBOLS {
      self.directive(&format!(".extern {symbol}"));
    }
    self.directive(".section .note.GNU-stack,\"\",@progbits");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::CompileError;
  use crate::parser::parse;
  use crate::simplify::simplify;
  use crate::symbols::{SymbolRef, bind};
  use crate::tokenizer::tokenize;

  fn compile(source: &str) -> String {
    let mut root = parse(tokenize(source).unwrap(), source).unwrap();
    let mut strings = StringPool::new();
    let globals = bind(&mut root, &mut strings).unwrap();
    let root = simplify(root);
    generate(&root, &globals, &strings).unwrap()
  }

  fn lines(asm: &str) -> Vec<&str> {
    asm.lines().map(str::trim).collect()
  }

  /// Instructions between `label:` and the next `ret`.
  fn body<'s>(asm: &'s str, label: &str) -> Vec<&'s str> {
    lines(asm)
      .into_iter()
      .skip_while(|line| *line != format!("{label}:"))
      .skip(1)
      .take_while(|line| *line != "ret")
      .collect()
  }

  #[test]
  fn sections_come_in_order() {
    let asm = compile("var a function main() is print \"hi\" end");
    let positions: Vec<_> = [
      ".section .rodata",
      ".section .bss",
      ".text",
      ".Vmain:",
      "\nmain:",
      "safe_printf:",
      ".globl main",
    ]
    .iter()
    .map(|needle| asm.find(needle).unwrap())
    .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{asm}");
  }

  #[test]
  fn fixed_strings_and_pooled_strings_are_emitted() {
    let asm = compile("function main() is print \"hi\" print \"hi\" end");
    let lines = lines(&asm);
    assert!(lines.contains(&"intout: .asciz \"%ld\""));
    assert!(lines.contains(&"strout: .asciz \"%s\""));
    assert!(lines.contains(&"errout: .asciz \"Wrong number of arguments\""));
    assert!(lines.contains(&"string0: .asciz \"hi\""));
    assert!(lines.contains(&"string1: .asciz \"hi\""));
    assert!(lines.contains(&"leaq string1(%rip), %rsi"));
  }

  #[test]
  fn global_array_reserves_eight_bytes_per_element() {
    let asm = compile("var x, g[10] function main() is end");
    let lines = lines(&asm);
    assert!(lines.contains(&".Vx: .zero 8"));
    assert!(lines.contains(&".Vg: .zero 80"));
  }

  #[test]
  fn prologue_pushes_parameters_then_zeroed_locals() {
    let asm = compile(
      "function f(a, b, c, d, e, g, h, i) is
         var x, y
         return h
       end",
    );
    assert_eq!(
      body(&asm, ".Vf"),
      vec![
        "pushq %rbp",
        "movq %rsp, %rbp",
        "pushq %rdi",
        "pushq %rsi",
        "pushq %rdx",
        "pushq %rcx",
        "pushq %r8",
        "pushq %r9",
        "pushq 16(%rbp)",
        "pushq 24(%rbp)",
        "pushq $0",
        "pushq $0",
        "movq -56(%rbp), %rax",
        "jmp .Vf.return",
        "movq $0, %rax",
        ".Vf.return:",
        "movq %rbp, %rsp",
        "popq %rbp",
      ]
    );
  }

  #[test]
  fn binary_operators_use_accumulator_and_scratch() {
    let asm = compile("function f(a, b) is return a - b end");
    assert_eq!(
      body(&asm, ".Vf")[4..10],
      [
        "movq -8(%rbp), %rax",
        "pushq %rax",
        "movq -16(%rbp), %rax",
        "popq %rcx",
        "xchgq %rax, %rcx",
        "subq %rcx, %rax",
      ]
    );
  }

  #[test]
  fn division_sign_extends() {
    let asm = compile("function f(a, b) is return a / b end");
    let body = body(&asm, ".Vf");
    let at = body.iter().position(|line| *line == "cqto").unwrap();
    assert_eq!(body[at + 1], "idivq %rcx");
  }

  #[test]
  fn multiplication_by_power_of_two_is_a_shift() {
    let asm = compile("function f(a) is return a * 8 end");
    let body = body(&asm, ".Vf");
    assert!(body.contains(&"movq $3, %rax"));
    assert!(body.contains(&"salq %cl, %rax"));
    assert!(!body.iter().any(|line| line.starts_with("imulq")));
  }

  #[test]
  fn constant_expression_is_a_single_load() {
    let asm = compile("function f() is return 2 * 4 end");
    assert_eq!(body(&asm, ".Vf")[2..4], ["movq $8, %rax", "jmp .Vf.return"]);
  }

  #[test]
  fn large_literals_use_movabs() {
    let asm = compile("function f() is return 4294967296 end");
    assert!(lines(&asm).contains(&"movabsq $4294967296, %rax"));
  }

  #[test]
  fn globals_are_addressed_relative_to_rip() {
    let asm = compile(
      "var v, g[4]
       function f(i) is
         v := g[i]
         g[i] := v
       end",
    );
    assert_eq!(
      body(&asm, ".Vf")[3..],
      [
        "movq -8(%rbp), %rax",
        "leaq .Vg(%rip), %rcx",
        "leaq (%rcx,%rax,8), %rcx",
        "movq (%rcx), %rax",
        "movq %rax, .Vv(%rip)",
        "movq .Vv(%rip), %rax",
        "pushq %rax",
        "movq -8(%rbp), %rax",
        "leaq .Vg(%rip), %rcx",
        "leaq (%rcx,%rax,8), %rcx",
        "popq %rax",
        "movq %rax, (%rcx)",
        "movq $0, %rax",
        ".Vf.return:",
        "movq %rbp, %rsp",
        "popq %rbp",
      ]
    );
  }

  #[test]
  fn calls_pass_six_in_registers_and_clean_up_the_rest() {
    let asm = compile(
      "function f() is return g(1, 2, 3, 4, 5, 6, 7, 8) end
       function g(a, b, c, d, e, f, h, i) is return i end",
    );
    let body = body(&asm, ".Vf");
    let call = body.iter().position(|line| *line == "call .Vg").unwrap();
    assert_eq!(
      body[call - 6..=call + 1],
      [
        "popq %rdi",
        "popq %rsi",
        "popq %rdx",
        "popq %rcx",
        "popq %r8",
        "popq %r9",
        "call .Vg",
        "addq $16, %rsp",
      ]
    );
    assert_eq!(body[2], "movq $8, %rax");
  }

  #[test]
  fn print_goes_through_the_aligned_helper() {
    let asm = compile("function f(n) is print \"n=\", n end");
    assert_eq!(
      body(&asm, ".Vf")[3..12],
      [
        "leaq strout(%rip), %rdi",
        "leaq string0(%rip), %rsi",
        "call safe_printf",
        "movq -8(%rbp), %rax",
        "movq %rax, %rsi",
        "leaq intout(%rip), %rdi",
        "call safe_printf",
        "movq $10, %rdi",
        "call safe_putchar",
      ]
    );
    assert_eq!(
      body(&asm, "safe_printf"),
      [
        "pushq %rbp",
        "movq %rsp, %rbp",
        "andq $-16, %rsp",
        "movq $0, %rax",
        "call printf@PLT",
        "movq %rbp, %rsp",
        "popq %rbp",
      ]
    );
  }

  #[test]
  fn entry_point_checks_count_and_parses_arguments() {
    let asm = compile(
      "function main(a, b) is return a + b end
       function other() is return 0 end",
    );
    let lines = lines(&asm);
    let start = lines.iter().position(|line| *line == "main:").unwrap();
    assert_eq!(
      lines[start + 1..start + 29],
      [
        "pushq %rbp",
        "movq %rsp, %rbp",
        "subq $1, %rdi",
        "cmpq $2, %rdi",
        "jne ABORT",
        "addq $16, %rsi",
        "movq %rdi, %rcx",
        "PARSE_ARGV:",
        "pushq %rsi",
        "pushq %rcx",
        "movq (%rsi), %rdi",
        "movq $0, %rsi",
        "movq $10, %rdx",
        "call safe_strtol",
        "popq %rcx",
        "popq %rsi",
        "pushq %rax",
        "subq $8, %rsi",
        "loop PARSE_ARGV",
        "popq %rdi",
        "popq %rsi",
        "call .Vmain",
        "movq %rax, %rdi",
        "andq $-16, %rsp",
        "call exit@PLT",
        "ABORT:",
        "leaq errout(%rip), %rdi",
        "andq $-16, %rsp",
      ]
    );
  }

  #[test]
  fn entry_point_without_parameters_skips_parsing() {
    let asm = compile("function main() is return 3 end");
    assert!(!asm.contains("PARSE_ARGV"));
    assert!(asm.contains("cmpq $0, %rdi"));
  }

  #[test]
  fn runtime_symbols_are_declared() {
    let asm = compile("function main() is end");
    let lines = lines(&asm);
    assert!(lines.contains(&".globl main"));
    for symbol in RUNTIME_SYMBOLS {
      assert!(lines.contains(&format!(".extern {symbol}").as_str()));
    }
  }

  #[test]
  fn program_without_functions_has_no_entry_point() {
    let source = "var a";
    let mut root = parse(tokenize(source).unwrap(), source).unwrap();
    let mut strings = StringPool::new();
    let globals = bind(&mut root, &mut strings).unwrap();
    assert_eq!(
      generate(&root, &globals, &strings).unwrap_err(),
      CompileError::MissingEntryPoint
    );
  }

  #[test]
  fn unbound_identifier_is_reported_not_emitted() {
    fn unbind(node: &mut Node, name: &str) {
      if node.as_ident() == Some(name) {
        node.symbol = None;
      }
      for child in &mut node.children {
        unbind(child, name);
      }
    }

    let source = "var x function main() is return x end";
    let mut root = parse(tokenize(source).unwrap(), source).unwrap();
    let mut strings = StringPool::new();
    let globals = bind(&mut root, &mut strings).unwrap();
    unbind(&mut root, "x");
    assert_eq!(
      generate(&root, &globals, &strings).unwrap_err(),
      CompileError::Unbound { name: "x".into() }
    );
  }

  #[test]
  fn names_of_assembler_sections_are_mangled() {
    let asm = compile(
      "var text, data, bss
       function main() is
         text := 1
         return data + bss
       end",
    );
    let lines = lines(&asm);
    assert!(lines.contains(&".Vtext: .zero 8"));
    assert!(lines.contains(&"movq %rax, .Vtext(%rip)"));
    assert!(lines.contains(&"movq .Vdata(%rip), %rax"));
    assert!(!lines.iter().any(|line| line.starts_with(".text:")));
  }

  #[test]
  fn oversized_array_is_reported_not_wrapped() {
    let mut globals = SymbolTable::new();
    globals
      .insert("g", SymbolKind::GlobalArray { len: 1 << 61 }, 0)
      .unwrap();
    globals
      .insert("main", SymbolKind::Function { arity: 0 }, 0)
      .unwrap();
    let root = Node::leaf(NodeKind::Program, 0);
    let err = generate(&root, &globals, &StringPool::new()).unwrap_err();
    assert!(matches!(err, CompileError::Unsupported { .. }), "{err:?}");
  }

  #[test]
  fn arrays_and_functions_are_not_values() {
    let source = "var g[2] function main() is return 0 end";
    let mut root = parse(tokenize(source).unwrap(), source).unwrap();
    let mut strings = StringPool::new();
    let globals = bind(&mut root, &mut strings).unwrap();
    let mut array = Node::ident("g");
    array.symbol = Some(SymbolRef::Global(0));
    root.children[1].children[2].children[0].children[0] = array;
    let err = generate(&root, &globals, &strings).unwrap_err();
    assert_eq!(
      err,
      CompileError::Unsupported {
        what: "g used as a value".into()
      }
    );
  }
}
