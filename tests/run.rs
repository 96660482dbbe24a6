//! Assemble generated code with the system C compiler and run it. Skipped
//! unless the host is x86-64 Linux with `cc` on the path.

#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use std::fs;
use std::process::{Command, Output};

use rvslc::{Options, compile};
use tempfile::TempDir;

fn have_cc() -> bool {
  Command::new("cc")
    .arg("--version")
    .output()
    .is_ok_and(|output| output.status.success())
}

/// Compile `source`, link it and run the result with `args`.
fn run(source: &str, options: &Options, args: &[&str]) -> Option<Output> {
  if !have_cc() {
    eprintln!("cc not found, skipping");
    return None;
  }
  let dir = TempDir::new().unwrap();
  let asm_path = dir.path().join("program.s");
  let exe_path = dir.path().join("program");
  fs::write(&asm_path, compile(source, options).unwrap()).unwrap();

  let status = Command::new("cc")
    .arg("-o")
    .arg(&exe_path)
    .arg(&asm_path)
    .status()
    .unwrap();
  assert!(status.success(), "assembling failed");
  Some(Command::new(&exe_path).args(args).output().unwrap())
}

fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).into_owned()
}

const ARITHMETIC: &str = "
function main(a, b) is
  print \"sum \", a + b
  print a * 8, \" \", a / 2, \" \", -a, \" \", a << 2, \" \", a >> 1, \" \", a & 6
  return a - b
end
";

#[test]
fn arithmetic_prints_and_exits_with_the_result() {
  for options in [Options::default(), Options::default().with_simplify(false)] {
    let Some(output) = run(ARITHMETIC, &options, &["10", "3"]) else {
      return;
    };
    assert_eq!(stdout(&output), "sum 13\n80 5 -10 40 5 2\n");
    assert_eq!(output.status.code(), Some(7));
  }
}

#[test]
fn negative_division_depends_on_strength_reduction() {
  // idivq truncates toward zero; the shift it is reduced to rounds down.
  let expected = [
    (Options::default().with_simplify(false), "sum -7\n-56 -3 7 -28 -4 0\n"),
    (Options::default(), "sum -7\n-56 -4 7 -28 -4 0\n"),
  ];
  for (options, printed) in expected {
    let Some(output) = run(ARITHMETIC, &options, &["-7", "0"]) else {
      return;
    };
    assert_eq!(stdout(&output), printed);
  }
}

#[test]
fn wrong_argument_count_aborts() {
  let Some(output) = run(ARITHMETIC, &Options::default(), &["1"]) else {
    return;
  };
  assert_eq!(stdout(&output), "Wrong number of arguments\n");
  assert_eq!(output.status.code(), Some(1));
}

#[test]
fn globals_arrays_and_stack_arguments() {
  let source = "
    var total, g[8]
    function main(a, b, c, d, e, f, h, i) is
      g[0] := a
      g[7] := i
      total := sum(a, b, c, d, e, f, h, i)
      print total, \" \", g[0] + g[7]
      return sum(i, h, f, e, d, c, b, a) - total
    end
    function sum(a, b, c, d, e, f, h, i) is
      return a + b + c + d + e + f + h + i * 10
    end
  ";
  let Some(output) = run(source, &Options::default(), &["1", "2", "3", "4", "5", "6", "7", "8"])
  else {
    return;
  };
  // 1+2+...+7 + 80 = 108; reversed: 8+7+6+5+4+3+2 + 10 = 45
  assert_eq!(stdout(&output), "108 9\n");
  assert_eq!(output.status.code(), Some((45 - 108_i32).rem_euclid(256)));
}

#[test]
fn block_locals_shadow_and_functions_fall_through_to_zero() {
  let source = "
    var x
    function main() is
      x := 5
      begin
        var x
        x := 1
        print x
      end
      print x, \" \", nothing()
      return x
    end
    function nothing() is
      var unused
      unused := 9
    end
  ";
  let Some(output) = run(source, &Options::default(), &[]) else {
    return;
  };
  assert_eq!(stdout(&output), "1\n5 0\n");
  assert_eq!(output.status.code(), Some(5));
}

#[test]
fn names_of_assembler_sections_are_usable() {
  let source = "
    var data, bss
    function main() is
      data := 3
      bss := text(data)
      print data, \" \", bss
      return bss
    end
    function text(n) is return n + 1 end
  ";
  let Some(output) = run(source, &Options::default(), &[]) else {
    return;
  };
  assert_eq!(stdout(&output), "3 4\n");
  assert_eq!(output.status.code(), Some(4));
}
