use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use rvslc::{Options, Session};
use tracing::level_filters::LevelFilter;

/// Compile a VSL program to x86-64 assembly.
#[derive(Parser, Debug)]
#[command(name = "rvslc", version, about, long_about = None)]
struct Cli {
  /// Source file; standard input when omitted
  #[arg(value_name = "FILE")]
  input: Option<PathBuf>,

  /// Write assembly here instead of standard output
  #[arg(short, long, value_name = "FILE")]
  output: Option<PathBuf>,

  /// Skip constant folding and strength reduction
  #[arg(long)]
  no_simplify: bool,

  /// Print the symbol tables and string pool to standard error
  #[arg(long)]
  dump_tables: bool,

  /// Log more; repeat for more detail
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => LevelFilter::WARN,
    1 => LevelFilter::INFO,
    2 => LevelFilter::DEBUG,
    _ => LevelFilter::TRACE,
  };
  tracing_subscriber::fmt()
    .with_max_level(level)
    .with_target(false)
    .without_time()
    .with_writer(io::stderr)
    .init();
}

fn read_source(input: Option<&PathBuf>) -> io::Result<String> {
  match input {
    Some(path) => fs::read_to_string(path),
    None => {
      let mut source = String::new();
      io::stdin().read_to_string(&mut source)?;
      Ok(source)
    }
  }
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let source = match read_source(cli.input.as_ref()) {
    Ok(source) => source,
    Err(err) => {
      let name = cli
        .input
        .as_ref()
        .map_or_else(|| "<stdin>".to_string(), |path| path.display().to_string());
      eprintln!("{name}: {err}");
      process::exit(1);
    }
  };

  let options = Options::default()
    .with_simplify(!cli.no_simplify)
    .with_dump_tables(cli.dump_tables);
  let mut session = Session::new(options);
  let result = session.compile(&source);
  if options.dump_tables {
    eprint!("{}", session.dump_tables());
  }

  let asm = match result {
    Ok(asm) => asm,
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  };

  match &cli.output {
    Some(path) => {
      if let Err(err) = fs::write(path, asm) {
        eprintln!("{}: {err}", path.display());
        process::exit(1);
      }
    }
    None => print!("{asm}"),
  }
}
