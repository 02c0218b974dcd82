use crate::CompileError;
use crate::CompileErrorPrinter;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(about = "Print per-instruction liveness of every function in an L2 program.")]
pub struct Options {
  /// Log analysis progress to stderr.
  #[arg(short, long)]
  pub verbose: bool,

  /// L2 source file.
  pub file: PathBuf,
}

pub fn cli_main(analyze: impl FnOnce(&str) -> Result<String, CompileError>) {
  let opts = Options::parse();

  let mut logger = env_logger::Builder::from_default_env();
  if opts.verbose {
    logger.filter_level(log::LevelFilter::Debug);
  }
  let _ = logger.try_init();

  let path = &opts.file;
  let input = fs::read_to_string(path).unwrap_or_else(|err| {
    eprintln!("read file {} error", path.display());
    eprintln!("{:?}", err);
    process::exit(1);
  });
  log::debug!("read {} bytes from {}", input.len(), path.display());

  match analyze(&input) {
    Ok(output) => print!("{}", output),
    Err(err) => {
      let printer = CompileErrorPrinter::new(path, &input);
      printer.print(&err);
      process::exit(1);
    }
  }
}
