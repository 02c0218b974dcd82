mod cli;
mod compile_error;
mod range;
mod test_cli;

pub use cli::{cli_main, Options};
pub use compile_error::{CompileError, CompileErrorPrinter};
pub use range::Range;
pub use test_cli::TestCli;
