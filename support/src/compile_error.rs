use crate::Range;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
  pub range: Range,
  pub message: String,
}

impl CompileError {
  pub fn new(range: Range, message: impl ToString) -> Self {
    Self {
      range,
      message: message.to_string(),
    }
  }
}

pub struct CompileErrorPrinter {
  path: PathBuf,
  line_offsets: Vec<usize>,
}

impl CompileErrorPrinter {
  pub fn new<P: AsRef<Path>, S: AsRef<str>>(file: P, input: S) -> Self {
    Self {
      path: file.as_ref().to_owned(),
      line_offsets: Self::compute_line_offsets(input.as_ref()),
    }
  }

  /// Zero-based (line, column) of a byte position.
  fn get_location(&self, position: usize) -> (usize, usize) {
    let line = match self.line_offsets.binary_search(&position) {
      Ok(line) => line,
      Err(next) => next - 1,
    };
    (line, position - self.line_offsets[line])
  }

  pub fn render(&self, err: &CompileError) -> String {
    let start = self.get_location(err.range.start);
    let end = self.get_location(if err.range.is_empty() {
      err.range.end
    } else {
      err.range.end - 1
    });
    let end = if end.0 == start.0 {
      format!("{}", end.1 + 2)
    } else {
      format!("{}:{}", end.0 + 1, end.1 + 2)
    };
    format!(
      "error at {}:{}:{} - {}\n    {}",
      self.path.display(),
      start.0 + 1,
      start.1 + 1,
      end,
      err.message
    )
  }

  pub fn print(&self, err: &CompileError) {
    eprintln!("{}", self.render(err));
  }

  fn compute_line_offsets(input: &str) -> Vec<usize> {
    let mut offset = 0;
    let mut offsets = vec![];
    for line in input.split('\n') {
      offsets.push(offset);
      offset += line.len() + 1;
    }
    offsets
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  const INPUT: &str = "(:main\n(:main 0 0\n\n(goto :nowhere)))";

  #[test]
  fn line_offsets() {
    let printer = CompileErrorPrinter::new("a.L2", INPUT);
    assert_eq!(printer.line_offsets, vec![0, 7, 18, 19]);
  }

  #[test]
  fn location() {
    let printer = CompileErrorPrinter::new("a.L2", INPUT);
    assert_eq!(printer.get_location(0), (0, 0));
    assert_eq!(printer.get_location(7), (1, 0));
    assert_eq!(printer.get_location(18), (2, 0));
    assert_eq!(printer.get_location(25), (3, 6));
  }

  #[test]
  fn render_single_line() {
    let printer = CompileErrorPrinter::new("a.L2", INPUT);
    let err = CompileError::new((19, 34).into(), "unresolved label :nowhere");
    assert_eq!(
      printer.render(&err),
      "error at a.L2:4:1 - 16\n    unresolved label :nowhere"
    );
  }

  #[test]
  fn render_multi_line() {
    let printer = CompileErrorPrinter::new("a.L2", INPUT);
    let err = CompileError::new((7, 20).into(), "bad function");
    assert_eq!(
      printer.render(&err),
      "error at a.L2:2:1 - 4:2\n    bad function"
    );
  }
}
