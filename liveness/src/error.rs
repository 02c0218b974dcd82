use thiserror::Error;

/// Structural defects that make a function unanalysable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
  #[error("unresolved label :{label} in function :{function}")]
  UnresolvedLabel {
    function: String,
    index: usize,
    label: String,
  },
  #[error("label :{label} is defined more than once in function :{function}")]
  DuplicateLabel {
    function: String,
    index: usize,
    label: String,
  },
  #[error("malformed instruction in function :{function}: {message}")]
  MalformedInstruction {
    function: String,
    index: usize,
    message: String,
  },
}

impl AnalysisError {
  pub fn function(&self) -> &str {
    match self {
      Self::UnresolvedLabel { function, .. }
      | Self::DuplicateLabel { function, .. }
      | Self::MalformedInstruction { function, .. } => function,
    }
  }

  /// Index of the offending instruction.
  pub fn index(&self) -> usize {
    match *self {
      Self::UnresolvedLabel { index, .. }
      | Self::DuplicateLabel { index, .. }
      | Self::MalformedInstruction { index, .. } => index,
    }
  }
}
