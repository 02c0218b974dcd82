#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Range {
  pub start: usize,
  pub end: usize,
}

impl From<(usize, usize)> for Range {
  fn from((start, end): (usize, usize)) -> Self {
    Self { start, end }
  }
}

impl Range {
  pub fn is_empty(&self) -> bool {
    self.start == self.end
  }

  /// The smallest range covering both `self` and `other`.
  pub fn to(self, other: Range) -> Range {
    Range {
      start: self.start.min(other.start),
      end: self.end.max(other.end),
    }
  }

  pub fn slice<'a>(&self, input: &'a str) -> &'a str {
    &input[self.start..self.end]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn cover() {
    let a: Range = (3, 5).into();
    let b: Range = (8, 12).into();
    assert_eq!(a.to(b), (3, 12).into());
    assert_eq!(b.to(a), (3, 12).into());
  }

  #[test]
  fn slice() {
    let range: Range = (1, 4).into();
    assert_eq!(range.slice("(rax <- 1)"), "rax");
    assert!(!range.is_empty());
  }
}
