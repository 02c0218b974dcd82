//! Read-only per-instruction view of a solved function.

use crate::dataflow::Solution;
use crate::name_set::NameStore;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSets {
  pub live_in: Vec<String>,
  pub live_out: Vec<String>,
}

/// IN/OUT names of every instruction of one function, in instruction
/// order, each set sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Liveness {
  pub function: String,
  pub instrs: Vec<LiveSets>,
}

impl Liveness {
  pub fn project(function: &str, solution: &Solution, store: &NameStore) -> Self {
    let instrs = solution
      .live_in
      .iter()
      .zip(solution.live_out.iter())
      .map(|(live_in, live_out)| LiveSets {
        live_in: live_in.names(store),
        live_out: live_out.names(store),
      })
      .collect();
    Self {
      function: function.to_owned(),
      instrs,
    }
  }

  pub fn live_in(&self, index: usize) -> &[String] {
    &self.instrs[index].live_in
  }

  pub fn live_out(&self, index: usize) -> &[String] {
    &self.instrs[index].live_out
  }

  pub fn len(&self) -> usize {
    self.instrs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instrs.is_empty()
  }
}

fn write_sets<'a>(
  f: &mut Formatter,
  header: &str,
  sets: impl Iterator<Item = &'a Vec<String>>,
) -> fmt::Result {
  writeln!(f, "({}", header)?;
  for set in sets {
    writeln!(f, "({})", set.join(" "))?;
  }
  writeln!(f, ")")
}

impl Display for Liveness {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    writeln!(f, "(")?;
    write_sets(f, "in", self.instrs.iter().map(|sets| &sets.live_in))?;
    writeln!(f)?;
    write_sets(f, "out", self.instrs.iter().map(|sets| &sets.live_out))?;
    writeln!(f)?;
    writeln!(f, ")")
  }
}
