//! Backward may-liveness fixed point over individual instructions.

use crate::cfg::Cfg;
use crate::effects::Effects;
use crate::name_set::NameSet;
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
  pub live_in: Vec<NameSet>,
  pub live_out: Vec<NameSet>,
  /// Full passes run, the last of which changed nothing.
  pub passes: usize,
}

/// Solves
///
/// ```text
/// OUT[i] = ⋃ IN[j] for j in succ(i)
/// IN[i]  = GEN[i] ∪ (OUT[i] \ KILL[i])
/// ```
///
/// starting from empty sets. Instructions are visited in reverse program
/// order, and iteration stops after a full pass that leaves every IN and
/// OUT set unchanged.
pub fn solve(cfg: &Cfg, effects: &[Effects]) -> Solution {
  assert_eq!(
    cfg.instr_count(),
    effects.len(),
    "one transfer function per instruction"
  );
  let succs = cfg.instr_successors();
  let n = effects.len();
  let mut live_in = vec![NameSet::new(); n];
  let mut live_out = vec![NameSet::new(); n];

  let mut passes = 0;
  loop {
    passes += 1;
    let mut changed = false;
    for i in (0..n).rev() {
      let out = join(&succs[i], &live_in);
      let mut inn = out.clone();
      inn -= &effects[i].kill;
      inn |= &effects[i].gen;
      if inn != live_in[i] || out != live_out[i] {
        changed = true;
        live_in[i] = inn;
        live_out[i] = out;
      }
    }
    if !changed {
      break;
    }
  }

  Solution {
    live_in,
    live_out,
    passes,
  }
}

fn join(succs: &SmallVec<[usize; 2]>, live_in: &[NameSet]) -> NameSet {
  let mut out = NameSet::new();
  for &s in succs {
    out |= &live_in[s];
  }
  out
}

impl Solution {
  /// Whether both dataflow equations hold at every instruction.
  pub fn is_fixed_point(&self, cfg: &Cfg, effects: &[Effects]) -> bool {
    let succs = cfg.instr_successors();
    (0..effects.len()).all(|i| {
      let mut inn = self.live_out[i].clone();
      inn -= &effects[i].kill;
      inn |= &effects[i].gen;
      self.live_out[i] == join(&succs[i], &self.live_in) && self.live_in[i] == inn
    })
  }
}
