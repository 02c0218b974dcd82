//! Sets of live names as bit sets over a per-function universe.
//!
//! Bits `0..Reg::COUNT` are registers in declaration order; bit
//! `Reg::COUNT + k` is the k-th variable interned in the [`NameStore`].

use indexmap::IndexSet;
use ir::Reg;
use num_traits::FromPrimitive;
use smallvec::SmallVec;
use std::ops::{BitOrAssign, SubAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Name {
  Reg(Reg),
  Var(Var),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Var(pub usize);

/// Interned variable names of one function.
#[derive(Debug, Clone, Default)]
pub struct NameStore(IndexSet<String>);

#[derive(Debug, Clone, Default)]
pub struct NameSet(SmallVec<[u64; 2]>);

const BITS: usize = u64::BITS as usize;

impl NameStore {
  pub fn new() -> Self {
    Self(IndexSet::new())
  }

  /// Returns the variable called `name`, interning it on first sight.
  pub fn get(&mut self, name: &str) -> Var {
    match self.0.get_index_of(name) {
      Some(index) => Var(index),
      None => Var(self.0.insert_full(name.to_owned()).0),
    }
  }

  pub fn var_name(&self, var: Var) -> &str {
    &self.0[var.0]
  }

  pub fn name(&self, name: Name) -> &str {
    match name {
      Name::Reg(reg) => reg.name(),
      Name::Var(var) => self.var_name(var),
    }
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

fn index(name: Name) -> usize {
  match name {
    Name::Reg(reg) => reg as usize,
    Name::Var(var) => Reg::COUNT + var.0,
  }
}

fn name_at(i: usize) -> Option<Name> {
  if i < Reg::COUNT {
    Reg::from_usize(i).map(Name::Reg)
  } else {
    Some(Name::Var(Var(i - Reg::COUNT)))
  }
}

impl NameSet {
  pub fn new() -> Self {
    Self(SmallVec::new())
  }

  pub fn regs(regs: impl IntoIterator<Item = Reg>) -> Self {
    let mut set = Self::new();
    for reg in regs {
      set.add_reg(reg);
    }
    set
  }

  pub fn insert(&mut self, name: Name) {
    let i = index(name);
    if self.0.len() <= i / BITS {
      self.0.resize(i / BITS + 1, 0);
    }
    self.0[i / BITS] |= 1 << (i % BITS);
  }

  pub fn contains(&self, name: Name) -> bool {
    let i = index(name);
    self
      .0
      .get(i / BITS)
      .map_or(false, |word| word & (1 << (i % BITS)) != 0)
  }

  pub fn add_reg(&mut self, reg: Reg) {
    self.insert(Name::Reg(reg));
  }

  pub fn add_var(&mut self, var: Var) {
    self.insert(Name::Var(var));
  }

  pub fn is_empty(&self) -> bool {
    self.0.iter().all(|&word| word == 0)
  }

  pub fn len(&self) -> usize {
    self.0.iter().map(|word| word.count_ones() as usize).sum()
  }

  pub fn iter(&self) -> impl Iterator<Item = Name> + '_ {
    self.0.iter().enumerate().flat_map(|(w, &word)| {
      (0..BITS)
        .filter(move |bit| word & (1 << bit) != 0)
        .filter_map(move |bit| name_at(w * BITS + bit))
    })
  }

  /// Member names in byte-wise lexicographic order.
  pub fn names(&self, store: &NameStore) -> Vec<String> {
    let mut names = self
      .iter()
      .map(|name| store.name(name).to_owned())
      .collect::<Vec<_>>();
    names.sort();
    names
  }
}

/// Sets that differ only in trailing zero words are equal.
impl PartialEq for NameSet {
  fn eq(&self, other: &Self) -> bool {
    let len = self.0.len().max(other.0.len());
    (0..len).all(|i| {
      self.0.get(i).copied().unwrap_or(0) == other.0.get(i).copied().unwrap_or(0)
    })
  }
}

impl Eq for NameSet {}

impl BitOrAssign<&NameSet> for NameSet {
  fn bitor_assign(&mut self, rhs: &NameSet) {
    if self.0.len() < rhs.0.len() {
      self.0.resize(rhs.0.len(), 0);
    }
    for (word, &other) in self.0.iter_mut().zip(rhs.0.iter()) {
      *word |= other;
    }
  }
}

impl SubAssign<&NameSet> for NameSet {
  fn sub_assign(&mut self, rhs: &NameSet) {
    for (word, &other) in self.0.iter_mut().zip(rhs.0.iter()) {
      *word &= !other;
    }
  }
}
