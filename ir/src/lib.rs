//! In-memory L2: x86-64 registers, operands, instructions, functions and
//! programs, plus a reader for the textual s-expression form.

pub mod parser;

pub use parser::{parse, Result};

use enum_iterator::IntoEnumIterator;
use indexmap::IndexMap;
use num_derive::FromPrimitive;
use std::fmt::{self, Display, Formatter};
use support::Range;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  FromPrimitive,
  IntoEnumIterator,
)]
pub enum Reg {
  Rax,
  Rbx,
  Rcx,
  Rdx,
  Rsi,
  Rdi,
  Rbp,
  Rsp,
  R8,
  R9,
  R10,
  R11,
  R12,
  R13,
  R14,
  R15,
}

impl Reg {
  pub const COUNT: usize = 16;

  /// Argument-passing registers, in calling-convention order.
  pub fn argument_regs() -> [Reg; 6] {
    use Reg::*;
    [Rdi, Rsi, Rdx, Rcx, R8, R9]
  }

  pub fn caller_saved_regs() -> [Reg; 9] {
    use Reg::*;
    [R10, R11, R8, R9, Rax, Rcx, Rdi, Rdx, Rsi]
  }

  pub fn callee_saved_regs() -> [Reg; 6] {
    use Reg::*;
    [R12, R13, R14, R15, Rbp, Rbx]
  }

  pub fn return_reg() -> Reg {
    Reg::Rax
  }

  pub fn name(self) -> &'static str {
    use Reg::*;
    match self {
      Rax => "rax",
      Rbx => "rbx",
      Rcx => "rcx",
      Rdx => "rdx",
      Rsi => "rsi",
      Rdi => "rdi",
      Rbp => "rbp",
      Rsp => "rsp",
      R8 => "r8",
      R9 => "r9",
      R10 => "r10",
      R11 => "r11",
      R12 => "r12",
      R13 => "r13",
      R14 => "r14",
      R15 => "r15",
    }
  }

  pub fn from_name(name: &str) -> Option<Reg> {
    Reg::into_enum_iter().find(|reg| reg.name() == name)
  }
}

impl Display for Reg {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Entry points provided by the runtime system. They are not allocatable
/// names and never take part in liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoEnumIterator)]
pub enum RuntimeFn {
  Print,
  Allocate,
  ArrayError,
}

impl RuntimeFn {
  pub fn name(self) -> &'static str {
    match self {
      Self::Print => "print",
      Self::Allocate => "allocate",
      Self::ArrayError => "array-error",
    }
  }

  pub fn from_name(name: &str) -> Option<RuntimeFn> {
    RuntimeFn::into_enum_iter().find(|f| f.name() == name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
  Reg(Reg),
  Var(String),
  /// Label name without the leading `:`.
  Label(String),
  Num(i64),
  /// `mem base offset`. The base is a register or a variable.
  Mem(Box<Operand>, i64),
}

impl Operand {
  pub fn var(name: impl ToString) -> Self {
    Self::Var(name.to_string())
  }

  pub fn label(name: impl ToString) -> Self {
    Self::Label(name.to_string())
  }

  pub fn mem(base: Operand, offset: i64) -> Self {
    Self::Mem(Box::new(base), offset)
  }
}

impl From<Reg> for Operand {
  fn from(reg: Reg) -> Self {
    Self::Reg(reg)
  }
}

impl From<i64> for Operand {
  fn from(n: i64) -> Self {
    Self::Num(n)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallTarget {
  Operand(Operand),
  Runtime(RuntimeFn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoEnumIterator)]
pub enum AssignOp {
  Move,
  Add,
  Sub,
  Mul,
  And,
  Shl,
  Shr,
}

impl AssignOp {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Move => "<-",
      Self::Add => "+=",
      Self::Sub => "-=",
      Self::Mul => "*=",
      Self::And => "&=",
      Self::Shl => "<<=",
      Self::Shr => ">>=",
    }
  }

  pub fn from_symbol(symbol: &str) -> Option<AssignOp> {
    AssignOp::into_enum_iter().find(|op| op.symbol() == symbol)
  }

  /// Whether the destination's old value is read.
  pub fn is_update(self) -> bool {
    self != Self::Move
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoEnumIterator)]
pub enum CmpOp {
  Lt,
  Le,
  Eq,
}

impl CmpOp {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Lt => "<",
      Self::Le => "<=",
      Self::Eq => "=",
    }
  }

  pub fn from_symbol(symbol: &str) -> Option<CmpOp> {
    CmpOp::into_enum_iter().find(|op| op.symbol() == symbol)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncDecOp {
  Inc,
  Dec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
  Return,
  Label(String),
  Assign {
    dest: Operand,
    op: AssignOp,
    src: Operand,
  },
  Call {
    target: CallTarget,
    args: i64,
  },
  Goto(String),
  IncDec {
    target: Operand,
    op: IncDecOp,
  },
  /// `dest @ base index scale`, i.e. `dest <- base + index * scale`.
  Cisc {
    dest: Operand,
    base: Operand,
    index: Operand,
    scale: i64,
  },
  Compare {
    dest: Operand,
    lhs: Operand,
    cmp: CmpOp,
    rhs: Operand,
  },
  CJump {
    lhs: Operand,
    cmp: CmpOp,
    rhs: Operand,
    then_label: String,
    else_label: String,
  },
  StackArg {
    dest: Operand,
    offset: i64,
  },
}

impl Instr {
  /// Labels this instruction may transfer control to within its function.
  pub fn jump_targets(&self) -> Vec<&str> {
    match self {
      Self::Goto(label) => vec![label.as_str()],
      Self::CJump {
        then_label,
        else_label,
        ..
      } => vec![then_label.as_str(), else_label.as_str()],
      _ => vec![],
    }
  }

  /// Whether control never falls through to the next instruction.
  pub fn closes_block(&self) -> bool {
    matches!(self, Self::Return | Self::Goto(_) | Self::CJump { .. })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
  /// Name without the leading `:`.
  pub name: String,
  pub arguments: i64,
  pub locals: i64,
  pub instrs: Vec<(Range, Instr)>,
}

impl Function {
  /// Builds a function from instructions with no source positions.
  pub fn new(
    name: impl ToString,
    arguments: i64,
    instrs: impl IntoIterator<Item = Instr>,
  ) -> Self {
    Self {
      name: name.to_string(),
      arguments,
      locals: 0,
      instrs: instrs
        .into_iter()
        .map(|instr| (Range::default(), instr))
        .collect(),
    }
  }

  pub fn instr(&self, index: usize) -> &Instr {
    &self.instrs[index].1
  }

  pub fn len(&self) -> usize {
    self.instrs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instrs.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
  /// Entry label without the leading `:`.
  pub entry: String,
  pub funs: IndexMap<String, Function>,
}

impl Display for Operand {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Self::Reg(reg) => write!(f, "{}", reg),
      Self::Var(name) => write!(f, "{}", name),
      Self::Label(name) => write!(f, ":{}", name),
      Self::Num(n) => write!(f, "{}", n),
      Self::Mem(base, offset) => write!(f, "mem {} {}", base, offset),
    }
  }
}

impl Display for CallTarget {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Self::Operand(operand) => Display::fmt(operand, f),
      Self::Runtime(func) => f.write_str(func.name()),
    }
  }
}

impl Display for Instr {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Self::Return => write!(f, "(return)"),
      Self::Label(label) => write!(f, ":{}", label),
      Self::Assign { dest, op, src } => {
        write!(f, "({} {} {})", dest, op.symbol(), src)
      }
      Self::Call { target, args } => write!(f, "(call {} {})", target, args),
      Self::Goto(label) => write!(f, "(goto :{})", label),
      Self::IncDec { target, op } => match op {
        IncDecOp::Inc => write!(f, "({}++)", target),
        IncDecOp::Dec => write!(f, "({}--)", target),
      },
      Self::Cisc {
        dest,
        base,
        index,
        scale,
      } => write!(f, "({} @ {} {} {})", dest, base, index, scale),
      Self::Compare {
        dest,
        lhs,
        cmp,
        rhs,
      } => write!(f, "({} <- {} {} {})", dest, lhs, cmp.symbol(), rhs),
      Self::CJump {
        lhs,
        cmp,
        rhs,
        then_label,
        else_label,
      } => write!(
        f,
        "(cjump {} {} {} :{} :{})",
        lhs,
        cmp.symbol(),
        rhs,
        then_label,
        else_label
      ),
      Self::StackArg { dest, offset } => {
        write!(f, "({} <- stack-arg {})", dest, offset)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn register_tables() {
    assert_eq!(Reg::into_enum_iter().count(), Reg::COUNT);
    for reg in Reg::into_enum_iter() {
      assert_eq!(Reg::from_name(reg.name()), Some(reg));
    }
    assert_eq!(Reg::from_name("rip"), None);
    assert!(!Reg::caller_saved_regs().contains(&Reg::Rsp));
    assert!(!Reg::callee_saved_regs().contains(&Reg::Rsp));
    for reg in Reg::callee_saved_regs() {
      assert!(!Reg::caller_saved_regs().contains(&reg));
    }
  }

  #[test]
  fn display() {
    use Reg::*;
    let instrs = vec![
      Instr::Assign {
        dest: Operand::mem(Rsp.into(), -8),
        op: AssignOp::Move,
        src: Operand::label("ret"),
      },
      Instr::Call {
        target: CallTarget::Runtime(RuntimeFn::ArrayError),
        args: 2,
      },
      Instr::IncDec {
        target: Operand::var("i"),
        op: IncDecOp::Dec,
      },
      Instr::Cisc {
        dest: Rax.into(),
        base: Rdi.into(),
        index: Operand::var("i"),
        scale: 8,
      },
      Instr::CJump {
        lhs: Operand::var("i"),
        cmp: CmpOp::Le,
        rhs: 0.into(),
        then_label: "done".to_owned(),
        else_label: "loop".to_owned(),
      },
    ];
    let text = instrs
      .iter()
      .map(|instr| instr.to_string())
      .collect::<Vec<_>>();
    assert_eq!(
      text,
      vec![
        "(mem rsp -8 <- :ret)",
        "(call array-error 2)",
        "(i--)",
        "(rax @ rdi i 8)",
        "(cjump i <= 0 :done :loop)",
      ]
    );
  }
}
