//! GEN/KILL sets of every L2 instruction kind.

use crate::name_set::{Name, NameSet, NameStore};
use crate::AnalysisError;
use ir::{CallTarget, Function, Instr, Operand, Reg, RuntimeFn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
  /// Names read before this instruction writes anything.
  pub gen: NameSet,
  /// Names this instruction defines.
  pub kill: NameSet,
}

/// Computes the effects of every instruction of `function`, interning its
/// variables into `store`.
pub fn function_effects(
  function: &Function,
  store: &mut NameStore,
) -> Result<Vec<Effects>, AnalysisError> {
  function
    .instrs
    .iter()
    .enumerate()
    .map(|(index, (_, instr))| {
      let fx = effects(instr, store).map_err(|message| {
        AnalysisError::MalformedInstruction {
          function: function.name.clone(),
          index,
          message,
        }
      })?;
      log::trace!(
        "{:>4} {:<28} gen {:?} kill {:?}",
        index,
        instr.to_string(),
        fx.gen.names(store),
        fx.kill.names(store)
      );
      Ok(fx)
    })
    .collect()
}

/// GEN/KILL of a single instruction. Fails with a description when an
/// operand slot holds a kind the instruction cannot take.
pub fn effects(instr: &Instr, store: &mut NameStore) -> Result<Effects, String> {
  let mut state = Transfer {
    store,
    fx: Effects::default(),
  };
  match instr {
    Instr::Return => {
      for reg in Reg::callee_saved_regs() {
        state.fx.gen.add_reg(reg);
      }
      state.fx.gen.add_reg(Reg::return_reg());
    }
    Instr::Label(_) | Instr::Goto(_) => {}
    Instr::Assign { dest, op, src } => {
      state.read(src)?;
      if let Operand::Mem(..) = dest {
        // a store defines no name; its address is read
        state.read(dest)?;
      } else {
        state.write(dest)?;
        if op.is_update() {
          state.read(dest)?;
        }
      }
    }
    Instr::Call { target, args } => {
      let args = usize::try_from(*args)
        .map_err(|_| format!("negative argument count {} in {}", args, instr))?;
      match target {
        CallTarget::Operand(
          target @ (Operand::Reg(_) | Operand::Var(_) | Operand::Label(_)),
        ) => state.read(target)?,
        CallTarget::Operand(target) => {
          return Err(format!("invalid call target {} in {}", target, instr))
        }
        CallTarget::Runtime(_) => {}
      }
      for reg in Reg::argument_regs().into_iter().take(args.min(6)) {
        state.fx.gen.add_reg(reg);
      }
      for reg in Reg::caller_saved_regs() {
        state.fx.kill.add_reg(reg);
      }
      state.fx.kill.add_reg(Reg::return_reg());
    }
    Instr::IncDec { target, .. } => {
      state.write(target)?;
      state.read(target)?;
    }
    Instr::Cisc {
      dest,
      base,
      index,
      scale,
    } => {
      if !matches!(scale, 1 | 2 | 4 | 8) {
        return Err(format!("invalid scale {} in {}", scale, instr));
      }
      state.write(dest)?;
      state.read(base)?;
      state.read(index)?;
    }
    Instr::Compare { dest, lhs, rhs, .. } => {
      state.write(dest)?;
      state.read(lhs)?;
      state.read(rhs)?;
    }
    Instr::CJump { lhs, rhs, .. } => {
      state.read(lhs)?;
      state.read(rhs)?;
    }
    Instr::StackArg { dest, .. } => {
      state.write(dest)?;
    }
  }
  Ok(state.fx)
}

struct Transfer<'a> {
  store: &'a mut NameStore,
  fx: Effects,
}

impl<'a> Transfer<'a> {
  /// The tracked name of a register or variable, if any. The stack
  /// pointer and runtime entry points are never tracked.
  fn name(&mut self, operand: &Operand) -> Option<Name> {
    match operand {
      Operand::Reg(Reg::Rsp) => None,
      Operand::Reg(reg) => Some(Name::Reg(*reg)),
      Operand::Var(var) if RuntimeFn::from_name(var).is_some() => None,
      Operand::Var(var) => Some(Name::Var(self.store.get(var))),
      Operand::Label(_) | Operand::Num(_) | Operand::Mem(..) => None,
    }
  }

  fn read(&mut self, operand: &Operand) -> Result<(), String> {
    match operand {
      Operand::Mem(base, _) => match **base {
        Operand::Reg(_) | Operand::Var(_) => self.read(base),
        _ => Err(format!("invalid memory base {}", base)),
      },
      _ => {
        if let Some(name) = self.name(operand) {
          self.fx.gen.insert(name);
        }
        Ok(())
      }
    }
  }

  fn write(&mut self, operand: &Operand) -> Result<(), String> {
    match operand {
      Operand::Reg(_) | Operand::Var(_) => {
        if let Some(name) = self.name(operand) {
          self.fx.kill.insert(name);
        }
        Ok(())
      }
      _ => Err(format!("cannot assign to {}", operand)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ir::{AssignOp, CmpOp, IncDecOp};
  use pretty_assertions::assert_eq;
  use Reg::*;

  /// (GEN, KILL) as sorted names.
  fn gen_kill(instr: Instr) -> (Vec<String>, Vec<String>) {
    let mut store = NameStore::new();
    let fx = effects(&instr, &mut store).unwrap();
    (fx.gen.names(&store), fx.kill.names(&store))
  }

  fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  fn x() -> Operand {
    Operand::var("x")
  }

  fn y() -> Operand {
    Operand::var("y")
  }

  #[test]
  fn r#return() {
    assert_eq!(
      gen_kill(Instr::Return),
      (names(&["r12", "r13", "r14", "r15", "rax", "rbp", "rbx"]), names(&[]))
    );
  }

  #[test]
  fn labels_and_goto() {
    let empty = (names(&[]), names(&[]));
    assert_eq!(gen_kill(Instr::Label("a".to_owned())), empty);
    assert_eq!(gen_kill(Instr::Goto("a".to_owned())), empty);
  }

  #[test]
  fn plain_assignment() {
    let instr = Instr::Assign {
      dest: x(),
      op: AssignOp::Move,
      src: y(),
    };
    assert_eq!(gen_kill(instr), (names(&["y"]), names(&["x"])));

    let instr = Instr::Assign {
      dest: x(),
      op: AssignOp::Move,
      src: Operand::label("f"),
    };
    assert_eq!(gen_kill(instr), (names(&[]), names(&["x"])));
  }

  #[test]
  fn self_assignment_reads_and_defines() {
    let instr = Instr::Assign {
      dest: x(),
      op: AssignOp::Move,
      src: x(),
    };
    assert_eq!(gen_kill(instr), (names(&["x"]), names(&["x"])));
  }

  #[test]
  fn compound_assignment() {
    for op in [
      AssignOp::Add,
      AssignOp::Sub,
      AssignOp::Mul,
      AssignOp::And,
      AssignOp::Shl,
      AssignOp::Shr,
    ] {
      let instr = Instr::Assign {
        dest: x(),
        op,
        src: Rcx.into(),
      };
      assert_eq!(gen_kill(instr), (names(&["rcx", "x"]), names(&["x"])));
    }
  }

  #[test]
  fn memory_operands() {
    let load = Instr::Assign {
      dest: x(),
      op: AssignOp::Move,
      src: Operand::mem(y(), 8),
    };
    assert_eq!(gen_kill(load), (names(&["y"]), names(&["x"])));

    let store = Instr::Assign {
      dest: Operand::mem(y(), 0),
      op: AssignOp::Add,
      src: x(),
    };
    assert_eq!(gen_kill(store), (names(&["x", "y"]), names(&[])));

    let spill = Instr::Assign {
      dest: Operand::mem(Rsp.into(), -8),
      op: AssignOp::Move,
      src: Operand::label("ret"),
    };
    assert_eq!(gen_kill(spill), (names(&[]), names(&[])));
  }

  #[test]
  fn call() {
    let instr = Instr::Call {
      target: CallTarget::Operand(x()),
      args: 2,
    };
    assert_eq!(
      gen_kill(instr),
      (
        names(&["rdi", "rsi", "x"]),
        names(&["r10", "r11", "r8", "r9", "rax", "rcx", "rdi", "rdx", "rsi"])
      )
    );
  }

  #[test]
  fn call_clamps_argument_registers() {
    let instr = Instr::Call {
      target: CallTarget::Operand(Operand::label("f")),
      args: 8,
    };
    let (gen, _) = gen_kill(instr);
    assert_eq!(gen, names(&["r8", "r9", "rcx", "rdi", "rdx", "rsi"]));
  }

  #[test]
  fn runtime_calls_are_not_names() {
    let instr = Instr::Call {
      target: CallTarget::Runtime(RuntimeFn::Allocate),
      args: 2,
    };
    let (gen, kill) = gen_kill(instr);
    assert_eq!(gen, names(&["rdi", "rsi"]));
    assert!(!kill.contains(&"allocate".to_owned()));

    let instr = Instr::Assign {
      dest: x(),
      op: AssignOp::Move,
      src: Operand::var("print"),
    };
    assert_eq!(gen_kill(instr), (names(&[]), names(&["x"])));
  }

  #[test]
  fn stack_pointer_is_not_tracked() {
    let instr = Instr::Assign {
      dest: Rsp.into(),
      op: AssignOp::Sub,
      src: 8.into(),
    };
    assert_eq!(gen_kill(instr), (names(&[]), names(&[])));
  }

  #[test]
  fn inc_dec() {
    let instr = Instr::IncDec {
      target: x(),
      op: IncDecOp::Dec,
    };
    assert_eq!(gen_kill(instr), (names(&["x"]), names(&["x"])));
  }

  #[test]
  fn cisc_and_compare() {
    let lea = Instr::Cisc {
      dest: Rax.into(),
      base: x(),
      index: y(),
      scale: 8,
    };
    assert_eq!(gen_kill(lea), (names(&["x", "y"]), names(&["rax"])));

    let cmp = Instr::Compare {
      dest: Rdi.into(),
      lhs: x(),
      cmp: CmpOp::Lt,
      rhs: 5.into(),
    };
    assert_eq!(gen_kill(cmp), (names(&["x"]), names(&["rdi"])));
  }

  #[test]
  fn cjump_defines_nothing() {
    let instr = Instr::CJump {
      lhs: x(),
      cmp: CmpOp::Eq,
      rhs: Rdx.into(),
      then_label: "a".to_owned(),
      else_label: "b".to_owned(),
    };
    assert_eq!(gen_kill(instr), (names(&["rdx", "x"]), names(&[])));
  }

  #[test]
  fn stack_arg() {
    let instr = Instr::StackArg {
      dest: x(),
      offset: 8,
    };
    assert_eq!(gen_kill(instr), (names(&[]), names(&["x"])));
  }

  #[test]
  fn malformed() {
    let mut store = NameStore::new();
    let number_dest = Instr::Assign {
      dest: 5.into(),
      op: AssignOp::Move,
      src: x(),
    };
    assert_eq!(
      effects(&number_dest, &mut store),
      Err("cannot assign to 5".to_owned())
    );

    let negative_args = Instr::Call {
      target: CallTarget::Runtime(RuntimeFn::Print),
      args: -1,
    };
    assert_eq!(
      effects(&negative_args, &mut store),
      Err("negative argument count -1 in (call print -1)".to_owned())
    );

    let bad_scale = Instr::Cisc {
      dest: x(),
      base: x(),
      index: y(),
      scale: 3,
    };
    assert_eq!(
      effects(&bad_scale, &mut store),
      Err("invalid scale 3 in (x @ x y 3)".to_owned())
    );

    let nested_mem = Instr::Assign {
      dest: x(),
      op: AssignOp::Move,
      src: Operand::mem(Operand::mem(y(), 0), 8),
    };
    assert_eq!(
      effects(&nested_mem, &mut store),
      Err("invalid memory base mem y 0".to_owned())
    );
  }

  #[test]
  fn function_effects_report_position() {
    let f = Function::new(
      "f",
      0,
      [
        Instr::Return,
        Instr::IncDec {
          target: 3.into(),
          op: IncDecOp::Inc,
        },
      ],
    );
    let mut store = NameStore::new();
    assert_eq!(
      function_effects(&f, &mut store),
      Err(AnalysisError::MalformedInstruction {
        function: "f".to_owned(),
        index: 1,
        message: "cannot assign to 3".to_owned(),
      })
    );
  }
}
