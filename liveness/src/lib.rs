use self::cfg::Cfg;
use self::effects::function_effects;
use self::name_set::NameStore;
use ir::{CallTarget, Function, Instr, Operand, Program};
use rayon::prelude::*;
use std::collections::HashSet;
use support::CompileError;

pub mod cfg;
pub mod dataflow;
pub mod effects;
mod error;
pub mod name_set;
pub mod report;

pub use error::AnalysisError;
pub use report::{LiveSets, Liveness};

/// Per-instruction liveness of one function. Call targets are not
/// resolved here; see [`analyze_program`].
pub fn analyze_function(function: &Function) -> Result<Liveness, AnalysisError> {
  let cfg = Cfg::build(function)?;
  let mut store = NameStore::new();
  let effects = function_effects(function, &mut store)?;
  let solution = dataflow::solve(&cfg, &effects);
  debug_assert!(solution.is_fixed_point(&cfg, &effects));
  log::debug!(
    "function :{}: converged after {} passes over {} blocks and {} names",
    function.name,
    solution.passes,
    cfg.len(),
    store.len() + ir::Reg::COUNT
  );
  Ok(Liveness::project(&function.name, &solution, &store))
}

/// Analyses every function of `prog`, in parallel, returning results in
/// function order. When several functions fail, the error of the first
/// one in program order is reported.
pub fn analyze_program(prog: &Program) -> Result<Vec<Liveness>, AnalysisError> {
  for function in prog.funs.values() {
    check_call_targets(prog, function)?;
  }
  let results = prog
    .funs
    .values()
    .collect::<Vec<_>>()
    .into_par_iter()
    .map(analyze_function)
    .collect::<Vec<_>>();
  results.into_iter().collect()
}

/// `call :l` must name a function of the program or a label of the caller.
fn check_call_targets(
  prog: &Program,
  function: &Function,
) -> Result<(), AnalysisError> {
  let labels = function
    .instrs
    .iter()
    .filter_map(|(_, instr)| match instr {
      Instr::Label(label) => Some(label.as_str()),
      _ => None,
    })
    .collect::<HashSet<_>>();
  for (index, (_, instr)) in function.instrs.iter().enumerate() {
    if let Instr::Call {
      target: CallTarget::Operand(Operand::Label(label)),
      ..
    } = instr
    {
      if !labels.contains(label.as_str()) && !prog.funs.contains_key(label) {
        return Err(AnalysisError::UnresolvedLabel {
          function: function.name.clone(),
          index,
          label: label.clone(),
        });
      }
    }
  }
  Ok(())
}

fn to_compile_error(prog: &Program, err: AnalysisError) -> CompileError {
  let range = prog
    .funs
    .get(err.function())
    .and_then(|function| function.instrs.get(err.index()))
    .map(|(range, _)| *range)
    .unwrap_or_default();
  CompileError::new(range, err)
}

/// Reads an L2 program and renders the liveness report of each function.
pub fn liveness(input: &str) -> Result<String, CompileError> {
  let prog = ir::parse(input)?;
  let results =
    analyze_program(&prog).map_err(|err| to_compile_error(&prog, err))?;
  Ok(results.iter().map(|result| result.to_string()).collect())
}
