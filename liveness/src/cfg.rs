//! Basic blocks and control-flow edges of one function.

use crate::AnalysisError;
use indexmap::map::Entry;
use indexmap::IndexMap;
use ir::{Function, Instr};
use petgraph::graph::{DiGraph, NodeIndex};
use smallvec::SmallVec;

/// A maximal run of instructions `start..end` entered only at `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
  pub label: Option<String>,
  pub start: usize,
  pub end: usize,
}

impl BasicBlock {
  pub fn last(&self) -> usize {
    self.end - 1
  }
}

/// Node `i` of the graph is the `i`-th block in program order.
#[derive(Debug, Clone)]
pub struct Cfg {
  graph: DiGraph<BasicBlock, ()>,
  instr_count: usize,
}

impl Cfg {
  pub fn build(function: &Function) -> Result<Cfg, AnalysisError> {
    let mut graph = DiGraph::new();
    let mut labels = IndexMap::<&str, NodeIndex>::new();

    let mut start = 0;
    for i in 0..function.len() {
      let next_is_label = matches!(
        function.instrs.get(i + 1),
        Some((_, Instr::Label(_)))
      );
      let is_last = i + 1 == function.len();
      if !function.instr(i).closes_block() && !next_is_label && !is_last {
        continue;
      }

      let label = match function.instr(start) {
        Instr::Label(label) => Some(label.as_str()),
        _ => None,
      };
      let node = graph.add_node(BasicBlock {
        label: label.map(str::to_owned),
        start,
        end: i + 1,
      });
      if let Some(label) = label {
        match labels.entry(label) {
          Entry::Occupied(_) => {
            return Err(AnalysisError::DuplicateLabel {
              function: function.name.clone(),
              index: start,
              label: label.to_owned(),
            })
          }
          Entry::Vacant(entry) => {
            entry.insert(node);
          }
        }
      }
      start = i + 1;
    }

    for node in graph.node_indices().collect::<Vec<_>>() {
      let last = graph[node].last();
      let targets = match function.instr(last) {
        Instr::Return => vec![],
        instr @ (Instr::Goto(_) | Instr::CJump { .. }) => instr
          .jump_targets()
          .into_iter()
          .map(|label| {
            labels.get(label).copied().ok_or_else(|| {
              AnalysisError::UnresolvedLabel {
                function: function.name.clone(),
                index: last,
                label: label.to_owned(),
              }
            })
          })
          .collect::<Result<Vec<_>, _>>()?,
        _ if node.index() + 1 < graph.node_count() => {
          vec![NodeIndex::new(node.index() + 1)]
        }
        _ => vec![],
      };
      for target in targets {
        graph.update_edge(node, target, ());
      }
    }

    log::debug!(
      "function :{}: {} instructions in {} blocks",
      function.name,
      function.len(),
      graph.node_count()
    );

    Ok(Cfg {
      graph,
      instr_count: function.len(),
    })
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  pub fn instr_count(&self) -> usize {
    self.instr_count
  }

  pub fn block(&self, block: usize) -> &BasicBlock {
    &self.graph[NodeIndex::new(block)]
  }

  pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
    self.graph.node_weights()
  }

  /// Successor blocks, ascending and without duplicates.
  pub fn successors(&self, block: usize) -> Vec<usize> {
    let mut succs = self
      .graph
      .neighbors(NodeIndex::new(block))
      .map(|node| node.index())
      .collect::<Vec<_>>();
    succs.sort_unstable();
    succs
  }

  /// For every instruction, the instructions that may execute right after
  /// it: the next one inside a block, or the first instruction of each
  /// successor block.
  pub fn instr_successors(&self) -> Vec<SmallVec<[usize; 2]>> {
    let mut succs = vec![SmallVec::new(); self.instr_count];
    for (b, block) in self.blocks().enumerate() {
      for i in block.start..block.last() {
        succs[i].push(i + 1);
      }
      succs[block.last()] = self
        .successors(b)
        .into_iter()
        .map(|s| self.block(s).start)
        .collect();
    }
    succs
  }
}
