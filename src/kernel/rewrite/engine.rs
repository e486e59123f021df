//! The generic rewriting engine.
//!
//! Rewriting runs in two phases. The planner walks a node once, trying
//! candidate rules at each subnode, and records what succeeded as a
//! `Plan` together with the rewritten node. The executor replays a plan
//! against a node, which need only be structurally compatible with the
//! one the plan was built for. Both work over any `Rewriter`.

use tracing::{debug, trace};

use super::plan::Plan;
use crate::kernel::error::{KResult, KernelError};

/// Traversal order of the planner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
  /// Rewrite a node before its subnodes.
  #[default]
  TopDown,
  /// Rewrite the subnodes first, then the node.
  BottomUp,
}

/// Planner configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Control {
  pub strategy: Strategy,
  /// Bound on the total number of rule applications. `None` leaves
  /// termination to the rules.
  pub depth: Option<usize>,
  /// Bound on the number of traversals; planning stops earlier once a
  /// traversal changes nothing.
  pub max_passes: usize,
}

impl Default for Control {
  fn default() -> Self {
    Control { strategy: Strategy::TopDown, depth: None, max_passes: usize::MAX }
  }
}

impl Control {
  pub fn with_depth(depth: usize) -> Self {
    Control { depth: Some(depth), ..Control::default() }
  }

  pub fn bottom_up() -> Self {
    Control { strategy: Strategy::BottomUp, ..Control::default() }
  }
}

/// Raised by `Rewriter::rewrite` to interrupt the engine.
#[derive(Debug)]
pub enum Signal {
  /// Stop trying the current rule list; work already done is kept.
  Stop,
  /// Abandon the whole rewrite.
  Quit(KernelError),
}

/// A node type together with the rules that rewrite it.
pub trait Rewriter {
  type Node: Clone;
  type Key;
  type Rule: Clone;

  /// The immediate subnodes, in a fixed order.
  fn subnodes(&self, node: &Self::Node) -> Vec<Self::Node>;

  /// `node` with its subnodes replaced.
  fn rebuild(&self, node: &Self::Node, subs: Vec<Self::Node>) -> KResult<Self::Node>;

  fn key_matches(&self, key: &Self::Key, node: &Self::Node) -> bool;

  /// Rules worth trying at `node`, in order of preference.
  fn candidates(&self, node: &Self::Node) -> Vec<Self::Rule>;

  /// Rewrite `node` with `rule`; `Ok(None)` if the rule does not apply.
  fn rewrite(
    &mut self,
    rule: &Self::Rule,
    node: &Self::Node,
  ) -> Result<Option<Self::Node>, Signal>;
}

type PlanOf<W> = Plan<<W as Rewriter>::Key, <W as Rewriter>::Rule>;

struct Planner<'a, W> {
  rw: &'a mut W,
  ctrl: &'a Control,
  steps: usize,
}

impl<W: Rewriter> Planner<'_, W> {
  fn exhausted(&self) -> bool {
    self.ctrl.depth.is_some_and(|d| self.steps >= d)
  }

  /// Rewrite at `node` itself until no candidate applies.
  fn at_node(&mut self, node: &W::Node) -> KResult<(W::Node, Vec<W::Rule>)> {
    let mut curr = node.clone();
    let mut applied = Vec::new();
    'outer: while !self.exhausted() {
      for rule in self.rw.candidates(&curr) {
        match self.rw.rewrite(&rule, &curr) {
          Ok(Some(next)) => {
            trace!(step = self.steps, "rewrite rule applied");
            self.steps += 1;
            applied.push(rule);
            curr = next;
            continue 'outer;
          },
          Ok(None) => {},
          Err(Signal::Stop) => break 'outer,
          Err(Signal::Quit(e)) => return Err(e),
        }
      }
      break;
    }
    Ok((curr, applied))
  }

  fn descend(&mut self, node: &W::Node) -> KResult<(W::Node, PlanOf<W>)> {
    let subs = self.rw.subnodes(node);
    let mut changed = false;
    let mut new_subs = Vec::with_capacity(subs.len());
    let mut plans = Vec::with_capacity(subs.len());
    for sub in &subs {
      let (s, p) = self.visit(sub)?;
      changed |= !p.is_skip();
      new_subs.push(s);
      plans.push(p);
    }
    if !changed {
      return Ok((node.clone(), Plan::Skip));
    }
    Ok((self.rw.rebuild(node, new_subs)?, Plan::branches(plans)))
  }

  fn visit(&mut self, node: &W::Node) -> KResult<(W::Node, PlanOf<W>)> {
    match self.ctrl.strategy {
      Strategy::TopDown => {
        let (curr, rules) = self.at_node(node)?;
        let (curr, below) = self.descend(&curr)?;
        Ok((curr, Plan::serial(vec![Plan::rules(rules), below])))
      },
      Strategy::BottomUp => {
        let (curr, below) = self.descend(node)?;
        let (curr, rules) = self.at_node(&curr)?;
        Ok((curr, Plan::serial(vec![below, Plan::rules(rules)])))
      },
    }
  }
}

/// Rewrite `node` as far as `ctrl` allows, returning the result and the
/// plan that reproduces it. Traversals are repeated until one changes
/// nothing, the step bound is reached or `max_passes` is used up.
pub fn plan<W: Rewriter>(
  rw: &mut W,
  ctrl: &Control,
  node: &W::Node,
) -> KResult<(W::Node, PlanOf<W>)> {
  let mut planner = Planner { rw, ctrl, steps: 0 };
  let mut curr = node.clone();
  let mut plans = Vec::new();
  let mut passes = 0;
  while passes < ctrl.max_passes && !planner.exhausted() {
    let (next, p) = planner.visit(&curr)?;
    passes += 1;
    if p.is_skip() {
      break;
    }
    curr = next;
    plans.push(p);
  }
  debug!(steps = planner.steps, passes, "rewrite planned");
  Ok((curr, Plan::serial(plans)))
}

/// Replay `plan` against `node`. A rule that no longer applies is
/// skipped; a plan whose shape does not fit the node is an error.
pub fn execute<W: Rewriter>(
  rw: &mut W,
  plan: &PlanOf<W>,
  node: &W::Node,
) -> KResult<W::Node> {
  match plan {
    Plan::Skip => Ok(node.clone()),
    Plan::Rules(rules) => {
      let mut curr = node.clone();
      for rule in rules {
        match rw.rewrite(rule, &curr) {
          Ok(Some(next)) => curr = next,
          Ok(None) => trace!("planned rule does not apply, skipped"),
          Err(Signal::Stop) => break,
          Err(Signal::Quit(e)) => return Err(e),
        }
      }
      Ok(curr)
    },
    Plan::Keyed(key, p) => {
      if rw.key_matches(key, node) {
        return execute(rw, p, node);
      }
      let subs = rw.subnodes(node);
      if subs.is_empty() {
        return Ok(node.clone());
      }
      let new_subs = subs
        .iter()
        .map(|s| execute(&mut *rw, plan, s))
        .collect::<KResult<Vec<_>>>()?;
      rw.rebuild(node, new_subs)
    },
    Plan::Subnode(i, p) => {
      let mut subs = rw.subnodes(node);
      let Some(sub) = subs.get(*i).cloned() else {
        return Err(KernelError::rewrite(
          format!("plan expects subnode {i}, node has {}", subs.len()),
          vec![],
        ));
      };
      subs[*i] = execute(rw, p, &sub)?;
      rw.rebuild(node, subs)
    },
    Plan::Branches(plans) => {
      let subs = rw.subnodes(node);
      if subs.len() != plans.len() {
        return Err(KernelError::rewrite(
          format!("plan has {} branches, node has {}", plans.len(), subs.len()),
          vec![],
        ));
      }
      let new_subs = plans
        .iter()
        .zip(subs.iter())
        .map(|(p, s)| execute(&mut *rw, p, s))
        .collect::<KResult<Vec<_>>>()?;
      rw.rebuild(node, new_subs)
    },
    Plan::Serial(plans) => {
      plans.iter().try_fold(node.clone(), |curr, p| execute(&mut *rw, p, &curr))
    },
  }
}
