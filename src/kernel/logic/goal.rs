//! Goals, branches and the rule-application gate.
//!
//! A goal is a list of open sequents sharing one type environment. It is
//! changed only by running a tactic on a `Node` (one sequent plus the
//! type environment) and splicing the resulting `Branch` back in. Every
//! primitive rule runs through [`apply_rule`], which issues a fresh
//! ticket per application and refuses branches that do not carry it.

use tracing::debug;

use super::Thm;
use super::sequent::Sequent;
use super::tag::Tag;
use crate::kernel::error::{KResult, KernelError, ResultExt};
use crate::kernel::formula::Formula;
use crate::kernel::gtype::TypeSubst;
use crate::kernel::scope::Scope;
use crate::kernel::term::Term;

/// What the last step created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Changes {
  pub(crate) goals: Vec<Tag>,
  pub(crate) asms: Vec<Tag>,
  pub(crate) concls: Vec<Tag>,
  pub(crate) consts: Vec<Term>,
}

impl Changes {
  /// Tags of the new or changed subgoals.
  pub fn goals(&self) -> &[Tag] {
    &self.goals
  }

  /// Tags of the new or changed assumptions.
  pub fn asms(&self) -> &[Tag] {
    &self.asms
  }

  /// Tags of the new or changed conclusions.
  pub fn concls(&self) -> &[Tag] {
    &self.concls
  }

  /// Skolem constants introduced.
  pub fn consts(&self) -> &[Term] {
    &self.consts
  }

  fn append(&mut self, other: Changes) {
    self.goals.extend(other.goals);
    self.asms.extend(other.asms);
    self.concls.extend(other.concls);
    self.consts.extend(other.consts);
  }
}

/// The input of a tactic: one sequent and the goal's type environment.
#[derive(Clone, Debug)]
pub struct Node {
  tyenv: TypeSubst,
  seq: Sequent,
}

impl Node {
  pub fn sequent(&self) -> &Sequent {
    &self.seq
  }

  pub fn tyenv(&self) -> &TypeSubst {
    &self.tyenv
  }

  pub fn scope(&self) -> &Scope {
    self.seq.scope()
  }
}

/// The output of a tactic: the sequents replacing a node, the extended
/// type environment and a record of what changed.
#[derive(Clone, Debug)]
pub struct Branch {
  tag: Tag,
  tyenv: TypeSubst,
  seqs: Vec<Sequent>,
  changes: Changes,
}

impl Branch {
  pub(crate) fn new(
    ticket: &Tag,
    tyenv: TypeSubst,
    seqs: Vec<Sequent>,
    changes: Changes,
  ) -> Self {
    Branch { tag: ticket.clone(), tyenv, seqs, changes }
  }

  pub fn tag(&self) -> &Tag {
    &self.tag
  }

  pub fn tyenv(&self) -> &TypeSubst {
    &self.tyenv
  }

  pub fn sequents(&self) -> &[Sequent] {
    &self.seqs
  }

  pub fn changes(&self) -> &Changes {
    &self.changes
  }

  pub fn is_solved(&self) -> bool {
    self.seqs.is_empty()
  }
}

/// A tactic: a total function from a node to a branch.
pub trait Tactic: Fn(&Node) -> KResult<Step<Branch>> + Send + Sync {}

impl<T> Tactic for T where T: Fn(&Node) -> KResult<Step<Branch>> + Send + Sync {}

/// What a primitive rule reports to the gate.
#[derive(Debug)]
pub enum RuleResult {
  Applied(Branch),
  /// The node is closed; the type environment may have grown.
  Solved(TypeSubst),
  /// The rule does not apply here. Alternatives may be tried.
  NotApplicable(KernelError),
}

/// The outcome of a tactic or combinator. Fatal errors travel separately
/// as `Err`.
#[derive(Debug)]
pub enum Step<T> {
  Applied(T),
  NotApplicable(KernelError),
}

impl<T> Step<T> {
  pub fn is_applied(&self) -> bool {
    matches!(self, Step::Applied(_))
  }

  pub fn applied(self) -> Option<T> {
    match self {
      Step::Applied(t) => Some(t),
      Step::NotApplicable(_) => None,
    }
  }

  /// Treat a rule that does not apply as an error.
  pub fn into_result(self) -> KResult<T> {
    match self {
      Step::Applied(t) => Ok(t),
      Step::NotApplicable(e) => Err(e),
    }
  }

  pub fn map<S>(self, f: impl FnOnce(T) -> S) -> Step<S> {
    match self {
      Step::Applied(t) => Step::Applied(f(t)),
      Step::NotApplicable(e) => Step::NotApplicable(e),
    }
  }
}

// ============================================================================
// The gate
// ============================================================================

/// Run a primitive rule on `node`.
///
/// The rule receives a fresh ticket and must return a branch tagged with
/// it. A solved node becomes an empty branch. The returned branch is
/// tagged with the node's sequent tag.
pub(crate) fn apply_rule<F>(
  name: &str,
  node: &Node,
  rule: F,
) -> KResult<Step<Branch>>
where
  F: FnOnce(&Tag, &Sequent, &TypeSubst) -> KResult<RuleResult>,
{
  let ticket = Tag::fresh();
  let result = rule(&ticket, &node.seq, &node.tyenv).context(name)?;
  let tag = node.seq.tag().clone();
  match result {
    RuleResult::Applied(b) => {
      if b.tag != ticket {
        debug!(rule = name, "branch ticket mismatch");
        return Err(KernelError::structural(
          format!("{name}: branch was not built for this node"),
          vec![],
        ));
      }
      debug!(rule = name, subgoals = b.seqs.len(), "rule applied");
      Ok(Step::Applied(Branch { tag, ..b }))
    },
    RuleResult::Solved(tyenv) => {
      debug!(rule = name, "subgoal solved");
      Ok(Step::Applied(Branch {
        tag,
        tyenv,
        seqs: Vec::new(),
        changes: Changes::default(),
      }))
    },
    RuleResult::NotApplicable(e) => {
      debug!(rule = name, error = %e, "rule not applicable");
      Ok(Step::NotApplicable(e.context(name)))
    },
  }
}

// ============================================================================
// Combinators
// ============================================================================

fn no_subgoals() -> KernelError {
  KernelError::structural("no subgoals", vec![])
}

fn check_origin(seq: &Sequent, b: &Branch) -> KResult<()> {
  if b.tag == *seq.tag() {
    return Ok(());
  }
  Err(KernelError::structural(
    "tactic returned a branch for another subgoal",
    vec![],
  ))
}

fn node_of(tyenv: &TypeSubst, seq: &Sequent) -> Node {
  Node { tyenv: tyenv.clone(), seq: seq.clone() }
}

/// Apply `tac` to the first subgoal of `branch`.
pub fn apply_to_first(
  tac: impl Fn(&Node) -> KResult<Step<Branch>>,
  branch: &Branch,
) -> KResult<Step<Branch>> {
  let Some((first, rest)) = branch.seqs.split_first() else {
    return Err(no_subgoals());
  };
  let b = match tac(&node_of(&branch.tyenv, first))? {
    Step::Applied(b) => b,
    Step::NotApplicable(e) => return Ok(Step::NotApplicable(e)),
  };
  check_origin(first, &b)?;
  let mut seqs = b.seqs;
  seqs.extend(rest.iter().cloned());
  Ok(Step::Applied(Branch {
    tag: branch.tag.clone(),
    tyenv: b.tyenv,
    seqs,
    changes: b.changes,
  }))
}

/// Apply `tac` to every subgoal of `branch`, left to right. The type
/// environment is threaded through; if the tactic does not apply to one
/// subgoal, it does not apply to the branch.
pub fn apply_to_each(
  tac: impl Fn(&Node) -> KResult<Step<Branch>>,
  branch: &Branch,
) -> KResult<Step<Branch>> {
  if branch.seqs.is_empty() {
    return Err(no_subgoals());
  }
  let mut tyenv = branch.tyenv.clone();
  let mut seqs = Vec::new();
  let mut changes = Changes::default();
  for seq in &branch.seqs {
    let b = match tac(&node_of(&tyenv, seq))? {
      Step::Applied(b) => b,
      Step::NotApplicable(e) => return Ok(Step::NotApplicable(e)),
    };
    check_origin(seq, &b)?;
    tyenv = b.tyenv;
    seqs.extend(b.seqs);
    changes.append(b.changes);
  }
  Ok(Step::Applied(Branch { tag: branch.tag.clone(), tyenv, seqs, changes }))
}

/// Apply the i-th tactic to the i-th subgoal. Subgoals without a tactic
/// are kept; tactics without a subgoal are ignored.
pub fn apply_zip(
  tacs: &[&dyn Fn(&Node) -> KResult<Step<Branch>>],
  branch: &Branch,
) -> KResult<Step<Branch>> {
  if branch.seqs.is_empty() {
    return Err(no_subgoals());
  }
  let mut tyenv = branch.tyenv.clone();
  let mut seqs = Vec::new();
  let mut changes = Changes::default();
  for (i, seq) in branch.seqs.iter().enumerate() {
    let Some(tac) = tacs.get(i) else {
      seqs.push(seq.clone());
      continue;
    };
    let b = match tac(&node_of(&tyenv, seq))? {
      Step::Applied(b) => b,
      Step::NotApplicable(e) => return Ok(Step::NotApplicable(e)),
    };
    check_origin(seq, &b)?;
    tyenv = b.tyenv;
    seqs.extend(b.seqs);
    changes.append(b.changes);
  }
  Ok(Step::Applied(Branch { tag: branch.tag.clone(), tyenv, seqs, changes }))
}

/// Apply `tac` to every subgoal, threading an accumulator through.
pub fn apply_fold<A>(
  tac: impl Fn(A, &Node) -> KResult<Step<(A, Branch)>>,
  init: A,
  branch: &Branch,
) -> KResult<Step<(A, Branch)>> {
  if branch.seqs.is_empty() {
    return Err(no_subgoals());
  }
  let mut acc = init;
  let mut tyenv = branch.tyenv.clone();
  let mut seqs = Vec::new();
  let mut changes = Changes::default();
  for seq in &branch.seqs {
    let (next, b) = match tac(acc, &node_of(&tyenv, seq))? {
      Step::Applied(r) => r,
      Step::NotApplicable(e) => return Ok(Step::NotApplicable(e)),
    };
    check_origin(seq, &b)?;
    acc = next;
    tyenv = b.tyenv;
    seqs.extend(b.seqs);
    changes.append(b.changes);
  }
  let branch = Branch { tag: branch.tag.clone(), tyenv, seqs, changes };
  Ok(Step::Applied((acc, branch)))
}

// ============================================================================
// Goals
// ============================================================================

#[derive(Clone, Debug)]
pub struct Goal {
  tag: Tag,
  subgoals: Vec<Sequent>,
  tyenv: TypeSubst,
  form: Formula,
  changes: Changes,
}

impl Goal {
  /// The goal `|- form`.
  pub fn new(scope: &Scope, form: Formula) -> KResult<Goal> {
    form.check_valid(scope)?;
    let seq = Sequent::new(scope.clone(), form.clone());
    let changes = Changes {
      goals: vec![seq.tag().clone()],
      concls: vec![seq.concls()[0].0.clone()],
      ..Changes::default()
    };
    Ok(Goal {
      tag: Tag::fresh(),
      subgoals: vec![seq],
      tyenv: TypeSubst::new(),
      form,
      changes,
    })
  }

  pub fn subgoals(&self) -> &[Sequent] {
    &self.subgoals
  }

  pub fn tyenv(&self) -> &TypeSubst {
    &self.tyenv
  }

  /// The formula being proved.
  pub fn form(&self) -> &Formula {
    &self.form
  }

  pub fn changes(&self) -> &Changes {
    &self.changes
  }

  pub fn is_solved(&self) -> bool {
    self.subgoals.is_empty()
  }

  fn to_branch(&self) -> Branch {
    Branch {
      tag: self.tag.clone(),
      tyenv: self.tyenv.clone(),
      seqs: self.subgoals.clone(),
      changes: self.changes.clone(),
    }
  }

  /// Run a combinator on the goal's subgoals. The goal is unchanged; the
  /// result is a new goal.
  pub fn apply<F>(&self, f: F) -> KResult<Step<Goal>>
  where
    F: FnOnce(&Branch) -> KResult<Step<Branch>>,
  {
    let b = match f(&self.to_branch())? {
      Step::Applied(b) => b,
      Step::NotApplicable(e) => return Ok(Step::NotApplicable(e)),
    };
    if b.tag != self.tag {
      return Err(KernelError::structural(
        "branch does not belong to this goal",
        vec![self.form.term().clone()],
      ));
    }
    Ok(Step::Applied(Goal {
      tag: self.tag.clone(),
      subgoals: b.seqs,
      tyenv: b.tyenv,
      form: self.form.clone(),
      changes: b.changes,
    }))
  }

  /// The theorem proved by a solved goal.
  pub fn to_theorem(self) -> KResult<Thm> {
    if !self.subgoals.is_empty() {
      return Err(KernelError::structural(
        format!("goal has {} unsolved subgoals", self.subgoals.len()),
        vec![self.form.term().clone()],
      ));
    }
    let form = self.form.retype(&self.tyenv);
    debug!(theorem = %form, "goal proved");
    Ok(Thm::mk_theorem(form))
  }
}

/// Apply `tac` to the first subgoal of `goal`.
pub fn apply_to_goal(
  tac: impl Fn(&Node) -> KResult<Step<Branch>>,
  goal: &Goal,
) -> KResult<Step<Goal>> {
  goal.apply(|b| apply_to_first(tac, b))
}
