//! The sequent calculus.
//!
//! Theorems are built in exactly two ways: as axioms asserted by the
//! theory layer, or by closing every subgoal of a `Goal` with the
//! primitive tactics of [`tactics`] (or by a conversion in [`conv`],
//! which is a closed proof packaged up).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kernel::error::{KResult, KernelError};
use crate::kernel::formula::Formula;
use crate::kernel::gtype::TypeSubst;
use crate::kernel::lterm::is_all;
use crate::kernel::scope::Scope;
use crate::kernel::term::Term;

pub mod conv;
pub mod goal;
pub mod sequent;
pub mod tactics;
pub mod tag;

pub use goal::{Branch, Changes, Goal, Node, RuleResult, Step, Tactic};
pub use sequent::{SeqEnv, Sequent};
pub use tag::{Label, Tag};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThmKind {
  Axiom,
  Theorem,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Thm {
  kind: ThmKind,
  formula: Formula,
}

impl fmt::Display for Thm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "|- {}", self.formula)
  }
}

impl Thm {
  /// Assert `formula` without proof.
  pub fn mk_axiom(formula: Formula) -> Thm {
    Thm { kind: ThmKind::Axiom, formula }
  }

  pub(crate) fn mk_theorem(formula: Formula) -> Thm {
    Thm { kind: ThmKind::Theorem, formula }
  }

  pub fn kind(&self) -> ThmKind {
    self.kind
  }

  pub fn formula(&self) -> &Formula {
    &self.formula
  }

  pub fn term(&self) -> &Term {
    self.formula.term()
  }

  /// A theorem can only be used while its theory is loaded.
  pub fn is_valid(&self, scope: &Scope) -> bool {
    self.formula.is_valid_in(scope)
  }

  pub(crate) fn check_valid(&self, scope: &Scope) -> KResult<()> {
    self.formula.check_valid(scope)
  }

  /// Eliminate the outer universal quantifiers of the theorem, one per
  /// witness.
  pub fn instantiate(&self, scope: &Scope, witnesses: &[Term]) -> KResult<Thm> {
    self.check_valid(scope)?;
    let mut form = self.formula.to_weak();
    let mut tyenv = TypeSubst::new();
    for w in witnesses {
      if !is_all(form.term()) {
        return Err(KernelError::structural(
          "more witnesses than universal quantifiers",
          vec![self.term().clone()],
        ));
      }
      (form, tyenv) = Formula::inst(scope, &tyenv, &form, w)?;
    }
    Ok(Thm::mk_theorem(form.retype(&tyenv).generalize()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::error::ErrorKind;
  use crate::kernel::gtype::Gtype;
  use crate::kernel::lterm::{mk_all, mk_equality};

  fn refl_axiom(scp: &Scope) -> Thm {
    let t = mk_all("x", Gtype::var("a"), |x| mk_equality(x.clone(), x));
    Thm::mk_axiom(Formula::make(scp, &t).unwrap())
  }

  #[test]
  fn instantiate_generic_axiom() {
    let scp = Scope::base();
    let ax = refl_axiom(&scp);
    assert_eq!(ax.kind(), ThmKind::Axiom);
    let thm = ax.instantiate(&scp, &[Term::mk_num(3)]).unwrap();
    assert_eq!(thm.kind(), ThmKind::Theorem);
    assert_eq!(thm.term(), &mk_equality(Term::mk_num(3), Term::mk_num(3)));
    let thm = ax.instantiate(&scp, &[Term::mk_bool(true)]).unwrap();
    assert_eq!(
      thm.term(),
      &mk_equality(Term::mk_bool(true), Term::mk_bool(true))
    );
  }

  #[test]
  fn instantiate_checks_arity_and_staleness() {
    let scp = Scope::base().open_theory("t").unwrap();
    let ax = refl_axiom(&scp);
    let err = ax.instantiate(&scp, &[Term::mk_num(1), Term::mk_num(2)]);
    assert_eq!(err.unwrap_err().kind(), ErrorKind::Structural);
    let reloaded = scp.reload_theory("t").unwrap();
    assert!(!ax.is_valid(&reloaded));
    let err = ax.instantiate(&reloaded, &[Term::mk_num(1)]);
    assert_eq!(err.unwrap_err().kind(), ErrorKind::Stale);
  }
}
