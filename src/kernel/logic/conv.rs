//! Conversions and rewrite-rule sources.
//!
//! A conversion turns a term into a theorem `|- t = t'`. Rewrite plans
//! are built here from `RuleSource`s; before a plan is used in a proof it
//! is certified, which replaces every rule it mentions by the one its
//! source yields now. A plan therefore only fixes where and in what order
//! rules are used, never what they say.

use std::fmt;

use super::Thm;
use super::sequent::Sequent;
use super::tag::Label;
use crate::kernel::error::{KResult, KernelError};
use crate::kernel::formula::Formula;
use crate::kernel::gtype::TypeSubst;
use crate::kernel::lterm::mk_equality;
use crate::kernel::rewrite::term_rw::plan_term;
use crate::kernel::rewrite::{Control, Order, Plan, RewriteRule, TermPlan};
use crate::kernel::scope::Scope;
use crate::kernel::term::Term;

/// Where a rewrite rule comes from.
#[derive(Clone)]
pub enum RuleSource {
  Thm(Thm),
  /// A theorem used only where `order` holds.
  OrderedThm(Thm, Order),
  /// An assumption of the sequent being rewritten.
  Asm(Label),
  OrderedAsm(Label, Order),
}

impl fmt::Debug for RuleSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RuleSource::Thm(t) => write!(f, "Thm({t})"),
      RuleSource::OrderedThm(t, _) => write!(f, "OrderedThm({t})"),
      RuleSource::Asm(l) => write!(f, "Asm({l})"),
      RuleSource::OrderedAsm(l, _) => write!(f, "OrderedAsm({l})"),
    }
  }
}

impl RuleSource {
  pub(crate) fn asm_label(&self) -> Option<&Label> {
    match self {
      RuleSource::Asm(l) | RuleSource::OrderedAsm(l, _) => Some(l),
      RuleSource::Thm(_) | RuleSource::OrderedThm(..) => None,
    }
  }
}

/// The rules `srcs` stand for, numbered by position. Assumption sources
/// need the sequent they belong to.
pub fn resolve_rules(
  scope: &Scope,
  seq: Option<&Sequent>,
  srcs: &[RuleSource],
) -> KResult<Vec<RewriteRule>> {
  srcs
    .iter()
    .enumerate()
    .map(|(i, src)| match src {
      RuleSource::Thm(thm) | RuleSource::OrderedThm(thm, _) => {
        thm.check_valid(scope)?;
        let order = match src {
          RuleSource::OrderedThm(_, o) => Some(o.clone()),
          _ => None,
        };
        RewriteRule::new(i, thm.term(), order, true)
      },
      RuleSource::Asm(label) | RuleSource::OrderedAsm(label, _) => {
        let Some(seq) = seq else {
          return Err(KernelError::structural(
            format!("assumption {label} used outside a sequent"),
            vec![],
          ));
        };
        let (_, form) = seq.lookup_asm(label)?;
        let order = match src {
          RuleSource::OrderedAsm(_, o) => Some(o.clone()),
          _ => None,
        };
        RewriteRule::new(i, form.term(), order, false)
      },
    })
    .collect()
}

/// Plan the rewriting of `t` with the rules of `srcs`, returning the
/// rewritten term, the extended type environment and the plan.
pub fn plan_rewrite(
  ctrl: &Control,
  scope: &Scope,
  seq: Option<&Sequent>,
  srcs: &[RuleSource],
  tyenv: &TypeSubst,
  t: &Term,
) -> KResult<(Term, TypeSubst, TermPlan)> {
  let rules = resolve_rules(scope, seq, srcs)?;
  plan_term(ctrl, tyenv, rules, t)
}

/// Replace the rules of `plan` by the ones `srcs` yield in `seq`.
pub fn certify(
  scope: &Scope,
  seq: Option<&Sequent>,
  srcs: &[RuleSource],
  plan: &TermPlan,
) -> KResult<TermPlan> {
  let rules = resolve_rules(scope, seq, srcs)?;
  plan.try_map(&mut |r: &RewriteRule| {
    rules.get(r.src()).cloned().ok_or_else(|| {
      KernelError::rewrite(
        format!("plan uses rule {} of {} sources", r.src(), srcs.len()),
        vec![r.lhs().clone()],
      )
    })
  })
}

/// `|- t = t'` where `t'` is the beta normal form of `t`.
pub fn beta_conv(scope: &Scope, t: &Term) -> KResult<Thm> {
  Ok(Thm::mk_theorem(Formula::beta_conv_eq(scope, t)?))
}

/// `|- t = t'` where `t'` is `t` rewritten with the theorems of `srcs`.
pub fn rewrite_conv(
  scope: &Scope,
  ctrl: &Control,
  srcs: &[RuleSource],
  t: &Term,
) -> KResult<Thm> {
  let (_, _, plan) =
    plan_rewrite(ctrl, scope, None, srcs, &TypeSubst::new(), t)?;
  if plan.is_skip() {
    return Err(KernelError::rewrite("no rule applies", vec![t.clone()]));
  }
  let refl = Formula::make_open(scope, &mk_equality(t.clone(), t.clone()))?;
  let (eq, tyenv) =
    Formula::rewrite(scope, &TypeSubst::new(), &Plan::subnode(1, plan), &refl)?;
  Ok(Thm::mk_theorem(eq.retype(&tyenv)))
}

/// Rewrite the statement of `thm` with `plan`, using the theorems of
/// `srcs`.
pub fn rewrite_rule(
  scope: &Scope,
  srcs: &[RuleSource],
  plan: &TermPlan,
  thm: &Thm,
) -> KResult<Thm> {
  thm.check_valid(scope)?;
  let plan = certify(scope, None, srcs, plan)?;
  let (form, tyenv) =
    Formula::rewrite(scope, &TypeSubst::new(), &plan, thm.formula())?;
  Ok(Thm::mk_theorem(form.retype(&tyenv)))
}
