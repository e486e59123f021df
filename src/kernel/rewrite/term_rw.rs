//! Rewriting terms with equations.
//!
//! A rule is built from a term `forall x1 .. xn. lhs = rhs`; the bound
//! variables become pattern variables. Rules are indexed by their left
//! sides in a discrimination net and applied by one-sided matching.

use std::{fmt, sync::Arc};

use rustc_hash::FxHashMap;
use tracing::trace;

use super::engine::{self, Control, Rewriter, Signal};
use super::plan::Plan;
use crate::kernel::error::{KResult, KernelError};
use crate::kernel::gtype::{Gtype, TypeSubst, copy_type_env};
use crate::kernel::ident::Ident;
use crate::kernel::lterm::{dest_equality, strip_qnt};
use crate::kernel::net::Net;
use crate::kernel::term::{
  Binder, Quant, Subst, Term, TermData, map_types, retype, subst,
};
use crate::kernel::unify::matches_env;

/// Ordering of rule instances: `order(new, old)` holds when rewriting
/// `old` to `new` makes progress.
pub type Order = Arc<dyn Fn(&Term, &Term) -> bool + Send + Sync>;

/// A test on the outer shape of a term, used to direct a plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
  Any,
  /// An identifier, or an application with that identifier at its head.
  Ident(Ident),
  Free(Arc<str>),
  Bound(Quant),
  Meta,
  App,
  Quant(Quant),
  Const,
  Not(Box<Key>),
  Alt(Vec<Key>),
}

impl Key {
  pub fn matches(&self, t: &Term) -> bool {
    match self {
      Key::Any => true,
      Key::Ident(id) => matches!(t.get_fun().dest_id(), Some((i, _)) if i == id),
      Key::Free(n) => matches!(t.dest_free(), Some((m, _)) if m == &**n),
      Key::Bound(q) => {
        matches!(t.as_data(), TermData::Bound(b) if b.quant() == *q)
      },
      Key::Meta => t.is_meta(),
      Key::App => t.is_app(),
      Key::Quant(q) => matches!(t.dest_qnt(), Some((b, _)) if b.quant() == *q),
      Key::Const => t.is_const(),
      Key::Not(k) => !k.matches(t),
      Key::Alt(ks) => ks.iter().any(|k| k.matches(t)),
    }
  }
}

#[derive(Clone)]
pub struct RewriteRule {
  src: usize,
  vars: Vec<Term>,
  lhs: Term,
  rhs: Term,
  order: Option<Order>,
  generic: bool,
}

impl fmt::Debug for RewriteRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RewriteRule")
      .field("src", &self.src)
      .field("lhs", &format_args!("{}", self.lhs))
      .field("rhs", &format_args!("{}", self.rhs))
      .field("ordered", &self.order.is_some())
      .field("generic", &self.generic)
      .finish()
  }
}

impl RewriteRule {
  /// Build a rule from `forall x1 .. xn. lhs = rhs`. `src` identifies
  /// where the rule came from. The type variables of a `generic` rule
  /// are renamed at every use; otherwise only its weak variables may be
  /// instantiated.
  pub fn new(
    src: usize,
    t: &Term,
    order: Option<Order>,
    generic: bool,
  ) -> KResult<Self> {
    let (binders, body) = strip_qnt(Quant::All, t);
    let vars: Vec<Term> = binders
      .iter()
      .map(|b| Term::meta(Binder::fresh(Quant::Meta, b.name(), b.ty().clone())))
      .collect();
    let env = Subst::from_pairs(
      binders.iter().map(|b| Term::bound(b.clone())).zip(vars.iter().cloned()),
    );
    let body = subst(&env, &body);
    let Some((lhs, rhs)) = dest_equality(&body) else {
      return Err(KernelError::rewrite("rewrite rule is not an equation", vec![
        t.clone(),
      ]));
    };
    if let Some(v) = vars.iter().find(|v| rhs.occurs(v) && !lhs.occurs(v)) {
      return Err(KernelError::rewrite(
        format!("variable {v} of the right side is not bound by the left side"),
        vec![t.clone()],
      ));
    }
    Ok(RewriteRule {
      src,
      vars,
      lhs: lhs.clone(),
      rhs: rhs.clone(),
      order,
      generic,
    })
  }

  pub fn src(&self) -> usize {
    self.src
  }

  pub fn lhs(&self) -> &Term {
    &self.lhs
  }

  pub fn rhs(&self) -> &Term {
    &self.rhs
  }

  pub fn is_ordered(&self) -> bool {
    self.order.is_some()
  }

  fn is_var(&self, t: &Term) -> bool {
    self.vars.contains(t)
  }

  /// The sides of the rule, with fresh type variables if it is generic.
  fn instance(&self) -> (Term, Term) {
    if !self.generic {
      return (self.lhs.clone(), self.rhs.clone());
    }
    let mut renaming = FxHashMap::default();
    let lhs = map_types(&self.lhs, &mut |ty| copy_type_env(&mut renaming, ty));
    let rhs = map_types(&self.rhs, &mut |ty| copy_type_env(&mut renaming, ty));
    (lhs, rhs)
  }
}

pub type TermPlan = Plan<Key, RewriteRule>;

/// Terms as rewrite nodes. Carries the type environment that rule
/// applications extend.
pub struct TermRewriter {
  rules: Vec<RewriteRule>,
  net: Net<usize>,
  tyenv: TypeSubst,
}

impl TermRewriter {
  pub fn new(rules: Vec<RewriteRule>, tyenv: TypeSubst) -> Self {
    let mut net = Net::new();
    for (i, r) in rules.iter().enumerate() {
      net.add(&|t| r.is_var(t), &r.lhs, i);
    }
    TermRewriter { rules, net, tyenv }
  }

  pub fn tyenv(&self) -> &TypeSubst {
    &self.tyenv
  }

  pub fn into_tyenv(self) -> TypeSubst {
    self.tyenv
  }
}

impl Rewriter for TermRewriter {
  type Node = Term;
  type Key = Key;
  type Rule = RewriteRule;

  fn subnodes(&self, node: &Term) -> Vec<Term> {
    match node.as_data() {
      TermData::App(f, a) => vec![f.clone(), a.clone()],
      TermData::Qnt(_, body) => vec![body.clone()],
      _ => vec![],
    }
  }

  fn rebuild(&self, node: &Term, subs: Vec<Term>) -> KResult<Term> {
    match (node.as_data(), subs.as_slice()) {
      (TermData::App(..), [f, a]) => Ok(Term::app(f.clone(), a.clone())),
      (TermData::Qnt(b, _), [body]) => Ok(Term::qnt(b.clone(), body.clone())),
      (TermData::App(..) | TermData::Qnt(..), _) => Err(KernelError::rewrite(
        format!("cannot rebuild from {} subterms", subs.len()),
        vec![node.clone()],
      )),
      _ => Ok(node.clone()),
    }
  }

  fn key_matches(&self, key: &Key, node: &Term) -> bool {
    key.matches(node)
  }

  fn candidates(&self, node: &Term) -> Vec<RewriteRule> {
    self.net.lookup(node).into_iter().map(|&i| self.rules[i].clone()).collect()
  }

  fn rewrite(
    &mut self,
    rule: &RewriteRule,
    node: &Term,
  ) -> Result<Option<Term>, Signal> {
    let (lhs, rhs) = rule.instance();
    let any = |_: &Gtype| true;
    let weak = Gtype::is_weak;
    let tyvarp: &dyn Fn(&Gtype) -> bool =
      if rule.generic { &any } else { &weak };
    let matched = matches_env(
      &self.tyenv,
      &Subst::new(),
      &|t| rule.is_var(t),
      tyvarp,
      &lhs,
      node,
    );
    let (tyenv, env) = match matched {
      Ok(r) => r,
      Err(e) if e.is_recoverable() => return Ok(None),
      Err(e) => return Err(Signal::Quit(e)),
    };
    let result = subst(&env, &retype(&tyenv, &rhs));
    if result == *node {
      return Ok(None);
    }
    if let Some(order) = &rule.order {
      if !order(&result, node) {
        return Ok(None);
      }
    }
    trace!(from = %node, to = %result, "rewrite");
    self.tyenv = tyenv;
    Ok(Some(result))
  }
}

/// Rewrite `t` with `rules`, returning the result, the extended type
/// environment and the plan that reproduces the rewrite.
pub fn plan_term(
  ctrl: &Control,
  tyenv: &TypeSubst,
  rules: Vec<RewriteRule>,
  t: &Term,
) -> KResult<(Term, TypeSubst, TermPlan)> {
  let mut rw = TermRewriter::new(rules, tyenv.clone());
  let (result, plan) = engine::plan(&mut rw, ctrl, t)?;
  Ok((result, rw.into_tyenv(), plan))
}

/// Replay `plan` against `t`.
pub fn execute_term(
  tyenv: &TypeSubst,
  plan: &TermPlan,
  t: &Term,
) -> KResult<(Term, TypeSubst)> {
  let mut rw = TermRewriter::new(Vec::new(), tyenv.clone());
  let result = engine::execute(&mut rw, plan, t)?;
  Ok((result, rw.into_tyenv()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::lterm::{mk_all, mk_and, mk_equality, mk_lam};
  use crate::kernel::term::alpha_equals;

  fn num() -> Gtype {
    Gtype::num()
  }

  fn plus(a: Term, b: Term) -> Term {
    let ty = Gtype::fun_of(vec![num(), num()], num());
    Term::comb(Term::id(Ident::new("test", "plus"), ty), vec![a, b])
  }

  fn n(k: i64) -> Term {
    Term::mk_num(k)
  }

  fn rule(t: Term) -> RewriteRule {
    RewriteRule::new(0, &t, None, true).unwrap()
  }

  /// `forall x. plus x 0 = x`
  fn plus_zero() -> RewriteRule {
    rule(mk_all("x", num(), |x| mk_equality(plus(x.clone(), n(0)), x)))
  }

  #[test]
  fn rewrites_nested_instances() {
    let t = plus(plus(n(1), n(0)), n(0));
    let (r, _, plan) =
      plan_term(&Control::default(), &TypeSubst::new(), vec![plus_zero()], &t)
        .unwrap();
    assert_eq!(r, n(1));
    assert!(!plan.is_skip());
  }

  #[test]
  fn rewrites_under_binders() {
    let t = mk_lam("z", num(), |z| plus(z, n(0)));
    let (r, _, _) =
      plan_term(&Control::default(), &TypeSubst::new(), vec![plus_zero()], &t)
        .unwrap();
    let expected = mk_lam("w", num(), |w| w);
    assert!(alpha_equals(&r, &expected));
  }

  #[test]
  fn generic_rules_are_instantiated_per_use() {
    let a = Gtype::var("a");
    let ident = |ty: Gtype, x: Term| {
      let fty = Gtype::fun(ty.clone(), ty);
      Term::app(Term::id(Ident::new("test", "ident"), fty), x)
    };
    let r = rule(mk_all("x", a.clone(), |x| {
      mk_equality(ident(a.clone(), x.clone()), x)
    }));
    let t = mk_and(
      mk_equality(ident(num(), n(1)), n(1)),
      ident(Gtype::bool(), Term::mk_bool(true)),
    );
    let (res, _, _) =
      plan_term(&Control::default(), &TypeSubst::new(), vec![r], &t).unwrap();
    let expected = mk_and(mk_equality(n(1), n(1)), Term::mk_bool(true));
    assert_eq!(res, expected);
  }

  #[test]
  fn ordered_rules_only_decrease() {
    let comm = mk_all("x", num(), |x| {
      mk_all("y", num(), |y| mk_equality(plus(x.clone(), y.clone()), plus(y, x)))
    });
    let order: Order = Arc::new(|new: &Term, old: &Term| new < old);
    let r = RewriteRule::new(0, &comm, Some(order), true).unwrap();
    assert!(r.is_ordered());

    let small = plus(n(1), n(2));
    let big = plus(n(2), n(1));
    let (res, _, plan) =
      plan_term(&Control::default(), &TypeSubst::new(), vec![r.clone()], &big)
        .unwrap();
    assert_eq!(res, small);
    assert_eq!(plan.all_rules().len(), 1);
    let (res, _, plan) =
      plan_term(&Control::default(), &TypeSubst::new(), vec![r], &small)
        .unwrap();
    assert_eq!(res, small);
    assert!(plan.is_skip());
  }

  #[test]
  fn keyed_plans_restrict_where_rules_apply() {
    let g = |x: Term| {
      Term::app(Term::id(Ident::new("test", "g"), Gtype::fun(num(), num())), x)
    };
    let t = plus(g(plus(n(1), n(0))), n(0));
    let plan = Plan::keyed(
      Key::Ident(Ident::new("test", "g")),
      Plan::subnode(1, Plan::rules(vec![plus_zero()])),
    );
    let (r, _) = execute_term(&TypeSubst::new(), &plan, &t).unwrap();
    assert_eq!(r, plus(g(n(1)), n(0)));
  }

  #[test]
  fn replaying_a_plan_is_deterministic() {
    let t = plus(plus(n(3), n(0)), plus(n(0), n(0)));
    let env = TypeSubst::new();
    let (r, _, plan) =
      plan_term(&Control::bottom_up(), &env, vec![plus_zero()], &t).unwrap();
    let (r1, _) = execute_term(&env, &plan, &t).unwrap();
    let (r2, _) = execute_term(&env, &plan, &t).unwrap();
    assert_eq!(r1, r);
    assert_eq!(r1, r2);
    assert_eq!(execute_term(&env, &Plan::Skip, &t).unwrap().0, t);
  }

  #[test]
  fn malformed_rules_are_rejected() {
    let not_eq = mk_all("x", num(), |x| plus(x, n(0)));
    assert!(RewriteRule::new(0, &not_eq, None, true).is_err());
    let unbound = mk_all("x", num(), |x| {
      mk_all("y", num(), |y| mk_equality(x, y))
    });
    assert!(RewriteRule::new(0, &unbound, None, true).is_err());
  }

  #[test]
  fn keys() {
    let t = plus(n(1), n(2));
    assert!(Key::Ident(Ident::new("test", "plus")).matches(&t));
    assert!(Key::App.matches(&t));
    assert!(Key::Not(Box::new(Key::Const)).matches(&t));
    assert!(Key::Alt(vec![Key::Meta, Key::Const]).matches(&n(1)));
    assert!(!Key::Quant(Quant::All).matches(&t));
  }
}
