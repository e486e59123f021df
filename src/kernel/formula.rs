//! Formulas: terms admitted into the logic.
//!
//! A `Formula` pairs a term with the marker of the scope it was checked
//! against. The constructors here are the only way in: they check that
//! the term is closed, that every identifier and meta-variable is known
//! and that the term is a well-typed boolean. Every other operation
//! either preserves those properties by construction or checks again.

use std::fmt;

use rustc_hash::FxHashMap;

use super::error::{ErrorKind, KResult, KernelError, ResultExt};
use super::gtype::{
  Gtype, GtypeData, TyVar, TypeSubst, to_weak_env, unify_weak_env,
};
use super::lterm::{
  beta_reduce, dest_conj, dest_disj, dest_equality, dest_implies, dest_not,
  mk_equality,
};
use super::rewrite::TermPlan;
use super::rewrite::term_rw::execute_term;
use super::scope::{Marker, Scope};
use super::term::{Term, TermData, map_types, rename, retype};
use super::typing::{infer, typecheck_env};
use super::unify;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Formula {
  marker: Marker,
  term: Term,
}

impl fmt::Display for Formula {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.term)
  }
}

/// Which side of an equation is replaced by the other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
  /// Replace left sides with right sides.
  #[default]
  LeftRight,
  RightLeft,
}

// ============================================================================
// Admission
// ============================================================================

/// Replace free variables naming declared identifiers by the identifier.
/// With `strict`, a free variable that names nothing is an error.
fn resolve_frees(scope: &Scope, t: &Term, strict: bool) -> KResult<Term> {
  match t.as_data() {
    TermData::Free(name, ty) => match scope.resolve_name(name) {
      Some(id) => Ok(Term::id(id, ty.clone())),
      None if strict => Err(KernelError::scope(
        format!("unknown name {name}"),
        vec![t.clone()],
      )),
      None => Ok(t.clone()),
    },
    TermData::App(f, a) => Ok(Term::app(
      resolve_frees(scope, f, strict)?,
      resolve_frees(scope, a, strict)?,
    )),
    TermData::Qnt(b, body) => {
      Ok(Term::qnt(b.clone(), resolve_frees(scope, body, strict)?))
    },
    _ => Ok(t.clone()),
  }
}

fn check(
  scope: &Scope,
  tyenv: &TypeSubst,
  t: &Term,
  strict: bool,
) -> KResult<(Formula, TypeSubst)> {
  let t = if t.exists(&Term::is_free) {
    resolve_frees(scope, t, strict)?
  } else {
    t.clone()
  };
  if !t.is_closed() {
    let loose = t.unbound_binders().into_iter().map(Term::bound).collect();
    return Err(KernelError::scope("term is not closed", loose));
  }
  let unknown = scope.unknown_metas(&t);
  if !unknown.is_empty() {
    return Err(KernelError::scope(
      "unknown meta-variables",
      unknown.into_iter().map(Term::meta).collect(),
    ));
  }
  let env = typecheck_env(scope, tyenv, &t, &Gtype::bool())?;
  let term = retype(&env, &t);
  Ok((Formula { marker: scope.marker().clone(), term }, env))
}

impl Formula {
  /// Admit `t`. Free variables must name declared identifiers.
  pub fn make(scope: &Scope, t: &Term) -> KResult<Formula> {
    Ok(check(scope, &TypeSubst::new(), t, true)?.0)
  }

  /// Admit `t`, leaving free variables that name nothing in place.
  pub fn make_open(scope: &Scope, t: &Term) -> KResult<Formula> {
    Ok(check(scope, &TypeSubst::new(), t, false)?.0)
  }

  /// `make` under an existing type environment, returning the extended
  /// environment.
  pub fn make_in(
    scope: &Scope,
    tyenv: &TypeSubst,
    t: &Term,
  ) -> KResult<(Formula, TypeSubst)> {
    check(scope, tyenv, t, true)
  }

  pub(crate) fn make_open_in(
    scope: &Scope,
    tyenv: &TypeSubst,
    t: &Term,
  ) -> KResult<(Formula, TypeSubst)> {
    check(scope, tyenv, t, false)
  }

  /// A formula known to be valid because it was built from one.
  fn derived(&self, term: Term) -> Formula {
    Formula { marker: self.marker.clone(), term }
  }

  pub fn term(&self) -> &Term {
    &self.term
  }

  pub fn marker(&self) -> &Marker {
    &self.marker
  }

  pub fn thy(&self) -> &str {
    self.marker.thy()
  }

  pub fn is_valid_in(&self, scope: &Scope) -> bool {
    scope.in_scope_marker(&self.marker)
  }

  pub(crate) fn check_valid(&self, scope: &Scope) -> KResult<()> {
    if self.is_valid_in(scope) {
      return Ok(());
    }
    Err(KernelError::terms(
      ErrorKind::Stale,
      format!("formula of theory {} is out of scope", self.thy()),
      vec![self.term.clone()],
    ))
  }

  // ==========================================================================
  // Connectives
  // ==========================================================================

  pub fn dest_neg(&self) -> KResult<Formula> {
    match dest_not(&self.term) {
      Some(a) => Ok(self.derived(a.clone())),
      None => Err(self.shape_error("not a negation")),
    }
  }

  pub fn dest_conj(&self) -> KResult<(Formula, Formula)> {
    self.dest_pair(dest_conj, "not a conjunction")
  }

  pub fn dest_disj(&self) -> KResult<(Formula, Formula)> {
    self.dest_pair(dest_disj, "not a disjunction")
  }

  pub fn dest_implies(&self) -> KResult<(Formula, Formula)> {
    self.dest_pair(dest_implies, "not an implication")
  }

  /// The two sides of an equation. They are terms, not formulas: they
  /// need not be boolean.
  pub fn dest_equality(&self) -> KResult<(Term, Term)> {
    match dest_equality(&self.term) {
      Some((a, b)) => Ok((a.clone(), b.clone())),
      None => Err(self.shape_error("not an equation")),
    }
  }

  fn dest_pair(
    &self,
    dest: fn(&Term) -> Option<(&Term, &Term)>,
    msg: &str,
  ) -> KResult<(Formula, Formula)> {
    match dest(&self.term) {
      Some((a, b)) => Ok((self.derived(a.clone()), self.derived(b.clone()))),
      None => Err(self.shape_error(msg)),
    }
  }

  fn shape_error(&self, msg: &str) -> KernelError {
    KernelError::structural(msg, vec![self.term.clone()])
  }

  pub fn mk_not(scope: &Scope, a: &Formula) -> KResult<Formula> {
    a.check_valid(scope)?;
    Formula::make_open(scope, &super::lterm::mk_not(a.term.clone()))
  }

  pub fn mk_and(scope: &Scope, a: &Formula, b: &Formula) -> KResult<Formula> {
    Formula::mk_binop(scope, super::lterm::mk_and, a, b)
  }

  pub fn mk_or(scope: &Scope, a: &Formula, b: &Formula) -> KResult<Formula> {
    Formula::mk_binop(scope, super::lterm::mk_or, a, b)
  }

  pub fn mk_implies(
    scope: &Scope,
    a: &Formula,
    b: &Formula,
  ) -> KResult<Formula> {
    Formula::mk_binop(scope, super::lterm::mk_implies, a, b)
  }

  pub fn mk_iff(scope: &Scope, a: &Formula, b: &Formula) -> KResult<Formula> {
    Formula::mk_binop(scope, super::lterm::mk_iff, a, b)
  }

  fn mk_binop(
    scope: &Scope,
    op: fn(Term, Term) -> Term,
    a: &Formula,
    b: &Formula,
  ) -> KResult<Formula> {
    a.check_valid(scope)?;
    b.check_valid(scope)?;
    Formula::make_open(scope, &op(a.term.clone(), b.term.clone()))
  }

  /// The equation `a = b` between two terms of the same type.
  pub fn mk_equality(scope: &Scope, a: &Term, b: &Term) -> KResult<Formula> {
    Formula::make_open(scope, &mk_equality(a.clone(), b.clone()))
  }

  // ==========================================================================
  // Instantiation
  // ==========================================================================

  /// Instantiate the outermost quantifier of `f` with `witness`. The
  /// ordinary type variables of the witness become weak; the quantifier's
  /// own ordinary type variables are not instantiated.
  pub fn inst(
    scope: &Scope,
    tyenv: &TypeSubst,
    f: &Formula,
    witness: &Term,
  ) -> KResult<(Formula, TypeSubst)> {
    f.check_valid(scope)?;
    let Some((b, _)) = f.term.dest_qnt() else {
      return Err(f.shape_error("not a quantified formula"));
    };
    let mut renaming = FxHashMap::default();
    let witness = map_types(witness, &mut |ty| to_weak_env(&mut renaming, ty));
    let witness = resolve_frees(scope, &witness, true)?;
    if !witness.is_closed() {
      return Err(KernelError::scope("witness is not closed", vec![witness]));
    }
    if let Some(m) = scope.unknown_metas(&witness).into_iter().next() {
      return Err(KernelError::scope(
        "witness mentions an unknown meta-variable",
        vec![Term::meta(m)],
      ));
    }
    let mut env = tyenv.clone();
    let wty = infer(scope, &mut env, &witness)?;
    let env = unify_weak_env(&env, &wty, b.ty()).map_err(|e| {
      KernelError::terms(
        ErrorKind::Unify,
        format!("witness does not fit binder type {}: {e}", b.ty()),
        vec![witness.clone()],
      )
    })?;
    let body = super::term::inst(&f.term, &witness)
      .ok_or_else(|| f.shape_error("not a quantified formula"))?;
    Ok((f.derived(retype(&env, &body)), env))
  }

  /// Instantiate the outermost quantifier of `f` with a skolem constant
  /// built from that quantifier's binder.
  pub(crate) fn inst_skolem(&self, c: &Term) -> KResult<Formula> {
    match super::term::inst(&self.term, c) {
      Some(body) => Ok(self.derived(body)),
      None => Err(self.shape_error("not a quantified formula")),
    }
  }

  // ==========================================================================
  // Rewriting
  // ==========================================================================

  /// Replay `plan` against `f` and admit the result again.
  pub fn rewrite(
    scope: &Scope,
    tyenv: &TypeSubst,
    plan: &TermPlan,
    f: &Formula,
  ) -> KResult<(Formula, TypeSubst)> {
    f.check_valid(scope)?;
    let (t, env) = execute_term(tyenv, plan, &f.term).context("rewrite")?;
    Formula::make_open_in(scope, &env, &t).context("rewrite result")
  }

  /// The equation `t = t'` where `t'` is the beta-normal form of `t`.
  pub fn beta_conv_eq(scope: &Scope, t: &Term) -> KResult<Formula> {
    let Some(r) = beta_reduce(t) else {
      return Err(KernelError::rewrite("no beta redex", vec![t.clone()]));
    };
    Formula::make_open(scope, &mk_equality(t.clone(), r))
  }

  /// Replace, in one pass, every subterm of `f` equal to one side of an
  /// equation in `eqs` (up to weak type variables) by the other side.
  /// Replacements are not rewritten again.
  pub fn subst_equiv(
    scope: &Scope,
    tyenv: &TypeSubst,
    eqs: &[Formula],
    f: &Formula,
    dir: Direction,
  ) -> KResult<(Formula, TypeSubst)> {
    f.check_valid(scope)?;
    let mut pairs = Vec::with_capacity(eqs.len());
    for eq in eqs {
      eq.check_valid(scope)?;
      let (l, r) = eq.dest_equality()?;
      pairs.push(match dir {
        Direction::LeftRight => (l, r),
        Direction::RightLeft => (r, l),
      });
    }
    fn go(
      pairs: &[(Term, Term)],
      env: &mut TypeSubst,
      t: &Term,
    ) -> Term {
      for (from, to) in pairs {
        if let Ok(next) = unify::alpha_equals_weak(env, from, t) {
          *env = next;
          return to.clone();
        }
      }
      match t.as_data() {
        TermData::App(f, a) => {
          let f1 = go(pairs, env, f);
          Term::app(f1, go(pairs, env, a))
        },
        TermData::Qnt(b, body) => Term::qnt(b.clone(), go(pairs, env, body)),
        _ => t.clone(),
      }
    }
    let mut env = tyenv.clone();
    let t = go(&pairs, &mut env, &f.term);
    if t == f.term {
      return Err(KernelError::rewrite(
        "no subterm matches an equation",
        vec![f.term.clone()],
      ));
    }
    Formula::make_open_in(scope, &env, &t).context("substitution result")
  }

  // ==========================================================================
  // Comparison and copying
  // ==========================================================================

  pub fn alpha_equals(a: &Formula, b: &Formula) -> bool {
    super::term::alpha_equals(&a.term, &b.term)
  }

  /// Alpha-equality where weak type variables may be bound.
  pub fn alpha_equals_weak(
    tyenv: &TypeSubst,
    a: &Formula,
    b: &Formula,
  ) -> KResult<TypeSubst> {
    unify::alpha_equals_weak(tyenv, &a.term, &b.term)
  }

  /// A copy with fresh binders.
  pub fn rename(&self) -> Formula {
    self.derived(rename(&self.term))
  }

  /// Apply a type substitution. Instances of well-typed terms are
  /// well-typed.
  pub fn retype(&self, tyenv: &TypeSubst) -> Formula {
    self.derived(retype(tyenv, &self.term))
  }

  /// Replace the ordinary type variables of `f` by fresh weak ones.
  pub fn to_weak(&self) -> Formula {
    let mut renaming = FxHashMap::default();
    self.derived(map_types(&self.term, &mut |ty| to_weak_env(&mut renaming, ty)))
  }

  /// Replace the weak type variables of `f` by fresh ordinary ones.
  pub(crate) fn generalize(&self) -> Formula {
    fn go(renaming: &mut FxHashMap<TyVar, Gtype>, ty: &Gtype) -> Gtype {
      match ty.as_data() {
        GtypeData::WeakVar(v) => renaming
          .entry(v.clone())
          .or_insert_with(|| Gtype::var(v.name()))
          .clone(),
        GtypeData::Var(_) => ty.clone(),
        GtypeData::Constr(id, args) => Gtype::constr(
          id.clone(),
          args.iter().map(|a| go(renaming, a)).collect(),
        ),
      }
    }
    let mut renaming = FxHashMap::default();
    self.derived(map_types(&self.term, &mut |ty| go(&mut renaming, ty)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::ident::Ident;
  use crate::kernel::lterm::{mk_all, mk_and, mk_lam, mk_not};
  use crate::kernel::rewrite::Plan;

  fn scope() -> Scope {
    let mut scp = Scope::base().open_theory("test").unwrap();
    scp.declare(Ident::new("test", "P"), Gtype::bool()).unwrap();
    scp.declare(Ident::new("test", "Q"), Gtype::bool()).unwrap();
    scp
      .declare(
        Ident::new("test", "f"),
        Gtype::fun(Gtype::num(), Gtype::num()),
      )
      .unwrap();
    scp
  }

  fn free(name: &str) -> Term {
    Term::free(name, Gtype::var("t"))
  }

  #[test]
  fn make_resolves_names() {
    let scp = scope();
    let f = Formula::make(&scp, &mk_and(free("P"), free("Q"))).unwrap();
    assert!(f.term().is_ident_app(&Ident::base("and"), 2));
    let (a, b) = f.dest_conj().unwrap();
    assert_eq!(a.term(), &Term::id(Ident::new("test", "P"), Gtype::bool()));
    assert!(b.is_valid_in(&scp));
  }

  #[test]
  fn make_rejects_unknown_names_and_open_terms() {
    let scp = scope();
    let err = Formula::make(&scp, &free("R")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Scope);
    assert!(Formula::make_open(&scp, &free("R")).is_ok());

    let body = mk_all("x", Gtype::num(), |x| {
      mk_equality(x, Term::mk_num(1))
    });
    let (_, open) = body.dest_qnt().unwrap();
    let err = Formula::make(&scp, open).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Scope);
  }

  #[test]
  fn make_rejects_ill_typed_terms() {
    let scp = scope();
    let err = Formula::make(&scp, &Term::mk_num(3)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    let err = Formula::make(&scp, &mk_and(free("P"), Term::mk_num(1)));
    assert!(err.is_err());
  }

  #[test]
  fn inst_checks_witness_type() {
    let scp = scope();
    let t = mk_all("x", Gtype::num(), |x| mk_equality(x.clone(), x));
    let f = Formula::make(&scp, &t).unwrap();
    let (g, _) =
      Formula::inst(&scp, &TypeSubst::new(), &f, &Term::mk_num(4)).unwrap();
    assert_eq!(g.term(), &mk_equality(Term::mk_num(4), Term::mk_num(4)));
    let err = Formula::inst(&scp, &TypeSubst::new(), &f, &Term::mk_bool(true));
    assert_eq!(err.unwrap_err().kind(), ErrorKind::Unify);
    let not_q = Formula::make(&scp, &mk_not(free("P"))).unwrap();
    let err = Formula::inst(&scp, &TypeSubst::new(), &not_q, &Term::mk_num(4));
    assert_eq!(err.unwrap_err().kind(), ErrorKind::Structural);
  }

  #[test]
  fn stale_formulas_are_rejected() {
    let scp = scope();
    let f = Formula::make(&scp, &free("P")).unwrap();
    let reloaded = scp.reload_theory("test").unwrap();
    assert!(!f.is_valid_in(&reloaded));
    let err = Formula::mk_not(&reloaded, &f).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Stale);
  }

  #[test]
  fn beta_conversion_equation() {
    let scp = scope();
    let t = Term::app(mk_lam("x", Gtype::num(), |x| x), Term::mk_num(5));
    let f = Formula::beta_conv_eq(&scp, &t).unwrap();
    let (l, r) = f.dest_equality().unwrap();
    assert_eq!(l, t);
    assert_eq!(r, Term::mk_num(5));
    assert!(Formula::beta_conv_eq(&scp, &Term::mk_num(5)).is_err());
  }

  #[test]
  fn subst_equiv_replaces_once() {
    let scp = scope();
    let fx = |t: Term| {
      Term::app(
        Term::id(Ident::new("test", "f"), Gtype::fun(Gtype::num(), Gtype::num())),
        t,
      )
    };
    // 1 = f 1 used left to right on  f 1 = 1  gives  f (f 1) = f 1
    let eq = Formula::make(&scp, &mk_equality(Term::mk_num(1), fx(Term::mk_num(1))))
      .unwrap();
    let target =
      Formula::make(&scp, &mk_equality(fx(Term::mk_num(1)), Term::mk_num(1)))
        .unwrap();
    let (r, _) = Formula::subst_equiv(
      &scp,
      &TypeSubst::new(),
      &[eq.clone()],
      &target,
      Direction::LeftRight,
    )
    .unwrap();
    assert_eq!(
      r.term(),
      &mk_equality(fx(fx(Term::mk_num(1))), fx(Term::mk_num(1)))
    );
    let (back, _) = Formula::subst_equiv(
      &scp,
      &TypeSubst::new(),
      &[eq],
      &target,
      Direction::RightLeft,
    )
    .unwrap();
    assert_eq!(back.term(), &mk_equality(Term::mk_num(1), Term::mk_num(1)));
  }

  #[test]
  fn rewrite_with_empty_plan_is_identity() {
    let scp = scope();
    let f = Formula::make(&scp, &mk_and(free("P"), free("Q"))).unwrap();
    let (g, _) =
      Formula::rewrite(&scp, &TypeSubst::new(), &Plan::Skip, &f).unwrap();
    assert_eq!(f, g);
  }

  #[test]
  fn weak_and_generalized_copies() {
    let scp = scope();
    let t = mk_all("x", Gtype::var("a"), |x| mk_equality(x.clone(), x));
    let f = Formula::make(&scp, &t).unwrap();
    let weak = f.to_weak();
    let (b, _) = weak.term().dest_qnt().unwrap();
    assert!(b.ty().is_weak());
    let back = weak.generalize();
    let (b, _) = back.term().dest_qnt().unwrap();
    assert!(b.ty().is_var());
    assert!(!Formula::alpha_equals(&f, &back));
    assert!(Formula::alpha_equals(&f, &f.rename()));
  }
}
