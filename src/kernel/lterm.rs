//! Logical terms: the connectives of the base theory and beta reduction.

use super::gtype::Gtype;
use super::ident::{
  Ident, and_ident, equals_ident, iff_ident, implies_ident, not_ident,
  or_ident,
};
use super::term::{Binder, Const, Quant, Term, TermData, inst};
use super::typing::type_of;

pub fn mk_true() -> Term {
  Term::mk_bool(true)
}

pub fn mk_false() -> Term {
  Term::mk_bool(false)
}

pub fn is_true(t: &Term) -> bool {
  matches!(t.as_data(), TermData::Const(Const::Bool(true)))
}

pub fn is_false(t: &Term) -> bool {
  matches!(t.as_data(), TermData::Const(Const::Bool(false)))
}

pub fn mk_not(t: Term) -> Term {
  let b = Gtype::bool();
  Term::app(Term::id(not_ident(), Gtype::fun(b.clone(), b)), t)
}

fn mk_binop(id: Ident, a: Term, b: Term) -> Term {
  let bool_ty = Gtype::bool;
  let ty = Gtype::fun_of(vec![bool_ty(), bool_ty()], bool_ty());
  Term::comb(Term::id(id, ty), vec![a, b])
}

pub fn mk_and(a: Term, b: Term) -> Term {
  mk_binop(and_ident(), a, b)
}

pub fn mk_or(a: Term, b: Term) -> Term {
  mk_binop(or_ident(), a, b)
}

pub fn mk_implies(a: Term, b: Term) -> Term {
  mk_binop(implies_ident(), a, b)
}

pub fn mk_iff(a: Term, b: Term) -> Term {
  mk_binop(iff_ident(), a, b)
}

/// `a = b` at type `ty`.
pub fn mk_equality_ty(ty: Gtype, a: Term, b: Term) -> Term {
  let eq_ty = Gtype::fun_of(vec![ty.clone(), ty], Gtype::bool());
  Term::comb(Term::id(equals_ident(), eq_ty), vec![a, b])
}

/// `a = b`, typed from the annotations of `a` where possible.
pub fn mk_equality(a: Term, b: Term) -> Term {
  let ty = type_of(&a).unwrap_or_else(|_| Gtype::var("a"));
  mk_equality_ty(ty, a, b)
}

fn dest_unop<'a>(id: &Ident, t: &'a Term) -> Option<&'a Term> {
  let (f, a) = t.dest_app()?;
  matches!(f.dest_id(), Some((fid, _)) if fid == id).then_some(a)
}

fn dest_binop<'a>(id: &Ident, t: &'a Term) -> Option<(&'a Term, &'a Term)> {
  let (fa, b) = t.dest_app()?;
  let a = dest_unop(id, fa)?;
  Some((a, b))
}

pub fn dest_not(t: &Term) -> Option<&Term> {
  dest_unop(&not_ident(), t)
}

pub fn dest_conj(t: &Term) -> Option<(&Term, &Term)> {
  dest_binop(&and_ident(), t)
}

pub fn dest_disj(t: &Term) -> Option<(&Term, &Term)> {
  dest_binop(&or_ident(), t)
}

pub fn dest_implies(t: &Term) -> Option<(&Term, &Term)> {
  dest_binop(&implies_ident(), t)
}

pub fn dest_iff(t: &Term) -> Option<(&Term, &Term)> {
  dest_binop(&iff_ident(), t)
}

pub fn dest_equality(t: &Term) -> Option<(&Term, &Term)> {
  dest_binop(&equals_ident(), t)
}

pub fn is_neg(t: &Term) -> bool {
  dest_not(t).is_some()
}

pub fn is_conj(t: &Term) -> bool {
  dest_conj(t).is_some()
}

pub fn is_disj(t: &Term) -> bool {
  dest_disj(t).is_some()
}

pub fn is_implies(t: &Term) -> bool {
  dest_implies(t).is_some()
}

pub fn is_equality(t: &Term) -> bool {
  dest_equality(t).is_some()
}

// ============================================================================
// Quantifiers
// ============================================================================

/// Build a quantified term over a fresh binder; `body` receives the bound
/// variable.
pub fn mk_qnt(
  quant: Quant,
  name: &str,
  ty: Gtype,
  body: impl FnOnce(Term) -> Term,
) -> Term {
  let b = Binder::fresh(quant, name, ty);
  let inner = body(Term::bound(b.clone()));
  Term::qnt(b, inner)
}

pub fn mk_all(name: &str, ty: Gtype, body: impl FnOnce(Term) -> Term) -> Term {
  mk_qnt(Quant::All, name, ty, body)
}

pub fn mk_ex(name: &str, ty: Gtype, body: impl FnOnce(Term) -> Term) -> Term {
  mk_qnt(Quant::Ex, name, ty, body)
}

pub fn mk_lam(name: &str, ty: Gtype, body: impl FnOnce(Term) -> Term) -> Term {
  mk_qnt(Quant::Lambda, name, ty, body)
}

pub fn is_qnt_of(quant: Quant, t: &Term) -> bool {
  matches!(t.dest_qnt(), Some((b, _)) if b.quant() == quant)
}

pub fn is_all(t: &Term) -> bool {
  is_qnt_of(Quant::All, t)
}

pub fn is_exists(t: &Term) -> bool {
  is_qnt_of(Quant::Ex, t)
}

pub fn is_lambda(t: &Term) -> bool {
  is_qnt_of(Quant::Lambda, t)
}

/// Strip the outermost run of `quant` binders.
pub fn strip_qnt(quant: Quant, t: &Term) -> (Vec<Binder>, Term) {
  let mut binders = Vec::new();
  let mut curr = t;
  while let Some((b, body)) = curr.dest_qnt() {
    if b.quant() != quant {
      break;
    }
    binders.push(b.clone());
    curr = body;
  }
  (binders, curr.clone())
}

/// Rebuild `Qnt(b1, ... Qnt(bn, body))`.
pub fn rebuild_qnt(binders: &[Binder], body: Term) -> Term {
  binders.iter().rev().fold(body, |acc, b| Term::qnt(b.clone(), acc))
}

// ============================================================================
// Beta reduction
// ============================================================================

pub fn is_beta_redex(t: &Term) -> bool {
  matches!(t.dest_app(), Some((f, _)) if is_lambda(f))
}

/// Contract the redex at the root of `t`.
pub fn beta_step(t: &Term) -> Option<Term> {
  let (f, a) = t.dest_app()?;
  if !is_lambda(f) {
    return None;
  }
  inst(f, a)
}

/// Reduce every redex of `t`. Returns `None` when `t` has none.
pub fn beta_reduce(t: &Term) -> Option<Term> {
  fn go(t: &Term) -> (Term, bool) {
    match t.as_data() {
      TermData::App(f, a) => {
        let (f1, cf) = go(f);
        let (a1, ca) = go(a);
        match beta_step(&Term::app(f1.clone(), a1.clone())) {
          Some(r) => (go(&r).0, true),
          None if cf || ca => (Term::app(f1, a1), true),
          None => (t.clone(), false),
        }
      },
      TermData::Qnt(b, body) => match go(body) {
        (nb, true) => (Term::qnt(b.clone(), nb), true),
        (_, false) => (t.clone(), false),
      },
      _ => (t.clone(), false),
    }
  }
  match go(t) {
    (r, true) => Some(r),
    (_, false) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::term::alpha_equals;

  fn p() -> Term {
    Term::free("P", Gtype::bool())
  }

  fn q() -> Term {
    Term::free("Q", Gtype::bool())
  }

  #[test]
  fn connectives_round_trip() {
    let t = mk_implies(mk_and(p(), q()), mk_or(q(), mk_not(p())));
    let (a, c) = dest_implies(&t).unwrap();
    assert_eq!(dest_conj(a), Some((&p(), &q())));
    let (l, r) = dest_disj(c).unwrap();
    assert_eq!(*l, q());
    assert_eq!(dest_not(r), Some(&p()));
    assert!(!is_conj(&t));
    assert!(dest_iff(&t).is_none());
  }

  #[test]
  fn equality_is_typed_from_left_side() {
    let t = mk_equality(Term::mk_num(1), Term::mk_num(2));
    let (f, _) = t.get_fun_args();
    let (_, ty) = f.dest_id().unwrap();
    assert_eq!(ty.dest_fun().map(|(a, _)| a.clone()), Some(Gtype::num()));
    assert!(is_equality(&t));
  }

  #[test]
  fn strip_and_rebuild_quantifiers() {
    let t = mk_all("x", Gtype::num(), |x| {
      mk_all("y", Gtype::num(), |y| mk_equality(x, y))
    });
    let (bs, body) = strip_qnt(Quant::All, &t);
    assert_eq!(bs.len(), 2);
    assert!(is_equality(&body));
    assert_eq!(rebuild_qnt(&bs, body), t);
    assert_eq!(strip_qnt(Quant::Ex, &t).0.len(), 0);
  }

  #[test]
  fn beta_reduces_identity_application() {
    let id = mk_lam("x", Gtype::num(), |x| x);
    let t = Term::app(id, Term::mk_num(5));
    assert!(is_beta_redex(&t));
    assert_eq!(beta_reduce(&t), Some(Term::mk_num(5)));
    assert_eq!(beta_reduce(&Term::mk_num(5)), None);
  }

  #[test]
  fn beta_reduces_nested_redexes() {
    // (lambda f. f 1) (lambda y. y = y)
    let num = Gtype::num();
    let fty = Gtype::fun(num.clone(), Gtype::bool());
    let outer = mk_lam("f", fty, |f| Term::app(f, Term::mk_num(1)));
    let arg = mk_lam("y", num, |y| mk_equality(y.clone(), y));
    let r = beta_reduce(&Term::app(outer, arg)).unwrap();
    let expected = mk_equality(Term::mk_num(1), Term::mk_num(1));
    assert!(alpha_equals(&r, &expected));
  }
}
