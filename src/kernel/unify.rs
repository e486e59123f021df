//! Syntactic unification and matching of terms.
//!
//! A caller-supplied predicate says which terms are variables. Bound
//! variables are never substituted; they are related through a binder
//! correspondence built while descending through matching quantifiers.
//! The same walk serves full unification, one-sided matching and
//! alpha-equality modulo type unification.

use tracing::trace;

use crate::cons_list::ConsList;

use super::error::{KResult, KernelError};
use super::gtype::{Gtype, TypeSubst, matching_with, unify_with};
use super::term::{Binder, Subst, Term, TermData, alpha_equals};
use super::typing::type_of_env;

type Correspondence = ConsList<(Binder, Binder)>;

struct Unifier<'a> {
  varp: &'a dyn Fn(&Term) -> bool,
  tyvarp: &'a dyn Fn(&Gtype) -> bool,
  one_sided: bool,
  tyenv: TypeSubst,
  env: Subst,
}

impl Unifier<'_> {
  fn fail(&self, t1: &Term, t2: &Term) -> KernelError {
    KernelError::unify(
      "terms do not unify",
      vec![self.env.resolve(t1), self.env.resolve(t2)],
    )
  }

  fn unify_types(&mut self, a: &Gtype, b: &Gtype) -> KResult<()> {
    self.tyenv = if self.one_sided {
      matching_with(&self.tyenv, a, b, self.tyvarp)?
    } else {
      unify_with(&self.tyenv, a, b, self.tyvarp)?
    };
    Ok(())
  }

  fn is_var(&self, t: &Term) -> bool {
    (self.varp)(t)
  }

  fn chase(&self, t: &Term) -> Term {
    if self.is_var(t) { self.env.chase(t) } else { t.clone() }
  }

  fn bind(&mut self, bnds: &Correspondence, var: &Term, val: &Term) -> KResult<()> {
    let escapes = val
      .unbound_binders()
      .iter()
      .any(|b| bnds.iter().any(|(l, r)| b == l || b == r));
    if escapes {
      return Err(self.fail(var, val));
    }
    if !self.one_sided {
      let resolved = self.env.resolve(val);
      if resolved.occurs(var) {
        return Err(KernelError::TermOccurs {
          var: var.clone(),
          term: resolved,
        });
      }
    }
    let vty = type_of_env(&self.tyenv, var).map_err(|_| self.fail(var, val))?;
    let tty = type_of_env(&self.tyenv, val).map_err(|_| self.fail(var, val))?;
    self.unify_types(&vty, &tty)?;
    trace!(var = %var, val = %val, "bind term variable");
    self.env.insert(var.clone(), val.clone());
    Ok(())
  }

  fn unify(&mut self, bnds: &Correspondence, t1: &Term, t2: &Term) -> KResult<()> {
    if self.one_sided && self.is_var(t1) {
      if let Some(v) = self.env.find(t1) {
        if alpha_equals(v, t2) {
          return Ok(());
        }
        return Err(self.fail(v, t2));
      }
    }
    let s = self.chase(t1);
    let t = if self.one_sided { t2.clone() } else { self.chase(t2) };
    if bnds.is_empty() && s == t {
      return Ok(());
    }
    if self.is_var(&s) {
      if s == t {
        return Ok(());
      }
      return self.bind(bnds, &s, &t);
    }
    if !self.one_sided && self.is_var(&t) {
      return self.bind(bnds, &t, &s);
    }
    match (s.as_data(), t.as_data()) {
      (TermData::Bound(x), TermData::Bound(y)) => {
        match bnds.find(|(l, r)| l == x || r == y) {
          Some((l, r)) if l == x && r == y => Ok(()),
          Some(_) => Err(self.fail(&s, &t)),
          None if x == y => Ok(()),
          None => Err(self.fail(&s, &t)),
        }
      },
      (TermData::Qnt(x, bx), TermData::Qnt(y, by)) => {
        if x.quant() != y.quant() {
          return Err(self.fail(&s, &t));
        }
        self.unify_types(x.ty(), y.ty())?;
        self.unify(&bnds.cons((x.clone(), y.clone())), bx, by)
      },
      (TermData::App(f1, a1), TermData::App(f2, a2)) => {
        self.unify(bnds, f1, f2)?;
        self.unify(bnds, a1, a2)
      },
      (TermData::Id(i1, ty1), TermData::Id(i2, ty2)) if i1 == i2 => {
        self.unify_types(ty1, ty2)
      },
      (TermData::Free(n1, ty1), TermData::Free(n2, ty2)) if n1 == n2 => {
        self.unify_types(ty1, ty2)
      },
      (TermData::Meta(x), TermData::Meta(y)) if x == y => Ok(()),
      (TermData::Const(c1), TermData::Const(c2)) if c1 == c2 => Ok(()),
      _ => Err(self.fail(&s, &t)),
    }
  }
}

/// Unify `t1` and `t2`, extending `tyenv` and the triangular term
/// substitution `env`. Only terms accepted by `varp` are bound; every
/// type variable is bindable.
pub fn unify_fullenv(
  tyenv: &TypeSubst,
  env: &Subst,
  varp: &dyn Fn(&Term) -> bool,
  t1: &Term,
  t2: &Term,
) -> KResult<(TypeSubst, Subst)> {
  let mut u = Unifier {
    varp,
    tyvarp: &|_| true,
    one_sided: false,
    tyenv: tyenv.clone(),
    env: env.clone(),
  };
  u.unify(&ConsList::new(), t1, t2)?;
  Ok((u.tyenv, u.env))
}

pub fn unify_env(
  tyenv: &TypeSubst,
  varp: &dyn Fn(&Term) -> bool,
  t1: &Term,
  t2: &Term,
) -> KResult<(TypeSubst, Subst)> {
  unify_fullenv(tyenv, &Subst::new(), varp, t1, t2)
}

pub fn unify(
  varp: &dyn Fn(&Term) -> bool,
  t1: &Term,
  t2: &Term,
) -> KResult<Subst> {
  Ok(unify_env(&TypeSubst::new(), varp, t1, t2)?.1)
}

/// One-sided matching: only variables of `pattern` (terms accepted by
/// `varp`, type variables accepted by `tyvarp`) are bound. The resulting
/// substitution is not triangular: its values are subterms of `target`.
pub fn matches_env(
  tyenv: &TypeSubst,
  env: &Subst,
  varp: &dyn Fn(&Term) -> bool,
  tyvarp: &dyn Fn(&Gtype) -> bool,
  pattern: &Term,
  target: &Term,
) -> KResult<(TypeSubst, Subst)> {
  let mut u = Unifier {
    varp,
    tyvarp,
    one_sided: true,
    tyenv: tyenv.clone(),
    env: env.clone(),
  };
  u.unify(&ConsList::new(), pattern, target)?;
  Ok((u.tyenv, u.env))
}

pub fn matches(
  varp: &dyn Fn(&Term) -> bool,
  pattern: &Term,
  target: &Term,
) -> KResult<(TypeSubst, Subst)> {
  matches_env(&TypeSubst::new(), &Subst::new(), varp, &|_| true, pattern, target)
}

/// Alpha-equality where weak type variables may be bound to make the
/// types agree. Returns the extended type environment.
pub fn alpha_equals_weak(
  tyenv: &TypeSubst,
  t1: &Term,
  t2: &Term,
) -> KResult<TypeSubst> {
  let mut u = Unifier {
    varp: &|_| false,
    tyvarp: &Gtype::is_weak,
    one_sided: false,
    tyenv: tyenv.clone(),
    env: Subst::new(),
  };
  u.unify(&ConsList::new(), t1, t2)?;
  Ok(u.tyenv)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::error::ErrorKind;
  use crate::kernel::ident::Ident;
  use crate::kernel::term::Quant;
  use quickcheck::{Arbitrary, Gen};
  use quickcheck_macros::quickcheck;

  fn f(args: Vec<Term>) -> Term {
    let ty = Gtype::fun_of(vec![Gtype::num(); args.len()], Gtype::num());
    Term::comb(Term::id(Ident::new("test", "f"), ty), args)
  }

  fn x() -> Term {
    Term::free("x", Gtype::num())
  }

  fn y() -> Term {
    Term::free("y", Gtype::num())
  }

  fn is_xy(t: &Term) -> bool {
    *t == x() || *t == y()
  }

  #[test]
  fn unify_binds_variables_on_both_sides() {
    let t1 = f(vec![x(), Term::mk_num(2)]);
    let t2 = f(vec![Term::mk_num(1), y()]);
    let env = unify(&is_xy, &t1, &t2).unwrap();
    assert_eq!(env.resolve(&t1), env.resolve(&t2));
    assert_eq!(env.find(&x()), Some(&Term::mk_num(1)));
  }

  #[test]
  fn occurs_check_on_terms() {
    let err = unify(&is_xy, &x(), &f(vec![x()])).unwrap_err();
    assert!(matches!(err, KernelError::TermOccurs { .. }));
    assert!(err.is_recoverable());
  }

  #[test]
  fn bound_variables_cannot_escape() {
    let b = Binder::fresh(Quant::All, "z", Gtype::num());
    let t1 = Term::qnt(b.clone(), f(vec![Term::bound(b.clone())]));
    let c = Binder::fresh(Quant::All, "w", Gtype::num());
    let t2 = Term::qnt(c, f(vec![x()]));
    // x would have to stand for the bound z
    let err = unify(&is_xy, &t2, &t1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unify);
  }

  #[test]
  fn quantifier_kinds_must_agree() {
    let all = Binder::fresh(Quant::All, "z", Gtype::num());
    let ex = Binder::fresh(Quant::Ex, "z", Gtype::num());
    let t1 = Term::qnt(all.clone(), Term::bound(all));
    let t2 = Term::qnt(ex.clone(), Term::bound(ex));
    assert!(unify(&|_| false, &t1, &t2).is_err());
  }

  #[test]
  fn matching_does_not_bind_target_variables() {
    let pattern = f(vec![x(), Term::mk_num(2)]);
    let target = f(vec![Term::mk_num(1), y()]);
    assert!(matches(&is_xy, &pattern, &target).is_err());
    let target = f(vec![y(), Term::mk_num(2)]);
    let (_, env) = matches(&is_xy, &pattern, &target).unwrap();
    assert_eq!(env.find(&x()), Some(&y()));
    assert!(!env.contains(&y()));
  }

  #[test]
  fn matching_instantiates_pattern_types() {
    let a = Gtype::var("a");
    let v = Term::free("v", a.clone());
    let is_v = |t: &Term| t.dest_free().map(|(n, _)| n) == Some("v");
    let (tyenv, env) = matches(&is_v, &v, &Term::mk_num(3)).unwrap();
    assert_eq!(tyenv.mgu(&a), Gtype::num());
    assert_eq!(env.find(&v), Some(&Term::mk_num(3)));
  }

  #[test]
  fn weak_alpha_equality() {
    let w = Gtype::weak("w");
    let p = |ty: Gtype| {
      Term::app(
        Term::id(Ident::new("test", "p"), Gtype::fun(ty.clone(), Gtype::bool())),
        Term::free("x", ty),
      )
    };
    let env = alpha_equals_weak(&TypeSubst::new(), &p(w.clone()), &p(Gtype::num()))
      .unwrap();
    assert_eq!(env.mgu(&w), Gtype::num());
    let a = Gtype::var("a");
    assert!(alpha_equals_weak(&TypeSubst::new(), &p(a), &p(Gtype::num())).is_err());
  }

  #[test]
  fn distinct_free_variables_are_not_alpha_equal() {
    assert!(alpha_equals_weak(&TypeSubst::new(), &x(), &y()).is_err());
    assert!(alpha_equals_weak(&TypeSubst::new(), &x(), &x()).is_ok());
  }

  // ==========================================================================
  // Property tests (quickcheck)
  // ==========================================================================

  /// First-order terms over `f`, numerals and the variables x, y.
  #[derive(Clone, Debug)]
  struct FoTerm(Term);

  fn arb_fo(g: &mut Gen, size: usize) -> Term {
    if size == 0 {
      match usize::arbitrary(g) % 3 {
        0 => x(),
        1 => y(),
        _ => Term::mk_num(i64::from(u8::arbitrary(g) % 3)),
      }
    } else {
      let n = 1 + usize::arbitrary(g) % 2;
      f((0..n).map(|_| arb_fo(g, size / 2)).collect())
    }
  }

  impl Arbitrary for FoTerm {
    fn arbitrary(g: &mut Gen) -> Self {
      let size = usize::arbitrary(g) % 5;
      FoTerm(arb_fo(g, size))
    }
  }

  #[quickcheck]
  fn prop_unifier_is_sound(t1: FoTerm, t2: FoTerm) -> bool {
    match unify(&is_xy, &t1.0, &t2.0) {
      Ok(env) => alpha_equals(&env.resolve(&t1.0), &env.resolve(&t2.0)),
      Err(e) => e.is_recoverable(),
    }
  }

  #[quickcheck]
  fn prop_unify_never_binds_cyclically(t1: FoTerm, t2: FoTerm) -> bool {
    match unify(&is_xy, &t1.0, &t2.0) {
      Ok(env) => env.iter().all(|(k, _)| !env.resolve(k).occurs(k)),
      Err(_) => true,
    }
  }

  #[quickcheck]
  fn prop_term_unifies_with_itself(t: FoTerm) -> bool {
    unify(&is_xy, &t.0, &t.0).is_ok()
  }
}
