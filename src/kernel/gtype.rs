//! The type language.
//!
//! A type is a tree of variables, weak variables and constructor
//! applications. Variables are identity-bearing: two variables with the
//! same display name are distinct unless they share the same `TyVar`.

use std::{
  cmp::Ordering,
  fmt,
  hash::{Hash, Hasher},
  sync::Arc,
};

use rustc_hash::FxHashMap;
use tracing::trace;

use super::error::{ErrorKind, KResult, KernelError};
use super::ident::{Ident, bool_ident, fun_ident, num_ident, BASE_THY};
use super::ids::fresh_id;

// ============================================================================
// Type variables
// ============================================================================

#[derive(Debug)]
struct TyVarData {
  id: u64,
  name: Arc<str>,
}

/// An identity-bearing type variable.
#[derive(Clone, Debug)]
pub struct TyVar(Arc<TyVarData>);

impl TyVar {
  pub fn fresh(name: &str) -> Self {
    TyVar(Arc::new(TyVarData { id: fresh_id(), name: Arc::from(name) }))
  }

  pub fn id(&self) -> u64 {
    self.0.id
  }

  pub fn name(&self) -> &str {
    &self.0.name
  }
}

impl PartialEq for TyVar {
  fn eq(&self, other: &Self) -> bool {
    self.0.id == other.0.id
  }
}

impl Eq for TyVar {}

impl Hash for TyVar {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.0.id.hash(state);
  }
}

impl PartialOrd for TyVar {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for TyVar {
  fn cmp(&self, other: &Self) -> Ordering {
    self.0.id.cmp(&other.0.id)
  }
}

// ============================================================================
// Gtype
// ============================================================================

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Gtype(Arc<GtypeData>);

#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum GtypeData {
  /// An ordinary type variable, rigid inside a sequent.
  Var(TyVar),
  /// A weak variable: once bound, the binding is shared by every
  /// sequent of the goal.
  WeakVar(TyVar),
  /// A constructor applied to arguments.
  Constr(Ident, Vec<Gtype>),
}

impl Gtype {
  pub fn as_data(&self) -> &GtypeData {
    &self.0
  }

  /// A fresh ordinary variable.
  pub fn var(name: &str) -> Self {
    Gtype::of_var(TyVar::fresh(name))
  }

  /// A fresh weak variable.
  pub fn weak(name: &str) -> Self {
    Gtype::of_weak(TyVar::fresh(name))
  }

  pub fn of_var(v: TyVar) -> Self {
    Gtype(Arc::new(GtypeData::Var(v)))
  }

  pub fn of_weak(v: TyVar) -> Self {
    Gtype(Arc::new(GtypeData::WeakVar(v)))
  }

  pub fn constr(id: Ident, args: Vec<Gtype>) -> Self {
    Gtype(Arc::new(GtypeData::Constr(id, args)))
  }

  pub fn fun(dom: Gtype, cod: Gtype) -> Self {
    Gtype::constr(fun_ident(), vec![dom, cod])
  }

  /// `a1 -> a2 -> ... -> res`
  pub fn fun_of(args: Vec<Gtype>, res: Gtype) -> Self {
    args.into_iter().rev().fold(res, |acc, a| Gtype::fun(a, acc))
  }

  pub fn bool() -> Self {
    Gtype::constr(bool_ident(), vec![])
  }

  pub fn num() -> Self {
    Gtype::constr(num_ident(), vec![])
  }

  pub fn is_var(&self) -> bool {
    matches!(self.as_data(), GtypeData::Var(_))
  }

  pub fn is_weak(&self) -> bool {
    matches!(self.as_data(), GtypeData::WeakVar(_))
  }

  pub fn is_any_var(&self) -> bool {
    self.as_tyvar().is_some()
  }

  pub fn as_tyvar(&self) -> Option<&TyVar> {
    match self.as_data() {
      GtypeData::Var(v) | GtypeData::WeakVar(v) => Some(v),
      GtypeData::Constr(..) => None,
    }
  }

  pub fn is_fun(&self) -> bool {
    self.dest_fun().is_some()
  }

  pub fn dest_fun(&self) -> Option<(&Gtype, &Gtype)> {
    match self.as_data() {
      GtypeData::Constr(id, args) if *id == fun_ident() && args.len() == 2 => {
        Some((&args[0], &args[1]))
      },
      _ => None,
    }
  }

  pub fn is_bool(&self) -> bool {
    matches!(self.as_data(), GtypeData::Constr(id, args)
      if *id == bool_ident() && args.is_empty())
  }

  /// All variables (ordinary and weak) in order of first occurrence.
  pub fn vars(&self) -> Vec<TyVar> {
    fn go(ty: &Gtype, acc: &mut Vec<TyVar>) {
      match ty.as_data() {
        GtypeData::Var(v) | GtypeData::WeakVar(v) => {
          if !acc.contains(v) {
            acc.push(v.clone());
          }
        },
        GtypeData::Constr(_, args) => args.iter().for_each(|a| go(a, acc)),
      }
    }
    let mut acc = Vec::new();
    go(self, &mut acc);
    acc
  }
}

impl fmt::Display for Gtype {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.as_data() {
      GtypeData::Var(v) => write!(f, "'{}", v.name()),
      GtypeData::WeakVar(v) => write!(f, "_{}", v.name()),
      GtypeData::Constr(..) if self.is_fun() => {
        let (a, b) = self.dest_fun().ok_or(fmt::Error)?;
        write!(f, "({a} -> {b})")
      },
      GtypeData::Constr(id, args) => {
        if !args.is_empty() {
          write!(f, "(")?;
          for (i, a) in args.iter().enumerate() {
            if i > 0 {
              write!(f, ", ")?;
            }
            write!(f, "{a}")?;
          }
          write!(f, ") ")?;
        }
        if id.thy() == BASE_THY {
          write!(f, "{}", id.name())
        } else {
          write!(f, "{id}")
        }
      },
    }
  }
}

// ============================================================================
// Type substitutions
// ============================================================================

/// A triangular substitution from type variables to types.
///
/// Bindings may refer to other bound variables; `mgu` resolves them
/// fully. A variable is never bound to a type containing itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeSubst(im::OrdMap<TyVar, Gtype>);

impl TypeSubst {
  pub fn new() -> Self {
    TypeSubst::default()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn find(&self, v: &TyVar) -> Option<&Gtype> {
    self.0.get(v)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&TyVar, &Gtype)> {
    self.0.iter()
  }

  /// Bind `v` to `ty` after an occurs check.
  pub fn bind(&self, v: &TyVar, ty: &Gtype) -> KResult<TypeSubst> {
    let mut env = self.clone();
    env.bind_mut(v, ty)?;
    Ok(env)
  }

  fn bind_mut(&mut self, v: &TyVar, ty: &Gtype) -> KResult<()> {
    if occurs(self, v, ty) {
      return Err(KernelError::Occurs {
        var: Gtype::of_var(v.clone()),
        ty: self.mgu(ty),
      });
    }
    trace!(var = v.name(), ty = %ty, "bind type variable");
    self.0.insert(v.clone(), ty.clone());
    Ok(())
  }

  /// Chase the bindings of a top-level variable.
  pub fn lookup(&self, ty: &Gtype) -> Gtype {
    let mut curr = ty.clone();
    while let Some(next) = curr.as_tyvar().and_then(|v| self.find(v)) {
      curr = next.clone();
    }
    curr
  }

  /// Apply the substitution throughout `ty`.
  pub fn mgu(&self, ty: &Gtype) -> Gtype {
    if self.is_empty() {
      return ty.clone();
    }
    let ty = self.lookup(ty);
    match ty.as_data() {
      GtypeData::Var(_) | GtypeData::WeakVar(_) => ty,
      GtypeData::Constr(id, args) => {
        Gtype::constr(id.clone(), args.iter().map(|a| self.mgu(a)).collect())
      },
    }
  }
}

/// Does `v` occur in `ty` under the bindings of `env`?
pub fn occurs(env: &TypeSubst, v: &TyVar, ty: &Gtype) -> bool {
  let ty = env.lookup(ty);
  match ty.as_data() {
    GtypeData::Var(w) | GtypeData::WeakVar(w) => w == v,
    GtypeData::Constr(_, args) => args.iter().any(|a| occurs(env, v, a)),
  }
}

fn mismatch(env: &TypeSubst, t1: &Gtype, t2: &Gtype) -> KernelError {
  KernelError::types(
    ErrorKind::Unify,
    "type unification failed",
    vec![env.mgu(t1), env.mgu(t2)],
  )
}

/// Unify two types, binding only variables accepted by `bindable`.
pub fn unify_with(
  env: &TypeSubst,
  t1: &Gtype,
  t2: &Gtype,
  bindable: &dyn Fn(&Gtype) -> bool,
) -> KResult<TypeSubst> {
  let mut env = env.clone();
  unify_aux(&mut env, t1, t2, bindable)?;
  Ok(env)
}

fn unify_aux(
  env: &mut TypeSubst,
  t1: &Gtype,
  t2: &Gtype,
  bindable: &dyn Fn(&Gtype) -> bool,
) -> KResult<()> {
  let a = env.lookup(t1);
  let b = env.lookup(t2);
  if a == b {
    return Ok(());
  }
  match (a.as_data(), b.as_data()) {
    (GtypeData::Var(v) | GtypeData::WeakVar(v), _) if bindable(&a) => {
      env.bind_mut(v, &b)
    },
    (_, GtypeData::Var(v) | GtypeData::WeakVar(v)) if bindable(&b) => {
      env.bind_mut(v, &a)
    },
    (GtypeData::Constr(f, fargs), GtypeData::Constr(g, gargs))
      if f == g && fargs.len() == gargs.len() =>
    {
      for (x, y) in fargs.iter().zip(gargs.iter()) {
        unify_aux(env, x, y, bindable).map_err(|e| match e {
          KernelError::Occurs { .. } => e,
          _ => mismatch(env, t1, t2),
        })?;
      }
      Ok(())
    },
    _ => Err(mismatch(env, &a, &b)),
  }
}

/// Unify two types; every variable is bindable.
pub fn unify_env(
  env: &TypeSubst,
  t1: &Gtype,
  t2: &Gtype,
) -> KResult<TypeSubst> {
  unify_with(env, t1, t2, &|_| true)
}

/// Unify two types binding weak variables only. Ordinary variables must
/// match exactly.
pub fn unify_weak_env(
  env: &TypeSubst,
  t1: &Gtype,
  t2: &Gtype,
) -> KResult<TypeSubst> {
  unify_with(env, t1, t2, &Gtype::is_weak)
}

pub fn unify(t1: &Gtype, t2: &Gtype) -> KResult<TypeSubst> {
  unify_env(&TypeSubst::new(), t1, t2)
}

/// One-sided matching: only variables of `pattern` accepted by
/// `bindable` may be bound; `target` is left unchanged.
pub fn matching_with(
  env: &TypeSubst,
  pattern: &Gtype,
  target: &Gtype,
  bindable: &dyn Fn(&Gtype) -> bool,
) -> KResult<TypeSubst> {
  let mut env = env.clone();
  match_aux(&mut env, pattern, target, bindable)?;
  Ok(env)
}

fn match_aux(
  env: &mut TypeSubst,
  pattern: &Gtype,
  target: &Gtype,
  bindable: &dyn Fn(&Gtype) -> bool,
) -> KResult<()> {
  let p = env.lookup(pattern);
  if p == *target {
    return Ok(());
  }
  match (p.as_data(), target.as_data()) {
    (GtypeData::Var(v) | GtypeData::WeakVar(v), _) if bindable(&p) => {
      env.bind_mut(v, target)
    },
    (GtypeData::Constr(f, fargs), GtypeData::Constr(g, gargs))
      if f == g && fargs.len() == gargs.len() =>
    {
      for (x, y) in fargs.iter().zip(gargs.iter()) {
        match_aux(env, x, y, bindable)?;
      }
      Ok(())
    },
    _ => Err(mismatch(env, &p, target)),
  }
}

pub fn matching_env(
  env: &TypeSubst,
  pattern: &Gtype,
  target: &Gtype,
) -> KResult<TypeSubst> {
  matching_with(env, pattern, target, &|_| true)
}

// ============================================================================
// Copying
// ============================================================================

/// Replace ordinary variables with fresh ones, consistently across every
/// type copied with the same `renaming`. Weak variables are kept.
pub fn copy_type_env(
  renaming: &mut FxHashMap<TyVar, Gtype>,
  ty: &Gtype,
) -> Gtype {
  match ty.as_data() {
    GtypeData::Var(v) => renaming
      .entry(v.clone())
      .or_insert_with(|| Gtype::var(v.name()))
      .clone(),
    GtypeData::WeakVar(_) => ty.clone(),
    GtypeData::Constr(id, args) => Gtype::constr(
      id.clone(),
      args.iter().map(|a| copy_type_env(renaming, a)).collect(),
    ),
  }
}

pub fn copy_type(ty: &Gtype) -> Gtype {
  copy_type_env(&mut FxHashMap::default(), ty)
}

/// Replace ordinary variables with fresh weak variables, consistently
/// across every type converted with the same `renaming`.
pub fn to_weak_env(
  renaming: &mut FxHashMap<TyVar, Gtype>,
  ty: &Gtype,
) -> Gtype {
  match ty.as_data() {
    GtypeData::Var(v) => renaming
      .entry(v.clone())
      .or_insert_with(|| Gtype::weak(v.name()))
      .clone(),
    GtypeData::WeakVar(_) => ty.clone(),
    GtypeData::Constr(id, args) => Gtype::constr(
      id.clone(),
      args.iter().map(|a| to_weak_env(renaming, a)).collect(),
    ),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use quickcheck::{Arbitrary, Gen};
  use quickcheck_macros::quickcheck;

  fn list_of(ty: Gtype) -> Gtype {
    Gtype::constr(Ident::new("list", "list"), vec![ty])
  }

  #[test]
  fn unify_binds_variable_to_constructor() {
    let a = Gtype::var("a");
    let env = unify(&Gtype::fun(a.clone(), Gtype::bool()), &Gtype::fun(
      Gtype::num(),
      Gtype::bool(),
    ))
    .unwrap();
    assert_eq!(env.mgu(&a), Gtype::num());
  }

  #[test]
  fn unify_chases_existing_bindings() {
    let a = Gtype::var("a");
    let b = Gtype::var("b");
    let env = unify(&a, &b).unwrap();
    let env = unify_env(&env, &b, &Gtype::bool()).unwrap();
    assert_eq!(env.mgu(&a), Gtype::bool());
    assert_eq!(env.mgu(&list_of(a)), list_of(Gtype::bool()));
  }

  #[test]
  fn occurs_check_names_cyclic_pair() {
    let a = Gtype::var("a");
    let err = unify(&a, &list_of(a.clone())).unwrap_err();
    match err {
      KernelError::Occurs { var, ty } => {
        assert_eq!(var, a);
        assert_eq!(ty, list_of(a));
      },
      other => panic!("unexpected error {other}"),
    }
  }

  #[test]
  fn constructor_clash_fails() {
    let err = unify(&Gtype::bool(), &Gtype::num()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unify);
  }

  #[test]
  fn same_name_variables_are_distinct() {
    let a1 = Gtype::var("a");
    let a2 = Gtype::var("a");
    assert_ne!(a1, a2);
    let env = unify(&a1, &a2).unwrap();
    assert_eq!(env.len(), 1);
  }

  #[test]
  fn weak_unification_leaves_ordinary_variables_rigid() {
    let a = Gtype::var("a");
    let w = Gtype::weak("w");
    let env = unify_weak_env(&TypeSubst::new(), &w, &Gtype::num()).unwrap();
    assert_eq!(env.mgu(&w), Gtype::num());
    assert!(unify_weak_env(&TypeSubst::new(), &a, &Gtype::num()).is_err());
    assert!(unify_weak_env(&TypeSubst::new(), &a, &a).is_ok());
  }

  #[test]
  fn matching_is_one_sided() {
    let a = Gtype::var("a");
    let b = Gtype::var("b");
    let env = matching_env(&TypeSubst::new(), &list_of(a.clone()), &list_of(
      b.clone(),
    ))
    .unwrap();
    assert_eq!(env.mgu(&a), b);
    let env = TypeSubst::new();
    let bindable = |t: &Gtype| *t == a;
    assert!(matching_with(&env, &Gtype::bool(), &a, &bindable).is_err());
  }

  #[test]
  fn copy_type_is_consistent_and_fresh() {
    let a = Gtype::var("a");
    let ty = Gtype::fun(a.clone(), a.clone());
    let copy = copy_type(&ty);
    let (x, y) = copy.dest_fun().unwrap();
    assert_eq!(x, y);
    assert_ne!(*x, a);
    assert_eq!(x.as_tyvar().map(TyVar::name), Some("a"));
  }

  #[test]
  fn to_weak_turns_variables_weak() {
    let a = Gtype::var("a");
    let ty = to_weak_env(&mut FxHashMap::default(), &list_of(a));
    match ty.as_data() {
      GtypeData::Constr(_, args) => assert!(args[0].is_weak()),
      _ => panic!("expected a constructor"),
    }
  }

  #[test]
  fn display_types() {
    let a = Gtype::var("a");
    assert_eq!(Gtype::fun(a, Gtype::bool()).to_string(), "('a -> bool)");
    assert_eq!(list_of(Gtype::num()).to_string(), "(num) list.list");
  }

  // ==========================================================================
  // Property tests (quickcheck)
  // ==========================================================================

  /// A type over three variable slots, instantiated by each property so
  /// that both sides of a unification share their variables.
  #[derive(Clone, Debug)]
  enum Shape {
    Slot(usize),
    Bool,
    Num,
    List(Box<Shape>),
    Fun(Box<Shape>, Box<Shape>),
  }

  fn arb_shape(g: &mut Gen, size: usize) -> Shape {
    if size == 0 {
      return match usize::arbitrary(g) % 4 {
        0 => Shape::Bool,
        1 => Shape::Num,
        _ => Shape::Slot(usize::arbitrary(g) % 3),
      };
    }
    match usize::arbitrary(g) % 3 {
      0 => Shape::List(Box::new(arb_shape(g, size - 1))),
      1 => Shape::Fun(
        Box::new(arb_shape(g, size / 2)),
        Box::new(arb_shape(g, size / 2)),
      ),
      _ => arb_shape(g, 0),
    }
  }

  impl Arbitrary for Shape {
    fn arbitrary(g: &mut Gen) -> Self {
      let size = usize::arbitrary(g) % 5;
      arb_shape(g, size)
    }
  }

  fn build(vars: &[Gtype], s: &Shape) -> Gtype {
    match s {
      Shape::Slot(i) => vars[*i].clone(),
      Shape::Bool => Gtype::bool(),
      Shape::Num => Gtype::num(),
      Shape::List(a) => list_of(build(vars, a)),
      Shape::Fun(a, b) => Gtype::fun(build(vars, a), build(vars, b)),
    }
  }

  fn slots() -> Vec<Gtype> {
    vec![Gtype::var("a"), Gtype::var("b"), Gtype::var("c")]
  }

  #[quickcheck]
  fn prop_unifier_equates_both_sides(s1: Shape, s2: Shape) -> bool {
    let vars = slots();
    let (t1, t2) = (build(&vars, &s1), build(&vars, &s2));
    match unify(&t1, &t2) {
      Ok(env) => env.mgu(&t1) == env.mgu(&t2),
      Err(e) => e.is_recoverable(),
    }
  }

  #[quickcheck]
  fn prop_variable_never_unifies_with_a_type_containing_it(s: Shape) -> bool {
    let vars = slots();
    let a = vars[0].clone();
    let cyclic = list_of(Gtype::fun(build(&vars, &s), a.clone()));
    matches!(unify(&a, &cyclic), Err(e) if e.kind() == ErrorKind::Occurs)
      && matches!(unify(&cyclic, &a), Err(e) if e.kind() == ErrorKind::Occurs)
  }
}
