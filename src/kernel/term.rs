//! Binder-aware terms.
//!
//! `Bound` and `Meta` terms refer to a binder record by identity. Two
//! binder records are the same binder iff they carry the same id, so
//! substitution never captures: a replacement can only mention a binder
//! that was already in scope where it was built.

use std::{
  cmp::Ordering,
  fmt,
  hash::{Hash, Hasher},
  sync::Arc,
};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cons_list::ConsList;

use super::gtype::{Gtype, TypeSubst};
use super::ident::{BASE_THY, Ident};
use super::ids::fresh_id;

// ============================================================================
// Binders
// ============================================================================

#[derive(
  Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize,
)]
pub enum Quant {
  All,
  Ex,
  Lambda,
  /// Skolem constants and unification meta-variables.
  Meta,
}

impl Quant {
  fn keyword(self) -> &'static str {
    match self {
      Quant::All => "forall",
      Quant::Ex => "exists",
      Quant::Lambda => "lambda",
      Quant::Meta => "meta",
    }
  }
}

#[derive(Debug)]
struct BinderData {
  id: u64,
  quant: Quant,
  name: Arc<str>,
  ty: Gtype,
}

/// A binder record. Equality, ordering and hashing use the id only; the
/// type is an annotation that `retype` may refine without changing the
/// binder's identity.
#[derive(Clone, Debug)]
pub struct Binder(Arc<BinderData>);

impl Binder {
  pub fn fresh(quant: Quant, name: &str, ty: Gtype) -> Self {
    Binder(Arc::new(BinderData {
      id: fresh_id(),
      quant,
      name: Arc::from(name),
      ty,
    }))
  }

  pub fn id(&self) -> u64 {
    self.0.id
  }

  pub fn quant(&self) -> Quant {
    self.0.quant
  }

  pub fn name(&self) -> &str {
    &self.0.name
  }

  pub fn ty(&self) -> &Gtype {
    &self.0.ty
  }

  /// A new binder record with the same kind, name and type.
  pub fn renamed(&self) -> Self {
    Binder::fresh(self.quant(), self.name(), self.ty().clone())
  }

  /// The same binder with a refined type annotation.
  pub(crate) fn retyped(&self, ty: Gtype) -> Self {
    if ty == self.0.ty {
      return self.clone();
    }
    Binder(Arc::new(BinderData {
      id: self.0.id,
      quant: self.0.quant,
      name: self.0.name.clone(),
      ty,
    }))
  }
}

impl PartialEq for Binder {
  fn eq(&self, other: &Self) -> bool {
    self.0.id == other.0.id
  }
}

impl Eq for Binder {}

impl Hash for Binder {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.0.id.hash(state);
  }
}

impl PartialOrd for Binder {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Binder {
  fn cmp(&self, other: &Self) -> Ordering {
    self.0.id.cmp(&other.0.id)
  }
}

// ============================================================================
// Constants
// ============================================================================

#[derive(
  Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize,
)]
pub enum Const {
  Bool(bool),
  Num(i64),
}

impl Const {
  pub fn ty(&self) -> Gtype {
    match self {
      Const::Bool(_) => Gtype::bool(),
      Const::Num(_) => Gtype::num(),
    }
  }
}

impl fmt::Display for Const {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Const::Bool(b) => write!(f, "{b}"),
      Const::Num(n) => write!(f, "{n}"),
    }
  }
}

// ============================================================================
// Terms
// ============================================================================

/// An immutable term. `==` is syntactic equality with binders compared by
/// identity; `alpha_equals` identifies terms up to binder renaming. The
/// derived order is total and is used to key substitutions.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Term(Arc<TermData>);

#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum TermData {
  /// A global identifier declared in a scope.
  Id(Ident, Gtype),
  /// A named free variable.
  Free(Arc<str>, Gtype),
  /// An occurrence of the variable bound by a `Qnt` with this binder.
  Bound(Binder),
  /// A meta-variable or skolem constant.
  Meta(Binder),
  App(Term, Term),
  Qnt(Binder, Term),
  Const(Const),
}

impl Term {
  pub fn as_data(&self) -> &TermData {
    &self.0
  }

  /// Pointer identity; a cheap sufficient test for `==`.
  pub fn same(&self, other: &Term) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }

  pub fn id(id: Ident, ty: Gtype) -> Self {
    Term(Arc::new(TermData::Id(id, ty)))
  }

  pub fn free(name: &str, ty: Gtype) -> Self {
    Term(Arc::new(TermData::Free(Arc::from(name), ty)))
  }

  pub fn bound(b: Binder) -> Self {
    Term(Arc::new(TermData::Bound(b)))
  }

  pub fn meta(b: Binder) -> Self {
    Term(Arc::new(TermData::Meta(b)))
  }

  pub fn app(f: Term, a: Term) -> Self {
    Term(Arc::new(TermData::App(f, a)))
  }

  pub fn qnt(b: Binder, body: Term) -> Self {
    Term(Arc::new(TermData::Qnt(b, body)))
  }

  pub fn cnst(c: Const) -> Self {
    Term(Arc::new(TermData::Const(c)))
  }

  pub fn mk_bool(b: bool) -> Self {
    Term::cnst(Const::Bool(b))
  }

  pub fn mk_num(n: i64) -> Self {
    Term::cnst(Const::Num(n))
  }

  /// `f a1 ... an`
  pub fn comb(f: Term, args: Vec<Term>) -> Self {
    args.into_iter().fold(f, Term::app)
  }

  pub fn is_id(&self) -> bool {
    matches!(self.as_data(), TermData::Id(..))
  }

  pub fn is_free(&self) -> bool {
    matches!(self.as_data(), TermData::Free(..))
  }

  pub fn is_bound(&self) -> bool {
    matches!(self.as_data(), TermData::Bound(_))
  }

  pub fn is_meta(&self) -> bool {
    matches!(self.as_data(), TermData::Meta(_))
  }

  pub fn is_app(&self) -> bool {
    matches!(self.as_data(), TermData::App(..))
  }

  pub fn is_qnt(&self) -> bool {
    matches!(self.as_data(), TermData::Qnt(..))
  }

  pub fn is_const(&self) -> bool {
    matches!(self.as_data(), TermData::Const(_))
  }

  pub fn dest_app(&self) -> Option<(&Term, &Term)> {
    match self.as_data() {
      TermData::App(f, a) => Some((f, a)),
      _ => None,
    }
  }

  pub fn dest_qnt(&self) -> Option<(&Binder, &Term)> {
    match self.as_data() {
      TermData::Qnt(b, body) => Some((b, body)),
      _ => None,
    }
  }

  pub fn dest_id(&self) -> Option<(&Ident, &Gtype)> {
    match self.as_data() {
      TermData::Id(id, ty) => Some((id, ty)),
      _ => None,
    }
  }

  pub fn dest_free(&self) -> Option<(&str, &Gtype)> {
    match self.as_data() {
      TermData::Free(n, ty) => Some((&**n, ty)),
      _ => None,
    }
  }

  /// The binder of a `Bound` or `Meta` term.
  pub fn binder(&self) -> Option<&Binder> {
    match self.as_data() {
      TermData::Bound(b) | TermData::Meta(b) => Some(b),
      _ => None,
    }
  }

  /// Split `f a1 ... an` into `f` and `[a1, ..., an]`.
  pub fn get_fun_args(&self) -> (Term, Vec<Term>) {
    let mut args = Vec::new();
    let mut curr = self;
    while let TermData::App(f, a) = curr.as_data() {
      args.push(a.clone());
      curr = f;
    }
    args.reverse();
    (curr.clone(), args)
  }

  pub fn get_fun(&self) -> &Term {
    let mut curr = self;
    while let TermData::App(f, _) = curr.as_data() {
      curr = f;
    }
    curr
  }

  /// Is this an application of the identifier `id` to `n` arguments?
  pub fn is_ident_app(&self, id: &Ident, n: usize) -> bool {
    let (f, args) = self.get_fun_args();
    args.len() == n && matches!(f.dest_id(), Some((fid, _)) if fid == id)
  }

  pub fn size(&self) -> usize {
    match self.as_data() {
      TermData::App(f, a) => 1 + f.size() + a.size(),
      TermData::Qnt(_, body) => 1 + body.size(),
      _ => 1,
    }
  }

  /// Does any subterm (including `self`) satisfy `pred`?
  pub fn exists(&self, pred: &dyn Fn(&Term) -> bool) -> bool {
    if pred(self) {
      return true;
    }
    match self.as_data() {
      TermData::App(f, a) => f.exists(pred) || a.exists(pred),
      TermData::Qnt(_, body) => body.exists(pred),
      _ => false,
    }
  }

  /// Does `sub` occur syntactically in `self`?
  pub fn occurs(&self, sub: &Term) -> bool {
    self.exists(&|t| t == sub)
  }

  /// Free variables, in order of first occurrence.
  pub fn free_vars(&self) -> Vec<Term> {
    let mut acc = Vec::new();
    self.collect(&mut acc, &|t| t.is_free());
    acc
  }

  /// Meta-variable binders, in order of first occurrence.
  pub fn metas(&self) -> Vec<Binder> {
    let mut acc = Vec::new();
    self.collect(&mut acc, &|t| t.is_meta());
    acc.iter().filter_map(|t| t.binder().cloned()).collect()
  }

  fn collect(&self, acc: &mut Vec<Term>, pred: &dyn Fn(&Term) -> bool) {
    match self.as_data() {
      TermData::App(f, a) => {
        f.collect(acc, pred);
        a.collect(acc, pred);
      },
      TermData::Qnt(_, body) => body.collect(acc, pred),
      _ => {
        if pred(self) && !acc.contains(self) {
          acc.push(self.clone());
        }
      },
    }
  }

  /// Every `Bound` occurrence is enclosed by a `Qnt` with its binder.
  pub fn is_closed(&self) -> bool {
    self.unbound_binders().is_empty()
  }

  /// Is the term closed once the binders in `env` count as enclosing it?
  pub fn is_closed_env(&self, env: &[Binder]) -> bool {
    self.unbound_binders().iter().all(|b| env.contains(b))
  }

  /// Binders of `Bound` occurrences not enclosed by their `Qnt`.
  pub fn unbound_binders(&self) -> Vec<Binder> {
    fn go(env: &ConsList<Binder>, t: &Term, acc: &mut Vec<Binder>) {
      match t.as_data() {
        TermData::Bound(b) => {
          if !env.contains(b) && !acc.contains(b) {
            acc.push(b.clone());
          }
        },
        TermData::App(f, a) => {
          go(env, f, acc);
          go(env, a, acc);
        },
        TermData::Qnt(b, body) => go(&env.cons(b.clone()), body, acc),
        _ => {},
      }
    }
    let mut acc = Vec::new();
    go(&ConsList::new(), self, &mut acc);
    acc
  }
}

// ============================================================================
// Alpha-equality
// ============================================================================

/// Equality up to the identity of binders.
pub fn alpha_equals(t1: &Term, t2: &Term) -> bool {
  alpha_aux(&ConsList::new(), t1, t2)
}

fn alpha_aux(env: &ConsList<(Binder, Binder)>, t1: &Term, t2: &Term) -> bool {
  if env.is_empty() && t1.same(t2) {
    return true;
  }
  match (t1.as_data(), t2.as_data()) {
    (TermData::Bound(x), TermData::Bound(y)) => {
      match env.find(|(l, r)| l == x || r == y) {
        Some((l, r)) => l == x && r == y,
        None => x == y,
      }
    },
    (TermData::Qnt(x, bx), TermData::Qnt(y, by)) => {
      x.quant() == y.quant()
        && x.ty() == y.ty()
        && alpha_aux(&env.cons((x.clone(), y.clone())), bx, by)
    },
    (TermData::App(f1, a1), TermData::App(f2, a2)) => {
      alpha_aux(env, f1, f2) && alpha_aux(env, a1, a2)
    },
    _ => t1 == t2,
  }
}

// ============================================================================
// Substitution
// ============================================================================

/// A finite map from terms to terms, keyed by the total term order.
///
/// `subst` applies it simultaneously in one pass. Unification builds
/// triangular substitutions whose values may mention other keys;
/// `resolve` applies those to a fixpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subst(im::OrdMap<Term, Term>);

impl Subst {
  pub fn new() -> Self {
    Subst::default()
  }

  pub fn from_pairs<I>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (Term, Term)>,
  {
    Subst(pairs.into_iter().collect())
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn find(&self, t: &Term) -> Option<&Term> {
    self.0.get(t)
  }

  pub fn contains(&self, t: &Term) -> bool {
    self.0.contains_key(t)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Term, &Term)> {
    self.0.iter()
  }

  pub fn bind(&self, k: Term, v: Term) -> Subst {
    Subst(self.0.update(k, v))
  }

  pub fn insert(&mut self, k: Term, v: Term) {
    self.0.insert(k, v);
  }

  /// Follow bindings from `t` until an unbound term is reached.
  pub fn chase(&self, t: &Term) -> Term {
    let mut curr = t.clone();
    while let Some(next) = self.find(&curr) {
      curr = next.clone();
    }
    curr
  }

  /// Apply a triangular substitution until no key remains.
  pub fn resolve(&self, t: &Term) -> Term {
    if self.is_empty() {
      return t.clone();
    }
    if let Some(r) = self.find(t) {
      return self.resolve(r);
    }
    match t.as_data() {
      TermData::App(f, a) => rebuild_app(t, self.resolve(f), self.resolve(a)),
      TermData::Qnt(b, body) => rebuild_qnt(t, b, self.resolve(body)),
      _ => t.clone(),
    }
  }
}

fn rebuild_app(orig: &Term, f: Term, a: Term) -> Term {
  match orig.dest_app() {
    Some((f0, a0)) if f0.same(&f) && a0.same(&a) => orig.clone(),
    _ => Term::app(f, a),
  }
}

fn rebuild_qnt(orig: &Term, b: &Binder, body: Term) -> Term {
  match orig.dest_qnt() {
    Some((_, body0)) if body0.same(&body) => orig.clone(),
    _ => Term::qnt(b.clone(), body),
  }
}

/// Simultaneously replace every subterm that is a key of `env`.
/// Replacements are not themselves substituted into.
pub fn subst(env: &Subst, t: &Term) -> Term {
  if env.is_empty() {
    return t.clone();
  }
  if let Some(r) = env.find(t) {
    return r.clone();
  }
  match t.as_data() {
    TermData::App(f, a) => rebuild_app(t, subst(env, f), subst(env, a)),
    TermData::Qnt(b, body) => rebuild_qnt(t, b, subst(env, body)),
    _ => t.clone(),
  }
}

/// Replace `from` by `to` throughout `t`.
pub fn replace(t: &Term, from: &Term, to: &Term) -> Term {
  subst(&Subst::new().bind(from.clone(), to.clone()), t)
}

/// Instantiate the outermost binder of a `Qnt` with `arg`.
pub fn inst(t: &Term, arg: &Term) -> Option<Term> {
  let (b, body) = t.dest_qnt()?;
  Some(replace(body, &Term::bound(b.clone()), arg))
}

// ============================================================================
// Renaming and retyping
// ============================================================================

/// Copy `t` with a fresh binder record for every quantifier. The result
/// is alpha-equal to `t` but shares no binder with it.
pub fn rename(t: &Term) -> Term {
  rename_env(&mut FxHashMap::default(), t)
}

/// `rename` continuing an existing renaming of binders.
pub fn rename_env(map: &mut FxHashMap<Binder, Binder>, t: &Term) -> Term {
  match t.as_data() {
    TermData::Bound(b) => match map.get(b) {
      Some(nb) => Term::bound(nb.clone()),
      None => t.clone(),
    },
    TermData::App(f, a) => {
      Term::app(rename_env(map, f), rename_env(map, a))
    },
    TermData::Qnt(b, body) => {
      let nb = b.renamed();
      let prev = map.insert(b.clone(), nb.clone());
      let nbody = rename_env(map, body);
      match prev {
        Some(p) => map.insert(b.clone(), p),
        None => map.remove(b),
      };
      Term::qnt(nb, nbody)
    },
    _ => t.clone(),
  }
}

/// Apply `f` to every type annotation in `t`. Binder identities are kept.
pub fn map_types(t: &Term, f: &mut dyn FnMut(&Gtype) -> Gtype) -> Term {
  match t.as_data() {
    TermData::Id(id, ty) => Term::id(id.clone(), f(ty)),
    TermData::Free(n, ty) => Term::free(n, f(ty)),
    TermData::Bound(b) => Term::bound(b.retyped(f(b.ty()))),
    TermData::Meta(b) => Term::meta(b.retyped(f(b.ty()))),
    TermData::App(fun, a) => {
      let fun = map_types(fun, f);
      Term::app(fun, map_types(a, f))
    },
    TermData::Qnt(b, body) => {
      let nb = b.retyped(f(b.ty()));
      Term::qnt(nb, map_types(body, f))
    },
    TermData::Const(_) => t.clone(),
  }
}

/// Apply a type substitution throughout `t`.
pub fn retype(env: &TypeSubst, t: &Term) -> Term {
  if env.is_empty() {
    return t.clone();
  }
  map_types(t, &mut |ty| env.mgu(ty))
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Term {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.as_data() {
      TermData::Id(id, _) => {
        if id.thy() == BASE_THY {
          write!(f, "{}", id.name())
        } else {
          write!(f, "{id}")
        }
      },
      TermData::Free(n, _) => write!(f, "{n}"),
      TermData::Bound(b) | TermData::Meta(b) => write!(f, "{}", b.name()),
      TermData::App(..) => {
        let (fun, args) = self.get_fun_args();
        write!(f, "({fun}")?;
        for a in args {
          write!(f, " {a}")?;
        }
        write!(f, ")")
      },
      TermData::Qnt(b, body) => {
        write!(f, "({} {}: {}. {body})", b.quant().keyword(), b.name(), b.ty())
      },
      TermData::Const(c) => write!(f, "{c}"),
    }
  }
}
