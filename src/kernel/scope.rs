//! Scopes: the environment a formula is checked against.
//!
//! A scope records the visible theories (each with a marker), the
//! declared identifiers with their types, the defined type constructors
//! and the meta-variables (skolem constants) in force. Scopes are cheap to
//! clone and are extended by building new values.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::error::{ErrorKind, KResult, KernelError};
use super::gtype::Gtype;
use super::ident::{
  BASE_THY, Ident, and_ident, bool_ident, equals_ident, fun_ident,
  iff_ident, implies_ident, not_ident, num_ident, or_ident,
};
use super::ids::fresh_id;
use super::term::{Binder, Term};

/// Identifies one load of a theory. Reloading a theory issues a new
/// marker, which makes every formula built against the old one stale.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Marker {
  thy: Arc<str>,
  id: u64,
}

impl Marker {
  fn fresh(thy: &str) -> Self {
    Marker { thy: Arc::from(thy), id: fresh_id() }
  }

  pub fn thy(&self) -> &str {
    &self.thy
  }
}

/// A defined type constructor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDef {
  pub arity: usize,
}

#[derive(Clone, Debug)]
pub struct Scope {
  marker: Marker,
  theories: IndexMap<Arc<str>, Marker>,
  decls: im::HashMap<Ident, Gtype>,
  typedefs: im::HashMap<Ident, TypeDef>,
  metas: im::OrdMap<Arc<str>, Binder>,
}

impl Scope {
  /// A scope holding only the theory `thy`, with nothing declared.
  pub fn empty(thy: &str) -> Self {
    let marker = Marker::fresh(thy);
    let mut theories = IndexMap::new();
    theories.insert(Arc::from(thy), marker.clone());
    Scope {
      marker,
      theories,
      decls: im::HashMap::new(),
      typedefs: im::HashMap::new(),
      metas: im::OrdMap::new(),
    }
  }

  /// The base theory: `bool`, `num`, `fun` and the logical connectives.
  pub fn base() -> Self {
    let mut scp = Scope::empty(BASE_THY);
    scp.typedefs.insert(bool_ident(), TypeDef { arity: 0 });
    scp.typedefs.insert(num_ident(), TypeDef { arity: 0 });
    scp.typedefs.insert(fun_ident(), TypeDef { arity: 2 });

    let b = Gtype::bool;
    scp.decls.insert(not_ident(), Gtype::fun(b(), b()));
    for id in [and_ident(), or_ident(), implies_ident(), iff_ident()] {
      scp.decls.insert(id, Gtype::fun_of(vec![b(), b()], b()));
    }
    let a = Gtype::var("a");
    scp.decls.insert(equals_ident(), Gtype::fun_of(vec![a.clone(), a], b()));
    scp
  }

  pub fn marker(&self) -> &Marker {
    &self.marker
  }

  pub fn thy_name(&self) -> &str {
    self.marker.thy()
  }

  pub fn thy_in_scope(&self, thy: &str) -> bool {
    self.theories.contains_key(thy)
  }

  /// Is `m` the current marker of a visible theory?
  pub fn in_scope_marker(&self, m: &Marker) -> bool {
    self.theories.get(m.thy()) == Some(m)
  }

  /// Begin a new theory on top of this scope; earlier theories stay
  /// visible.
  pub fn open_theory(&self, thy: &str) -> KResult<Scope> {
    if self.thy_in_scope(thy) {
      return Err(KernelError::scope(
        format!("theory {thy} is already in scope"),
        vec![],
      ));
    }
    let marker = Marker::fresh(thy);
    let mut scp = self.clone();
    scp.theories.insert(Arc::from(thy), marker.clone());
    scp.marker = marker;
    Ok(scp)
  }

  /// Reload a visible theory: it gets a fresh marker and loses its
  /// declarations. Formulas and theorems carrying the old marker become
  /// stale.
  pub fn reload_theory(&self, thy: &str) -> KResult<Scope> {
    if !self.thy_in_scope(thy) {
      return Err(KernelError::scope(
        format!("theory {thy} is not in scope"),
        vec![],
      ));
    }
    let marker = Marker::fresh(thy);
    let mut scp = self.clone();
    scp.theories.insert(Arc::from(thy), marker.clone());
    if scp.marker.thy() == thy {
      scp.marker = marker;
    }
    scp.decls.retain(|id, _| id.thy() != thy);
    scp.typedefs.retain(|id, _| id.thy() != thy);
    Ok(scp)
  }

  // ==========================================================================
  // Declarations
  // ==========================================================================

  fn check_new(&self, id: &Ident) -> KResult<()> {
    if !self.thy_in_scope(id.thy()) {
      return Err(KernelError::scope(
        format!("theory of {id} is not in scope"),
        vec![],
      ));
    }
    if self.decls.contains_key(id) || self.typedefs.contains_key(id) {
      return Err(KernelError::scope(format!("{id} is already declared"), vec![]));
    }
    Ok(())
  }

  /// Declare an identifier with its (generic) type.
  pub fn declare(&mut self, id: Ident, ty: Gtype) -> KResult<()> {
    self.check_new(&id)?;
    if let Some(bad) = self.undefined_constr(&ty) {
      return Err(KernelError::types(
        ErrorKind::Type,
        format!("undefined type constructor {bad} in declaration of {id}"),
        vec![ty],
      ));
    }
    self.decls.insert(id, ty);
    Ok(())
  }

  /// Define a type constructor taking `arity` arguments.
  pub fn define_type(&mut self, id: Ident, arity: usize) -> KResult<()> {
    self.check_new(&id)?;
    self.typedefs.insert(id, TypeDef { arity });
    Ok(())
  }

  pub fn typeof_ident(&self, id: &Ident) -> Option<&Gtype> {
    if !self.thy_in_scope(id.thy()) {
      return None;
    }
    self.decls.get(id)
  }

  pub fn type_def(&self, id: &Ident) -> Option<&TypeDef> {
    if !self.thy_in_scope(id.thy()) {
      return None;
    }
    self.typedefs.get(id)
  }

  /// First constructor in `ty` that is not defined with matching arity.
  fn undefined_constr(&self, ty: &Gtype) -> Option<Ident> {
    use super::gtype::GtypeData;
    match ty.as_data() {
      GtypeData::Var(_) | GtypeData::WeakVar(_) => None,
      GtypeData::Constr(id, args) => match self.type_def(id) {
        Some(def) if def.arity == args.len() => {
          args.iter().find_map(|a| self.undefined_constr(a))
        },
        _ => Some(id.clone()),
      },
    }
  }

  /// Resolve a bare name to a declared identifier, searching the most
  /// recently opened theory first.
  pub fn resolve_name(&self, name: &str) -> Option<Ident> {
    self.theories.keys().rev().find_map(|thy| {
      let id = Ident::new(thy, name);
      self.decls.contains_key(&id).then_some(id)
    })
  }

  // ==========================================================================
  // Meta-variables
  // ==========================================================================

  /// Extend the scope with a meta-variable (a skolem constant).
  pub fn add_meta(&self, b: Binder) -> Scope {
    let mut scp = self.clone();
    scp.metas.insert(Arc::from(b.name()), b);
    scp
  }

  /// Is `name` already taken by a meta-variable in scope?
  pub fn is_meta(&self, name: &str) -> bool {
    self.metas.contains_key(name)
  }

  pub fn find_meta(&self, name: &str) -> Option<&Binder> {
    self.metas.get(name)
  }

  pub fn meta_in_scope(&self, b: &Binder) -> bool {
    self.metas.get(b.name()) == Some(b)
  }

  pub fn metas(&self) -> impl Iterator<Item = &Binder> {
    self.metas.values()
  }

  /// Meta-variables of `t` that this scope does not know.
  pub fn unknown_metas(&self, t: &Term) -> Vec<Binder> {
    t.metas().into_iter().filter(|b| !self.meta_in_scope(b)).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::term::Quant;

  #[test]
  fn base_scope_declares_connectives() {
    let scp = Scope::base();
    assert!(scp.typeof_ident(&and_ident()).is_some());
    assert_eq!(scp.type_def(&fun_ident()), Some(&TypeDef { arity: 2 }));
    assert_eq!(scp.resolve_name("equals"), Some(equals_ident()));
    assert_eq!(scp.resolve_name("nothing"), None);
  }

  #[test]
  fn declarations_need_a_visible_theory() {
    let mut scp = Scope::base();
    let err = scp.declare(Ident::new("nat", "zero"), Gtype::num()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Scope);

    let mut scp = scp.open_theory("nat").unwrap();
    scp.declare(Ident::new("nat", "zero"), Gtype::num()).unwrap();
    assert!(scp.declare(Ident::new("nat", "zero"), Gtype::num()).is_err());
    assert_eq!(scp.resolve_name("zero"), Some(Ident::new("nat", "zero")));
  }

  #[test]
  fn declarations_need_defined_types() {
    let mut scp = Scope::base().open_theory("t").unwrap();
    let bad = Gtype::constr(Ident::new("t", "set"), vec![Gtype::num()]);
    assert!(scp.declare(Ident::new("t", "s"), bad.clone()).is_err());
    scp.define_type(Ident::new("t", "set"), 1).unwrap();
    scp.declare(Ident::new("t", "s"), bad).unwrap();
  }

  #[test]
  fn reloading_invalidates_markers() {
    let scp = Scope::base().open_theory("t").unwrap();
    let old = scp.marker().clone();
    assert!(scp.in_scope_marker(&old));
    let scp = scp.reload_theory("t").unwrap();
    assert!(!scp.in_scope_marker(&old));
    assert!(scp.in_scope_marker(scp.marker()));
  }

  #[test]
  fn meta_variables() {
    let scp = Scope::base();
    let b = Binder::fresh(Quant::Meta, "_x", Gtype::num());
    let ext = scp.add_meta(b.clone());
    assert!(!scp.is_meta("_x"));
    assert!(ext.is_meta("_x"));
    assert!(ext.meta_in_scope(&b));
    assert_eq!(ext.unknown_metas(&Term::meta(b.clone())), vec![]);
    assert_eq!(scp.unknown_metas(&Term::meta(b.clone())), vec![b]);
  }
}
