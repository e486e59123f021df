//! Sequents: the nodes of a proof.

use std::sync::Arc;

use super::tag::{Label, Tag};
use crate::kernel::error::{KResult, KernelError};
use crate::kernel::formula::Formula;
use crate::kernel::gtype::{Gtype, TyVar};
use crate::kernel::scope::Scope;
use crate::kernel::term::{Binder, Quant, Term};

/// The environment of a sequent: its skolem constants and the scope
/// that knows them.
#[derive(Clone, Debug)]
pub struct SeqEnv {
  skolems: im::Vector<Binder>,
  /// Next unused suffix for each skolem base name.
  names: im::OrdMap<Arc<str>, usize>,
  scope: Scope,
  /// Weak type variables introduced in this branch.
  tyvars: im::OrdSet<TyVar>,
}

impl SeqEnv {
  fn new(scope: Scope) -> Self {
    SeqEnv {
      skolems: im::Vector::new(),
      names: im::OrdMap::new(),
      scope,
      tyvars: im::OrdSet::new(),
    }
  }

  pub fn scope(&self) -> &Scope {
    &self.scope
  }

  pub fn skolems(&self) -> impl Iterator<Item = &Binder> {
    self.skolems.iter()
  }

  pub fn tyvars(&self) -> impl Iterator<Item = &TyVar> {
    self.tyvars.iter()
  }

  /// A name `_x`, `_x1`, `_x2`, .. for a skolem constant standing for a
  /// variable named `x`, unused by any meta-variable in scope.
  fn fresh_name(&mut self, base: &str) -> String {
    let mut n = self.names.get(base).copied().unwrap_or(0);
    loop {
      let cand =
        if n == 0 { format!("_{base}") } else { format!("_{base}{n}") };
      n += 1;
      if !self.scope.is_meta(&cand) {
        self.names.insert(Arc::from(base), n);
        return cand;
      }
    }
  }

  /// Introduce a skolem constant for a variable named `base` of type
  /// `ty`.
  pub(crate) fn new_skolem(&mut self, base: &str, ty: &Gtype) -> Term {
    let name = self.fresh_name(base);
    let b = Binder::fresh(Quant::Meta, &name, ty.clone());
    for v in ty.vars() {
      if ty_has_weak(ty, &v) {
        self.tyvars.insert(v);
      }
    }
    self.scope = self.scope.add_meta(b.clone());
    self.skolems.push_back(b.clone());
    Term::meta(b)
  }
}

fn ty_has_weak(ty: &Gtype, v: &TyVar) -> bool {
  use crate::kernel::gtype::GtypeData;
  match ty.as_data() {
    GtypeData::WeakVar(w) => w == v,
    GtypeData::Var(_) => false,
    GtypeData::Constr(_, args) => args.iter().any(|a| ty_has_weak(a, v)),
  }
}

pub type Tagged = (Tag, Formula);

/// A sequent `asms |- concls`. Every formula carries a tag that survives
/// changes to its position.
#[derive(Clone, Debug)]
pub struct Sequent {
  tag: Tag,
  env: SeqEnv,
  asms: Vec<Tagged>,
  concls: Vec<Tagged>,
}

/// Which side of a sequent a formula is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
  Asm,
  Concl,
}

impl Sequent {
  /// `|- concl` in `scope`.
  pub(crate) fn new(scope: Scope, concl: Formula) -> Self {
    Sequent {
      tag: Tag::fresh(),
      env: SeqEnv::new(scope),
      asms: Vec::new(),
      concls: vec![(Tag::fresh(), concl)],
    }
  }

  pub fn tag(&self) -> &Tag {
    &self.tag
  }

  pub fn env(&self) -> &SeqEnv {
    &self.env
  }

  pub fn scope(&self) -> &Scope {
    &self.env.scope
  }

  pub fn asms(&self) -> &[Tagged] {
    &self.asms
  }

  pub fn concls(&self) -> &[Tagged] {
    &self.concls
  }

  pub(crate) fn env_mut(&mut self) -> &mut SeqEnv {
    &mut self.env
  }

  /// The same sequent under a new tag.
  pub(crate) fn retagged(mut self) -> Self {
    self.tag = Tag::fresh();
    self
  }

  pub(crate) fn side(&self, side: Side) -> &[Tagged] {
    match side {
      Side::Asm => &self.asms,
      Side::Concl => &self.concls,
    }
  }

  pub(crate) fn side_mut(&mut self, side: Side) -> &mut Vec<Tagged> {
    match side {
      Side::Asm => &mut self.asms,
      Side::Concl => &mut self.concls,
    }
  }

  // ==========================================================================
  // Lookup
  // ==========================================================================

  /// Position of the formula `label` names on `side`.
  pub(crate) fn position(&self, side: Side, label: &Label) -> KResult<usize> {
    let forms = self.side(side);
    let found = match label {
      Label::Tag(t) => forms.iter().position(|(ft, _)| ft == t),
      Label::Name(n) => {
        forms.iter().position(|(ft, _)| ft.name() == Some(&**n))
      },
      Label::Index(i) => {
        let pos = match side {
          Side::Asm if *i < 0 => Some(i.unsigned_abs() - 1),
          Side::Concl if *i > 0 => Some(i.unsigned_abs() - 1),
          _ => None,
        };
        pos.filter(|&p| p < forms.len())
      },
    };
    found.ok_or_else(|| {
      let which = match side {
        Side::Asm => "assumption",
        Side::Concl => "conclusion",
      };
      KernelError::structural(format!("no {which} labelled {label}"), vec![])
    })
  }

  /// The first formula on `side` accepted by `pred`.
  pub(crate) fn find(
    &self,
    side: Side,
    pred: impl Fn(&Formula) -> bool,
  ) -> Option<usize> {
    self.side(side).iter().position(|(_, f)| pred(f))
  }

  pub fn lookup_asm(&self, label: &Label) -> KResult<&Tagged> {
    Ok(&self.asms[self.position(Side::Asm, label)?])
  }

  pub fn lookup_concl(&self, label: &Label) -> KResult<&Tagged> {
    Ok(&self.concls[self.position(Side::Concl, label)?])
  }

  /// Is some formula of the sequent tagged with the name `name`?
  pub fn is_name_used(&self, name: &str) -> bool {
    self.asms.iter().chain(&self.concls).any(|(t, _)| t.name() == Some(name))
  }
}
