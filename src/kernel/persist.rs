//! Stored forms of types, terms, formulas and theorems.
//!
//! A stored form is independent of any scope: bound variables are
//! de Bruijn indices, type variables are numbered by first occurrence
//! and meta-variables are kept by name. Loading allocates fresh binders
//! and type variables, and formulas are admitted again against the scope
//! they are loaded into. A loaded theorem is an axiom of that scope: the
//! stored kind is a record of where it came from, not a proof.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cons_list::ConsList;

use super::error::{ErrorKind, KResult, KernelError, ResultExt};
use super::formula::Formula;
use super::gtype::{Gtype, GtypeData, TyVar};
use super::ident::Ident;
use super::logic::{Thm, ThmKind};
use super::scope::Scope;
use super::term::{Binder, Const, Quant, Term, TermData};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredType {
  /// An ordinary type variable: its number and its name.
  Var(usize, String),
  Weak(usize, String),
  Constr(Ident, Vec<StoredType>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredTerm {
  Id(Ident, StoredType),
  Free(String, StoredType),
  /// De Bruijn index of the binding quantifier.
  Var(usize),
  /// A meta-variable, found by name in the scope on load.
  Meta(String, StoredType),
  App(Box<StoredTerm>, Box<StoredTerm>),
  Qnt(Quant, String, StoredType, Box<StoredTerm>),
  Const(Const),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFormula {
  pub thy: String,
  pub term: StoredTerm,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredThm {
  pub kind: ThmKind,
  pub formula: StoredFormula,
}

fn persist_error(msg: impl Into<String>, terms: Vec<Term>) -> KernelError {
  KernelError::terms(ErrorKind::Persist, msg, terms)
}

// ============================================================================
// Types
// ============================================================================

/// Numbering of type variables while saving.
#[derive(Default)]
pub struct TypeNumbering(FxHashMap<TyVar, usize>);

impl TypeNumbering {
  fn number(&mut self, v: &TyVar) -> usize {
    let next = self.0.len();
    *self.0.entry(v.clone()).or_insert(next)
  }
}

/// Type variables allocated while loading.
#[derive(Default)]
pub struct TypeTable(FxHashMap<usize, TyVar>);

impl TypeTable {
  fn var(&mut self, n: usize, name: &str) -> TyVar {
    self.0.entry(n).or_insert_with(|| TyVar::fresh(name)).clone()
  }
}

pub fn save_type(nums: &mut TypeNumbering, ty: &Gtype) -> StoredType {
  match ty.as_data() {
    GtypeData::Var(v) => StoredType::Var(nums.number(v), v.name().to_string()),
    GtypeData::WeakVar(v) => {
      StoredType::Weak(nums.number(v), v.name().to_string())
    },
    GtypeData::Constr(id, args) => StoredType::Constr(
      id.clone(),
      args.iter().map(|a| save_type(nums, a)).collect(),
    ),
  }
}

pub fn load_type(table: &mut TypeTable, ty: &StoredType) -> Gtype {
  match ty {
    StoredType::Var(n, name) => Gtype::of_var(table.var(*n, name)),
    StoredType::Weak(n, name) => Gtype::of_weak(table.var(*n, name)),
    StoredType::Constr(id, args) => Gtype::constr(
      id.clone(),
      args.iter().map(|a| load_type(table, a)).collect(),
    ),
  }
}

// ============================================================================
// Terms
// ============================================================================

fn save_term_with(
  nums: &mut TypeNumbering,
  ctx: &ConsList<Binder>,
  t: &Term,
) -> KResult<StoredTerm> {
  Ok(match t.as_data() {
    TermData::Id(id, ty) => StoredTerm::Id(id.clone(), save_type(nums, ty)),
    TermData::Free(name, ty) => {
      StoredTerm::Free(name.to_string(), save_type(nums, ty))
    },
    TermData::Bound(b) => match ctx.index_of(b) {
      Some(i) => StoredTerm::Var(i),
      None => {
        return Err(persist_error("unbound variable", vec![t.clone()]));
      },
    },
    TermData::Meta(b) => {
      StoredTerm::Meta(b.name().to_string(), save_type(nums, b.ty()))
    },
    TermData::App(f, a) => StoredTerm::App(
      Box::new(save_term_with(nums, ctx, f)?),
      Box::new(save_term_with(nums, ctx, a)?),
    ),
    TermData::Qnt(b, body) => {
      let ty = save_type(nums, b.ty());
      let body = save_term_with(nums, &ctx.cons(b.clone()), body)?;
      StoredTerm::Qnt(b.quant(), b.name().to_string(), ty, Box::new(body))
    },
    TermData::Const(c) => StoredTerm::Const(c.clone()),
  })
}

fn load_term_with(
  scope: &Scope,
  table: &mut TypeTable,
  ctx: &ConsList<Binder>,
  t: &StoredTerm,
) -> KResult<Term> {
  Ok(match t {
    StoredTerm::Id(id, ty) => Term::id(id.clone(), load_type(table, ty)),
    StoredTerm::Free(name, ty) => Term::free(name, load_type(table, ty)),
    StoredTerm::Var(i) => match ctx.get(*i) {
      Some(b) => Term::bound(b.clone()),
      None => {
        let msg = format!("variable index {i} out of range");
        return Err(persist_error(msg, vec![]));
      },
    },
    StoredTerm::Meta(name, ty) => match scope.find_meta(name) {
      Some(b) => {
        let mut nums = TypeNumbering::default();
        if save_type(&mut nums, b.ty()) != *ty {
          let msg = format!(
            "meta-variable {name} is stored at a type other than {}",
            b.ty()
          );
          return Err(persist_error(msg, vec![Term::meta(b.clone())]));
        }
        Term::meta(b.clone())
      },
      None => {
        let msg = format!("unknown meta-variable {name}");
        return Err(persist_error(msg, vec![]));
      },
    },
    StoredTerm::App(f, a) => Term::app(
      load_term_with(scope, table, ctx, f)?,
      load_term_with(scope, table, ctx, a)?,
    ),
    StoredTerm::Qnt(q, name, ty, body) => {
      let b = Binder::fresh(*q, name, load_type(table, ty));
      let body = load_term_with(scope, table, &ctx.cons(b.clone()), body)?;
      Term::qnt(b, body)
    },
    StoredTerm::Const(c) => Term::cnst(c.clone()),
  })
}

/// The stored form of `t`. Bound variables outside their quantifier
/// cannot be stored.
pub fn save_term(t: &Term) -> KResult<StoredTerm> {
  save_term_with(&mut TypeNumbering::default(), &ConsList::new(), t)
}

/// Rebuild a term from its stored form. Meta-variables are looked up by
/// name in `scope`.
pub fn load_term(scope: &Scope, t: &StoredTerm) -> KResult<Term> {
  load_term_with(scope, &mut TypeTable::default(), &ConsList::new(), t)
}

// ============================================================================
// Formulas and theorems
// ============================================================================

impl Formula {
  pub fn to_save(&self) -> KResult<StoredFormula> {
    Ok(StoredFormula { thy: self.thy().to_string(), term: save_term(self.term())? })
  }

  /// Load a formula and admit it again in `scope`, which must see the
  /// formula's theory.
  pub fn from_save(scope: &Scope, f: &StoredFormula) -> KResult<Formula> {
    if !scope.thy_in_scope(&f.thy) {
      return Err(persist_error(
        format!("theory {} is not in scope", f.thy),
        vec![],
      ));
    }
    let t = load_term(scope, &f.term)?;
    Formula::make_open(scope, &t).context("loading formula")
  }
}

impl Thm {
  pub fn to_save(&self) -> KResult<StoredThm> {
    Ok(StoredThm { kind: self.kind(), formula: self.formula().to_save()? })
  }

  /// Load a stored theorem as an axiom of `scope`.
  pub fn from_save(scope: &Scope, thm: &StoredThm) -> KResult<Thm> {
    let formula = Formula::from_save(scope, &thm.formula)?;
    Ok(Thm::mk_axiom(formula))
  }
}
