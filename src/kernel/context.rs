//! A scope together with a cache of proved theorems.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::error::{KResult, ResultExt};
use super::ident::Ident;
use super::logic::Thm;
use super::scope::Scope;

#[derive(Clone, Debug)]
pub struct Context {
  scope: Scope,
  thms: FxHashMap<Ident, Thm>,
}

impl Context {
  pub fn new(scope: Scope) -> Self {
    Context { scope, thms: FxHashMap::default() }
  }

  pub fn scope(&self) -> &Scope {
    &self.scope
  }

  /// Replace the scope. Cached theorems are checked against the new
  /// scope when next looked up.
  pub fn set_scope(&mut self, scope: Scope) {
    self.scope = scope;
  }

  /// The cached theorem `id`, if it is still valid in the current scope.
  /// A stale entry is dropped.
  pub fn lookup_thm(&mut self, id: &Ident) -> Option<Thm> {
    let thm = self.thms.get(id)?;
    if thm.is_valid(&self.scope) {
      return Some(thm.clone());
    }
    warn!(%id, "evicting stale theorem");
    self.thms.remove(id);
    None
  }

  pub fn cache_thm(&mut self, id: Ident, thm: Thm) {
    debug!(%id, "caching theorem");
    self.thms.insert(id, thm);
  }

  /// The theorem `id`, proved by `prover` unless a valid copy is cached.
  pub fn lemma<F>(&mut self, id: &Ident, prover: F) -> KResult<Thm>
  where
    F: FnOnce(&Scope) -> KResult<Thm>,
  {
    if let Some(thm) = self.lookup_thm(id) {
      return Ok(thm);
    }
    let thm = prover(&self.scope).with_context(|| format!("proving {id}"))?;
    self.cache_thm(id.clone(), thm.clone());
    Ok(thm)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::formula::Formula;
  use crate::kernel::lterm::mk_true;
  use std::cell::Cell;

  fn truth(scp: &Scope) -> KResult<Thm> {
    Ok(Thm::mk_axiom(Formula::make(scp, &mk_true())?))
  }

  #[test]
  fn lemmas_are_memoised() {
    let scp = Scope::base().open_theory("ctx").unwrap();
    let mut ctx = Context::new(scp);
    let id = Ident::new("ctx", "truth");
    let calls = Cell::new(0);
    let prove = |s: &Scope| {
      calls.set(calls.get() + 1);
      truth(s)
    };
    ctx.lemma(&id, prove).unwrap();
    ctx.lemma(&id, prove).unwrap();
    assert_eq!(calls.get(), 1);
    assert!(ctx.lookup_thm(&id).is_some());
  }

  #[test]
  fn stale_theorems_are_evicted() {
    let scp = Scope::base().open_theory("ctx").unwrap();
    let mut ctx = Context::new(scp.clone());
    let id = Ident::new("ctx", "truth");
    ctx.cache_thm(id.clone(), truth(&scp).unwrap());
    ctx.set_scope(scp.reload_theory("ctx").unwrap());
    assert!(ctx.lookup_thm(&id).is_none());
    let thm = ctx.lemma(&id, truth).unwrap();
    assert!(thm.is_valid(ctx.scope()));
  }

  #[test]
  fn failed_proofs_are_not_cached() {
    let mut ctx = Context::new(Scope::base());
    let id = Ident::base("bogus");
    let err = ctx.lemma(&id, |s| {
      Ok(Thm::mk_axiom(Formula::make(s, &crate::kernel::term::Term::mk_num(1))?))
    });
    assert!(err.is_err());
    assert!(ctx.lookup_thm(&id).is_none());
  }
}
