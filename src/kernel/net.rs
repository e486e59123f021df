//! Term discrimination nets.
//!
//! A net is a trie over the preorder key path of a term. Each key records
//! the outer shape of one subterm; a pattern variable is a single `Var`
//! key that stands for a whole subterm. Lookup walks the target once and
//! returns every item whose pattern might match it, most specific first.
//! The net only narrows the search: the exact matcher still decides.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::ident::Ident;
use super::term::{Binder, Const, Quant, Term, TermData};

/// The outer shape of a subterm.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum NetKey {
  Var,
  App,
  Bound(Quant),
  Quant(Quant),
  Const(Const),
  Ident(Ident),
  Free(Arc<str>),
  Meta(Binder),
}

fn key_of(varp: &dyn Fn(&Term) -> bool, t: &Term) -> NetKey {
  if varp(t) {
    return NetKey::Var;
  }
  match t.as_data() {
    TermData::App(..) => NetKey::App,
    TermData::Bound(b) => NetKey::Bound(b.quant()),
    TermData::Qnt(b, _) => NetKey::Quant(b.quant()),
    TermData::Const(c) => NetKey::Const(c.clone()),
    TermData::Id(id, _) => NetKey::Ident(id.clone()),
    TermData::Free(n, _) => NetKey::Free(n.clone()),
    TermData::Meta(b) => NetKey::Meta(b.clone()),
  }
}

/// Subterms examined after `t`, in the order they are visited.
fn children(t: &Term) -> Vec<&Term> {
  match t.as_data() {
    TermData::App(f, a) => vec![f, a],
    TermData::Qnt(_, body) => vec![body],
    _ => vec![],
  }
}

/// The preorder key path of a pattern.
fn key_path(varp: &dyn Fn(&Term) -> bool, t: &Term) -> Vec<NetKey> {
  fn go(varp: &dyn Fn(&Term) -> bool, t: &Term, acc: &mut Vec<NetKey>) {
    let key = key_of(varp, t);
    let is_var = key == NetKey::Var;
    acc.push(key);
    if !is_var {
      children(t).into_iter().for_each(|c| go(varp, c, acc));
    }
  }
  let mut acc = Vec::new();
  go(varp, t, &mut acc);
  acc
}

#[derive(Clone, Debug)]
pub struct Net<T> {
  items: Vec<T>,
  var_branch: Option<Box<Net<T>>>,
  branches: FxHashMap<NetKey, Net<T>>,
}

impl<T> Default for Net<T> {
  fn default() -> Self {
    Net { items: Vec::new(), var_branch: None, branches: FxHashMap::default() }
  }
}

impl<T> Net<T> {
  pub fn new() -> Self {
    Net::default()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
      && self.var_branch.is_none()
      && self.branches.is_empty()
  }

  /// Number of stored items.
  pub fn len(&self) -> usize {
    self.items.len()
      + self.var_branch.as_ref().map_or(0, |v| v.len())
      + self.branches.values().map(Net::len).sum::<usize>()
  }

  fn child_mut(&mut self, key: &NetKey) -> &mut Net<T> {
    match key {
      NetKey::Var => &mut **self.var_branch.get_or_insert_with(Box::default),
      _ => self.branches.entry(key.clone()).or_default(),
    }
  }

  /// Apply `f` to the items stored under `pattern`, creating the path if
  /// needed and pruning it if it ends up empty.
  pub fn update(
    &mut self,
    varp: &dyn Fn(&Term) -> bool,
    pattern: &Term,
    f: impl FnOnce(&mut Vec<T>),
  ) {
    let path = key_path(varp, pattern);
    self.update_path(&path, f);
  }

  fn update_path(&mut self, path: &[NetKey], f: impl FnOnce(&mut Vec<T>)) {
    match path.split_first() {
      None => f(&mut self.items),
      Some((key, rest)) => {
        let child = self.child_mut(key);
        child.update_path(rest, f);
        if child.is_empty() {
          match key {
            NetKey::Var => self.var_branch = None,
            _ => {
              self.branches.remove(key);
            },
          }
        }
      },
    }
  }

  pub fn add(&mut self, varp: &dyn Fn(&Term) -> bool, pattern: &Term, item: T) {
    self.update(varp, pattern, |items| items.push(item));
  }

  /// Remove the items under `pattern` accepted by `pred`.
  pub fn delete(
    &mut self,
    varp: &dyn Fn(&Term) -> bool,
    pattern: &Term,
    pred: impl Fn(&T) -> bool,
  ) {
    self.update(varp, pattern, |items| items.retain(|i| !pred(i)));
  }

  /// Items whose pattern may match `t`. Concrete structure is tried
  /// before variables, so deeper matches come first.
  pub fn lookup(&self, t: &Term) -> Vec<&T> {
    let mut acc = Vec::new();
    self.lookup_aux(vec![t], &mut acc);
    acc
  }

  /// `pending` holds the subterms still to visit, next one last.
  fn lookup_aux<'a>(&'a self, pending: Vec<&Term>, acc: &mut Vec<&'a T>) {
    let mut rest = pending;
    let Some(t) = rest.pop() else {
      acc.extend(self.items.iter());
      return;
    };
    if let Some(child) = self.branches.get(&key_of(&|_| false, t)) {
      let mut next = rest.clone();
      next.extend(children(t).into_iter().rev());
      child.lookup_aux(next, acc);
    }
    if let Some(var) = &self.var_branch {
      var.lookup_aux(rest, acc);
    }
  }
}
