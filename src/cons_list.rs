use std::sync::Arc;

/// A persistent, shared-tail list.
///
/// Used for binder contexts: the innermost binder is at the head, so the
/// position of a binder is its de Bruijn index.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ConsList<T> {
  Nil,
  Cons(T, Arc<ConsList<T>>, usize),
}

impl<T> Default for ConsList<T> {
  fn default() -> Self {
    ConsList::Nil
  }
}

struct ConsListIter<'a, T>(&'a ConsList<T>);

impl<'a, T> Iterator for ConsListIter<'a, T> {
  type Item = &'a T;
  fn next(&mut self) -> Option<Self::Item> {
    match self.0 {
      ConsList::Nil => None,
      ConsList::Cons(t, tail, _) => {
        self.0 = tail.as_ref();
        Some(t)
      },
    }
  }
}

impl<T> ConsList<T> {
  pub fn new() -> Self {
    ConsList::Nil
  }

  /// A new list with `t` in front; `self` is unchanged.
  #[inline]
  pub fn cons(&self, t: T) -> Self
  where
    T: Clone,
  {
    match self {
      Self::Nil => Self::Cons(t, Arc::new(Self::Nil), 1),
      Self::Cons(.., len) => Self::Cons(t, Arc::new(self.clone()), len + 1),
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    match self {
      Self::Nil => 0,
      Self::Cons(.., len) => *len,
    }
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    matches!(self, Self::Nil)
  }

  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    ConsListIter(self)
  }

  #[inline]
  pub fn get(&self, idx: usize) -> Option<&T> {
    self.iter().nth(idx)
  }

  #[inline]
  pub fn contains(&self, t: &T) -> bool
  where
    T: PartialEq,
  {
    self.iter().any(|x| x == t)
  }

  /// Position from the head of the first element equal to `t`.
  #[inline]
  pub fn index_of(&self, t: &T) -> Option<usize>
  where
    T: PartialEq,
  {
    self.iter().position(|x| x == t)
  }

  /// The first element (innermost, for binder contexts) satisfying `pred`.
  #[inline]
  pub fn find<P>(&self, pred: P) -> Option<&T>
  where
    P: FnMut(&&T) -> bool,
  {
    self.iter().find(pred)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_list() {
    let list: ConsList<i32> = ConsList::new();
    assert!(list.is_empty());
    assert_eq!(list.len(), 0);
    assert!(list.iter().next().is_none());
  }

  #[test]
  fn cons_shares_tail() {
    let base = ConsList::new().cons(1).cons(2);
    let left = base.cons(3);
    let right = base.cons(4);
    assert_eq!(base.len(), 2);
    assert_eq!(left.iter().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
    assert_eq!(right.iter().copied().collect::<Vec<_>>(), vec![4, 2, 1]);
  }

  #[test]
  fn index_of_is_innermost_position() {
    let list = ConsList::new().cons("x").cons("y").cons("x");
    assert_eq!(list.index_of(&"x"), Some(0));
    assert_eq!(list.index_of(&"y"), Some(1));
    assert_eq!(list.index_of(&"z"), None);
    assert_eq!(list.get(2), Some(&"x"));
  }

  #[test]
  fn find_pairs() {
    let list = ConsList::new().cons((1, 'a')).cons((2, 'b'));
    assert_eq!(list.find(|(k, _)| *k == 1), Some(&(1, 'a')));
    assert!(list.contains(&(2, 'b')));
    assert!(!list.contains(&(2, 'a')));
  }
}
