//! Tags: stable names for formulas and sequents.

use std::{
  cmp::Ordering,
  fmt,
  hash::{Hash, Hasher},
  sync::Arc,
};

use crate::kernel::ids::fresh_id;

#[derive(Debug)]
struct TagData {
  id: u64,
  name: Option<Arc<str>>,
}

/// An opaque identifier. Tags compare by identity only; the optional name
/// is for display and for lookup by the user.
#[derive(Clone, Debug)]
pub struct Tag(Arc<TagData>);

impl Tag {
  pub fn fresh() -> Self {
    Tag(Arc::new(TagData { id: fresh_id(), name: None }))
  }

  pub fn named(name: &str) -> Self {
    Tag(Arc::new(TagData { id: fresh_id(), name: Some(Arc::from(name)) }))
  }

  pub fn id(&self) -> u64 {
    self.0.id
  }

  pub fn name(&self) -> Option<&str> {
    self.0.name.as_deref()
  }
}

impl PartialEq for Tag {
  fn eq(&self, other: &Self) -> bool {
    self.0.id == other.0.id
  }
}

impl Eq for Tag {}

impl Hash for Tag {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.0.id.hash(state);
  }
}

impl PartialOrd for Tag {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Tag {
  fn cmp(&self, other: &Self) -> Ordering {
    self.0.id.cmp(&other.0.id)
  }
}

impl fmt::Display for Tag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.name() {
      Some(n) => write!(f, "{n}"),
      None => write!(f, "#{}", self.0.id),
    }
  }
}

/// How a tactic addresses a formula of a sequent.
///
/// Indices follow the sequent layout: assumptions are numbered `-1, -2,
/// ..` and conclusions `1, 2, ..`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Label {
  Tag(Tag),
  Name(Arc<str>),
  Index(isize),
}

impl From<Tag> for Label {
  fn from(t: Tag) -> Self {
    Label::Tag(t)
  }
}

impl From<&Tag> for Label {
  fn from(t: &Tag) -> Self {
    Label::Tag(t.clone())
  }
}

impl From<&str> for Label {
  fn from(n: &str) -> Self {
    Label::Name(Arc::from(n))
  }
}

impl From<isize> for Label {
  fn from(i: isize) -> Self {
    Label::Index(i)
  }
}

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Label::Tag(t) => write!(f, "{t}"),
      Label::Name(n) => write!(f, "{n}"),
      Label::Index(i) => write!(f, "{i}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tags_compare_by_identity() {
    let a = Tag::named("h");
    let b = Tag::named("h");
    assert_ne!(a, b);
    assert_eq!(a, a.clone());
    assert_eq!(a.name(), Some("h"));
    assert!(Tag::fresh().name().is_none());
  }

  #[test]
  fn labels_convert() {
    let t = Tag::fresh();
    assert_eq!(Label::from(&t), Label::Tag(t.clone()));
    assert_eq!(Label::from("h"), Label::Name(Arc::from("h")));
    assert_eq!(Label::from(-1), Label::Index(-1));
    assert_eq!(Label::from(3).to_string(), "3");
  }
}
