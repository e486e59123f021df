use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Name of the theory holding the built-in types and connectives.
pub const BASE_THY: &str = "base";

/// A global identifier: a name qualified by the theory declaring it.
#[derive(
  Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize,
)]
pub struct Ident {
  thy: Arc<str>,
  name: Arc<str>,
}

impl Ident {
  pub fn new(thy: &str, name: &str) -> Self {
    Ident { thy: Arc::from(thy), name: Arc::from(name) }
  }

  /// An identifier in the base theory.
  pub fn base(name: &str) -> Self {
    Ident::new(BASE_THY, name)
  }

  pub fn thy(&self) -> &str {
    &self.thy
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl fmt::Display for Ident {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.thy.is_empty() {
      write!(f, "{}", self.name)
    } else {
      write!(f, "{}.{}", self.thy, self.name)
    }
  }
}

// ============================================================================
// Base identifiers
// ============================================================================

pub fn fun_ident() -> Ident {
  Ident::base("fun")
}

pub fn bool_ident() -> Ident {
  Ident::base("bool")
}

pub fn num_ident() -> Ident {
  Ident::base("num")
}

pub fn not_ident() -> Ident {
  Ident::base("not")
}

pub fn and_ident() -> Ident {
  Ident::base("and")
}

pub fn or_ident() -> Ident {
  Ident::base("or")
}

pub fn implies_ident() -> Ident {
  Ident::base("implies")
}

pub fn iff_ident() -> Ident {
  Ident::base("iff")
}

pub fn equals_ident() -> Ident {
  Ident::base("equals")
}
