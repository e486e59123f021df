use std::fmt::Write as _;

use super::gtype::Gtype;
use super::term::Term;

pub type KResult<T> = Result<T, KernelError>;

/// Classification of a kernel failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Formula construction: unknown identifier, open term, out-of-scope
  /// theory marker.
  Scope,
  /// Ill-typed term or ill-formed type.
  Type,
  /// Unification or matching failed.
  Unify,
  /// A variable would be bound to a value containing itself.
  Occurs,
  /// A tactic was applied to the wrong kind of formula, an unknown
  /// label, or a colliding name.
  Structural,
  /// A rewrite plan could not be built or replayed.
  Rewrite,
  /// A theorem's theory marker is no longer valid.
  Stale,
  /// A stored value could not be reloaded.
  Persist,
}

fn fmt_terms(terms: &[Term]) -> String {
  let mut out = String::new();
  for t in terms {
    let _ = write!(out, "\n  {t}");
  }
  out
}

fn fmt_types(types: &[Gtype]) -> String {
  let mut out = String::new();
  for t in types {
    let _ = write!(out, "\n  {t}");
  }
  out
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum KernelError {
  #[error("{msg}{}", fmt_terms(terms))]
  Term { kind: ErrorKind, msg: String, terms: Vec<Term> },
  #[error("{msg}{}", fmt_types(types))]
  Type { kind: ErrorKind, msg: String, types: Vec<Gtype> },
  #[error("occurs check: {var} occurs in {ty}")]
  Occurs { var: Gtype, ty: Gtype },
  #[error("occurs check: {var} occurs in {term}")]
  TermOccurs { var: Term, term: Term },
  #[error("{msg}: {source}")]
  Context {
    msg: String,
    #[source]
    source: Box<KernelError>,
  },
}

impl KernelError {
  pub fn terms(kind: ErrorKind, msg: impl Into<String>, terms: Vec<Term>) -> Self {
    KernelError::Term { kind, msg: msg.into(), terms }
  }

  pub fn types(kind: ErrorKind, msg: impl Into<String>, types: Vec<Gtype>) -> Self {
    KernelError::Type { kind, msg: msg.into(), types }
  }

  pub fn scope(msg: impl Into<String>, terms: Vec<Term>) -> Self {
    Self::terms(ErrorKind::Scope, msg, terms)
  }

  pub fn structural(msg: impl Into<String>, terms: Vec<Term>) -> Self {
    Self::terms(ErrorKind::Structural, msg, terms)
  }

  pub fn unify(msg: impl Into<String>, terms: Vec<Term>) -> Self {
    Self::terms(ErrorKind::Unify, msg, terms)
  }

  pub fn type_error(msg: impl Into<String>, types: Vec<Gtype>) -> Self {
    Self::types(ErrorKind::Type, msg, types)
  }

  pub fn rewrite(msg: impl Into<String>, terms: Vec<Term>) -> Self {
    Self::terms(ErrorKind::Rewrite, msg, terms)
  }

  /// Wrap this error with the description of the calling operation.
  pub fn context(self, msg: impl Into<String>) -> Self {
    KernelError::Context { msg: msg.into(), source: Box::new(self) }
  }

  /// The innermost error of a context chain.
  pub fn root(&self) -> &KernelError {
    let mut err = self;
    while let KernelError::Context { source, .. } = err {
      err = source;
    }
    err
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      KernelError::Term { kind, .. } | KernelError::Type { kind, .. } => *kind,
      KernelError::Occurs { .. } | KernelError::TermOccurs { .. } => {
        ErrorKind::Occurs
      },
      KernelError::Context { source, .. } => source.kind(),
    }
  }

  /// Unification and occurs-check failures are control signals: a caller
  /// may try an alternative. Everything else is fatal to the operation.
  pub fn is_recoverable(&self) -> bool {
    matches!(self.kind(), ErrorKind::Unify | ErrorKind::Occurs)
  }
}

/// Attach context to the error of a kernel result.
pub trait ResultExt<T> {
  fn context(self, msg: impl Into<String>) -> KResult<T>;

  fn with_context<F, S>(self, f: F) -> KResult<T>
  where
    F: FnOnce() -> S,
    S: Into<String>;
}

impl<T> ResultExt<T> for KResult<T> {
  fn context(self, msg: impl Into<String>) -> KResult<T> {
    self.map_err(|e| e.context(msg))
  }

  fn with_context<F, S>(self, f: F) -> KResult<T>
  where
    F: FnOnce() -> S,
    S: Into<String>,
  {
    self.map_err(|e| e.context(f()))
  }
}
