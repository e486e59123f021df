//! The logical kernel.
//!
//! Types, terms and their unification sit at the bottom; `formula` is the
//! admission gate into the logic; `logic` holds sequents, goals and the
//! primitive tactics, the only way to build a `Thm` besides asserting an
//! axiom.

pub mod context;
pub mod error;
pub mod formula;
pub mod gtype;
pub mod ident;
pub mod ids;
pub mod logic;
pub mod lterm;
pub mod net;
pub mod persist;
pub mod rewrite;
pub mod scope;
pub mod term;
pub mod typing;
pub mod unify;
