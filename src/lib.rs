//! A sequent-calculus kernel for higher-order logic.

pub mod cons_list;
pub mod kernel;
