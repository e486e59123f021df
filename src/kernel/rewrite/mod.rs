//! Plan-based rewriting: the generic engine and its term instantiation.

pub mod engine;
pub mod plan;
pub mod term_rw;

pub use engine::{Control, Rewriter, Signal, Strategy};
pub use plan::Plan;
pub use term_rw::{Key, Order, RewriteRule, TermPlan, TermRewriter};
