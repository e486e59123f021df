//! Fresh identifier supply.
//!
//! Binder records, type variables and formula tags are compared by
//! identity. Each identity is a number drawn from a single process-wide
//! counter, so two values built independently never compare equal.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Draw a fresh, never before returned identifier.
pub fn fresh_id() -> u64 {
  NEXT_ID.fetch_add(1, Ordering::Relaxed)
}
