//! Instance identities.
//!
//! Every component held by an [`Own`](crate::handle::Own) carries an
//! [`InstanceId`]. The id is what a document records as a node's `address`,
//! what the output stream's visited set is keyed by, and what a
//! [`Weak`](crate::handle::Weak) reference stores in place of a pointer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Next id handed out by [`InstanceId::fresh`]. Zero is never allocated.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// InstanceId
// ---------------------------------------------------------------------------

/// A process-unique identity for one component instance.
///
/// Ids are never reused within a process, so two live handles can only
/// share an id if one was explicitly rewrapped with
/// [`Own::with_id`](crate::handle::Own::with_id).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Allocate a new identity.
    pub fn fresh() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw `u64` representation (the document `address`).
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct_and_nonzero() {
        let a = InstanceId::fresh();
        let b = InstanceId::fresh();
        assert_ne!(a, b);
        assert_ne!(a.to_raw(), 0);
        assert_ne!(b.to_raw(), 0);
    }

    #[test]
    fn raw_roundtrip() {
        let id = InstanceId::fresh();
        assert_eq!(InstanceId::from_raw(id.to_raw()), id);
    }

    #[test]
    fn debug_and_display() {
        let id = InstanceId::from_raw(42);
        assert_eq!(format!("{id:?}"), "InstanceId(42)");
        assert_eq!(format!("{id}"), "#42");
    }
}
