//! Conflict order: the deterministic tie-break between competing policies.

use std::borrow::Borrow;
use std::cmp::Ordering;

use crate::schema::Policy;

/// Which key leads the comparison. Both variants fall through to the other
/// key, then to non-special before special. Sorting is stable, so remaining
/// ties keep catalog-encounter order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOrder {
    /// Priority descending, then level descending, then non-special first.
    Priority,
    /// Level descending, then priority descending, then non-special first.
    Level,
}

impl ConflictOrder {
    pub fn compare(self, a: &Policy, b: &Policy) -> Ordering {
        let by_priority = b.priority.cmp(&a.priority);
        let by_level = b.level.cmp(&a.level);
        // false < true, so non-special sorts first.
        let by_special = a.special.cmp(&b.special);
        match self {
            ConflictOrder::Priority => by_priority.then(by_level).then(by_special),
            ConflictOrder::Level => by_level.then(by_priority).then(by_special),
        }
    }

    /// Stable in-place sort, most authoritative first.
    pub fn sort<P: Borrow<Policy>>(self, policies: &mut [P]) {
        policies.sort_by(|a, b| self.compare(a.borrow(), b.borrow()));
    }
}
