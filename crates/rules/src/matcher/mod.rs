//! Two-phase matching and conflict resolution.
//!
//! The basic phase evaluates every enabled basic policy against the fact
//! environment of one statement. The aggregate phase evaluates aggregate
//! policies over the ids that matched. Resolution picks one decisive
//! aggregate and, from it, the verdict policy.

mod engine;
mod order;

pub use engine::{facts, resolve, MatchError, MatchOutcome, Matcher};
pub use order::ConflictOrder;
