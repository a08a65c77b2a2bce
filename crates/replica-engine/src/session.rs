//! Clone session
//!
//! One session lives for exactly one top-level clone call. It maps every
//! source reference instance to its clone so that shared references stay
//! shared and cycles terminate.

use replica_model::{Identity, Value};
use std::collections::HashMap;

/// Counters gathered during one clone call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Distinct reference instances cloned
    pub tracked_references: usize,
    /// Strategy executions that produced a new clone
    pub strategies_executed: usize,
    /// Listener notifications delivered
    pub listener_invocations: usize,
    /// Deepest strategy nesting reached
    pub max_depth: usize,
}

#[derive(Debug)]
struct Tracked {
    // Holding the source keeps its identity from being reused mid-session
    _source: Value,
    clone: Value,
}

/// Source-to-clone identity map for one clone call
#[derive(Debug, Default)]
pub struct CloneSession {
    tracked: HashMap<Identity, Tracked>,
    stats: SessionStats,
}

impl CloneSession {
    /// Create empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone already made for `source`, if any
    #[must_use]
    pub fn try_get_clone(&self, source: &Value) -> Option<Value> {
        let identity = source.reference_identity()?;
        self.tracked.get(&identity).map(|t| t.clone.clone())
    }

    /// Remember the clone of a reference instance
    ///
    /// Values without reference identity are ignored.
    pub fn record(&mut self, source: &Value, clone: Value) {
        if let Some(identity) = source.reference_identity() {
            self.tracked.insert(
                identity,
                Tracked {
                    _source: source.clone(),
                    clone,
                },
            );
        }
    }

    /// Number of tracked instances
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Whether nothing is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            tracked_references: self.tracked.len(),
            ..self.stats
        }
    }

    pub(crate) fn stats_mut(&mut self) -> &mut SessionStats {
        &mut self.stats
    }
}
