//! Engine configuration

use serde::{Deserialize, Serialize};

/// Clone engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nesting of strategy executions in one clone call
    ///
    /// `None` leaves recursion bounded only by the graph (and the stack).
    pub max_depth: Option<usize>,

    /// Reject values whose runtime type is not assignable to the declared type
    pub verify_assignability: bool,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With recursion limit
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// With assignability verification on or off
    #[inline]
    #[must_use]
    pub fn with_verify_assignability(mut self, verify: bool) -> Self {
        self.verify_assignability = verify;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            verify_assignability: true,
        }
    }
}
