//! Per-field clone behaviors
//!
//! A field filter maps a field to a [`Behavior`]. Filters are consulted
//! once per field when a type's strategy is compiled; the first filter that
//! answers anything other than [`Behavior::Clone`] decides.

use parking_lot::RwLock;
use replica_model::FieldDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How a single field is treated during cloning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Behavior {
    /// Deep-clone the field value (default)
    #[default]
    Clone,
    /// Copy the source value as-is, sharing any referenced instance
    CopyValue,
    /// Leave whatever allocation or construction put there
    DoNotInitialize,
    /// Set the field type's zero/default value
    AssignDefault,
}

/// Field filter rule
pub type FieldFilter = Arc<dyn Fn(&FieldDescriptor) -> Behavior + Send + Sync>;

/// Ordered set of field filters
#[derive(Default)]
pub struct FieldFilterRegistry {
    rules: RwLock<Vec<FieldFilter>>,
}

impl FieldFilterRegistry {
    /// Create empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule
    pub fn register(&self, rule: impl Fn(&FieldDescriptor) -> Behavior + Send + Sync + 'static) {
        self.rules.write().push(Arc::new(rule));
    }

    /// Behavior for a field
    ///
    /// Rules run outside the lock, so a rule may register further rules.
    #[must_use]
    pub fn resolve(&self, field: &FieldDescriptor) -> Behavior {
        let rules = self.rules.read().clone();
        rules
            .iter()
            .map(|rule| rule(field))
            .find(|behavior| *behavior != Behavior::Clone)
            .unwrap_or_default()
    }

    /// Number of registered rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    /// Whether no rule is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

impl fmt::Debug for FieldFilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldFilterRegistry")
            .field("rules", &self.len())
            .finish()
    }
}
