//! Clone listeners
//!
//! Listeners are notified once per freshly cloned instance, after its fields
//! have been populated. They receive the live [`CloneContext`] so that they
//! can clone side data within the same session and keep shared identity.
//!
//! Value-type clones go to [`ValueListener`]s, which may replace the
//! destination. Reference-type clones go to [`ReferenceListener`]s. A value
//! listener is also notified for reference-type clones; any reassignment it
//! makes there is discarded.

use crate::engine::CloneContext;
use parking_lot::RwLock;
use replica_model::Value;
use std::fmt;
use std::sync::Arc;

/// Notified after a reference-type instance was cloned
pub trait ReferenceListener: Send + Sync {
    /// Observe the source and its clone
    fn on_clone(&self, cx: &mut CloneContext<'_>, source: &Value, destination: &Value);
}

/// Notified after a value-type instance was cloned
pub trait ValueListener: Send + Sync {
    /// Observe the source and optionally replace the clone
    fn decorate(&self, cx: &mut CloneContext<'_>, source: &Value, destination: &mut Value);
}

/// Listener registration
#[derive(Clone)]
pub enum Listener {
    /// Reference-type notifications only
    Reference(Arc<dyn ReferenceListener>),
    /// Value-type notifications, plus reference-type ones without reassignment
    Value(Arc<dyn ValueListener>),
}

impl Listener {
    /// Wrap a reference listener
    #[must_use]
    pub fn reference(listener: impl ReferenceListener + 'static) -> Self {
        Self::Reference(Arc::new(listener))
    }

    /// Wrap a value listener
    #[must_use]
    pub fn value(listener: impl ValueListener + 'static) -> Self {
        Self::Value(Arc::new(listener))
    }

    /// Reference listener from a closure
    #[must_use]
    pub fn reference_fn(
        f: impl Fn(&mut CloneContext<'_>, &Value, &Value) + Send + Sync + 'static,
    ) -> Self {
        Self::reference(FnReference(f))
    }

    /// Value listener from a closure
    #[must_use]
    pub fn value_fn(
        f: impl Fn(&mut CloneContext<'_>, &Value, &mut Value) + Send + Sync + 'static,
    ) -> Self {
        Self::value(FnValue(f))
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(_) => f.write_str("Listener::Reference"),
            Self::Value(_) => f.write_str("Listener::Value"),
        }
    }
}

struct FnReference<F>(F);

impl<F> ReferenceListener for FnReference<F>
where
    F: Fn(&mut CloneContext<'_>, &Value, &Value) + Send + Sync,
{
    fn on_clone(&self, cx: &mut CloneContext<'_>, source: &Value, destination: &Value) {
        (self.0)(cx, source, destination);
    }
}

struct FnValue<F>(F);

impl<F> ValueListener for FnValue<F>
where
    F: Fn(&mut CloneContext<'_>, &Value, &mut Value) + Send + Sync,
{
    fn decorate(&self, cx: &mut CloneContext<'_>, source: &Value, destination: &mut Value) {
        (self.0)(cx, source, destination);
    }
}

/// Value listener seen through the reference-type interface
struct DecorateReference(Arc<dyn ValueListener>);

impl ReferenceListener for DecorateReference {
    fn on_clone(&self, cx: &mut CloneContext<'_>, source: &Value, destination: &Value) {
        let mut local = destination.clone();
        self.0.decorate(cx, source, &mut local);
    }
}

/// Registered listeners, split by the kind of clone they observe
#[derive(Default)]
pub struct ListenerRegistry {
    value: RwLock<Vec<Arc<dyn ValueListener>>>,
    reference: RwLock<Vec<Arc<dyn ReferenceListener>>>,
}

impl ListenerRegistry {
    /// Create empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener to the lists it belongs to
    pub fn register(&self, listener: Listener) {
        match listener {
            Listener::Reference(l) => self.reference.write().push(l),
            Listener::Value(l) => {
                self.value.write().push(Arc::clone(&l));
                self.reference.write().push(Arc::new(DecorateReference(l)));
            }
        }
    }

    /// Snapshot of listeners for value-type clones
    #[must_use]
    pub fn value_listeners(&self) -> Vec<Arc<dyn ValueListener>> {
        self.value.read().clone()
    }

    /// Snapshot of listeners for reference-type clones
    #[must_use]
    pub fn reference_listeners(&self) -> Vec<Arc<dyn ReferenceListener>> {
        self.reference.read().clone()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.read().is_empty() && self.reference.read().is_empty()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("value", &self.value.read().len())
            .field("reference", &self.reference.read().len())
            .finish()
    }
}
