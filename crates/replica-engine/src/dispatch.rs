//! Polymorphic dispatch
//!
//! A field or element declared as one type may hold a value of a more
//! derived type. Every `(declared, runtime)` pair is resolved once into a
//! [`Dispatch`] that routes the value to the runtime type's strategy.

use crate::engine::CloneContext;
use crate::error::{CloneError, CloneResult};
use dashmap::DashMap;
use replica_model::{TypeIntrospector, TypeKey, Value};

/// How the runtime value relates to its declared slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// Declared and runtime types coincide
    Identity,
    /// Derived reference stored under a base type or interface
    Widen,
    /// Value-type instance stored under a reference type
    ///
    /// A struct [`Value`] already carries its runtime type, so no wrapper
    /// is built: the struct is copied by value and never tracked.
    Box,
}

/// Resolved route for a `(declared, runtime)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    /// Declared type of the slot
    pub declared: TypeKey,
    /// Actual type of the value
    pub runtime: TypeKey,
    /// Relation between the two
    pub conversion: Conversion,
}

impl Dispatch {
    /// Clone `value` with the runtime type's strategy
    pub(crate) fn invoke(&self, cx: &mut CloneContext<'_>, value: &Value) -> CloneResult<Value> {
        match self.conversion {
            Conversion::Identity => {}
            Conversion::Widen | Conversion::Box => tracing::trace!(
                "Cloning {} held as {} ({:?})",
                cx.types().type_name(self.runtime),
                cx.types().type_name(self.declared),
                self.conversion
            ),
        }
        cx.run_strategy(self.runtime, value)
    }
}

/// Cache of resolved dispatches
#[derive(Debug, Default)]
pub struct PolymorphicDispatcher {
    routes: DashMap<(TypeKey, TypeKey), Dispatch>,
}

impl PolymorphicDispatcher {
    /// Create empty dispatcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route for a value of type `runtime` found in a `declared` slot
    ///
    /// # Errors
    /// Returns [`CloneError::UnknownType`] if the runtime type is not
    /// described, or [`CloneError::TypeMismatch`] when `verify` is set and
    /// the runtime type is not assignable to the declared one. Failed
    /// resolutions are not cached.
    pub fn resolve(
        &self,
        types: &dyn TypeIntrospector,
        verify: bool,
        declared: TypeKey,
        runtime: TypeKey,
    ) -> CloneResult<Dispatch> {
        if let Some(route) = self.routes.get(&(declared, runtime)) {
            return Ok(*route);
        }

        let runtime_desc = types
            .descriptor(runtime)
            .ok_or_else(|| CloneError::UnknownType(types.type_name(runtime)))?;
        if verify && !types.is_assignable(declared, runtime) {
            return Err(CloneError::type_mismatch(
                types.type_name(declared),
                runtime_desc.name(),
            ));
        }

        let declared_is_value = types
            .descriptor(declared)
            .is_some_and(|d| d.is_value_type());
        let conversion = if declared == runtime {
            Conversion::Identity
        } else if runtime_desc.is_value_type() && !declared_is_value {
            Conversion::Box
        } else {
            Conversion::Widen
        };

        let route = Dispatch {
            declared,
            runtime,
            conversion,
        };
        tracing::trace!(
            "Resolved dispatch {} -> {} ({:?})",
            types.type_name(declared),
            runtime_desc.name(),
            conversion
        );
        self.routes.insert((declared, runtime), route);
        Ok(route)
    }

    /// Number of cached routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no route is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
