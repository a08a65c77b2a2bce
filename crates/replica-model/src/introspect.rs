//! Type introspection capability
//!
//! The cloning engine never inspects types on its own; everything it needs
//! to know about a type (fields, allocation, defaults, assignability) comes
//! through [`TypeIntrospector`].

use crate::descriptor::{TypeDescriptor, TypeKey};
use crate::error::RegistryError;
use crate::value::{ObjectRef, Value};
use std::fmt::Debug;
use std::sync::Arc;

/// Host capability for enumerating and instantiating types
///
/// [`crate::TypeRegistry`] is the default implementation.
pub trait TypeIntrospector: Send + Sync + Debug {
    /// Describe a type; `None` if the key is unknown or not yet defined
    fn descriptor(&self, ty: TypeKey) -> Option<Arc<TypeDescriptor>>;

    /// Zero/default value for a type
    ///
    /// Reference kinds default to [`Value::Null`].
    fn default_value(&self, ty: TypeKey) -> Value;

    /// Construct via the accessible parameterless constructor
    ///
    /// Returns `None` when the type has no such constructor.
    fn construct_default(&self, ty: &Arc<TypeDescriptor>) -> Option<ObjectRef>;

    /// Allocate without running any constructor, every field zeroed
    ///
    /// # Errors
    /// Returns [`RegistryError::NotInstantiable`] for abstract types,
    /// interfaces and non-class kinds.
    fn allocate_uninitialized(&self, ty: &Arc<TypeDescriptor>) -> Result<ObjectRef, RegistryError>;

    /// Whether a value of type `runtime` may be stored where `declared` is expected
    fn is_assignable(&self, declared: TypeKey, runtime: TypeKey) -> bool;

    /// Human-readable type name, for diagnostics
    fn type_name(&self, ty: TypeKey) -> String {
        self.descriptor(ty)
            .map_or_else(|| ty.to_string(), |d| d.name().to_string())
    }
}
