//! Replica Value Model
//!
//! Dynamic object graphs and the type registry the cloning engine
//! introspects.
//!
//! # Core Concepts
//!
//! - [`Value`]: scalar, value-type struct, or handle to a shared instance
//! - [`ObjectRef`] / [`ArrayRef`]: shared instances with reference identity
//! - [`TypeDescriptor`]: kind, fields and hierarchy of a registered type
//! - [`TypeIntrospector`]: capability the engine uses to inspect and
//!   allocate types
//! - [`TypeRegistry`]: explicit-registration implementation of the above
//!
//! # Example
//!
//! ```rust
//! use replica_model::{TypeDef, TypeKey, TypeRegistry, Value};
//!
//! let registry = TypeRegistry::new();
//! let account = registry
//!     .register(TypeDef::class("Account").field("balance", TypeKey::INT))
//!     .unwrap();
//!
//! let value = registry.instantiate(account).unwrap();
//! let object = value.as_object().unwrap();
//! object.set("balance", Value::Int(10));
//! assert_eq!(object.get("balance"), Some(Value::Int(10)));
//! ```

#![warn(missing_docs)]

pub mod descriptor;
pub mod error;
pub mod introspect;
pub mod registry;
pub mod value;

// Re-exports
pub use descriptor::{FieldDescriptor, Initializer, TypeDescriptor, TypeKey, TypeKind};
pub use error::RegistryError;
pub use introspect::TypeIntrospector;
pub use registry::{TypeDef, TypeRegistry};
pub use value::{ArrayRef, EnumValue, Identity, ObjectRef, StructValue, Value};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building and inspecting value graphs
    pub use crate::{
        ArrayRef, EnumValue, FieldDescriptor, ObjectRef, StructValue, TypeDef, TypeIntrospector,
        TypeKey, TypeKind, TypeRegistry, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
