//! Replica Clone Engine
//!
//! Deep copies of arbitrary object graphs described by a
//! [`TypeIntrospector`](replica_model::TypeIntrospector).
//!
//! # Core Concepts
//!
//! - [`CloneEngine`]: entry point; owns registrations and caches
//! - [`CloneContext`]: one clone call; shared with listeners
//! - [`Behavior`]: per-field treatment chosen by field filters
//! - [`Listener`]: post-clone notification for value or reference types
//! - [`TypeCloneStrategy`]: compiled, cached procedure for one type
//!
//! Immutable values (primitives, strings, enums, immutable records and
//! structs) are returned as-is. Everything else is copied exactly once per
//! call: shared references stay shared in the copy and cycles are preserved.
//!
//! # Example
//!
//! ```rust
//! use replica_engine::CloneEngine;
//! use replica_model::{TypeDef, TypeKey, TypeRegistry, Value};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let node = registry.declare("Node").unwrap();
//! registry
//!     .define(node, TypeDef::class("Node").field("next", node))
//!     .unwrap();
//!
//! let source = registry.instantiate(node).unwrap();
//! source.as_object().unwrap().set("next", source.clone());
//!
//! let engine = CloneEngine::new(registry.clone());
//! let copy = engine.clone_value(&source).unwrap();
//! let next = copy.as_object().unwrap().get("next").unwrap();
//! assert!(next.same_instance(&copy));
//! assert!(!copy.same_instance(&source));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod dispatch;
mod engine;
mod error;
mod filter;
mod immutability;
mod listener;
mod session;
mod strategy;

// Re-exports
pub use config::EngineConfig;
pub use dispatch::{Conversion, Dispatch, PolymorphicDispatcher};
pub use engine::{CloneContext, CloneEngine};
pub use error::{CloneError, CloneResult};
pub use filter::{Behavior, FieldFilter, FieldFilterRegistry};
pub use immutability::ImmutabilityClassifier;
pub use listener::{Listener, ListenerRegistry, ReferenceListener, ValueListener};
pub use session::{CloneSession, SessionStats};
pub use strategy::{Allocation, FieldAction, StrategyCache, TypeCloneStrategy, MAX_ARRAY_RANK};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for engine users
    pub use crate::{
        Behavior, CloneContext, CloneEngine, CloneError, CloneResult, EngineConfig, Listener,
        ReferenceListener, ValueListener,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
