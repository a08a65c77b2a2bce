//! Error types for the cloning engine
//!
//! Every failure is fatal for the clone call that raised it: the in-progress
//! session is dropped and the error propagates to the original caller.
//! Registering listeners or field filters never fails.

use replica_model::RegistryError;

/// Clone failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloneError {
    /// Array rank outside the supported range
    #[error("unsupported array shape: '{type_name}' has rank {rank} (at most 2 supported)")]
    UnsupportedShape {
        /// Array type name
        type_name: String,
        /// Offending rank
        rank: usize,
    },

    /// Type cannot be instantiated at all
    #[error("cannot allocate '{type_name}': {source}")]
    Allocation {
        /// Type name
        type_name: String,
        /// Introspector failure
        #[source]
        source: RegistryError,
    },

    /// Value refers to a type the introspector cannot describe
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Runtime type is not assignable to the declared type
    #[error("type mismatch: '{runtime}' is not assignable to '{declared}'")]
    TypeMismatch {
        /// Declared type name
        declared: String,
        /// Runtime type name
        runtime: String,
    },

    /// Graph nesting exceeded the configured limit
    #[error("clone depth limit of {limit} exceeded")]
    DepthLimitExceeded {
        /// Configured limit
        limit: usize,
    },
}

impl CloneError {
    /// Create unsupported shape error
    #[inline]
    #[must_use]
    pub fn unsupported_shape(type_name: impl Into<String>, rank: usize) -> Self {
        Self::UnsupportedShape {
            type_name: type_name.into(),
            rank,
        }
    }

    /// Create allocation error
    #[inline]
    #[must_use]
    pub fn allocation(type_name: impl Into<String>, source: RegistryError) -> Self {
        Self::Allocation {
            type_name: type_name.into(),
            source,
        }
    }

    /// Create type mismatch error
    #[inline]
    #[must_use]
    pub fn type_mismatch(declared: impl Into<String>, runtime: impl Into<String>) -> Self {
        Self::TypeMismatch {
            declared: declared.into(),
            runtime: runtime.into(),
        }
    }
}

/// Result type alias for clone operations
pub type CloneResult<T> = Result<T, CloneError>;
