//! Registry error types

use crate::descriptor::TypeKey;

/// Errors raised while registering types or instantiating values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Key was never handed out by this registry
    #[error("unknown type key: {0}")]
    UnknownType(TypeKey),

    /// Name already registered
    #[error("type already registered: '{0}'")]
    DuplicateType(String),

    /// Declared type was already given a definition
    #[error("type already defined: '{0}'")]
    AlreadyDefined(String),

    /// Declared type has no definition yet
    #[error("type declared but not defined: '{0}'")]
    NotDefined(String),

    /// Definition is inconsistent
    #[error("invalid definition of '{name}': {reason}")]
    InvalidDefinition {
        /// Type name
        name: String,
        /// What is wrong
        reason: String,
    },

    /// Arrays need at least one dimension
    #[error("invalid array rank: {0}")]
    InvalidRank(usize),

    /// Element count does not match the array shape
    #[error("array shape holds {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Product of the dimensions
        expected: usize,
        /// Elements supplied
        actual: usize,
    },

    /// Type cannot produce instances (abstract, interface, builtin)
    #[error("type cannot be instantiated: '{0}'")]
    NotInstantiable(String),
}

impl RegistryError {
    /// Create invalid definition error
    pub fn invalid_definition(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
