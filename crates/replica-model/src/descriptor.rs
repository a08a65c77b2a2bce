//! Type descriptors
//!
//! Describes the shape of every registered type: its kind, its instance
//! fields in slot order, its place in the type hierarchy and how a fresh
//! instance comes into existence.

use crate::registry::TypeRegistry;
use crate::value::ObjectRef;
use std::fmt;
use std::sync::Arc;

/// Handle of a registered type
///
/// Keys are dense indices handed out by a [`TypeRegistry`]. The built-in
/// types always occupy the same keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(pub(crate) u32);

impl TypeKey {
    /// Root reference type; every value is assignable to it
    pub const OBJECT: Self = Self(0);
    /// `bool`
    pub const BOOL: Self = Self(1);
    /// 64-bit signed integer
    pub const INT: Self = Self(2);
    /// 64-bit float
    pub const FLOAT: Self = Self(3);
    /// Unicode scalar
    pub const CHAR: Self = Self(4);
    /// Immutable text
    pub const STRING: Self = Self(5);
    /// Opaque pointer-like handle
    pub const POINTER: Self = Self(6);

    pub(crate) const BUILTIN_COUNT: u32 = 7;

    /// Dense index of this key
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural category of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Scalar: bool, int, float, char
    Primitive,

    /// Enumeration (stored as a discriminant)
    Enum,

    /// Opaque handle
    Pointer,

    /// Immutable text
    String,

    /// Value type with fields, copied on assignment
    Struct,

    /// Reference type with identity
    Class,

    /// Abstract contract; only ever a declared type
    Interface,

    /// Array with element type and rank
    Array {
        /// Element type
        element: TypeKey,
        /// Number of dimensions
        rank: usize,
    },
}

impl TypeKind {
    /// Whether instances are copied by value (no identity)
    #[inline]
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(self, Self::Primitive | Self::Enum | Self::Pointer | Self::Struct)
    }

    /// Whether instances are shared by reference
    #[inline]
    #[must_use]
    pub fn is_reference_type(&self) -> bool {
        !self.is_value_type()
    }
}

/// One instance field of a type
///
/// This is what field filters inspect to choose a clone behavior.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    /// Field name
    pub name: Arc<str>,

    /// Slot index inside the instance
    pub index: usize,

    /// Declared type of the field
    pub ty: TypeKey,

    /// Type that introduced the field (a base class for inherited fields)
    pub declaring_type: TypeKey,

    /// Assigned only at construction
    pub init_only: bool,
}

/// Parameterless constructor of a class
///
/// Runs against a zero-initialized instance and assigns its field
/// initializers.
#[derive(Clone)]
pub struct Initializer(Arc<dyn Fn(&TypeRegistry, &ObjectRef) + Send + Sync>);

impl Initializer {
    /// Wrap an initializer function
    #[must_use]
    pub fn new(f: impl Fn(&TypeRegistry, &ObjectRef) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Run the initializer on `instance`
    #[inline]
    pub fn run(&self, registry: &TypeRegistry, instance: &ObjectRef) {
        (self.0)(registry, instance);
    }
}

impl fmt::Debug for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Initializer(..)")
    }
}

/// Full description of a registered type
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    pub(crate) key: TypeKey,
    pub(crate) name: Arc<str>,
    pub(crate) kind: TypeKind,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) supertype: Option<TypeKey>,
    pub(crate) interfaces: Vec<TypeKey>,
    pub(crate) value_semantics: bool,
    pub(crate) is_abstract: bool,
    pub(crate) constructor: Option<Initializer>,
}

impl TypeDescriptor {
    pub(crate) fn builtin(key: TypeKey, name: &str, kind: TypeKind) -> Self {
        Self {
            key,
            name: Arc::from(name),
            kind,
            fields: Vec::new(),
            supertype: None,
            interfaces: Vec::new(),
            value_semantics: false,
            is_abstract: false,
            constructor: None,
        }
    }

    /// Registry key
    #[inline]
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Structural category
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Instance fields in slot order (inherited fields first)
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Find an instance field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| &*f.name == name)
    }

    /// Direct base class
    #[inline]
    #[must_use]
    pub fn supertype(&self) -> Option<TypeKey> {
        self.supertype
    }

    /// Directly implemented interfaces
    #[inline]
    #[must_use]
    pub fn interfaces(&self) -> &[TypeKey] {
        &self.interfaces
    }

    /// Whether the type has synthesized copy/equality semantics (a record)
    #[inline]
    #[must_use]
    pub fn has_value_semantics(&self) -> bool {
        self.value_semantics
    }

    /// Whether the type cannot be instantiated
    #[inline]
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Accessible parameterless constructor, if any
    #[inline]
    #[must_use]
    pub fn constructor(&self) -> Option<&Initializer> {
        self.constructor.as_ref()
    }

    /// Whether instances are value types
    #[inline]
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.kind.is_value_type()
    }

    /// Element type and rank for array types
    #[inline]
    #[must_use]
    pub fn array_shape(&self) -> Option<(TypeKey, usize)> {
        match self.kind {
            TypeKind::Array { element, rank } => Some((element, rank)),
            _ => None,
        }
    }
}
