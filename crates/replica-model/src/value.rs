//! Dynamic values
//!
//! A [`Value`] is either a scalar, a value-type struct, or a handle to a
//! shared instance ([`ObjectRef`], [`ArrayRef`]) with reference identity.
//! Handles are cheap to clone; cloning a handle never copies the instance.

use crate::descriptor::{TypeDescriptor, TypeKey};
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Reference identity of a shared instance
///
/// Stable for as long as the instance is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(usize);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A dynamically typed value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent reference
    #[default]
    Null,

    /// Boolean scalar
    Bool(bool),

    /// Integer scalar
    Int(i64),

    /// Float scalar
    Float(f64),

    /// Character scalar
    Char(char),

    /// Immutable text; identity is the shared allocation
    Str(Arc<str>),

    /// Enumeration value
    Enum(EnumValue),

    /// Opaque handle
    Pointer(usize),

    /// Value-type instance
    Struct(StructValue),

    /// Reference-type instance
    Object(ObjectRef),

    /// Array instance
    Array(ArrayRef),
}

impl Value {
    /// Create a text value
    #[inline]
    #[must_use]
    pub fn string(text: impl Into<Arc<str>>) -> Self {
        Self::Str(text.into())
    }

    /// Runtime type of the value, `None` for null
    #[must_use]
    pub fn runtime_type(&self) -> Option<TypeKey> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(TypeKey::BOOL),
            Self::Int(_) => Some(TypeKey::INT),
            Self::Float(_) => Some(TypeKey::FLOAT),
            Self::Char(_) => Some(TypeKey::CHAR),
            Self::Str(_) => Some(TypeKey::STRING),
            Self::Enum(e) => Some(e.ty),
            Self::Pointer(_) => Some(TypeKey::POINTER),
            Self::Struct(s) => Some(s.type_key()),
            Self::Object(o) => Some(o.type_key()),
            Self::Array(a) => Some(a.type_key()),
        }
    }

    /// Whether the value is null
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Identity of a tracked reference instance (objects and arrays)
    #[must_use]
    pub fn reference_identity(&self) -> Option<Identity> {
        match self {
            Self::Object(o) => Some(o.identity()),
            Self::Array(a) => Some(a.identity()),
            _ => None,
        }
    }

    /// Whether both values refer to the very same instance
    ///
    /// Objects, arrays and strings compare by allocation; everything else
    /// has no identity and is never the same instance.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Str(a), Self::Str(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Borrow as object handle
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Borrow as array handle
    #[inline]
    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow as struct
    #[inline]
    #[must_use]
    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Mutably borrow as struct
    #[inline]
    pub fn as_struct_mut(&mut self) -> Option<&mut StructValue> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Text payload
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::Pointer(a), Self::Pointer(b)) => a == b,
            (Self::Struct(a), Self::Struct(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(Arc::from(v))
    }
}

impl From<EnumValue> for Value {
    fn from(v: EnumValue) -> Self {
        Self::Enum(v)
    }
}

impl From<StructValue> for Value {
    fn from(v: StructValue) -> Self {
        Self::Struct(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Self::Object(v)
    }
}

impl From<ArrayRef> for Value {
    fn from(v: ArrayRef) -> Self {
        Self::Array(v)
    }
}

/// Enumeration value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// Enumeration type
    pub ty: TypeKey,

    /// Underlying discriminant
    pub discriminant: i64,
}

impl EnumValue {
    /// Create enum value
    #[inline]
    #[must_use]
    pub fn new(ty: TypeKey, discriminant: i64) -> Self {
        Self { ty, discriminant }
    }
}

/// Value-type instance
///
/// Owned inline; copying a `Value::Struct` copies its fields (shallowly for
/// any handles it holds).
#[derive(Clone)]
pub struct StructValue {
    ty: Arc<TypeDescriptor>,
    fields: Vec<Value>,
}

impl StructValue {
    /// Create from a descriptor and one value per field slot
    #[inline]
    #[must_use]
    pub fn new(ty: Arc<TypeDescriptor>, fields: Vec<Value>) -> Self {
        debug_assert_eq!(ty.fields().len(), fields.len());
        Self { ty, fields }
    }

    /// Type descriptor
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.ty
    }

    /// Type key
    #[inline]
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.ty.key()
    }

    /// Field by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ty.field(name).and_then(|f| self.fields.get(f.index))
    }

    /// Field by slot
    #[inline]
    #[must_use]
    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Assign field by name; `false` if no such field
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.ty.field(name).map(|f| f.index) {
            Some(index) => self.set_at(index, value),
            None => false,
        }
    }

    /// Assign field by slot; `false` if out of range
    pub fn set_at(&mut self, index: usize, value: Value) -> bool {
        match self.fields.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// All field values in slot order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }
}

impl PartialEq for StructValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_key() == other.type_key() && self.fields == other.fields
    }
}

impl fmt::Debug for StructValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.ty.name());
        for (field, value) in self.ty.fields().iter().zip(&self.fields) {
            s.field(&field.name, value);
        }
        s.finish()
    }
}

struct ObjectCell {
    ty: Arc<TypeDescriptor>,
    fields: RwLock<Vec<Value>>,
}

/// Shared handle to a reference-type instance
#[derive(Clone)]
pub struct ObjectRef(Arc<ObjectCell>);

impl ObjectRef {
    /// Create an instance from a descriptor and one value per field slot
    #[must_use]
    pub fn new(ty: Arc<TypeDescriptor>, fields: Vec<Value>) -> Self {
        debug_assert_eq!(ty.fields().len(), fields.len());
        Self(Arc::new(ObjectCell {
            ty,
            fields: RwLock::new(fields),
        }))
    }

    /// Runtime type descriptor
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.0.ty
    }

    /// Runtime type key
    #[inline]
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.0.ty.key()
    }

    /// Field by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        let index = self.0.ty.field(name)?.index;
        self.get_at(index)
    }

    /// Field by slot
    #[must_use]
    pub fn get_at(&self, index: usize) -> Option<Value> {
        self.0.fields.read().get(index).cloned()
    }

    /// Assign field by name; `false` if no such field
    pub fn set(&self, name: &str, value: Value) -> bool {
        match self.0.ty.field(name).map(|f| f.index) {
            Some(index) => self.set_at(index, value),
            None => false,
        }
    }

    /// Assign field by slot; `false` if out of range
    pub fn set_at(&self, index: usize, value: Value) -> bool {
        match self.0.fields.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Snapshot of all field values in slot order
    #[must_use]
    pub fn fields(&self) -> Vec<Value> {
        self.0.fields.read().clone()
    }

    /// Reference identity
    #[inline]
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity(Arc::as_ptr(&self.0) as usize)
    }

    /// Whether both handles refer to the same instance
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.0.ty.name(), self.identity())
    }
}

struct ArrayCell {
    ty: Arc<TypeDescriptor>,
    shape: SmallVec<[usize; 2]>,
    elements: RwLock<Vec<Value>>,
}

/// Shared handle to an array instance
///
/// Elements are stored row-major; `shape` holds the length of each
/// dimension.
#[derive(Clone)]
pub struct ArrayRef(Arc<ArrayCell>);

impl ArrayRef {
    /// Create an array from its type, shape and row-major elements
    #[must_use]
    pub fn new(ty: Arc<TypeDescriptor>, shape: &[usize], elements: Vec<Value>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), elements.len());
        Self(Arc::new(ArrayCell {
            ty,
            shape: SmallVec::from_slice(shape),
            elements: RwLock::new(elements),
        }))
    }

    /// Array type descriptor
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.0.ty
    }

    /// Array type key
    #[inline]
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.0.ty.key()
    }

    /// Element type
    #[inline]
    #[must_use]
    pub fn element_type(&self) -> Option<TypeKey> {
        self.0.ty.array_shape().map(|(element, _)| element)
    }

    /// Length of each dimension
    #[inline]
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.0.shape
    }

    /// Number of dimensions
    #[inline]
    #[must_use]
    pub fn rank(&self) -> usize {
        self.0.shape.len()
    }

    /// Total number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.elements.read().len()
    }

    /// Whether the array has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a row-major position
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.elements.read().get(index).cloned()
    }

    /// Element of a two-dimensional array
    #[must_use]
    pub fn get2(&self, row: usize, column: usize) -> Option<Value> {
        self.offset2(row, column).and_then(|i| self.get(i))
    }

    /// Assign element at a row-major position; `false` if out of range
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.0.elements.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Assign element of a two-dimensional array; `false` if out of range
    pub fn set2(&self, row: usize, column: usize, value: Value) -> bool {
        match self.offset2(row, column) {
            Some(index) => self.set(index, value),
            None => false,
        }
    }

    /// Snapshot of all elements, row-major
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.elements.read().clone()
    }

    /// Reference identity
    #[inline]
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity(Arc::as_ptr(&self.0) as usize)
    }

    /// Whether both handles refer to the same array
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn offset2(&self, row: usize, column: usize) -> Option<usize> {
        match self.0.shape.as_slice() {
            [rows, columns] if row < *rows && column < *columns => Some(row * columns + column),
            _ => None,
        }
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:?}@{}",
            self.0.ty.name(),
            self.0.shape.as_slice(),
            self.identity()
        )
    }
}
