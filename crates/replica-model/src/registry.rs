//! Type registry
//!
//! Provides [`TypeRegistry`], the default [`TypeIntrospector`]: types are
//! registered explicitly with a [`TypeDef`] builder instead of being
//! discovered by reflection.
//!
//! Self- and mutually-referential types are registered in two steps:
//!
//! ```rust
//! use replica_model::{TypeDef, TypeRegistry};
//!
//! let registry = TypeRegistry::new();
//! let node = registry.declare("Node").unwrap();
//! registry
//!     .define(node, TypeDef::class("Node").field("next", node))
//!     .unwrap();
//! ```

use crate::descriptor::{FieldDescriptor, Initializer, TypeDescriptor, TypeKey, TypeKind};
use crate::error::RegistryError;
use crate::introspect::TypeIntrospector;
use crate::value::{ArrayRef, EnumValue, ObjectRef, StructValue, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefKind {
    Class,
    Struct,
    Interface,
    Enum,
}

#[derive(Debug, Clone)]
struct FieldDef {
    name: Arc<str>,
    ty: TypeKey,
    init_only: bool,
}

/// Builder for a type definition
#[derive(Debug, Clone)]
pub struct TypeDef {
    name: Arc<str>,
    kind: DefKind,
    fields: Vec<FieldDef>,
    supertype: Option<TypeKey>,
    interfaces: Vec<TypeKey>,
    value_semantics: bool,
    is_abstract: bool,
    constructor: Option<Initializer>,
}

impl TypeDef {
    fn new(name: &str, kind: DefKind) -> Self {
        Self {
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

    /// Ordinary mutable reference type
    #[must_use]
    pub fn class(name: &str) -> Self {
        Self::new(name, DefKind::Class)
    }

    /// Reference type with value semantics; fields are init-only unless
    /// added with [`TypeDef::mutable_field`]
    #[must_use]
    pub fn record(name: &str) -> Self {
        Self {
            value_semantics: true,
            ..Self::new(name, DefKind::Class)
        }
    }

    /// Value type
    #[must_use]
    pub fn structure(name: &str) -> Self {
        Self::new(name, DefKind::Struct)
    }

    /// Abstract contract without fields
    #[must_use]
    pub fn interface(name: &str) -> Self {
        Self {
            is_abstract: true,
            ..Self::new(name, DefKind::Interface)
        }
    }

    /// Enumeration
    #[must_use]
    pub fn enumeration(name: &str) -> Self {
        Self::new(name, DefKind::Enum)
    }

    /// Type name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add an instance field
    #[must_use]
    pub fn field(self, name: &str, ty: TypeKey) -> Self {
        let init_only = self.value_semantics;
        self.push_field(name, ty, init_only)
    }

    /// Add a write-once instance field
    #[must_use]
    pub fn readonly_field(self, name: &str, ty: TypeKey) -> Self {
        self.push_field(name, ty, true)
    }

    /// Add an assignable instance field (also on records)
    #[must_use]
    pub fn mutable_field(self, name: &str, ty: TypeKey) -> Self {
        self.push_field(name, ty, false)
    }

    /// Set the base class
    #[must_use]
    pub fn extends(mut self, base: TypeKey) -> Self {
        self.supertype = Some(base);
        self
    }

    /// Add an implemented interface
    #[must_use]
    pub fn implements(mut self, interface: TypeKey) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Mark as abstract (not instantiable)
    #[must_use]
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Attach a parameterless constructor
    #[must_use]
    pub fn with_constructor(
        mut self,
        f: impl Fn(&TypeRegistry, &ObjectRef) + Send + Sync + 'static,
    ) -> Self {
        self.constructor = Some(Initializer::new(f));
        self
    }

    fn push_field(mut self, name: &str, ty: TypeKey, init_only: bool) -> Self {
        self.fields.push(FieldDef {
            name: Arc::from(name),
            ty,
            init_only,
        });
        self
    }
}

#[derive(Debug)]
struct Slot {
    name: Arc<str>,
    descriptor: Option<Arc<TypeDescriptor>>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    slots: Vec<Slot>,
    by_name: HashMap<Arc<str>, TypeKey>,
    arrays: HashMap<(TypeKey, usize), TypeKey>,
}

impl RegistryInner {
    #[allow(clippy::cast_possible_truncation)]
    fn next_key(&self) -> TypeKey {
        TypeKey(self.slots.len() as u32)
    }

    fn push(&mut self, name: Arc<str>, descriptor: Option<Arc<TypeDescriptor>>) -> TypeKey {
        let key = self.next_key();
        self.by_name.insert(Arc::clone(&name), key);
        self.slots.push(Slot { name, descriptor });
        key
    }

    fn slot(&self, key: TypeKey) -> Result<&Slot, RegistryError> {
        self.slots
            .get(key.index())
            .ok_or(RegistryError::UnknownType(key))
    }

    fn defined(&self, key: TypeKey) -> Result<Arc<TypeDescriptor>, RegistryError> {
        let slot = self.slot(key)?;
        slot.descriptor
            .clone()
            .ok_or_else(|| RegistryError::NotDefined(slot.name.to_string()))
    }

    /// Whether the value-type layout of `ty` embeds `target`
    fn embeds(&self, ty: TypeKey, target: TypeKey) -> bool {
        if ty == target {
            return true;
        }
        match self.slots.get(ty.index()).and_then(|s| s.descriptor.as_ref()) {
            Some(desc) if desc.kind == TypeKind::Struct => {
                desc.fields.iter().any(|f| self.embeds(f.ty, target))
            }
            _ => false,
        }
    }

    fn build(&self, key: TypeKey, def: TypeDef) -> Result<TypeDescriptor, RegistryError> {
        let invalid = |reason: &str| RegistryError::invalid_definition(def.name.to_string(), reason);

        let kind = match def.kind {
            DefKind::Class => TypeKind::Class,
            DefKind::Struct => TypeKind::Struct,
            DefKind::Interface => TypeKind::Interface,
            DefKind::Enum => TypeKind::Enum,
        };

        if matches!(def.kind, DefKind::Interface | DefKind::Enum) && !def.fields.is_empty() {
            return Err(invalid("interfaces and enumerations have no instance fields"));
        }
        if def.kind != DefKind::Class && def.constructor.is_some() {
            return Err(invalid("only classes have a parameterless constructor"));
        }

        let mut fields = Vec::with_capacity(def.fields.len());
        if let Some(base) = def.supertype {
            if def.kind != DefKind::Class {
                return Err(invalid("only classes have a base class"));
            }
            let base_desc = self.defined(base)?;
            if base_desc.kind != TypeKind::Class {
                return Err(invalid("base type must be a class"));
            }
            fields.extend(base_desc.fields.iter().cloned());
        }

        for interface in &def.interfaces {
            if self.defined(*interface)?.kind != TypeKind::Interface {
                return Err(invalid("implemented type must be an interface"));
            }
        }

        for field in &def.fields {
            self.slot(field.ty)?;
            if def.kind == DefKind::Struct && self.embeds(field.ty, key) {
                return Err(invalid("struct contains itself by value"));
            }
            if fields
                .iter()
                .any(|f: &FieldDescriptor| f.name == field.name)
            {
                return Err(invalid(&format!("duplicate field '{}'", field.name)));
            }
            let index = fields.len();
            fields.push(FieldDescriptor {
                name: Arc::clone(&field.name),
                index,
                ty: field.ty,
                declaring_type: key,
                init_only: field.init_only,
            });
        }

        Ok(TypeDescriptor {
            key,
            name: def.name,
            kind,
            fields,
            supertype: def.supertype,
            interfaces: def.interfaces,
            value_semantics: def.value_semantics,
            is_abstract: def.is_abstract,
            constructor: def.constructor,
        })
    }
}

/// Registry of types known to the cloning engine
///
/// Thread-safe; every lookup clones a descriptor handle out of the lock so
/// constructors may call back into the registry.
#[derive(Debug)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    /// Create registry holding only the built-in types
    #[must_use]
    pub fn new() -> Self {
        let mut inner = RegistryInner::default();
        let builtins = [
            (TypeKey::OBJECT, "object", TypeKind::Class),
            (TypeKey::BOOL, "bool", TypeKind::Primitive),
            (TypeKey::INT, "int", TypeKind::Primitive),
            (TypeKey::FLOAT, "float", TypeKind::Primitive),
            (TypeKey::CHAR, "char", TypeKind::Primitive),
            (TypeKey::STRING, "string", TypeKind::String),
            (TypeKey::POINTER, "pointer", TypeKind::Pointer),
        ];
        for (key, name, kind) in builtins {
            let descriptor = TypeDescriptor::builtin(key, name, kind);
            let pushed = inner.push(Arc::from(name), Some(Arc::new(descriptor)));
            debug_assert_eq!(pushed, key);
        }
        debug_assert_eq!(inner.slots.len(), TypeKey::BUILTIN_COUNT as usize);
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Reserve a key for a type defined later with [`TypeRegistry::define`]
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateType`] if the name is taken
    pub fn declare(&self, name: &str) -> Result<TypeKey, RegistryError> {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateType(name.to_string()));
        }
        Ok(inner.push(Arc::from(name), None))
    }

    /// Complete a declared type
    ///
    /// # Errors
    /// Returns error if the key is unknown or already defined, or the
    /// definition is inconsistent
    pub fn define(&self, key: TypeKey, def: TypeDef) -> Result<Arc<TypeDescriptor>, RegistryError> {
        let mut inner = self.inner.write();
        {
            let slot = inner.slot(key)?;
            if slot.descriptor.is_some() {
                return Err(RegistryError::AlreadyDefined(slot.name.to_string()));
            }
            if slot.name != def.name {
                return Err(RegistryError::invalid_definition(
                    def.name.to_string(),
                    format!("key was declared as '{}'", slot.name),
                ));
            }
        }
        let descriptor = Arc::new(inner.build(key, def)?);
        inner.slots[key.index()].descriptor = Some(Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Declare and define in one step
    ///
    /// # Errors
    /// Returns error if the name is taken or the definition is inconsistent
    pub fn register(&self, def: TypeDef) -> Result<TypeKey, RegistryError> {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&*def.name) {
            return Err(RegistryError::DuplicateType(def.name.to_string()));
        }
        let key = inner.next_key();
        let descriptor = inner.build(key, def)?;
        Ok(inner.push(Arc::clone(&descriptor.name), Some(Arc::new(descriptor))))
    }

    /// Array type with the given element type and rank (interned)
    ///
    /// # Errors
    /// Returns error for rank 0 or an unknown element type
    pub fn array_of(&self, element: TypeKey, rank: usize) -> Result<TypeKey, RegistryError> {
        if rank == 0 {
            return Err(RegistryError::InvalidRank(rank));
        }
        let mut inner = self.inner.write();
        if let Some(key) = inner.arrays.get(&(element, rank)) {
            return Ok(*key);
        }
        let element_name = Arc::clone(&inner.slot(element)?.name);
        let name = format!("{element_name}[{}]", ",".repeat(rank - 1));
        if inner.by_name.contains_key(name.as_str()) {
            return Err(RegistryError::DuplicateType(name));
        }
        let key = inner.next_key();
        let descriptor = TypeDescriptor::builtin(key, &name, TypeKind::Array { element, rank });
        inner.push(Arc::from(name), Some(Arc::new(descriptor)));
        inner.arrays.insert((element, rank), key);
        Ok(key)
    }

    /// Descriptor of a defined type
    #[must_use]
    pub fn descriptor(&self, key: TypeKey) -> Option<Arc<TypeDescriptor>> {
        self.inner
            .read()
            .slots
            .get(key.index())
            .and_then(|slot| slot.descriptor.clone())
    }

    /// Key of a type by name
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<TypeKey> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Number of registered types, built-ins included
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().slots.len()
    }

    /// Always `false`: built-ins are registered on creation
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create an instance the way `new T()` would
    ///
    /// Classes are zero-initialized and then run their constructor; value
    /// types get their default value.
    ///
    /// # Errors
    /// Returns error for unknown, undefined or non-instantiable types
    pub fn instantiate(&self, key: TypeKey) -> Result<Value, RegistryError> {
        let desc = self.require(key)?;
        match desc.kind {
            TypeKind::Class => {
                let object = self.construct(&desc)?;
                Ok(Value::Object(object))
            }
            TypeKind::Interface | TypeKind::String | TypeKind::Array { .. } => {
                Err(RegistryError::NotInstantiable(desc.name.to_string()))
            }
            TypeKind::Primitive | TypeKind::Enum | TypeKind::Pointer | TypeKind::Struct => {
                Ok(self.default_value(key))
            }
        }
    }

    /// Create an array from its shape and row-major elements
    ///
    /// # Errors
    /// Returns error if the element count does not match the shape
    pub fn new_array(
        &self,
        element: TypeKey,
        shape: &[usize],
        elements: Vec<Value>,
    ) -> Result<ArrayRef, RegistryError> {
        let ty = self.array_of(element, shape.len())?;
        let expected: usize = shape.iter().product();
        if expected != elements.len() {
            return Err(RegistryError::ShapeMismatch {
                expected,
                actual: elements.len(),
            });
        }
        let desc = self.require(ty)?;
        Ok(ArrayRef::new(desc, shape, elements))
    }

    /// One-dimensional array
    ///
    /// # Errors
    /// Returns error for an unknown element type
    pub fn array1(&self, element: TypeKey, elements: Vec<Value>) -> Result<ArrayRef, RegistryError> {
        let len = elements.len();
        self.new_array(element, &[len], elements)
    }

    /// Two-dimensional array from equally long rows
    ///
    /// # Errors
    /// Returns error for ragged rows or an unknown element type
    pub fn array2(
        &self,
        element: TypeKey,
        rows: Vec<Vec<Value>>,
    ) -> Result<ArrayRef, RegistryError> {
        let columns = rows.first().map_or(0, Vec::len);
        let row_count = rows.len();
        let elements: Vec<Value> = rows.into_iter().flatten().collect();
        if elements.len() != row_count * columns {
            return Err(RegistryError::ShapeMismatch {
                expected: row_count * columns,
                actual: elements.len(),
            });
        }
        self.new_array(element, &[row_count, columns], elements)
    }

    /// Zero/default value of a type
    #[must_use]
    pub fn default_value(&self, key: TypeKey) -> Value {
        match key {
            TypeKey::BOOL => return Value::Bool(false),
            TypeKey::INT => return Value::Int(0),
            TypeKey::FLOAT => return Value::Float(0.0),
            TypeKey::CHAR => return Value::Char('\0'),
            TypeKey::POINTER => return Value::Pointer(0),
            _ => {}
        }
        let Some(desc) = self.descriptor(key) else {
            return Value::Null;
        };
        match desc.kind {
            TypeKind::Enum => Value::Enum(EnumValue::new(key, 0)),
            TypeKind::Pointer => Value::Pointer(0),
            TypeKind::Struct => {
                let fields = self.zeroed_fields(&desc);
                Value::Struct(StructValue::new(desc, fields))
            }
            _ => Value::Null,
        }
    }

    /// Whether `runtime` values may be stored where `declared` is expected
    #[must_use]
    pub fn is_assignable(&self, declared: TypeKey, runtime: TypeKey) -> bool {
        if declared == runtime || declared == TypeKey::OBJECT {
            return true;
        }
        let Some(runtime_desc) = self.descriptor(runtime) else {
            return false;
        };

        if let Some((element, rank)) = runtime_desc.array_shape() {
            // Covariance only holds for reference element types
            return match self.descriptor(declared).and_then(|d| d.array_shape()) {
                Some((declared_element, declared_rank)) => {
                    declared_rank == rank
                        && self
                            .descriptor(element)
                            .is_some_and(|e| e.kind.is_reference_type())
                        && self.is_assignable(declared_element, element)
                }
                None => false,
            };
        }

        let mut current = Some(runtime_desc);
        while let Some(desc) = current {
            if desc.key == declared || self.implements(&desc, declared) {
                return true;
            }
            current = desc.supertype.and_then(|s| self.descriptor(s));
        }
        false
    }

    fn implements(&self, desc: &TypeDescriptor, interface: TypeKey) -> bool {
        desc.interfaces.iter().any(|&i| {
            i == interface
                || self
                    .descriptor(i)
                    .is_some_and(|d| self.implements(&d, interface))
        })
    }

    fn require(&self, key: TypeKey) -> Result<Arc<TypeDescriptor>, RegistryError> {
        self.inner.read().defined(key)
    }

    fn zeroed_fields(&self, desc: &TypeDescriptor) -> Vec<Value> {
        desc.fields.iter().map(|f| self.default_value(f.ty)).collect()
    }

    fn zeroed(&self, desc: &Arc<TypeDescriptor>) -> ObjectRef {
        ObjectRef::new(Arc::clone(desc), self.zeroed_fields(desc))
    }

    fn construct(&self, desc: &Arc<TypeDescriptor>) -> Result<ObjectRef, RegistryError> {
        let object = TypeIntrospector::allocate_uninitialized(self, desc)?;
        if let Some(constructor) = desc.constructor() {
            constructor.run(self, &object);
        }
        Ok(object)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeIntrospector for TypeRegistry {
    fn descriptor(&self, ty: TypeKey) -> Option<Arc<TypeDescriptor>> {
        TypeRegistry::descriptor(self, ty)
    }

    fn default_value(&self, ty: TypeKey) -> Value {
        TypeRegistry::default_value(self, ty)
    }

    fn construct_default(&self, ty: &Arc<TypeDescriptor>) -> Option<ObjectRef> {
        if ty.kind != TypeKind::Class || ty.is_abstract || ty.constructor.is_none() {
            return None;
        }
        self.construct(ty).ok()
    }

    fn allocate_uninitialized(&self, ty: &Arc<TypeDescriptor>) -> Result<ObjectRef, RegistryError> {
        if ty.kind != TypeKind::Class || ty.is_abstract {
            return Err(RegistryError::NotInstantiable(ty.name.to_string()));
        }
        Ok(self.zeroed(ty))
    }

    fn is_assignable(&self, declared: TypeKey, runtime: TypeKey) -> bool {
        TypeRegistry::is_assignable(self, declared, runtime)
    }

    fn type_name(&self, ty: TypeKey) -> String {
        self.inner
            .read()
            .slots
            .get(ty.index())
            .map_or_else(|| ty.to_string(), |slot| slot.name.to_string())
    }
}
