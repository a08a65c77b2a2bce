//! Per-type clone strategies
//!
//! A [`TypeCloneStrategy`] is compiled once per runtime type and captures
//! everything needed to copy an instance of it: how to allocate the copy,
//! what to do with each field, and which listeners to notify. Field
//! behaviors and listener lists are frozen at compile time, so registering a
//! filter or listener invalidates every compiled strategy.

use crate::engine::CloneContext;
use crate::error::{CloneError, CloneResult};
use crate::filter::{Behavior, FieldFilterRegistry};
use crate::listener::{ListenerRegistry, ReferenceListener, ValueListener};
use dashmap::DashMap;
use replica_model::{
    ArrayRef, FieldDescriptor, ObjectRef, RegistryError, StructValue, TypeDescriptor,
    TypeIntrospector, TypeKey, TypeKind, Value,
};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Highest array rank that can be cloned
pub const MAX_ARRAY_RANK: usize = 2;

/// How the copy comes into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// Same-shaped array filled with element defaults
    Array {
        /// Element type
        element: TypeKey,
        /// Dimension count
        rank: usize,
    },
    /// Value type starting from its zero value
    ZeroInit,
    /// Parameterless constructor, falling back to uninitialized allocation
    Constructor,
    /// Zeroed instance, no constructor run
    Uninitialized,
}

/// Compiled treatment of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAction {
    /// Field being handled
    pub field: FieldDescriptor,
    /// Behavior chosen by the field filters
    pub behavior: Behavior,
}

enum Notify {
    Value(Vec<Arc<dyn ValueListener>>),
    Reference(Vec<Arc<dyn ReferenceListener>>),
}

impl Notify {
    fn len(&self) -> usize {
        match self {
            Self::Value(listeners) => listeners.len(),
            Self::Reference(listeners) => listeners.len(),
        }
    }
}

/// Compiled clone procedure for one runtime type
pub struct TypeCloneStrategy {
    ty: Arc<TypeDescriptor>,
    allocation: Allocation,
    fields: Vec<FieldAction>,
    notify: Notify,
    generation: u64,
}

impl TypeCloneStrategy {
    /// Compile the strategy for `ty`
    ///
    /// # Errors
    /// Returns [`CloneError::UnsupportedShape`] for arrays of rank above
    /// [`MAX_ARRAY_RANK`] and [`CloneError::Allocation`] for kinds that can
    /// never be instantiated.
    pub fn compile(
        filters: &FieldFilterRegistry,
        listeners: &ListenerRegistry,
        ty: Arc<TypeDescriptor>,
        generation: u64,
    ) -> CloneResult<Self> {
        let allocation = match ty.kind() {
            TypeKind::Array { element, rank } => {
                if !(1..=MAX_ARRAY_RANK).contains(&rank) {
                    return Err(CloneError::unsupported_shape(ty.name(), rank));
                }
                Allocation::Array { element, rank }
            }
            TypeKind::Class if ty.constructor().is_some() => Allocation::Constructor,
            TypeKind::Class => Allocation::Uninitialized,
            TypeKind::Interface => {
                return Err(CloneError::allocation(
                    ty.name(),
                    RegistryError::NotInstantiable(ty.name().to_string()),
                ));
            }
            TypeKind::Primitive
            | TypeKind::Enum
            | TypeKind::Pointer
            | TypeKind::String
            | TypeKind::Struct => Allocation::ZeroInit,
        };

        let fields = if matches!(allocation, Allocation::Array { .. }) {
            Vec::new()
        } else {
            ty.fields()
                .iter()
                .map(|field| FieldAction {
                    field: field.clone(),
                    behavior: filters.resolve(field),
                })
                .collect()
        };

        let notify = if ty.is_value_type() {
            Notify::Value(listeners.value_listeners())
        } else {
            Notify::Reference(listeners.reference_listeners())
        };

        tracing::debug!(
            "Compiled clone strategy for '{}' ({:?}, {} fields, {} listeners)",
            ty.name(),
            allocation,
            fields.len(),
            notify.len()
        );
        Ok(Self {
            ty,
            allocation,
            fields,
            notify,
            generation,
        })
    }

    /// Type this strategy clones
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.ty
    }

    /// Allocation mode
    #[inline]
    #[must_use]
    pub fn allocation(&self) -> Allocation {
        self.allocation
    }

    /// Per-field actions in slot order
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &[FieldAction] {
        &self.fields
    }

    /// Number of listeners notified per clone
    #[inline]
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.notify.len()
    }

    /// Cache generation the strategy was compiled in
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Clone one instance of this type
    pub(crate) fn execute(&self, cx: &mut CloneContext<'_>, source: &Value) -> CloneResult<Value> {
        match (self.allocation, source) {
            (Allocation::Array { element, .. }, Value::Array(array)) => {
                self.clone_array(cx, source, array, element)
            }
            (Allocation::Constructor | Allocation::Uninitialized, Value::Object(object)) => {
                self.clone_object(cx, source, object)
            }
            (Allocation::ZeroInit, Value::Struct(value)) => self.clone_struct(cx, source, value),
            // Scalars carry no structure to copy
            (Allocation::ZeroInit, _) => Ok(source.clone()),
            _ => Err(CloneError::type_mismatch(
                self.ty.name(),
                source
                    .runtime_type()
                    .map_or_else(|| "null".to_string(), |t| cx.types().type_name(t)),
            )),
        }
    }

    fn clone_object(
        &self,
        cx: &mut CloneContext<'_>,
        source: &Value,
        object: &ObjectRef,
    ) -> CloneResult<Value> {
        if let Some(existing) = cx.session().try_get_clone(source) {
            return Ok(existing);
        }
        cx.session_mut().stats_mut().strategies_executed += 1;

        let copy = self.allocate(cx.types())?;
        let destination = Value::Object(copy.clone());
        // Recorded before population so cycles resolve to this copy
        cx.session_mut().record(source, destination.clone());

        self.populate(
            cx,
            |index| object.get_at(index).unwrap_or_default(),
            |index, value| {
                copy.set_at(index, value);
            },
        )?;

        self.notify_reference(cx, source, &destination);
        Ok(destination)
    }

    fn clone_array(
        &self,
        cx: &mut CloneContext<'_>,
        source: &Value,
        array: &ArrayRef,
        element: TypeKey,
    ) -> CloneResult<Value> {
        if let Some(existing) = cx.session().try_get_clone(source) {
            return Ok(existing);
        }
        cx.session_mut().stats_mut().strategies_executed += 1;

        let elements = array.to_vec();
        let zero = cx.types().default_value(element);
        let copy = ArrayRef::new(
            Arc::clone(&self.ty),
            array.shape(),
            vec![zero; elements.len()],
        );
        let destination = Value::Array(copy.clone());
        cx.session_mut().record(source, destination.clone());

        for (index, item) in elements.iter().enumerate() {
            let cloned = cx.clone_as(element, item)?;
            copy.set(index, cloned);
        }

        self.notify_reference(cx, source, &destination);
        Ok(destination)
    }

    fn clone_struct(
        &self,
        cx: &mut CloneContext<'_>,
        source: &Value,
        value: &StructValue,
    ) -> CloneResult<Value> {
        cx.session_mut().stats_mut().strategies_executed += 1;

        let types = cx.types();
        let zeroed = self
            .ty
            .fields()
            .iter()
            .map(|f| types.default_value(f.ty))
            .collect();
        let mut copy = StructValue::new(Arc::clone(&self.ty), zeroed);

        self.populate(
            cx,
            |index| value.get_at(index).cloned().unwrap_or_default(),
            |index, field_value| {
                copy.set_at(index, field_value);
            },
        )?;

        let mut destination = Value::Struct(copy);
        if let Notify::Value(listeners) = &self.notify {
            for listener in listeners {
                listener.decorate(cx, source, &mut destination);
                cx.session_mut().stats_mut().listener_invocations += 1;
            }
        }
        Ok(destination)
    }

    fn allocate(&self, types: &dyn TypeIntrospector) -> CloneResult<ObjectRef> {
        if self.allocation == Allocation::Constructor {
            if let Some(object) = types.construct_default(&self.ty) {
                return Ok(object);
            }
        }
        types
            .allocate_uninitialized(&self.ty)
            .map_err(|source| CloneError::allocation(self.ty.name(), source))
    }

    fn populate(
        &self,
        cx: &mut CloneContext<'_>,
        read: impl Fn(usize) -> Value,
        mut write: impl FnMut(usize, Value),
    ) -> CloneResult<()> {
        for action in &self.fields {
            let index = action.field.index;
            match action.behavior {
                Behavior::Clone => {
                    let value = read(index);
                    let cloned = cx.clone_as(action.field.ty, &value)?;
                    write(index, cloned);
                }
                Behavior::CopyValue => write(index, read(index)),
                Behavior::DoNotInitialize => {}
                Behavior::AssignDefault => write(index, cx.types().default_value(action.field.ty)),
            }
        }
        Ok(())
    }

    fn notify_reference(&self, cx: &mut CloneContext<'_>, source: &Value, destination: &Value) {
        if let Notify::Reference(listeners) = &self.notify {
            for listener in listeners {
                listener.on_clone(cx, source, destination);
                cx.session_mut().stats_mut().listener_invocations += 1;
            }
        }
    }
}

impl fmt::Debug for TypeCloneStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCloneStrategy")
            .field("type", &self.ty.name())
            .field("allocation", &self.allocation)
            .field("fields", &self.fields)
            .field("listeners", &self.notify.len())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Generation-stamped cache of compiled strategies
///
/// Invalidation bumps the generation before clearing, so a strategy
/// compiled concurrently against stale registrations is never stored.
#[derive(Debug, Default)]
pub struct StrategyCache {
    entries: DashMap<TypeKey, Arc<TypeCloneStrategy>>,
    generation: AtomicU64,
}

impl StrategyCache {
    /// Create empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cached strategy for `ty`, if compiled in the current generation
    #[must_use]
    pub fn get(&self, ty: TypeKey) -> Option<Arc<TypeCloneStrategy>> {
        let generation = self.generation();
        self.entries
            .get(&ty)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|strategy| strategy.generation == generation)
    }

    /// Store a strategy unless it is already stale
    pub fn insert(&self, strategy: Arc<TypeCloneStrategy>) {
        if strategy.generation == self.generation() {
            self.entries.insert(strategy.ty.key(), strategy);
        }
    }

    /// Drop every compiled strategy
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.entries.clear();
    }

    /// Number of cached strategies
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
