//! Clone engine
//!
//! [`CloneEngine`] owns every registration and cache. Each top-level clone
//! call runs inside a fresh [`CloneContext`], which carries the session and
//! is handed to listeners so they can clone side data consistently.

use crate::config::EngineConfig;
use crate::dispatch::PolymorphicDispatcher;
use crate::error::{CloneError, CloneResult};
use crate::filter::{Behavior, FieldFilterRegistry};
use crate::immutability::ImmutabilityClassifier;
use crate::listener::{Listener, ListenerRegistry};
use crate::session::{CloneSession, SessionStats};
use crate::strategy::{StrategyCache, TypeCloneStrategy};
use replica_model::{FieldDescriptor, TypeIntrospector, TypeKey, Value};
use std::sync::Arc;

/// Deep-cloning engine over an introspected type system
///
/// The engine is `Send + Sync`; share it behind an [`Arc`] to clone from
/// several threads. Every call gets its own session.
#[derive(Debug)]
pub struct CloneEngine {
    types: Arc<dyn TypeIntrospector>,
    config: EngineConfig,
    classifier: ImmutabilityClassifier,
    filters: FieldFilterRegistry,
    listeners: ListenerRegistry,
    strategies: StrategyCache,
    dispatcher: PolymorphicDispatcher,
}

impl CloneEngine {
    /// Create engine with default configuration
    #[must_use]
    pub fn new(types: Arc<dyn TypeIntrospector>) -> Self {
        Self::with_config(types, EngineConfig::default())
    }

    /// Create engine with explicit configuration
    #[must_use]
    pub fn with_config(types: Arc<dyn TypeIntrospector>, config: EngineConfig) -> Self {
        tracing::info!(
            "Creating clone engine (max_depth: {:?}, verify_assignability: {})",
            config.max_depth,
            config.verify_assignability
        );
        Self {
            types,
            config,
            classifier: ImmutabilityClassifier::new(),
            filters: FieldFilterRegistry::new(),
            listeners: ListenerRegistry::new(),
            strategies: StrategyCache::new(),
            dispatcher: PolymorphicDispatcher::new(),
        }
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Type introspector
    #[inline]
    #[must_use]
    pub fn types(&self) -> &dyn TypeIntrospector {
        self.types.as_ref()
    }

    /// Register a clone listener
    ///
    /// Compiled strategies are discarded; later clones pick up the listener.
    pub fn register_listener(&self, listener: Listener) {
        tracing::debug!("Registering {:?}", listener);
        self.listeners.register(listener);
        self.invalidate();
    }

    /// Register a field filter
    ///
    /// Filters are consulted in registration order; the first one answering
    /// anything other than [`Behavior::Clone`] decides. Compiled strategies
    /// are discarded.
    pub fn register_field_filter(
        &self,
        filter: impl Fn(&FieldDescriptor) -> Behavior + Send + Sync + 'static,
    ) {
        tracing::debug!("Registering field filter");
        self.filters.register(filter);
        self.invalidate();
    }

    /// Deep-clone a value, declared as its own runtime type
    ///
    /// # Errors
    /// Returns error if any part of the graph cannot be cloned
    pub fn clone_value(&self, value: &Value) -> CloneResult<Value> {
        self.run(declared_type(value), value).map(|(clone, _)| clone)
    }

    /// Deep-clone a value held in a slot of type `declared`
    ///
    /// # Errors
    /// Returns [`CloneError::TypeMismatch`] if assignability is verified and
    /// fails, or any error raised while cloning the graph
    pub fn clone_as(&self, declared: TypeKey, value: &Value) -> CloneResult<Value> {
        self.run(declared, value).map(|(clone, _)| clone)
    }

    /// Deep-clone a value and report session counters
    ///
    /// # Errors
    /// Returns error if any part of the graph cannot be cloned
    pub fn clone_with_stats(&self, value: &Value) -> CloneResult<(Value, SessionStats)> {
        self.run(declared_type(value), value)
    }

    /// Whether instances of `ty` are shared instead of copied
    #[must_use]
    pub fn is_immutable(&self, ty: TypeKey) -> bool {
        self.classifier.is_immutable(self.types.as_ref(), ty)
    }

    /// Number of compiled strategies currently cached
    #[must_use]
    pub fn cached_strategies(&self) -> usize {
        self.strategies.len()
    }

    /// Number of resolved dispatch routes cached
    #[must_use]
    pub fn cached_dispatches(&self) -> usize {
        self.dispatcher.len()
    }

    /// Number of immutability verdicts cached
    #[must_use]
    pub fn cached_verdicts(&self) -> usize {
        self.classifier.len()
    }

    fn invalidate(&self) {
        self.strategies.invalidate();
        tracing::debug!(
            "Clone strategies invalidated (generation {})",
            self.strategies.generation()
        );
    }

    fn run(&self, declared: TypeKey, value: &Value) -> CloneResult<(Value, SessionStats)> {
        let mut cx = CloneContext::new(self);
        match cx.clone_as(declared, value) {
            Ok(clone) => {
                let stats = cx.session.stats();
                tracing::debug!(
                    "Clone finished ({} references, {} strategies, {} listener calls)",
                    stats.tracked_references,
                    stats.strategies_executed,
                    stats.listener_invocations
                );
                Ok((clone, stats))
            }
            Err(err) => {
                tracing::warn!("Clone failed: {}", err);
                Err(err)
            }
        }
    }

    fn strategy_for(&self, ty: TypeKey) -> CloneResult<Arc<TypeCloneStrategy>> {
        if let Some(strategy) = self.strategies.get(ty) {
            return Ok(strategy);
        }
        let desc = self
            .types
            .descriptor(ty)
            .ok_or_else(|| CloneError::UnknownType(self.types.type_name(ty)))?;
        let strategy = Arc::new(TypeCloneStrategy::compile(
            &self.filters,
            &self.listeners,
            desc,
            self.strategies.generation(),
        )?);
        self.strategies.insert(Arc::clone(&strategy));
        Ok(strategy)
    }
}

fn declared_type(value: &Value) -> TypeKey {
    value.runtime_type().unwrap_or(TypeKey::OBJECT)
}

/// State of one top-level clone call
///
/// Listeners receive the context and may clone further values through it;
/// those clones share the session, so instances already copied in this
/// call are reused.
#[derive(Debug)]
pub struct CloneContext<'e> {
    engine: &'e CloneEngine,
    session: CloneSession,
    depth: usize,
}

impl<'e> CloneContext<'e> {
    fn new(engine: &'e CloneEngine) -> Self {
        Self {
            engine,
            session: CloneSession::new(),
            depth: 0,
        }
    }

    /// Engine running this call
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &'e CloneEngine {
        self.engine
    }

    /// Type introspector
    #[inline]
    #[must_use]
    pub fn types(&self) -> &'e dyn TypeIntrospector {
        self.engine.types.as_ref()
    }

    /// Session of this call
    #[inline]
    #[must_use]
    pub fn session(&self) -> &CloneSession {
        &self.session
    }

    #[inline]
    pub(crate) fn session_mut(&mut self) -> &mut CloneSession {
        &mut self.session
    }

    /// Current strategy nesting
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Clone a value within this session, declared as its runtime type
    ///
    /// # Errors
    /// Returns error if any part of the graph cannot be cloned
    pub fn clone_value(&mut self, value: &Value) -> CloneResult<Value> {
        self.clone_as(declared_type(value), value)
    }

    /// Clone a value held in a slot of type `declared`, within this session
    ///
    /// # Errors
    /// Returns error if any part of the graph cannot be cloned
    pub fn clone_as(&mut self, declared: TypeKey, value: &Value) -> CloneResult<Value> {
        let Some(runtime) = value.runtime_type() else {
            return Ok(Value::Null);
        };
        if self.engine.is_immutable(runtime) {
            return Ok(value.clone());
        }
        let route = self.engine.dispatcher.resolve(
            self.types(),
            self.engine.config.verify_assignability,
            declared,
            runtime,
        )?;
        route.invoke(self, value)
    }

    pub(crate) fn run_strategy(&mut self, ty: TypeKey, value: &Value) -> CloneResult<Value> {
        // Instances already copied in this call add no nesting
        if let Some(existing) = self.session.try_get_clone(value) {
            return Ok(existing);
        }
        let strategy = self.engine.strategy_for(ty)?;
        self.enter()?;
        let result = strategy.execute(self, value);
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> CloneResult<()> {
        if let Some(limit) = self.engine.config.max_depth {
            if self.depth >= limit {
                return Err(CloneError::DepthLimitExceeded { limit });
            }
        }
        self.depth += 1;
        let stats = self.session.stats_mut();
        stats.max_depth = stats.max_depth.max(self.depth);
        Ok(())
    }
}
