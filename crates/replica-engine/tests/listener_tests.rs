use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use replica_engine::{CloneContext, CloneEngine, Listener, ReferenceListener};
use replica_model::{Identity, Value};
use replica_test_utils::Fixtures;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn setup() -> (Fixtures, CloneEngine) {
    let fixtures = Fixtures::new();
    let engine = CloneEngine::new(fixtures.registry.clone());
    (fixtures, engine)
}

fn counting_listener(engine: &CloneEngine) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    engine.register_listener(Listener::reference_fn(move |_, _, _| {
        seen.fetch_add(1, Ordering::SeqCst);
    }));
    count
}

/// Side data keyed by instance identity, replicated onto clones
#[derive(Default)]
struct SideTable {
    entries: Mutex<HashMap<Identity, Value>>,
}

impl SideTable {
    fn attach(&self, owner: &Value, data: Value) {
        let identity = owner.reference_identity().unwrap();
        self.entries.lock().insert(identity, data);
    }

    fn get(&self, owner: &Value) -> Option<Value> {
        let identity = owner.reference_identity()?;
        self.entries.lock().get(&identity).cloned()
    }
}

struct SideTableListener(Arc<SideTable>);

impl ReferenceListener for SideTableListener {
    fn on_clone(&self, cx: &mut CloneContext<'_>, source: &Value, destination: &Value) {
        let Some(data) = self.0.get(source) else {
            return;
        };
        if let Ok(copy) = cx.clone_value(&data) {
            self.0.attach(destination, copy);
        }
    }
}

#[test]
fn test_listener_runs_once_per_distinct_instance() {
    let (fixtures, engine) = setup();
    let count = counting_listener(&engine);

    let shared = fixtures.mutable(1);
    let source = fixtures.list(vec![shared.clone(), shared.clone(), shared]);
    let (_, stats) = engine.clone_with_stats(&source).unwrap();

    // list, items array, shared element
    assert_eq!(count.load(Ordering::SeqCst), 3);
    assert_eq!(stats.listener_invocations, 3);
}

#[test]
fn test_listener_not_called_for_immutable_values() {
    let (fixtures, engine) = setup();
    let count = counting_listener(&engine);

    engine.clone_value(&Value::Int(1)).unwrap();
    engine.clone_value(&Value::string("text")).unwrap();
    engine
        .clone_value(&fixtures.immutable_record(1, "a"))
        .unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_listener_sees_populated_clone() {
    let (fixtures, engine) = setup();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    engine.register_listener(Listener::reference_fn(move |_, source, destination| {
        let number = |v: &Value| v.as_object().unwrap().get("number");
        sink.lock().push((number(source), number(destination)));
        assert!(!source.same_instance(destination));
    }));

    engine.clone_value(&fixtures.mutable(42)).unwrap();
    assert_eq!(
        *observed.lock(),
        vec![(Some(Value::Int(42)), Some(Value::Int(42)))]
    );
}

#[test]
fn test_listeners_run_in_registration_order() {
    let (fixtures, engine) = setup();
    let log = Arc::new(Mutex::new(Vec::new()));
    for name in ["first", "second", "third"] {
        let log = Arc::clone(&log);
        engine.register_listener(Listener::reference_fn(move |_, _, _| {
            log.lock().push(name);
        }));
    }

    engine.clone_value(&fixtures.mutable(1)).unwrap();
    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

#[test]
fn test_side_table_is_replicated_within_session() {
    let (fixtures, engine) = setup();
    let table = Arc::new(SideTable::default());
    engine.register_listener(Listener::reference(SideTableListener(Arc::clone(&table))));

    // The side data is also reachable from the graph itself
    let shared = fixtures.mutable(7);
    let owner = fixtures.holder(shared.clone());
    let side = fixtures.list(vec![shared.clone()]);
    table.attach(&owner, side.clone());

    let clone = engine.clone_value(&owner).unwrap();
    let copied_side = table.get(&clone).unwrap();
    assert!(!copied_side.same_instance(&side));

    let items = copied_side.as_object().unwrap().get("items").unwrap();
    let side_element = items.as_array().unwrap().get(0).unwrap();
    let graph_element = clone.as_object().unwrap().get("item").unwrap();
    assert!(side_element.same_instance(&graph_element));
    assert!(!side_element.same_instance(&shared));
}

#[test]
fn test_value_listener_replaces_struct_clone() {
    let (fixtures, engine) = setup();
    let slot = fixtures.slot;
    engine.register_listener(Listener::value_fn(move |_, _, destination| {
        if destination.runtime_type() == Some(slot) {
            if let Some(fields) = destination.as_struct_mut() {
                fields.set("weight", Value::Int(100));
            }
        }
    }));

    let source = fixtures.slot(fixtures.mutable(1), 5);
    let clone = engine.clone_value(&source).unwrap();
    assert_eq!(clone.as_struct().unwrap().get("weight"), Some(&Value::Int(100)));
    assert_eq!(source.as_struct().unwrap().get("weight"), Some(&Value::Int(5)));
}

#[test]
fn test_value_listener_reassignment_ignored_for_references() {
    let (fixtures, engine) = setup();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    engine.register_listener(Listener::value_fn(move |_, _, destination| {
        seen.fetch_add(1, Ordering::SeqCst);
        *destination = Value::Null;
    }));

    let source = fixtures.mutable(3);
    let clone = engine.clone_value(&source).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        clone.as_object().unwrap().get("number"),
        Some(Value::Int(3))
    );
}

#[test]
fn test_listener_registered_after_first_clone() {
    let (fixtures, engine) = setup();
    let source = fixtures.mutable(1);
    engine.clone_value(&source).unwrap();
    assert_eq!(engine.cached_strategies(), 1);

    let count = counting_listener(&engine);
    engine.clone_value(&source).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
