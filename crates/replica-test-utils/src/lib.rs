//! Testing utilities for Replica workspace
//!
//! Shared type fixtures, graph builders and structural assertions.

#![allow(missing_docs)]

use replica_model::{Identity, TypeDef, TypeKey, TypeRegistry, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Registry pre-populated with the types the engine tests exercise
#[derive(Debug)]
pub struct Fixtures {
    pub registry: Arc<TypeRegistry>,
    /// class MutableClass { number: int }
    pub mutable_class: TypeKey,
    /// class SelfReferencing { reference: SelfReferencing }
    pub self_referencing: TypeKey,
    /// record ImmutableRecord(number: int, text: string)
    pub immutable_record: TypeKey,
    /// struct RecordStruct { number: int, text: string }
    pub record_struct: TypeKey,
    /// struct Slot { owner: MutableClass, weight: int }
    pub slot: TypeKey,
    /// enum Color
    pub color: TypeKey,
    /// interface IEntity
    pub entity: TypeKey,
    /// class Base : IEntity { name: string, payload: MutableClass }
    pub base: TypeKey,
    /// class Derived : Base { extra: int, tag: MutableClass }
    pub derived: TypeKey,
    /// abstract class Shape
    pub shape: TypeKey,
    /// class Holder { item: object }
    pub holder: TypeKey,
    /// class TestData { value: int }
    pub test_data: TypeKey,
    /// class TestClass { id: int, child: TestClass, to_ignore: TestData }
    ///
    /// The constructor assigns a fresh id and a new `TestData`.
    pub test_class: TypeKey,
    /// class GraphNode { value: int, edges: GraphNode[] }
    pub graph_node: TypeKey,
    /// class List { items: MutableClass[], size: int }
    pub mutable_list: TypeKey,
    /// class BaseMap { keys: string[], values: Base[] }
    pub base_map: TypeKey,
    constructed: Arc<AtomicI64>,
}

impl Fixtures {
    pub fn new() -> Self {
        let registry = TypeRegistry::new();

        let mutable_class = registry
            .register(TypeDef::class("MutableClass").field("number", TypeKey::INT))
            .unwrap();

        let self_referencing = registry.declare("SelfReferencing").unwrap();
        registry
            .define(
                self_referencing,
                TypeDef::class("SelfReferencing").field("reference", self_referencing),
            )
            .unwrap();

        let immutable_record = registry
            .register(
                TypeDef::record("ImmutableRecord")
                    .field("number", TypeKey::INT)
                    .field("text", TypeKey::STRING),
            )
            .unwrap();
        let record_struct = registry
            .register(
                TypeDef::structure("RecordStruct")
                    .field("number", TypeKey::INT)
                    .field("text", TypeKey::STRING),
            )
            .unwrap();
        let slot = registry
            .register(
                TypeDef::structure("Slot")
                    .field("owner", mutable_class)
                    .field("weight", TypeKey::INT),
            )
            .unwrap();
        let color = registry.register(TypeDef::enumeration("Color")).unwrap();

        let entity = registry.register(TypeDef::interface("IEntity")).unwrap();
        let base = registry
            .register(
                TypeDef::class("Base")
                    .implements(entity)
                    .field("name", TypeKey::STRING)
                    .field("payload", mutable_class),
            )
            .unwrap();
        let derived = registry
            .register(
                TypeDef::class("Derived")
                    .extends(base)
                    .field("extra", TypeKey::INT)
                    .field("tag", mutable_class),
            )
            .unwrap();
        let shape = registry
            .register(TypeDef::class("Shape").abstract_type())
            .unwrap();
        let holder = registry
            .register(TypeDef::class("Holder").field("item", TypeKey::OBJECT))
            .unwrap();

        let test_data = registry
            .register(TypeDef::class("TestData").field("value", TypeKey::INT))
            .unwrap();
        let constructed = Arc::new(AtomicI64::new(0));
        let counter = Arc::clone(&constructed);
        let test_class = registry.declare("TestClass").unwrap();
        registry
            .define(
                test_class,
                TypeDef::class("TestClass")
                    .field("id", TypeKey::INT)
                    .field("child", test_class)
                    .field("to_ignore", test_data)
                    .with_constructor(move |registry, object| {
                        let id = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        object.set("id", Value::Int(id));
                        object.set(
                            "to_ignore",
                            registry.instantiate(test_data).unwrap_or_default(),
                        );
                    }),
            )
            .unwrap();

        let graph_node = registry.declare("GraphNode").unwrap();
        let edges = registry.array_of(graph_node, 1).unwrap();
        registry
            .define(
                graph_node,
                TypeDef::class("GraphNode")
                    .field("value", TypeKey::INT)
                    .field("edges", edges),
            )
            .unwrap();

        let items = registry.array_of(mutable_class, 1).unwrap();
        let mutable_list = registry
            .register(
                TypeDef::class("List")
                    .field("items", items)
                    .field("size", TypeKey::INT),
            )
            .unwrap();

        let keys = registry.array_of(TypeKey::STRING, 1).unwrap();
        let values = registry.array_of(base, 1).unwrap();
        let base_map = registry
            .register(
                TypeDef::class("BaseMap")
                    .field("keys", keys)
                    .field("values", values),
            )
            .unwrap();

        Self {
            registry: Arc::new(registry),
            mutable_class,
            self_referencing,
            immutable_record,
            record_struct,
            slot,
            color,
            entity,
            base,
            derived,
            shape,
            holder,
            test_data,
            test_class,
            graph_node,
            mutable_list,
            base_map,
            constructed,
        }
    }

    /// Number of `TestClass` constructor runs so far
    pub fn constructed(&self) -> i64 {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn new_object(&self, ty: TypeKey, fields: &[(&str, Value)]) -> Value {
        let value = self.registry.instantiate(ty).unwrap();
        if let Some(object) = value.as_object() {
            for (name, field) in fields {
                assert!(object.set(name, field.clone()), "no field '{name}'");
            }
        }
        value
    }

    pub fn mutable(&self, number: i64) -> Value {
        self.new_object(self.mutable_class, &[("number", Value::Int(number))])
    }

    /// Instance whose `reference` points back at itself
    pub fn self_referencing(&self) -> Value {
        let value = self.registry.instantiate(self.self_referencing).unwrap();
        value
            .as_object()
            .unwrap()
            .set("reference", value.clone());
        value
    }

    pub fn immutable_record(&self, number: i64, text: &str) -> Value {
        self.new_object(
            self.immutable_record,
            &[("number", Value::Int(number)), ("text", Value::string(text))],
        )
    }

    pub fn record_struct(&self, number: i64, text: &str) -> Value {
        let mut value = self.registry.instantiate(self.record_struct).unwrap();
        let fields = value.as_struct_mut().unwrap();
        fields.set("number", Value::Int(number));
        fields.set("text", Value::string(text));
        value
    }

    pub fn slot(&self, owner: Value, weight: i64) -> Value {
        let mut value = self.registry.instantiate(self.slot).unwrap();
        let fields = value.as_struct_mut().unwrap();
        fields.set("owner", owner);
        fields.set("weight", Value::Int(weight));
        value
    }

    pub fn derived(&self, name: &str, extra: i64, payload: Value, tag: Value) -> Value {
        self.new_object(
            self.derived,
            &[
                ("name", Value::string(name)),
                ("payload", payload),
                ("extra", Value::Int(extra)),
                ("tag", tag),
            ],
        )
    }

    pub fn holder(&self, item: Value) -> Value {
        self.new_object(self.holder, &[("item", item)])
    }

    pub fn int_array(&self, items: &[i64]) -> Value {
        let items = items.iter().map(|&i| Value::Int(i)).collect();
        Value::Array(self.registry.array1(TypeKey::INT, items).unwrap())
    }

    /// List of `MutableClass` with spare capacity, like a growable list
    pub fn list(&self, items: Vec<Value>) -> Value {
        let size = items.len();
        let mut slots = items;
        slots.resize(size.next_power_of_two().max(4), Value::Null);
        let array = self.registry.array1(self.mutable_class, slots).unwrap();
        self.new_object(
            self.mutable_list,
            &[
                ("items", Value::Array(array)),
                ("size", Value::Int(i64::try_from(size).unwrap())),
            ],
        )
    }

    /// String-keyed map whose values are declared as `Base`
    pub fn base_map(&self, entries: Vec<(&str, Value)>) -> Value {
        let (keys, values): (Vec<Value>, Vec<Value>) = entries
            .into_iter()
            .map(|(key, value)| (Value::string(key), value))
            .unzip();
        let keys = self.registry.array1(TypeKey::STRING, keys).unwrap();
        let values = self.registry.array1(self.base, values).unwrap();
        self.new_object(
            self.base_map,
            &[("keys", Value::Array(keys)), ("values", Value::Array(values))],
        )
    }

    /// Graph of `GraphNode`s; `edges[i]` lists the targets of node `i`
    pub fn graph(&self, edges: &[Vec<usize>]) -> Vec<Value> {
        let nodes: Vec<Value> = (0..edges.len())
            .map(|i| {
                self.new_object(
                    self.graph_node,
                    &[("value", Value::Int(i64::try_from(i).unwrap()))],
                )
            })
            .collect();
        for (node, targets) in nodes.iter().zip(edges) {
            let targets = targets.iter().map(|&t| nodes[t].clone()).collect();
            let array = self.registry.array1(self.graph_node, targets).unwrap();
            node.as_object().unwrap().set("edges", Value::Array(array));
        }
        nodes
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::new()
    }
}

/// Identities of every object and array reachable from `root`
pub fn reachable_instances(root: &Value) -> HashSet<Identity> {
    let mut seen = HashSet::new();
    let mut stack = vec![root.clone()];
    while let Some(value) = stack.pop() {
        match &value {
            Value::Object(object) => {
                if seen.insert(object.identity()) {
                    stack.extend(object.fields());
                }
            }
            Value::Array(array) => {
                if seen.insert(array.identity()) {
                    stack.extend(array.to_vec());
                }
            }
            Value::Struct(fields) => stack.extend(fields.fields().iter().cloned()),
            _ => {}
        }
    }
    seen
}

/// Check that `clone` mirrors `source` up to a one-to-one renaming of instances
///
/// # Errors
/// Describes the first divergence found
pub fn check_isomorphic(source: &Value, clone: &Value) -> Result<(), String> {
    let mut forward: HashMap<Identity, Identity> = HashMap::new();
    let mut backward: HashMap<Identity, Identity> = HashMap::new();
    let mut stack = vec![(source.clone(), clone.clone())];

    while let Some((s, c)) = stack.pop() {
        let (s_id, c_id) = match (s.reference_identity(), c.reference_identity()) {
            (Some(a), Some(b)) => (a, b),
            (None, None) => {
                match (&s, &c) {
                    (Value::Struct(a), Value::Struct(b)) => {
                        if a.type_key() != b.type_key() {
                            return Err(format!("struct type differs: {s:?} vs {c:?}"));
                        }
                        stack.extend(a.fields().iter().cloned().zip(b.fields().iter().cloned()));
                    }
                    _ if s != c => return Err(format!("value differs: {s:?} vs {c:?}")),
                    _ => {}
                }
                continue;
            }
            _ => return Err(format!("shape differs: {s:?} vs {c:?}")),
        };

        match forward.get(&s_id) {
            Some(mapped) if *mapped == c_id => continue,
            Some(_) => return Err(format!("{s:?} maps to two different clones")),
            None => {}
        }
        if backward.insert(c_id, s_id).is_some() {
            return Err(format!("{c:?} is the clone of two different sources"));
        }
        forward.insert(s_id, c_id);

        match (&s, &c) {
            (Value::Object(a), Value::Object(b)) => {
                if a.type_key() != b.type_key() {
                    return Err(format!("object type differs: {s:?} vs {c:?}"));
                }
                stack.extend(a.fields().into_iter().zip(b.fields()));
            }
            (Value::Array(a), Value::Array(b)) => {
                if a.type_key() != b.type_key() || a.shape() != b.shape() {
                    return Err(format!("array shape differs: {s:?} vs {c:?}"));
                }
                stack.extend(a.to_vec().into_iter().zip(b.to_vec()));
            }
            _ => return Err(format!("kind differs: {s:?} vs {c:?}")),
        }
    }
    Ok(())
}
