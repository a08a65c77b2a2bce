use pretty_assertions::assert_eq;
use replica_engine::{CloneEngine, CloneError, EngineConfig};
use replica_model::{EnumValue, TypeDef, TypeIntrospector, TypeKey, Value};
use replica_test_utils::{check_isomorphic, reachable_instances, Fixtures};
use std::sync::Arc;

fn setup() -> (Fixtures, CloneEngine) {
    let fixtures = Fixtures::new();
    let engine = CloneEngine::new(fixtures.registry.clone());
    (fixtures, engine)
}

#[test]
fn test_null_returns_null() {
    let (fixtures, engine) = setup();
    assert_eq!(engine.clone_value(&Value::Null).unwrap(), Value::Null);
    assert_eq!(
        engine.clone_as(fixtures.mutable_class, &Value::Null).unwrap(),
        Value::Null
    );
}

#[test]
fn test_primitives_pass_through() {
    let (_, engine) = setup();
    for value in [
        Value::Int(42),
        Value::Bool(true),
        Value::Float(1.5),
        Value::Char('x'),
        Value::Pointer(0xdead),
    ] {
        assert_eq!(engine.clone_value(&value).unwrap(), value);
    }
}

#[test]
fn test_string_is_same_instance() {
    let (_, engine) = setup();
    let text = Value::string("asdf");
    let clone = engine.clone_value(&text).unwrap();
    assert_eq!(clone.as_str(), Some("asdf"));
    assert!(clone.same_instance(&text));
}

#[test]
fn test_enum_passes_through() {
    let (fixtures, engine) = setup();
    let red = Value::Enum(EnumValue::new(fixtures.color, 2));
    assert_eq!(engine.clone_value(&red).unwrap(), red);
}

#[test]
fn test_immutable_record_is_same_instance() {
    let (fixtures, engine) = setup();
    let record = fixtures.immutable_record(42, "asdf");
    assert!(engine.is_immutable(fixtures.immutable_record));
    let clone = engine.clone_value(&record).unwrap();
    assert!(clone.same_instance(&record));
}

#[test]
fn test_immutable_record_struct_is_equal() {
    let (fixtures, engine) = setup();
    let record = fixtures.record_struct(42, "asdf");
    assert!(engine.is_immutable(fixtures.record_struct));
    assert_eq!(engine.clone_value(&record).unwrap(), record);
    assert_eq!(engine.cached_strategies(), 0);
}

#[test]
fn test_plain_object_is_new_instance() {
    let (_, engine) = setup();
    let registry = engine.types();
    let object = registry
        .allocate_uninitialized(&registry.descriptor(TypeKey::OBJECT).unwrap())
        .unwrap();
    let source = Value::Object(object);
    let clone = engine.clone_value(&source).unwrap();
    assert!(!clone.same_instance(&source));
    assert_eq!(clone.runtime_type(), Some(TypeKey::OBJECT));
}

#[test]
fn test_mutable_object_copies_fields() {
    let (fixtures, engine) = setup();
    let source = fixtures.mutable(7);
    let clone = engine.clone_value(&source).unwrap();
    assert!(!clone.same_instance(&source));
    assert_eq!(clone.as_object().unwrap().get("number"), Some(Value::Int(7)));

    // The copy is independent of the source
    clone.as_object().unwrap().set("number", Value::Int(8));
    assert_eq!(source.as_object().unwrap().get("number"), Some(Value::Int(7)));
}

#[test]
fn test_int_array_is_new_instance() {
    let (fixtures, engine) = setup();
    let source = fixtures.int_array(&[1, 2, 3]);
    let clone = engine.clone_value(&source).unwrap();
    assert!(!clone.same_instance(&source));
    assert_eq!(
        clone.as_array().unwrap().to_vec(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[test]
fn test_two_dimensional_array() {
    let (fixtures, engine) = setup();
    let shared = fixtures.mutable(5);
    let source = Value::Array(
        fixtures
            .registry
            .array2(
                fixtures.mutable_class,
                vec![
                    vec![shared.clone(), fixtures.mutable(1)],
                    vec![Value::Null, shared.clone()],
                ],
            )
            .unwrap(),
    );

    let clone = engine.clone_value(&source).unwrap();
    let array = clone.as_array().unwrap();
    assert_eq!(array.shape().to_vec(), vec![2usize, 2]);
    assert_eq!(array.get2(1, 0), Some(Value::Null));

    let first = array.get2(0, 0).unwrap();
    let last = array.get2(1, 1).unwrap();
    assert!(first.same_instance(&last));
    assert!(!first.same_instance(&shared));
    assert!(check_isomorphic(&source, &clone).is_ok());
}

#[test]
fn test_rank_three_array_is_unsupported() {
    let (fixtures, engine) = setup();
    let cube = fixtures
        .registry
        .new_array(TypeKey::INT, &[1, 1, 1], vec![Value::Int(1)])
        .unwrap();
    let err = engine.clone_value(&Value::Array(cube)).unwrap_err();
    assert_eq!(
        err,
        CloneError::UnsupportedShape {
            type_name: "int[,,]".to_string(),
            rank: 3
        }
    );
}

#[test]
fn test_repeated_reference_shares_one_clone() {
    let (fixtures, engine) = setup();
    let shared = fixtures.mutable(1);
    let source = fixtures.list(vec![shared.clone(), shared.clone(), shared.clone()]);

    let clone = engine.clone_value(&source).unwrap();
    let items = clone.as_object().unwrap().get("items").unwrap();
    let items = items.as_array().unwrap();
    let first = items.get(0).unwrap();
    assert!(!first.same_instance(&shared));
    assert!(first.same_instance(&items.get(1).unwrap()));
    assert!(first.same_instance(&items.get(2).unwrap()));
    assert_eq!(items.get(3), Some(Value::Null));
    assert_eq!(
        clone.as_object().unwrap().get("size"),
        Some(Value::Int(3))
    );
}

#[test]
fn test_self_reference_points_to_clone() {
    let (fixtures, engine) = setup();
    let source = fixtures.self_referencing();
    let clone = engine.clone_value(&source).unwrap();
    let reference = clone.as_object().unwrap().get("reference").unwrap();
    assert!(reference.same_instance(&clone));
    assert!(!reference.same_instance(&source));
}

#[test]
fn test_array_containing_itself() {
    let (fixtures, engine) = setup();
    let array = fixtures
        .registry
        .array1(TypeKey::OBJECT, vec![Value::Null, Value::Int(4)])
        .unwrap();
    let source = Value::Array(array.clone());
    array.set(0, source.clone());

    let clone = engine.clone_value(&source).unwrap();
    let first = clone.as_array().unwrap().get(0).unwrap();
    assert!(!clone.same_instance(&source));
    assert!(first.same_instance(&clone));
    assert!(!first.same_instance(&source));
    assert_eq!(clone.as_array().unwrap().get(1), Some(Value::Int(4)));
}

#[test]
fn test_two_dimensional_array_containing_itself() {
    let (fixtures, engine) = setup();
    let array = fixtures
        .registry
        .array2(
            TypeKey::OBJECT,
            vec![vec![Value::Null, Value::Null], vec![Value::Null, Value::Null]],
        )
        .unwrap();
    let source = Value::Array(array.clone());
    array.set2(1, 0, source.clone());
    array.set2(0, 1, source.clone());

    let clone = engine.clone_value(&source).unwrap();
    let copy = clone.as_array().unwrap();
    assert!(!clone.same_instance(&source));
    for (row, column) in [(1, 0), (0, 1)] {
        let element = copy.get2(row, column).unwrap();
        assert!(element.same_instance(&clone));
        assert!(!element.same_instance(&source));
    }
    assert_eq!(copy.get2(0, 0), Some(Value::Null));
}

#[test]
fn test_map_of_base_keeps_derived_values() {
    let (fixtures, engine) = setup();
    let payload = fixtures.mutable(10);
    let tag = fixtures.mutable(20);
    let derived = fixtures.derived("asdf", 99, payload.clone(), tag);
    let source = fixtures.base_map(vec![("k", derived.clone())]);

    let clone = engine.clone_value(&source).unwrap();
    let values = clone.as_object().unwrap().get("values").unwrap();
    let value = values.as_array().unwrap().get(0).unwrap();
    let object = value.as_object().unwrap();

    assert_eq!(value.runtime_type(), Some(fixtures.derived));
    assert!(!value.same_instance(&derived));
    assert_eq!(object.get("name").unwrap().as_str(), Some("asdf"));
    assert_eq!(object.get("extra"), Some(Value::Int(99)));
    let cloned_payload = object.get("payload").unwrap();
    assert!(!cloned_payload.same_instance(&payload));
    assert_eq!(
        cloned_payload.as_object().unwrap().get("number"),
        Some(Value::Int(10))
    );
    assert_eq!(
        object.get("tag").unwrap().as_object().unwrap().get("number"),
        Some(Value::Int(20))
    );

    let keys = clone.as_object().unwrap().get("keys").unwrap();
    assert_eq!(keys.as_array().unwrap().get(0).unwrap().as_str(), Some("k"));
}

#[test]
fn test_clone_as_base_keeps_runtime_type() {
    let (fixtures, engine) = setup();
    let derived = fixtures.derived("d", 1, Value::Null, Value::Null);
    let clone = engine.clone_as(fixtures.base, &derived).unwrap();
    assert_eq!(clone.runtime_type(), Some(fixtures.derived));

    let through_interface = engine.clone_as(fixtures.entity, &derived).unwrap();
    assert_eq!(through_interface.runtime_type(), Some(fixtures.derived));
}

#[test]
fn test_struct_with_reference_field() {
    let (fixtures, engine) = setup();
    let owner = fixtures.mutable(3);
    let source = fixtures.slot(owner.clone(), 9);
    assert!(!engine.is_immutable(fixtures.slot));

    let clone = engine.clone_value(&source).unwrap();
    let fields = clone.as_struct().unwrap();
    assert_eq!(fields.get("weight"), Some(&Value::Int(9)));
    let cloned_owner = fields.get("owner").unwrap();
    assert!(!cloned_owner.same_instance(&owner));
}

#[test]
fn test_boxed_structs_share_inner_references() {
    let (fixtures, engine) = setup();
    let owner = fixtures.mutable(3);
    let items = vec![
        fixtures.holder(fixtures.slot(owner.clone(), 1)),
        fixtures.holder(fixtures.slot(owner.clone(), 2)),
    ];
    let source = Value::Array(
        fixtures
            .registry
            .array1(fixtures.holder, items)
            .unwrap(),
    );

    let clone = engine.clone_value(&source).unwrap();
    let array = clone.as_array().unwrap();
    let owner_of = |index: usize| {
        let holder = array.get(index).unwrap();
        let slot = holder.as_object().unwrap().get("item").unwrap();
        slot.as_struct().unwrap().get("owner").unwrap().clone()
    };
    assert!(owner_of(0).same_instance(&owner_of(1)));
    assert!(!owner_of(0).same_instance(&owner));
}

#[test]
fn test_clone_shares_no_mutable_instance() {
    let (fixtures, engine) = setup();
    let nodes = fixtures.graph(&[vec![1, 2], vec![2, 0], vec![2]]);
    let clone = engine.clone_value(&nodes[0]).unwrap();

    let source_ids = reachable_instances(&nodes[0]);
    let clone_ids = reachable_instances(&clone);
    assert_eq!(source_ids.len(), clone_ids.len());
    assert!(source_ids.is_disjoint(&clone_ids));
    assert!(check_isomorphic(&nodes[0], &clone).is_ok());
}

#[test]
fn test_stats_count_distinct_instances() {
    let (fixtures, engine) = setup();
    let shared = fixtures.mutable(1);
    let source = fixtures.list(vec![shared.clone(), shared]);
    let (_, stats) = engine.clone_with_stats(&source).unwrap();
    // list, items array, one shared element
    assert_eq!(stats.tracked_references, 3);
    assert_eq!(stats.strategies_executed, 3);
    assert_eq!(stats.listener_invocations, 0);
    assert_eq!(stats.max_depth, 3);
}

#[test]
fn test_strategies_are_cached_per_runtime_type() {
    let (fixtures, engine) = setup();
    engine.clone_value(&fixtures.mutable(1)).unwrap();
    engine.clone_value(&fixtures.mutable(2)).unwrap();
    assert_eq!(engine.cached_strategies(), 1);

    let derived = fixtures.derived("d", 1, Value::Null, Value::Null);
    engine.clone_as(fixtures.base, &derived).unwrap();
    engine.clone_as(TypeKey::OBJECT, &derived).unwrap();
    assert_eq!(engine.cached_strategies(), 2);
    assert_eq!(engine.cached_dispatches(), 3);
}

#[test]
fn test_abstract_instance_fails_allocation() {
    let (fixtures, engine) = setup();
    let shape = fixtures.registry.descriptor(fixtures.shape).unwrap();
    // Only reachable when a host hands over an instance of an abstract type
    let orphan = Value::Object(replica_model::ObjectRef::new(shape, Vec::new()));
    let err = engine.clone_value(&orphan).unwrap_err();
    assert!(matches!(err, CloneError::Allocation { ref type_name, .. } if type_name == "Shape"));
}

#[test]
fn test_type_mismatch_is_rejected() {
    let (fixtures, engine) = setup();
    let err = engine
        .clone_as(fixtures.base, &fixtures.mutable(1))
        .unwrap_err();
    assert_eq!(
        err,
        CloneError::TypeMismatch {
            declared: "Base".to_string(),
            runtime: "MutableClass".to_string()
        }
    );

    let lenient = CloneEngine::with_config(
        fixtures.registry.clone(),
        EngineConfig::new().with_verify_assignability(false),
    );
    assert!(lenient.clone_as(fixtures.base, &fixtures.mutable(1)).is_ok());
}

#[test]
fn test_undefined_type_is_unknown() {
    let (fixtures, engine) = setup();
    let pending = fixtures.registry.declare("Pending").unwrap();
    let value = Value::Enum(EnumValue::new(pending, 0));
    assert_eq!(
        engine.clone_value(&value).unwrap_err(),
        CloneError::UnknownType("Pending".to_string())
    );

    fixtures
        .registry
        .define(pending, TypeDef::enumeration("Pending"))
        .unwrap();
    assert_eq!(engine.clone_value(&value).unwrap(), value);
}

#[test]
fn test_depth_limit_from_json_config() {
    let fixtures = Fixtures::new();
    let config: EngineConfig = serde_json::from_str(r#"{ "max_depth": 3 }"#).unwrap();
    let engine = CloneEngine::with_config(fixtures.registry.clone(), config);

    // node -> edges array -> node -> edges array
    let shallow = fixtures.graph(&[vec![], vec![0]]);
    assert!(engine.clone_value(&shallow[0]).is_ok());
    let err = engine.clone_value(&shallow[1]).unwrap_err();
    assert_eq!(err, CloneError::DepthLimitExceeded { limit: 3 });
}

#[test]
fn test_concurrent_clones_share_engine() {
    let fixtures = Arc::new(Fixtures::new());
    let engine = Arc::new(CloneEngine::new(fixtures.registry.clone()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let fixtures = Arc::clone(&fixtures);
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let nodes = fixtures.graph(&[vec![1], vec![0], vec![i % 2]]);
                let clone = engine.clone_value(&nodes[2]).unwrap();
                check_isomorphic(&nodes[2], &clone)
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().is_ok());
    }
}
