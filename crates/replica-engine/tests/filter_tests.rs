use pretty_assertions::assert_eq;
use replica_engine::{Behavior, CloneEngine};
use replica_model::{FieldDescriptor, Value};
use replica_test_utils::Fixtures;

fn setup() -> (Fixtures, CloneEngine) {
    let fixtures = Fixtures::new();
    let engine = CloneEngine::new(fixtures.registry.clone());
    (fixtures, engine)
}

fn on_field(name: &'static str, behavior: Behavior) -> impl Fn(&FieldDescriptor) -> Behavior {
    move |field| {
        if field.name.as_ref() == name {
            behavior
        } else {
            Behavior::Clone
        }
    }
}

fn field(value: &Value, name: &str) -> Value {
    value.as_object().unwrap().get(name).unwrap()
}

#[test]
fn test_do_not_initialize_keeps_constructor_value() {
    let (fixtures, engine) = setup();
    engine.register_field_filter(on_field("id", Behavior::DoNotInitialize));

    let source = fixtures.registry.instantiate(fixtures.test_class).unwrap();
    assert_eq!(field(&source, "id"), Value::Int(1));

    let clone = engine.clone_value(&source).unwrap();
    assert_eq!(field(&clone, "id"), Value::Int(2));
    assert_eq!(fixtures.constructed(), 2);
}

#[test]
fn test_copy_value_shares_reference() {
    let (fixtures, engine) = setup();
    engine.register_field_filter(on_field("to_ignore", Behavior::CopyValue));

    let source = fixtures.registry.instantiate(fixtures.test_class).unwrap();
    let clone = engine.clone_value(&source).unwrap();
    assert!(field(&clone, "to_ignore").same_instance(&field(&source, "to_ignore")));
    assert_eq!(field(&clone, "id"), field(&source, "id"));
}

#[test]
fn test_do_not_initialize_reference_comes_from_constructor() {
    let (fixtures, engine) = setup();
    engine.register_field_filter(on_field("to_ignore", Behavior::DoNotInitialize));

    let source = fixtures.registry.instantiate(fixtures.test_class).unwrap();
    field(&source, "to_ignore")
        .as_object()
        .unwrap()
        .set("value", Value::Int(11));

    let clone = engine.clone_value(&source).unwrap();
    let data = field(&clone, "to_ignore");
    assert!(!data.is_null());
    assert!(!data.same_instance(&field(&source, "to_ignore")));
    assert_eq!(field(&data, "value"), Value::Int(0));
}

#[test]
fn test_assign_default_clears_field() {
    let (fixtures, engine) = setup();
    engine.register_field_filter(on_field("to_ignore", Behavior::AssignDefault));
    engine.register_field_filter(on_field("number", Behavior::AssignDefault));

    let source = fixtures.registry.instantiate(fixtures.test_class).unwrap();
    let clone = engine.clone_value(&source).unwrap();
    assert_eq!(field(&clone, "to_ignore"), Value::Null);

    let mutable = engine.clone_value(&fixtures.mutable(5)).unwrap();
    assert_eq!(field(&mutable, "number"), Value::Int(0));
}

#[test]
fn test_unfiltered_fields_clone_recursively() {
    let (fixtures, engine) = setup();
    engine.register_field_filter(on_field("to_ignore", Behavior::CopyValue));

    let parent = fixtures.registry.instantiate(fixtures.test_class).unwrap();
    let child = fixtures.registry.instantiate(fixtures.test_class).unwrap();
    parent.as_object().unwrap().set("child", child.clone());

    let clone = engine.clone_value(&parent).unwrap();
    let cloned_child = field(&clone, "child");
    assert!(!cloned_child.same_instance(&child));
    assert_eq!(field(&cloned_child, "id"), field(&child, "id"));
    // The filter applies at every level of the graph
    assert!(field(&cloned_child, "to_ignore").same_instance(&field(&child, "to_ignore")));
}

#[test]
fn test_first_registered_filter_wins() {
    let (fixtures, engine) = setup();
    engine.register_field_filter(on_field("to_ignore", Behavior::AssignDefault));
    engine.register_field_filter(on_field("to_ignore", Behavior::CopyValue));

    let source = fixtures.registry.instantiate(fixtures.test_class).unwrap();
    let clone = engine.clone_value(&source).unwrap();
    assert_eq!(field(&clone, "to_ignore"), Value::Null);
}

#[test]
fn test_filter_registered_later_applies_to_next_clone() {
    let (fixtures, engine) = setup();
    let source = fixtures.mutable(5);

    let before = engine.clone_value(&source).unwrap();
    assert_eq!(field(&before, "number"), Value::Int(5));

    engine.register_field_filter(on_field("number", Behavior::AssignDefault));
    let after = engine.clone_value(&source).unwrap();
    assert_eq!(field(&after, "number"), Value::Int(0));
}

#[test]
fn test_filter_by_declaring_type() {
    let (fixtures, engine) = setup();
    let base = fixtures.base;
    engine.register_field_filter(move |field| {
        if field.declaring_type == base && field.name.as_ref() == "payload" {
            Behavior::CopyValue
        } else {
            Behavior::Clone
        }
    });

    let payload = fixtures.mutable(1);
    let tag = fixtures.mutable(2);
    let source = fixtures.derived("d", 3, payload.clone(), tag.clone());
    let clone = engine.clone_as(fixtures.base, &source).unwrap();

    assert!(field(&clone, "payload").same_instance(&payload));
    assert!(!field(&clone, "tag").same_instance(&tag));
}
