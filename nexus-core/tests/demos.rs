// Integration tests standing in for `original_source/demos/*.py`
// (`configuring_float_accuracy`, `custom_equality_callbacks`,
// `custom_nexus_managers`, `custom_numerical_types`); `basic_usage` is
// already covered by the worked scenarios in `nexus/tests/scenarios.rs`
// and this crate's own unit tests (SPEC_FULL.md §3).

use std::sync::Arc;

use test_log::test;

use nexus_core::NexusManager;
use nexus_equality::ValueKind;
use nexus_value::{Custom, ImmutableRecord, Value};

#[test]
fn configuring_float_accuracy_changes_what_counts_as_a_no_op() {
    let manager = NexusManager::new();
    assert_eq!(manager.tolerance(), nexus_base::DEFAULT_TOLERANCE);

    let a = manager.new_hook(1.0f64).unwrap();
    // Default tolerance (1e-9) treats this as a real change.
    a.set(1.0f64 + 1e-6).unwrap();
    assert_eq!(a.value(), Value::Float((1.0 + 1e-6).into()));

    manager.set_tolerance(1e-3);
    let before = a.value();
    a.set(1.000_000_5f64).unwrap();
    // Within the new, looser tolerance: no-op, value unchanged.
    assert_eq!(a.value(), before);
}

#[test]
fn custom_equality_callbacks_override_the_default_predicate() {
    let manager = NexusManager::new();
    // Registers a case-insensitive equality between two text values, the
    // sort of domain-specific override §4.5/§6 exists for.
    manager.register_equality(
        ValueKind::Text,
        ValueKind::Text,
        Arc::new(|a: &Value, b: &Value| match (a, b) {
            (Value::Text(x), Value::Text(y)) => x.to_lowercase() == y.to_lowercase(),
            _ => false,
        }),
    );

    let name = manager.new_hook("Alice".to_owned()).unwrap();
    let fire_count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let fc = fire_count.clone();
    let listener: Arc<nexus_core::ListenerFn> = Arc::new(move || {
        fc.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    name.add_listener(&listener);

    // Differs only in case: the custom callback treats this as equal, so
    // Normal mode filters it out as a no-op and no listener fires.
    name.set("ALICE".to_owned()).unwrap();
    assert_eq!(fire_count.load(std::sync::atomic::Ordering::SeqCst), 0);

    name.set("Bob".to_owned()).unwrap();
    assert_eq!(fire_count.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn custom_nexus_managers_clone_inherits_registries_fresh_does_not() {
    let base = NexusManager::new();
    base.set_tolerance(0.5);
    base.register_equality(
        ValueKind::Int,
        ValueKind::Int,
        Arc::new(|a: &Value, b: &Value| matches!((a, b), (Value::Int(x), Value::Int(y)) if x == y)),
    );

    let cloned = base.clone_with_registries();
    assert_eq!(cloned.tolerance(), 0.5);

    let fresh = base.fresh();
    assert_eq!(fresh.tolerance(), nexus_base::DEFAULT_TOLERANCE);

    // Each is a distinct manager identity even though clone_with_registries
    // starts from the same registry snapshot (§3: "hooks are permanently
    // bound to their creator manager").
    assert_ne!(base, cloned);
    assert_ne!(base, fresh);
    assert_ne!(cloned, fresh);
}

#[test]
fn custom_numerical_types_pass_through_once_registered() {
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    struct Rational {
        num: i64,
        den: i64,
    }

    let manager = NexusManager::new();
    manager.register_immutable_type::<Rational>();

    let half = Rational { num: 1, den: 2 };
    let hook = manager.new_hook(Custom(half.clone())).unwrap();
    match hook.value() {
        Value::Custom(c) => {
            assert_eq!(c.as_any().downcast_ref::<Rational>(), Some(&half));
        }
        other => panic!("expected a Custom value, got {other:?}"),
    }
}

#[test]
fn the_default_manager_is_a_lazily_initialized_singleton() {
    let a = NexusManager::global();
    let b = NexusManager::global();
    assert_eq!(a, b);
}
