// End-to-end usage of the public API surface, one test per worked scenario.
// Exercises the facade crate only — no reaching into the subsystem crates'
// internals — the way an external embedder would use this workspace.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use test_log::test;

use nexus::{
    DeliveryMode, Hook, JoinPolicy, Key, ListenerFn, NexusManager, Owner, OwnerKey, Publisher,
    PublishedEvent, Subscriber, SubmitMode, Value,
};

#[test]
fn join_propagates_value_and_notifies_once() {
    let manager = NexusManager::new();
    let a = manager.new_hook(1i64).unwrap();
    let b = manager.new_hook(2i64).unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = fired.clone();
    let listener: Arc<ListenerFn> = Arc::new(move || {
        fired2.fetch_add(1, Ordering::SeqCst);
    });
    a.add_listener(&listener);

    a.join(&b, JoinPolicy::UseCallerValue).unwrap();
    assert_eq!(a.value(), Value::Int(1));
    assert_eq!(b.value(), Value::Int(1));

    b.set(5i64).unwrap();
    assert_eq!(a.value(), Value::Int(5));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn tolerant_equality_suppresses_a_no_op_write() {
    let manager = NexusManager::new();
    manager.set_tolerance(1e-6);
    let a = manager.new_hook(1.0f64).unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = fired.clone();
    let listener: Arc<ListenerFn> = Arc::new(move || {
        fired2.fetch_add(1, Ordering::SeqCst);
    });
    a.add_listener(&listener);

    a.set(1.0f64 + 1e-9).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn forced_submission_of_an_unchanged_value_still_notifies() {
    let manager = NexusManager::new();
    let a = manager.new_hook(10i64).unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = fired.clone();
    let listener: Arc<ListenerFn> = Arc::new(move || {
        fired2.fetch_add(1, Ordering::SeqCst);
    });
    a.add_listener(&listener);

    a.set(10i64).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    manager
        .submit(vec![(a.clone(), Value::Int(10))], SubmitMode::Forced)
        .unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

/// Two-hook owner whose `complete` derives `sum = x + y`, used by the
/// completion and publisher scenarios below.
struct SumOwner {
    id: OwnerKey,
    x: Hook,
    y: Hook,
    sum: Hook,
}

impl SumOwner {
    fn new(manager: &NexusManager, x0: i64, y0: i64) -> Arc<SumOwner> {
        let x = manager.new_hook(x0).unwrap();
        let y = manager.new_hook(y0).unwrap();
        let sum = manager.new_read_only_hook(x0 + y0).unwrap();
        let owner = Arc::new(SumOwner {
            id: OwnerKey::new("sum-owner"),
            x,
            y,
            sum,
        });
        let dyn_owner: Arc<dyn Owner> = owner.clone();
        manager.bind_owner(&owner.x, &dyn_owner);
        manager.bind_owner(&owner.y, &dyn_owner);
        manager.bind_owner(&owner.sum, &dyn_owner);
        owner
    }
}

impl Owner for SumOwner {
    fn id(&self) -> OwnerKey {
        self.id.clone()
    }
    fn keys(&self) -> Vec<Key> {
        vec![Arc::from("x"), Arc::from("y"), Arc::from("sum")]
    }
    fn hook(&self, key: &Key) -> Option<Hook> {
        match key.as_ref() {
            "x" => Some(self.x.clone()),
            "y" => Some(self.y.clone()),
            "sum" => Some(self.sum.clone()),
            _ => None,
        }
    }
    fn key_of(&self, hook: &Hook) -> Option<Key> {
        if hook == &self.x {
            Some(Arc::from("x"))
        } else if hook == &self.y {
            Some(Arc::from("y"))
        } else if hook == &self.sum {
            Some(Arc::from("sum"))
        } else {
            None
        }
    }
    fn current_values(&self) -> BTreeMap<Key, Value> {
        let mut m = BTreeMap::new();
        m.insert(Arc::from("x"), self.x.value());
        m.insert(Arc::from("y"), self.y.value());
        m.insert(Arc::from("sum"), self.sum.value());
        m
    }
    fn complete(&self, submitted: &BTreeMap<Key, Value>, current: &BTreeMap<Key, Value>) -> BTreeMap<Key, Value> {
        let x_key: Key = Arc::from("x");
        let y_key: Key = Arc::from("y");
        let sum_key: Key = Arc::from("sum");

        let x = submitted.get(&x_key).or_else(|| current.get(&x_key));
        let y = submitted.get(&y_key).or_else(|| current.get(&y_key));
        if submitted.contains_key(&sum_key) {
            return BTreeMap::new();
        }
        match (x, y) {
            (Some(Value::Int(x)), Some(Value::Int(y))) => {
                let mut out = BTreeMap::new();
                out.insert(sum_key, Value::Int(x + y));
                out
            }
            _ => BTreeMap::new(),
        }
    }
    fn validate(&self, complete: &BTreeMap<Key, Value>) -> Result<(), String> {
        let x_key: Key = Arc::from("x");
        let y_key: Key = Arc::from("y");
        let sum_key: Key = Arc::from("sum");
        if let (Some(Value::Int(x)), Some(Value::Int(y)), Some(Value::Int(sum))) =
            (complete.get(&x_key), complete.get(&y_key), complete.get(&sum_key))
        {
            if *sum != x + y {
                return Err(format!("sum {sum} does not equal x + y ({x} + {y})"));
            }
        }
        Ok(())
    }
    fn invalidate(&self) {}
}

#[test]
fn completion_derives_a_dependent_value() {
    let manager = NexusManager::new();
    let owner = SumOwner::new(&manager, 2, 3);
    assert_eq!(owner.sum.value(), Value::Int(5));

    owner.x.set(10i64).unwrap();
    assert_eq!(owner.sum.value(), Value::Int(13));
}

#[test]
fn completion_conflict_is_rejected_and_state_is_unchanged() {
    let manager = NexusManager::new();
    let owner = SumOwner::new(&manager, 2, 3);

    // A caller-supplied `sum` that disagrees with `x + y` fails validation
    // (Step 5) rather than being silently accepted or overridden by
    // completion, which never overwrites a key already in `submitted`.
    // Rejection leaves every hook at its prior value.
    let result = manager.submit(
        vec![
            (owner.x.clone(), Value::Int(10)),
            (owner.sum.clone(), Value::Int(999)),
        ],
        SubmitMode::Normal,
    );
    assert!(result.is_err());
    assert_eq!(owner.x.value(), Value::Int(2));
    assert_eq!(owner.sum.value(), Value::Int(5));
}

#[test]
fn publisher_broadcasts_owner_view_after_commit() {
    let manager = NexusManager::new();
    let owner = SumOwner::new(&manager, 1, 1);
    let owner_dyn: Arc<dyn Owner> = owner.clone();
    let publisher = Publisher::for_owner(owner_dyn, &manager, DeliveryMode::Direct);

    let last_sum: Arc<std::sync::Mutex<Option<Value>>> = Arc::new(std::sync::Mutex::new(None));
    let last_sum2 = last_sum.clone();
    let subscriber: Arc<dyn Subscriber> = Arc::new(move |event: &PublishedEvent| {
        if let PublishedEvent::Owner(view) = event {
            *last_sum2.lock().unwrap() = view.get(&(Arc::from("sum") as Key)).cloned();
        }
    });
    publisher.subscribe(&subscriber);

    owner.x.set(41i64).unwrap();
    assert_eq!(*last_sum.lock().unwrap(), Some(Value::Int(42)));
}

#[test]
fn join_rejects_when_no_single_value_satisfies_both_invariants() {
    struct Bounded {
        id: OwnerKey,
        key: Key,
        hook: Hook,
        positive: bool,
    }
    impl Owner for Bounded {
        fn id(&self) -> OwnerKey {
            self.id.clone()
        }
        fn keys(&self) -> Vec<Key> {
            vec![self.key.clone()]
        }
        fn hook(&self, key: &Key) -> Option<Hook> {
            (key == &self.key).then(|| self.hook.clone())
        }
        fn key_of(&self, hook: &Hook) -> Option<Key> {
            (hook == &self.hook).then(|| self.key.clone())
        }
        fn current_values(&self) -> BTreeMap<Key, Value> {
            let mut m = BTreeMap::new();
            m.insert(self.key.clone(), self.hook.value());
            m
        }
        fn complete(&self, _submitted: &BTreeMap<Key, Value>, _current: &BTreeMap<Key, Value>) -> BTreeMap<Key, Value> {
            BTreeMap::new()
        }
        fn validate(&self, complete: &BTreeMap<Key, Value>) -> Result<(), String> {
            match &complete[&self.key] {
                Value::Int(n) if (*n > 0) == self.positive => Ok(()),
                _ => Err(format!("{} failed its sign invariant", self.key)),
            }
        }
        fn invalidate(&self) {}
    }

    let manager = NexusManager::new();
    let x_hook = manager.new_hook(5i64).unwrap();
    let positive_owner = Arc::new(Bounded {
        id: OwnerKey::new("positive"),
        key: Arc::from("x"),
        hook: x_hook.clone(),
        positive: true,
    });
    let positive_dyn: Arc<dyn Owner> = positive_owner;
    manager.bind_owner(&x_hook, &positive_dyn);

    let y_hook = manager.new_hook(-3i64).unwrap();
    let negative_owner = Arc::new(Bounded {
        id: OwnerKey::new("negative"),
        key: Arc::from("y"),
        hook: y_hook.clone(),
        positive: false,
    });
    let negative_dyn: Arc<dyn Owner> = negative_owner;
    manager.bind_owner(&y_hook, &negative_dyn);

    let result = x_hook.join(&y_hook, JoinPolicy::UseCallerValue);
    assert!(result.is_err());
    assert_eq!(x_hook.value(), Value::Int(5));
    assert_eq!(y_hook.value(), Value::Int(-3));
}
