//! Runs the worked scenarios from spec §8 end-to-end against the public
//! API, the way `submerge`'s top crate is meant to be "fairly small...
//! illustrative" rather than the only consumer of the library.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nexus::{
    Hook, JoinPolicy, Key, ListenerFn, NexusManager, Owner, OwnerKey, SubmitMode, Value,
};

fn main() {
    basic_join_and_propagate();
    tolerance_no_op();
    completion_conflict();
    selection_invariant();
    forced_recommit_of_equal_value();
    join_rejects_on_validation();
}

fn basic_join_and_propagate() {
    println!("1. basic join and propagate");
    let manager = NexusManager::new();
    let a = manager.new_hook(1i64).unwrap();
    let b = manager.new_hook(2i64).unwrap();

    let fire_count = Arc::new(AtomicUsize::new(0));
    let fc = fire_count.clone();
    let listener: Arc<ListenerFn> = Arc::new(move || {
        fc.fetch_add(1, Ordering::SeqCst);
    });
    a.add_listener(&listener);

    a.join(&b, JoinPolicy::UseCallerValue).unwrap();
    assert_eq!(a.value(), Value::Int(1));
    assert_eq!(b.value(), Value::Int(1));

    b.set(5i64).unwrap();
    assert_eq!(a.value(), Value::Int(5));
    assert_eq!(fire_count.load(Ordering::SeqCst), 1);
    println!("   ok: a == b == {:?}, listener fired once", a.value());
}

fn tolerance_no_op() {
    println!("2. tolerance no-op");
    let manager = NexusManager::new();
    manager.set_tolerance(1e-6);
    let a = manager.new_hook(1.0f64).unwrap();

    let fire_count = Arc::new(AtomicUsize::new(0));
    let fc = fire_count.clone();
    let listener: Arc<ListenerFn> = Arc::new(move || {
        fc.fetch_add(1, Ordering::SeqCst);
    });
    a.add_listener(&listener);

    a.set(1.0f64 + 1e-9).unwrap();
    assert_eq!(a.value(), Value::Float(1.0.into()));
    assert_eq!(fire_count.load(Ordering::SeqCst), 0);
    println!("   ok: a == {:?}, no listeners fired", a.value());
}

struct XyOwner {
    id: OwnerKey,
    x: Hook,
    y: Hook,
}

impl Owner for XyOwner {
    fn id(&self) -> OwnerKey {
        self.id.clone()
    }
    fn keys(&self) -> Vec<Key> {
        vec![Arc::from("x"), Arc::from("y")]
    }
    fn hook(&self, key: &Key) -> Option<Hook> {
        match key.as_ref() {
            "x" => Some(self.x.clone()),
            "y" => Some(self.y.clone()),
            _ => None,
        }
    }
    fn key_of(&self, hook: &Hook) -> Option<Key> {
        if hook == &self.x {
            Some(Arc::from("x"))
        } else if hook == &self.y {
            Some(Arc::from("y"))
        } else {
            None
        }
    }
    fn current_values(&self) -> BTreeMap<Key, Value> {
        let mut m = BTreeMap::new();
        m.insert(Arc::from("x"), self.x.value());
        m.insert(Arc::from("y"), self.y.value());
        m
    }
    fn complete(&self, submitted: &BTreeMap<Key, Value>, _current: &BTreeMap<Key, Value>) -> BTreeMap<Key, Value> {
        let y_key: Key = Arc::from("y");
        let x_key: Key = Arc::from("x");
        if submitted.get(&y_key) == Some(&Value::Int(2)) {
            let mut m = BTreeMap::new();
            m.insert(x_key, Value::Int(7));
            m
        } else {
            BTreeMap::new()
        }
    }
    fn validate(&self, _complete: &BTreeMap<Key, Value>) -> Result<(), String> {
        Ok(())
    }
    fn invalidate(&self) {}
}

fn completion_conflict() {
    println!("3. completion conflict");
    let manager = NexusManager::new();
    let x = manager.new_hook(0i64).unwrap();
    let y = manager.new_hook(0i64).unwrap();
    let owner = Arc::new(XyOwner {
        id: OwnerKey::new("xy"),
        x: x.clone(),
        y: y.clone(),
    });
    let owner_dyn: Arc<dyn Owner> = owner;
    manager.bind_owner(&x, &owner_dyn);
    manager.bind_owner(&y, &owner_dyn);

    let result = manager.submit(vec![(x.clone(), Value::Int(3)), (y.clone(), Value::Int(2))], SubmitMode::Normal);
    assert!(result.is_err());
    assert_eq!(x.value(), Value::Int(0));
    println!("   ok: submission rejected as {:?}", result.unwrap_err().kind);
}

struct SelectionOwner {
    id: OwnerKey,
    selected: Hook,
    options: Hook,
}

impl Owner for SelectionOwner {
    fn id(&self) -> OwnerKey {
        self.id.clone()
    }
    fn keys(&self) -> Vec<Key> {
        vec![Arc::from("selected"), Arc::from("options")]
    }
    fn hook(&self, key: &Key) -> Option<Hook> {
        match key.as_ref() {
            "selected" => Some(self.selected.clone()),
            "options" => Some(self.options.clone()),
            _ => None,
        }
    }
    fn key_of(&self, hook: &Hook) -> Option<Key> {
        if hook == &self.selected {
            Some(Arc::from("selected"))
        } else if hook == &self.options {
            Some(Arc::from("options"))
        } else {
            None
        }
    }
    fn current_values(&self) -> BTreeMap<Key, Value> {
        let mut m = BTreeMap::new();
        m.insert(Arc::from("selected"), self.selected.value());
        m.insert(Arc::from("options"), self.options.value());
        m
    }
    fn complete(&self, _submitted: &BTreeMap<Key, Value>, _current: &BTreeMap<Key, Value>) -> BTreeMap<Key, Value> {
        BTreeMap::new()
    }
    fn validate(&self, complete: &BTreeMap<Key, Value>) -> Result<(), String> {
        let selected = &complete[&(Arc::from("selected") as Key)];
        let options = &complete[&(Arc::from("options") as Key)];
        let ok = match options {
            Value::Tuple(items) => items.iter().any(|v| v == selected),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err("selected value is not among options".to_owned())
        }
    }
    fn invalidate(&self) {}
}

fn selection_invariant() {
    println!("4. selection invariant");
    let manager = NexusManager::new();
    let selected = manager.new_hook(2i64).unwrap();
    let options = manager
        .new_hook(Value::tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        .unwrap();
    let owner = Arc::new(SelectionOwner {
        id: OwnerKey::new("selection"),
        selected: selected.clone(),
        options: options.clone(),
    });
    let owner_dyn: Arc<dyn Owner> = owner;
    manager.bind_owner(&selected, &owner_dyn);
    manager.bind_owner(&options, &owner_dyn);

    let bad = manager.submit(
        vec![(options.clone(), Value::tuple(vec![Value::Int(4), Value::Int(5)]))],
        SubmitMode::Normal,
    );
    assert!(bad.is_err());
    assert_eq!(selected.value(), Value::Int(2));

    let good = manager.submit(
        vec![
            (options.clone(), Value::tuple(vec![Value::Int(4), Value::Int(5)])),
            (selected.clone(), Value::Int(4)),
        ],
        SubmitMode::Normal,
    );
    assert!(good.is_ok());
    assert_eq!(selected.value(), Value::Int(4));
    println!("   ok: rejected out-of-range write, accepted an atomic pair update");
}

fn forced_recommit_of_equal_value() {
    println!("5. forced re-commit of an equal value");
    let manager = NexusManager::new();
    let a = manager.new_hook(10i64).unwrap();

    let fire_count = Arc::new(AtomicUsize::new(0));
    let fc = fire_count.clone();
    let listener: Arc<ListenerFn> = Arc::new(move || {
        fc.fetch_add(1, Ordering::SeqCst);
    });
    a.add_listener(&listener);

    a.set(10i64).unwrap();
    assert_eq!(fire_count.load(Ordering::SeqCst), 0);

    manager.submit(vec![(a.clone(), Value::Int(10))], SubmitMode::Forced).unwrap();
    assert_eq!(fire_count.load(Ordering::SeqCst), 1);
    assert_eq!(a.value(), Value::Int(10));
    println!("   ok: Normal no-op silent, Forced re-commit still notified");
}

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

fn join_rejects_on_validation() {
    println!("6. join rejects on validation");
    let manager = NexusManager::new();
    let x = manager.new_hook(5i64).unwrap();
    let positive: Arc<dyn Owner> = Arc::new(Bounded {
        id: OwnerKey::new("O1"),
        key: Arc::from("x"),
        hook: x.clone(),
        positive: true,
    });
    manager.bind_owner(&x, &positive);

    let y = manager.new_hook(-3i64).unwrap();
    let negative: Arc<dyn Owner> = Arc::new(Bounded {
        id: OwnerKey::new("O2"),
        key: Arc::from("y"),
        hook: y.clone(),
        positive: false,
    });
    manager.bind_owner(&y, &negative);

    let result = x.join(&y, JoinPolicy::UseCallerValue);
    assert!(result.is_err());
    assert_eq!(x.value(), Value::Int(5));
    assert_eq!(y.value(), Value::Int(-3));
    println!("   ok: join rejected, both hooks kept their original values");
}
