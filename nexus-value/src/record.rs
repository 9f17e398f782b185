// Custom immutable types (§4.1: "user-registered immutable type" and
// "frozen record with immutable fields"). Rust has no runtime notion of a
// "frozen dataclass" the way the source language does, so the contract is
// pushed to the type system instead: any type that already structurally
// implements Eq + Ord + Hash + Debug is, by construction, as immutable as
// anything else normalize() accepts, and becomes eligible the moment its
// `TypeId` is added to a manager's `ImmutableTypeRegistry`.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Object-safe contract for a value that can live inside `Value::Custom`.
///
/// Implemented via the blanket impl below for any `T: Any + Debug + Eq +
/// Ord + Hash + Send + Sync`; callers never implement this by hand.
pub trait ImmutableRecord: Any + Send + Sync {
    fn record_eq(&self, other: &dyn ImmutableRecord) -> bool;
    fn record_cmp(&self, other: &dyn ImmutableRecord) -> Ordering;
    fn record_hash(&self, state: &mut dyn Hasher);
    fn record_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

/// Forwards `Hash::hash`'s generic `H: Hasher` bound to a `&mut dyn Hasher`.
struct HasherMut<'a>(&'a mut dyn Hasher);
impl Hasher for HasherMut<'_> {
    fn finish(&self) -> u64 {
        self.0.finish()
    }
    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes)
    }
}

impl<T> ImmutableRecord for T
where
    T: Any + fmt::Debug + Eq + Ord + Hash + Send + Sync,
{
    fn record_eq(&self, other: &dyn ImmutableRecord) -> bool {
        match other.as_any().downcast_ref::<T>() {
            Some(o) => self == o,
            None => false,
        }
    }

    fn record_cmp(&self, other: &dyn ImmutableRecord) -> Ordering {
        match other.as_any().downcast_ref::<T>() {
            Some(o) => self.cmp(o),
            // Different registered types: fall back to a stable but
            // otherwise arbitrary order by type name. Still a valid total
            // order, just not a meaningful one across types.
            None => self.type_name().cmp(other.type_name()),
        }
    }

    fn record_hash(&self, state: &mut dyn Hasher) {
        self.hash(&mut HasherMut(state));
    }

    fn record_fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// The manager-owned set of types allowed to pass through normalization
/// unchanged as `Value::Custom`. Mirrors `NexusManager`'s
/// custom-immutable-type registry (§3).
#[derive(Default, Clone)]
pub struct ImmutableTypeRegistry {
    types: HashSet<TypeId>,
}

impl ImmutableTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ImmutableRecord + 'static>(&mut self) {
        self.types.insert(TypeId::of::<T>());
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.types.contains(&TypeId::of::<T>())
    }

    pub fn is_registered_type_id(&self, id: TypeId) -> bool {
        self.types.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    struct Point {
        x: i64,
        y: i64,
    }

    #[test]
    fn registry_tracks_registered_types() {
        let mut reg = ImmutableTypeRegistry::new();
        assert!(!reg.is_registered::<Point>());
        reg.register::<Point>();
        assert!(reg.is_registered::<Point>());
    }

    #[test]
    fn record_eq_and_cmp_roundtrip() {
        let a: Box<dyn ImmutableRecord> = Box::new(Point { x: 1, y: 2 });
        let b: Box<dyn ImmutableRecord> = Box::new(Point { x: 1, y: 2 });
        let c: Box<dyn ImmutableRecord> = Box::new(Point { x: 9, y: 9 });
        assert!(a.record_eq(&*b));
        assert!(!a.record_eq(&*c));
        assert_eq!(a.record_cmp(&*c), Ordering::Less);
    }
}
