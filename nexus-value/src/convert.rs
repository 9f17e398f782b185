// normalize() and the IntoValue contract that feeds it. The normalization
// table from §4.1 is expressed as one IntoValue impl per input shape.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::record::{ImmutableRecord, ImmutableTypeRegistry};
use crate::value::Value;

/// Converts some Rust value into normalized immutable form, consulting the
/// registry for custom types. Mirrors `check_and_convert_to_immutable` in
/// the original: returns a descriptive error instead of a partial value.
pub trait IntoValue {
    fn into_value(self, registry: &ImmutableTypeRegistry) -> Result<Value, String>;
}

/// Entry point: `normalize(v, registry)`. Idempotent by construction (I6):
/// normalizing an already-normalized `Value` returns it unchanged, since
/// `Value` is its own `IntoValue` impl below, so `normalize(normalize(v))
/// == normalize(v)`.
pub fn normalize<T: IntoValue>(v: T, registry: &ImmutableTypeRegistry) -> Result<Value, String> {
    v.into_value(registry)
}

impl IntoValue for Value {
    fn into_value(self, _registry: &ImmutableTypeRegistry) -> Result<Value, String> {
        Ok(self)
    }
}

macro_rules! direct_into_value {
    ($t:ty, $ctor:expr) => {
        impl IntoValue for $t {
            fn into_value(self, _registry: &ImmutableTypeRegistry) -> Result<Value, String> {
                Ok(($ctor)(self))
            }
        }
    };
}

direct_into_value!(bool, Value::Bool);
direct_into_value!(i64, Value::Int);
direct_into_value!(f64, |x| Value::Float(x.into()));
direct_into_value!(String, Value::text);
direct_into_value!(Vec<u8>, Value::bytes);

impl IntoValue for () {
    fn into_value(self, _registry: &ImmutableTypeRegistry) -> Result<Value, String> {
        Ok(Value::Null)
    }
}

impl IntoValue for &str {
    fn into_value(self, _registry: &ImmutableTypeRegistry) -> Result<Value, String> {
        Ok(Value::text(self.to_owned()))
    }
}

/// Ordered sequence (§4.1): list/tuple → recursively-normalized tuple.
impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self, registry: &ImmutableTypeRegistry) -> Result<Value, String> {
        let mut items = Vec::with_capacity(self.len());
        for item in self {
            items.push(item.into_value(registry)?);
        }
        Ok(Value::tuple(items))
    }
}

/// Mapping (§4.1): keys and values both recursively normalized; a key that
/// fails to normalize aborts the whole conversion.
impl<K: IntoValue, V: IntoValue> IntoValue for BTreeMap<K, V> {
    fn into_value(self, registry: &ImmutableTypeRegistry) -> Result<Value, String> {
        let mut map = BTreeMap::new();
        for (k, v) in self {
            let k = k
                .into_value(registry)
                .map_err(|e| format!("map key failed to normalize: {e}"))?;
            let v = v.into_value(registry)?;
            map.insert(k, v);
        }
        Ok(Value::Map(Arc::new(map)))
    }
}

/// Unordered set (§4.1): elements recursively normalized; an element that
/// is not hashable after normalization would fail here (in practice every
/// `Value` is hashable, so the failure mode collapses to the element's own
/// normalization failing).
impl<T: IntoValue + Ord> IntoValue for BTreeSet<T> {
    fn into_value(self, registry: &ImmutableTypeRegistry) -> Result<Value, String> {
        let mut set = BTreeSet::new();
        for item in self {
            set.insert(item.into_value(registry)?);
        }
        Ok(Value::Set(Arc::new(set)))
    }
}

/// Wrapper marking a value as a candidate user-registered immutable type or
/// frozen record (§4.1). The type must already be registered via
/// `ImmutableTypeRegistry::register` or this fails with a descriptive
/// "not a known immutable type" message, matching the spec's error case
/// for unregistered, out-of-table types.
pub struct Custom<T>(pub T);

impl<T: ImmutableRecord + 'static> IntoValue for Custom<T> {
    fn into_value(self, registry: &ImmutableTypeRegistry) -> Result<Value, String> {
        if registry.is_registered::<T>() {
            Ok(Value::Custom(Arc::new(self.0)))
        } else {
            Err(format!(
                "value of type {} is not a known immutable type; register it with \
                 ImmutableTypeRegistry::register first",
                std::any::type_name::<T>()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_pass_through() {
        let reg = ImmutableTypeRegistry::new();
        assert_eq!(normalize(1i64, &reg).unwrap(), Value::Int(1));
        assert_eq!(normalize(true, &reg).unwrap(), Value::Bool(true));
        assert_eq!(normalize((), &reg).unwrap(), Value::Null);
    }

    #[test]
    fn idempotent_normalization() {
        let reg = ImmutableTypeRegistry::new();
        let once = normalize(vec![1i64, 2, 3], &reg).unwrap();
        let twice = normalize(once.clone(), &reg).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn list_becomes_tuple_recursively() {
        let reg = ImmutableTypeRegistry::new();
        let v = normalize(vec![vec![1i64, 2], vec![3]], &reg).unwrap();
        match v {
            Value::Tuple(items) => assert_eq!(items.len(), 2),
            other => panic!("expected tuple, got {other:?}"),
        }
    }

    #[test]
    fn unregistered_custom_type_errors() {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        struct Coord(i64, i64);
        let reg = ImmutableTypeRegistry::new();
        assert!(normalize(Custom(Coord(1, 2)), &reg).is_err());
    }

    #[test]
    fn registered_custom_type_passes_through() {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        struct Coord(i64, i64);
        let mut reg = ImmutableTypeRegistry::new();
        reg.register::<Coord>();
        assert!(normalize(Custom(Coord(1, 2)), &reg).is_ok());
    }

    #[test]
    fn one_unregistered_element_aborts_the_whole_sequence() {
        // A Vec containing one unregistered Custom element must fail the
        // whole conversion, not silently drop the bad element.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        struct Coord(i64, i64);
        let reg = ImmutableTypeRegistry::new();
        let items = vec![Custom(Coord(1, 2)), Custom(Coord(3, 4))];
        assert!(normalize(items, &reg).is_err());
    }
}
