// A lightweight stand-in for "the type of a Value" (§4.5: callbacks are
// keyed by the ordered pair of the two operands' types). Most `Value`
// variants already are their own type for this purpose; `Custom` defers to
// the concrete Rust type hiding behind the trait object.

use std::any::TypeId;

use nexus_value::Value;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Uuid,
    Range,
    Tuple,
    Map,
    Set,
    Custom(TypeId),
}

pub fn kind_of(v: &Value) -> ValueKind {
    match v {
        Value::Null => ValueKind::Null,
        Value::Bool(_) => ValueKind::Bool,
        Value::Int(_) => ValueKind::Int,
        Value::Float(_) => ValueKind::Float,
        Value::Text(_) => ValueKind::Text,
        Value::Bytes(_) => ValueKind::Bytes,
        Value::Uuid(_) => ValueKind::Uuid,
        Value::Range(..) => ValueKind::Range,
        Value::Tuple(_) => ValueKind::Tuple,
        Value::Map(_) => ValueKind::Map,
        Value::Set(_) => ValueKind::Set,
        Value::Custom(c) => ValueKind::Custom(c.as_any().type_id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_kinds_are_distinct() {
        assert_ne!(kind_of(&Value::Int(1)), kind_of(&Value::Float(1.0.into())));
        assert_eq!(kind_of(&Value::Int(1)), kind_of(&Value::Int(2)));
    }
}
