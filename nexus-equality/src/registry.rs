// The equal() predicate itself plus the per-manager registry of
// type-pair overrides and the tolerance scalar used for the default
// real-number comparison (§4.5, §3 NexusManager attributes).

use std::collections::HashMap;
use std::sync::Arc;

use nexus_value::Value;

use crate::kind::{kind_of, ValueKind};

pub type EqualityCallback = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Manager-owned equality configuration: a tolerance used for real-number
/// comparisons, plus any type-pair-specific overrides registered on top of
/// the default structural predicate.
#[derive(Clone)]
pub struct EqualityRegistry {
    tolerance: f64,
    callbacks: HashMap<(ValueKind, ValueKind), EqualityCallback>,
}

impl Default for EqualityRegistry {
    fn default() -> Self {
        Self {
            tolerance: nexus_base::DEFAULT_TOLERANCE,
            callbacks: HashMap::new(),
        }
    }
}

impl EqualityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }

    /// Registers a callback for the ordered pair `(a, b)`. Looked up
    /// symmetrically: a call to `equal(y, x)` finds a callback registered
    /// for `(type(x), type(y))` just as readily as one registered for
    /// `(type(y), type(x))`, with arguments swapped to match.
    pub fn register(&mut self, a: ValueKind, b: ValueKind, callback: EqualityCallback) {
        self.callbacks.insert((a, b), callback);
    }

    fn lookup(&self, a: ValueKind, b: ValueKind) -> Option<(&EqualityCallback, bool)> {
        if let Some(cb) = self.callbacks.get(&(a, b)) {
            return Some((cb, false));
        }
        self.callbacks.get(&(b, a)).map(|cb| (cb, true))
    }
}

/// The equality predicate (§4.5). Reflexive and symmetric by construction;
/// not claimed to be transitive, since tolerance-based float comparison
/// isn't.
pub fn equal(a: &Value, b: &Value, registry: &EqualityRegistry) -> bool {
    if let Some((cb, swapped)) = registry.lookup(kind_of(a), kind_of(b)) {
        return if swapped { cb(b, a) } else { cb(a, b) };
    }
    default_equal(a, b, registry)
}

fn default_equal(a: &Value, b: &Value, registry: &EqualityRegistry) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => {
            (x.into_inner() - y.into_inner()).abs() <= registry.tolerance
        }
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => {
            (*x as f64 - y.into_inner()).abs() <= registry.tolerance
        }
        (Value::Tuple(xs), Value::Tuple(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(x, y)| equal(x, y, registry))
        }
        (Value::Map(xs), Value::Map(ys)) => {
            xs.len() == ys.len()
                && xs.iter().zip(ys.iter()).all(|((xk, xv), (yk, yv))| {
                    equal(xk, yk, registry) && equal(xv, yv, registry)
                })
        }
        (Value::Set(xs), Value::Set(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(x, y)| equal(x, y, registry))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(test)]
    use test_log::test;

    #[test]
    fn reflexive_and_symmetric() {
        let reg = EqualityRegistry::new();
        let a = Value::Float(1.000_000_000_1.into());
        let b = Value::Float(1.000_000_000_2.into());
        assert!(equal(&a, &a, &reg));
        assert_eq!(equal(&a, &b, &reg), equal(&b, &a, &reg));
    }

    #[test]
    fn floats_within_tolerance_compare_equal() {
        let reg = EqualityRegistry::new();
        let a = Value::Float(1.0.into());
        let b = Value::Float((1.0 + 1e-12).into());
        assert!(equal(&a, &b, &reg));
    }

    #[test]
    fn floats_outside_tolerance_compare_unequal() {
        let reg = EqualityRegistry::new();
        let a = Value::Float(1.0.into());
        let b = Value::Float(1.5.into());
        assert!(!equal(&a, &b, &reg));
    }

    #[test]
    fn int_and_float_compare_with_tolerance() {
        let reg = EqualityRegistry::new();
        let a = Value::Int(2);
        let b = Value::Float(2.0.into());
        assert!(equal(&a, &b, &reg));
    }

    #[test]
    fn tuples_compare_elementwise_with_tolerance() {
        let reg = EqualityRegistry::new();
        let a = Value::tuple(vec![Value::Int(1), Value::Float(2.0.into())]);
        let b = Value::tuple(vec![Value::Int(1), Value::Float((2.0 + 1e-12).into())]);
        assert!(equal(&a, &b, &reg));
    }

    #[test]
    fn custom_callback_is_found_regardless_of_argument_order() {
        let mut reg = EqualityRegistry::new();
        reg.register(
            ValueKind::Int,
            ValueKind::Text,
            Arc::new(|a: &Value, b: &Value| match (a, b) {
                (Value::Int(n), Value::Text(s)) => n.to_string().as_str() == s.as_ref(),
                _ => false,
            }),
        );
        let n = Value::Int(42);
        let s = Value::text("42".to_owned());
        assert!(equal(&n, &s, &reg));
        assert!(equal(&s, &n, &reg));
    }

    #[test]
    fn tolerance_is_configurable() {
        let mut reg = EqualityRegistry::new();
        reg.set_tolerance(0.2);
        let a = Value::Float(1.0.into());
        let b = Value::Float(1.1.into());
        assert!(equal(&a, &b, &reg));
    }
}
