// The equality predicate and tolerance registry (§4.5). Split out from
// nexus-value because it is independently pluggable per-manager, the same
// way submerge keeps "language values" (submerge-lang) separate from
// cross-cutting numeric/behavioral concerns it layers on top.
//
// §4.5 asks for a predicate that is reflexive and symmetric but NOT
// necessarily transitive, because real-number comparisons are tolerance
// based. Nothing here tries to repair transitivity: two values a half-tick
// apart on either side of the tolerance boundary can each be "equal" to a
// third value in between and not to each other. That's a property of the
// predicate, not a bug in this implementation.

mod kind;
mod registry;

pub use kind::ValueKind;
pub use registry::{equal, EqualityCallback, EqualityRegistry};
