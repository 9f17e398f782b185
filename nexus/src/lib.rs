//! A nexus-coordinated reactive value-graph runtime.
//!
//! This crate is a thin façade over the workspace's five subsystems: it
//! re-exports the public surface a typical embedder needs (normalization,
//! equality, the core submission pipeline, and the publisher/subscriber
//! bridge) without assuming it is the only consumer of any of them — large
//! applications are expected to depend on the subsystem crates directly.

pub use nexus_base::{err, Error, Result, SubmitError, SubmitErrorKind, DEFAULT_TOLERANCE, MAX_ITERATIONS};
pub use nexus_core::{Hook, JoinPolicy, Key, ListenerFn, NexusManager, Owner, OwnerKey, SubmitMode};
pub use nexus_equality::{equal, EqualityCallback, EqualityRegistry, ValueKind};
pub use nexus_pubsub::{DeliveryMode, Publisher, PublishedEvent, Subscriber};
pub use nexus_value::{normalize, Custom, ImmutableRecord, ImmutableTypeRegistry, IntoValue, Value};
