// Handle identifiers. Hooks and nexuses are never addressed by pointer —
// all state lives in the manager's guarded tables, and hooks/nexuses are
// just indices into them (the same shape as `EntryId` over a `DiGraph` in
// a dependency-graph engine).

use std::sync::Arc;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct HookId(pub(crate) u64);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NexusId(pub(crate) u64);

/// Identity of an `Owner` instance. `Owner` is consumed as `dyn Owner`, so it
/// cannot be used directly as a map key or compared for identity; each
/// implementation supplies a stable opaque id instead of the core relying on
/// an associated type (which would make the trait object-unsafe).
///
/// Not to be confused with [`crate::owner::Key`], the local per-hook label
/// within one owner (`keys()`, `hook(key)`, ...).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct OwnerKey(pub Arc<str>);

impl OwnerKey {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        OwnerKey(id.into())
    }
}
