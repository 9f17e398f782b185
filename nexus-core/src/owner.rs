// The owner interface (§6). Owners are external collaborators — concrete
// observable flavors (single values, lists, selection containers, and so
// on) live outside this crate and are only ever seen here as `dyn Owner`.

use std::collections::BTreeMap;
use std::sync::Arc;

use nexus_value::Value;

use crate::hook::Hook;
use crate::ids::OwnerKey;

/// A local, per-hook label within one owner. Opaque and hashable, per the
/// spec's own design note; never interpreted by this crate.
pub type Key = Arc<str>;

/// Group of hooks keyed by a local label, imposing cross-hook invariants
/// (§3 Owner, §6 Owner interface).
///
/// `complete` and `validate` must be pure with respect to their arguments:
/// the pipeline may call either multiple times per submission (§4.4 Step 4
/// runs `complete` once per round until the pending set stops growing).
pub trait Owner: Send + Sync {
    /// Stable identity of this owner instance, used to deduplicate "affected
    /// owners" across many hooks without requiring `dyn Owner` to be
    /// comparable.
    fn id(&self) -> OwnerKey;

    fn keys(&self) -> Vec<Key>;

    fn hook(&self, key: &Key) -> Option<Hook>;

    /// Identity lookup, the inverse of `hook`.
    fn key_of(&self, hook: &Hook) -> Option<Key>;

    fn current_values(&self) -> BTreeMap<Key, Value>;

    /// (O2) Must never return a key present in `submitted`; it may only add
    /// keys that are missing from both `submitted` and `current`.
    fn complete(&self, submitted: &BTreeMap<Key, Value>, current: &BTreeMap<Key, Value>)
        -> BTreeMap<Key, Value>;

    /// (O3) `complete` is a total mapping over `keys()`: every local key has
    /// a value by the time this is called.
    fn validate(&self, complete: &BTreeMap<Key, Value>) -> Result<(), String>;

    /// Idempotent post-commit hook for owner-internal caches.
    fn invalidate(&self);
}
