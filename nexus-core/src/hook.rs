// Hook (§3, §4.3): a handle into a Nexus. Hooks are cheap, `Clone`able
// references into the manager's tables — all real state (nexus membership,
// callbacks, listeners) lives in `HookData`, keyed by `HookId`, inside the
// manager's guarded state.

use std::sync::{Arc, Weak};

use nexus_base::{SubmitError, SubmitErrorKind};
use nexus_value::{IntoValue, Value};

use crate::ids::{HookId, OwnerKey};
use crate::listener::{ListenerFn, ListenerList};
use crate::manager::{JoinPolicy, NexusManager, SubmitMode};
use crate::owner::Owner;

pub(crate) struct HookData {
    pub(crate) nexus: crate::ids::NexusId,
    pub(crate) owner: Option<Weak<dyn Owner>>,
    pub(crate) writable: bool,
    pub(crate) reaction: Option<Arc<dyn Fn(&Value) + Send + Sync>>,
    pub(crate) isolated_validation: Option<Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>>,
    pub(crate) listeners: ListenerList,
}

impl HookData {
    pub(crate) fn new(nexus: crate::ids::NexusId, writable: bool) -> Self {
        HookData {
            nexus,
            owner: None,
            writable,
            reaction: None,
            isolated_validation: None,
            listeners: ListenerList::new(),
        }
    }

    /// (H2) An owned hook's owner is held weakly; once it has been
    /// collected the hook is logically detached and behaves as floating.
    pub(crate) fn live_owner(&self) -> Option<Arc<dyn Owner>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn is_floating(&self) -> bool {
        self.live_owner().is_none()
    }
}

/// A handle into a nexus (§4.3). Two `Hook`s are equal iff they name the
/// same hook on the same manager.
#[derive(Clone)]
pub struct Hook {
    pub(crate) id: HookId,
    pub(crate) manager: NexusManager,
}

impl PartialEq for Hook {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.manager.same_manager(&other.manager)
    }
}
impl Eq for Hook {}

impl std::hash::Hash for Hook {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.manager.identity().hash(state);
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hook({})", self.id.0)
    }
}

impl Hook {
    pub(crate) fn new(id: HookId, manager: NexusManager) -> Self {
        Hook { id, manager }
    }

    /// Current stored value of this hook's nexus. Takes the critical
    /// section only long enough to clone the value.
    pub fn value(&self) -> Value {
        self.manager.read_value(self.id)
    }

    /// Shorthand for `manager.submit({self: value}, Normal)` (writable
    /// hooks only; a read-only hook's direct write is rejected in Step 1).
    pub fn set<T: IntoValue>(&self, v: T) -> Result<(), SubmitError> {
        self.check_writable()?;
        let value = self.manager.normalize_for_submit(v)?;
        self.manager
            .submit(vec![(self.clone(), value)], SubmitMode::Normal)
    }

    /// The lambda-callable equivalent of `value = v` (§6 Hook interface);
    /// Rust has no assignable-property sugar to hang this off of, so it is
    /// just another name for `set`.
    pub fn change_value<T: IntoValue>(&self, v: T) -> Result<(), SubmitError> {
        self.set(v)
    }

    /// Merges this hook's nexus with `other`'s (§4.6).
    pub fn join(&self, other: &Hook, policy: JoinPolicy) -> Result<(), SubmitError> {
        self.manager.join(self, other, policy)
    }

    /// Splits this hook into a fresh singleton nexus, preserving its
    /// current value (§4.6). No validation runs and no notification fires.
    pub fn isolate(&self) {
        self.manager.isolate(self.id)
    }

    pub fn add_listener(&self, listener: &Arc<ListenerFn>) {
        self.manager.add_hook_listener(self.id, listener);
    }

    pub fn remove_listener(&self, listener: &Arc<ListenerFn>) {
        self.manager.remove_hook_listener(self.id, listener);
    }

    /// Single-slot reaction callback, invoked after a successful commit
    /// that changed this hook's nexus (§4.3, §4.4 Step 8). Replaces any
    /// previously-registered reaction.
    pub fn add_reaction_callback(&self, callback: impl Fn(&Value) + Send + Sync + 'static) {
        self.manager.set_reaction(self.id, Arc::new(callback));
    }

    /// Floating-hook-only validation callback run in Step 5 against the
    /// pending value, alongside owner validation.
    pub fn add_isolated_validation_callback(
        &self,
        callback: impl Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    ) {
        self.manager.set_isolated_validation(self.id, Arc::new(callback));
    }

    pub fn is_writable(&self) -> bool {
        self.manager.hook_is_writable(self.id)
    }

    pub(crate) fn check_writable(&self) -> Result<(), SubmitError> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(SubmitError::new(
                SubmitErrorKind::Validation,
                "hook is read-only and cannot be written to directly",
            ))
        }
    }
}
