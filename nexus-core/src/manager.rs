// NexusManager (§3, §4.4, §5): the process-wide coordinator. Owns every
// nexus, hook, and owner-listener list behind one critical section, plus
// the pluggable equality and immutable-type registries.
//
// The critical section is a `parking_lot::ReentrantMutex` guarding a
// `RefCell<ManagerState>`: the same thread may re-enter it to take a short
// read or write borrow (§5: "All reads through hook.value take a short
// lock ... no long-lived read locks"), which is what lets a listener,
// reaction, or validation callback call back into the manager for an
// ordinary read without deadlocking or panicking. A *submission*
// (`submit`/`join`/`isolate`) is different: it is gated by a separate
// same-thread holder check that panics on re-entry, mirroring the spec's
// fatal, un-swallowable ReentrantSubmissionError (§7). The pipeline itself
// never holds a borrow of `ManagerState` while invoking external code —
// every owner/listener/reaction callback runs with the borrow already
// released, which is what makes the nested-read case safe in the first
// place.
//
// See `pipeline.rs` for how Step 8's fan-out honors this invariant.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};

use nexus_base::{SubmitError, SubmitErrorKind};
use nexus_equality::EqualityRegistry;
use nexus_value::{normalize, ImmutableTypeRegistry, IntoValue, Value};

use crate::hook::{Hook, HookData};
use crate::ids::{HookId, NexusId, OwnerKey};
use crate::listener::{ListenerFn, ListenerList};
use crate::nexus::NexusData;
use crate::owner::Owner;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SubmitMode {
    /// Skip requests whose proposed value equals the current stored value.
    Normal,
    /// Treat every request as effective regardless of equality.
    Forced,
    /// Run validation and report the verdict without mutating state.
    CheckOnly,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum JoinPolicy {
    UseCallerValue,
    UseTargetValue,
}

pub(crate) struct ManagerState {
    pub(crate) next_hook_id: u64,
    pub(crate) next_nexus_id: u64,
    pub(crate) nexuses: HashMap<NexusId, NexusData>,
    pub(crate) hooks: HashMap<HookId, HookData>,
    pub(crate) owner_listeners: HashMap<OwnerKey, ListenerList>,
    pub(crate) equality: EqualityRegistry,
    pub(crate) immutable_types: ImmutableTypeRegistry,
}

impl ManagerState {
    fn new() -> Self {
        ManagerState {
            next_hook_id: 0,
            next_nexus_id: 0,
            nexuses: HashMap::new(),
            hooks: HashMap::new(),
            owner_listeners: HashMap::new(),
            equality: EqualityRegistry::new(),
            immutable_types: ImmutableTypeRegistry::new(),
        }
    }

    fn clone_registries(&self) -> Self {
        ManagerState {
            next_hook_id: 0,
            next_nexus_id: 0,
            nexuses: HashMap::new(),
            hooks: HashMap::new(),
            owner_listeners: HashMap::new(),
            equality: self.equality.clone(),
            immutable_types: self.immutable_types.clone(),
        }
    }
}

struct CriticalSection {
    state: ReentrantMutex<RefCell<ManagerState>>,
    submission_holder: Mutex<Option<ThreadId>>,
}

/// Held for the duration of one `submit`/`join`/`isolate` call. Gates
/// against same-thread re-entry; does not itself keep any borrow of
/// `ManagerState` alive, so the pipeline is free to take its own short
/// `borrow`/`borrow_mut` scopes against `cell()` as it goes.
pub(crate) struct SubmissionGuard<'a> {
    cs: &'a CriticalSection,
    lock: Option<ReentrantMutexGuard<'a, RefCell<ManagerState>>>,
}

impl<'a> SubmissionGuard<'a> {
    pub(crate) fn cell(&self) -> &RefCell<ManagerState> {
        self.lock.as_ref().expect("guard used after drop")
    }
}

impl<'a> Drop for SubmissionGuard<'a> {
    fn drop(&mut self) {
        self.lock = None;
        *self.cs.submission_holder.lock() = None;
    }
}

impl CriticalSection {
    fn new() -> Self {
        CriticalSection {
            state: ReentrantMutex::new(RefCell::new(ManagerState::new())),
            submission_holder: Mutex::new(None),
        }
    }

    /// Short, reentrant-safe read. Safe to call from inside a callback that
    /// is itself running underneath an in-progress submission on this
    /// thread, as long as no `write` borrow is concurrently outstanding.
    fn read<R>(&self, f: impl FnOnce(&ManagerState) -> R) -> R {
        let guard = self.state.lock();
        let state = guard.borrow();
        f(&state)
    }

    /// Short, reentrant-safe write. Used for construction/configuration
    /// calls (`new_hook`, `bind_owner`, ...) that never invoke external
    /// code, so no nested borrow can ever be attempted while this is held.
    fn write<R>(&self, f: impl FnOnce(&mut ManagerState) -> R) -> R {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    fn enter_for_submission(&self) -> SubmissionGuard<'_> {
        let this_thread = std::thread::current().id();
        if *self.submission_holder.lock() == Some(this_thread) {
            tracing::error!(target: "nexus", "reentrant submission attempted on this thread");
            std::panic::panic_any(crate::pipeline::ReentrantSubmission);
        }
        let lock = self.state.lock();
        *self.submission_holder.lock() = Some(this_thread);
        SubmissionGuard {
            cs: self,
            lock: Some(lock),
        }
    }
}

/// Process-wide coordinator (§3 NexusManager). Cheap to `Clone` — every
/// clone is a handle to the same guarded state.
#[derive(Clone)]
pub struct NexusManager(Arc<CriticalSection>);

impl Default for NexusManager {
    fn default() -> Self {
        NexusManager::new()
    }
}

impl PartialEq for NexusManager {
    fn eq(&self, other: &Self) -> bool {
        self.same_manager(other)
    }
}
impl Eq for NexusManager {}

impl NexusManager {
    pub fn new() -> Self {
        NexusManager(Arc::new(CriticalSection::new()))
    }

    pub(crate) fn enter_for_submission(&self) -> SubmissionGuard<'_> {
        self.0.enter_for_submission()
    }

    pub(crate) fn same_manager(&self, other: &NexusManager) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// New manager inheriting the equality/immutable-type registries and
    /// tolerance; hooks are never shared across managers.
    pub fn clone_with_registries(&self) -> Self {
        let fresh_state = self.0.read(ManagerState::clone_registries);
        let cs = CriticalSection {
            state: ReentrantMutex::new(RefCell::new(fresh_state)),
            submission_holder: Mutex::new(None),
        };
        NexusManager(Arc::new(cs))
    }

    /// New manager with empty equality registry and default tolerance.
    pub fn fresh(&self) -> Self {
        NexusManager::new()
    }

    /// The process-wide default manager (§3: "a process typically runs one
    /// NexusManager"), lazily created on first access. Most applications
    /// only ever need this one; `NexusManager::new` remains available for
    /// tests and for embedders that want an isolated graph.
    pub fn global() -> &'static NexusManager {
        static DEFAULT: OnceLock<NexusManager> = OnceLock::new();
        DEFAULT.get_or_init(NexusManager::new)
    }

    pub fn register_equality(
        &self,
        a: nexus_equality::ValueKind,
        b: nexus_equality::ValueKind,
        callback: nexus_equality::EqualityCallback,
    ) {
        self.0.write(|state| state.equality.register(a, b, callback));
    }

    pub fn register_immutable_type<T: nexus_value::ImmutableRecord + 'static>(&self) {
        self.0.write(|state| state.immutable_types.register::<T>());
    }

    pub fn tolerance(&self) -> f64 {
        self.0.read(|state| state.equality.tolerance())
    }

    pub fn set_tolerance(&self, tolerance: f64) {
        self.0.write(|state| state.equality.set_tolerance(tolerance));
    }

    /// Creates a new writable, floating hook holding `value` in a fresh
    /// singleton nexus.
    pub fn new_hook<T: IntoValue>(&self, value: T) -> Result<Hook, SubmitError> {
        self.new_hook_with_capability(value, true)
    }

    pub fn new_read_only_hook<T: IntoValue>(&self, value: T) -> Result<Hook, SubmitError> {
        self.new_hook_with_capability(value, false)
    }

    fn new_hook_with_capability<T: IntoValue>(
        &self,
        value: T,
        writable: bool,
    ) -> Result<Hook, SubmitError> {
        let hook_id = self.0.write(|state| -> Result<HookId, SubmitError> {
            let value = normalize(value, &state.immutable_types)
                .map_err(|e| SubmitError::new(SubmitErrorKind::Normalization, e))?;
            let hook_id = HookId(state.next_hook_id);
            state.next_hook_id += 1;
            let nexus_id = NexusId(state.next_nexus_id);
            state.next_nexus_id += 1;
            state.nexuses.insert(nexus_id, NexusData::singleton(hook_id, value));
            state.hooks.insert(hook_id, HookData::new(nexus_id, writable));
            Ok(hook_id)
        })?;
        Ok(Hook::new(hook_id, self.clone()))
    }

    /// Binds `hook` to `owner` (weakly held, per H2). Used by concrete
    /// owner implementations when constructing their hooks.
    pub fn bind_owner(&self, hook: &Hook, owner: &Arc<dyn Owner>) {
        self.0.write(|state| {
            if let Some(data) = state.hooks.get_mut(&hook.id) {
                data.owner = Some(Arc::downgrade(owner));
            }
        });
    }

    pub(crate) fn read_value(&self, hook: HookId) -> Value {
        self.0.read(|state| {
            let nexus_id = state.hooks[&hook].nexus;
            state.nexuses[&nexus_id].stored_value.clone()
        })
    }

    pub(crate) fn hook_is_writable(&self, hook: HookId) -> bool {
        self.0.read(|state| state.hooks[&hook].writable)
    }

    pub(crate) fn normalize_for_submit<T: IntoValue>(&self, v: T) -> Result<Value, SubmitError> {
        self.0.read(|state| {
            normalize(v, &state.immutable_types)
                .map_err(|e| SubmitError::new(SubmitErrorKind::Normalization, e))
        })
    }

    pub(crate) fn set_reaction(&self, hook: HookId, callback: Arc<dyn Fn(&Value) + Send + Sync>) {
        self.0.write(|state| {
            if let Some(data) = state.hooks.get_mut(&hook) {
                data.reaction = Some(callback);
            }
        });
    }

    pub(crate) fn set_isolated_validation(
        &self,
        hook: HookId,
        callback: Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>,
    ) {
        self.0.write(|state| {
            if let Some(data) = state.hooks.get_mut(&hook) {
                data.isolated_validation = Some(callback);
            }
        });
    }

    pub(crate) fn add_hook_listener(&self, hook: HookId, listener: &Arc<ListenerFn>) {
        self.0.write(|state| {
            if let Some(data) = state.hooks.get_mut(&hook) {
                data.listeners.add(listener);
            }
        });
    }

    pub(crate) fn remove_hook_listener(&self, hook: HookId, listener: &Arc<ListenerFn>) {
        self.0.write(|state| {
            if let Some(data) = state.hooks.get_mut(&hook) {
                data.listeners.remove(listener);
            }
        });
    }

    pub fn add_owner_listener(&self, owner: &dyn Owner, listener: &Arc<ListenerFn>) {
        self.0.write(|state| {
            state.owner_listeners.entry(owner.id()).or_default().add(listener);
        });
    }

    pub fn remove_owner_listener(&self, owner: &dyn Owner, listener: &Arc<ListenerFn>) {
        self.0.write(|state| {
            if let Some(list) = state.owner_listeners.get_mut(&owner.id()) {
                list.remove(listener);
            }
        });
    }
}
