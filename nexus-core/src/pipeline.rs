// The submission pipeline (§4.4) — the heart of the runtime. Steps 1-8 are
// implemented as private helpers operating on short-lived borrows of the
// locked `ManagerState`; `NexusManager::submit` just threads them together
// under one `SubmissionGuard` so partial progress is never observable from
// outside and a nested submission on the same thread panics.
//
// No borrow of `ManagerState` is ever held while invoking owner or listener
// callbacks (`Owner::complete`, `Owner::validate`, `Owner::invalidate`,
// reactions, listeners): each step collects whatever owned data a callback
// needs, drops the borrow, then calls out. This is what lets a callback
// call back into the manager for an ordinary read (`hook.value()`) without
// tripping the reentrancy guard — only a nested *submission* does that.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use nexus_base::{SubmitError, SubmitErrorKind, MAX_ITERATIONS};
use nexus_equality::equal;
use nexus_value::Value;

use crate::hook::Hook;
use crate::ids::{HookId, NexusId, OwnerKey};
use crate::listener::ListenerFn;
use crate::manager::{ManagerState, NexusManager, SubmitMode};
use crate::owner::{Key, Owner};

/// Pending `nexus -> value` map that preserves first-insertion order
/// (§5 Ordering: "the iteration order of the pending map... e.g. insertion
/// order from pipeline assembly").
#[derive(Default)]
struct PendingMap {
    order: Vec<NexusId>,
    values: HashMap<NexusId, Value>,
}

impl PendingMap {
    fn get(&self, id: NexusId) -> Option<&Value> {
        self.values.get(&id)
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Inserts `value` for `id`. Returns `Ok(true)` if this was a genuinely
    /// new entry, `Ok(false)` if `id` was already pending with an equal
    /// value, and an error if it was pending with a conflicting one.
    fn insert_checked(
        &mut self,
        id: NexusId,
        value: Value,
        eq: impl Fn(&Value, &Value) -> bool,
    ) -> Result<bool, SubmitError> {
        if let Some(existing) = self.values.get(&id) {
            if eq(existing, &value) {
                return Ok(false);
            }
            return Err(conflict_error(id));
        }
        self.order.push(id);
        self.values.insert(id, value);
        Ok(true)
    }

    fn iter(&self) -> impl Iterator<Item = (NexusId, &Value)> {
        self.order.iter().map(move |id| (*id, &self.values[id]))
    }

    fn retain_changed(&mut self, state: &ManagerState) {
        let order = std::mem::take(&mut self.order);
        let mut values = std::mem::take(&mut self.values);
        let mut new_order = Vec::with_capacity(order.len());
        for id in order {
            let v = values.remove(&id).expect("pending entry vanished");
            let stored = &state.nexuses[&id].stored_value;
            if equal(&v, stored, &state.equality) {
                continue;
            }
            new_order.push(id);
            self.values.insert(id, v);
        }
        self.order = new_order;
        let _ = values;
    }
}

/// Panic payload thrown by the manager's re-entrancy guard (§5, §7). A
/// listener that triggers this by calling back into `submit`/`join`/
/// `isolate` must see it escape; anything else a listener panics with is
/// logged and swallowed (§7: "Listener-callback exceptions are logged and
/// discarded ... except that a control-flow error specifically indicating
/// recursive/reentrant submission propagates unchanged").
pub(crate) struct ReentrantSubmission;

/// Runs one listener, catching and logging any panic except a reentrant
/// submission, which is resumed so it still aborts the process the way an
/// un-swallowed control-flow exception would.
fn call_listener(listener: &ListenerFn) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener()));
    if let Err(payload) = result {
        if payload.is::<ReentrantSubmission>() {
            std::panic::resume_unwind(payload);
        }
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        tracing::error!(target: "nexus", "listener panicked during notification: {msg}");
    }
}

fn conflict_error(id: NexusId) -> SubmitError {
    SubmitError::new(
        SubmitErrorKind::Conflict,
        format!("two pending entries disagree on nexus {}", id.0),
    )
}

fn validation_error(msg: impl Into<String>) -> SubmitError {
    SubmitError::new(SubmitErrorKind::Validation, msg.into())
}

/// Recursively confirms every `Value::Custom` leaf reachable from `value`
/// is registered with this manager's immutable-type registry. A `Value`
/// built against a different manager's registry is exactly the "type
/// outside the table and not registered" error case (§4.1) re-surfacing at
/// submission time.
fn check_registered(value: &Value, registry: &nexus_value::ImmutableTypeRegistry) -> Result<(), String> {
    match value {
        Value::Custom(c) => {
            if registry.is_registered_type_id(c.as_any().type_id()) {
                Ok(())
            } else {
                Err(format!(
                    "value of type {} is not registered with this manager's \
                     ImmutableTypeRegistry",
                    c.type_name()
                ))
            }
        }
        Value::Tuple(items) => items.iter().try_for_each(|v| check_registered(v, registry)),
        Value::Map(m) => m.iter().try_for_each(|(k, v)| {
            check_registered(k, registry)?;
            check_registered(v, registry)
        }),
        Value::Set(s) => s.iter().try_for_each(|v| check_registered(v, registry)),
        _ => Ok(()),
    }
}

/// Live owners with at least one pending hook, deduplicated by identity
/// and accumulated across however many times this is called during one
/// submission (owners already in `acc` are left untouched).
fn collect_affected_owners(
    state: &ManagerState,
    pending: &PendingMap,
    acc: &mut BTreeMap<OwnerKey, Arc<dyn Owner>>,
) {
    for (nexus_id, _) in pending.iter() {
        let Some(nexus) = state.nexuses.get(&nexus_id) else { continue };
        for hook_id in &nexus.members {
            let Some(hook_data) = state.hooks.get(hook_id) else { continue };
            if let Some(owner) = hook_data.live_owner() {
                acc.entry(owner.id()).or_insert(owner);
            }
        }
    }
}

fn owner_nexus_id(state: &ManagerState, owner: &Arc<dyn Owner>, key: &Key) -> Option<NexusId> {
    owner.hook(key).map(|hook| state.hooks[&hook.id].nexus)
}

impl NexusManager {
    pub fn submit(&self, requests: Vec<(Hook, Value)>, mode: SubmitMode) -> Result<(), SubmitError> {
        let guard = self.enter_for_submission();
        // An ordinary submit's Forced mode must still notify a nexus whose
        // pending value is equal to what is already stored (scenario 5:
        // re-submitting the same value in Forced mode still fires listeners).
        self.run_pipeline(guard.cell(), requests, mode, true)
    }

    /// `notify_unchanged` controls which committed nexuses Step 8 fans out
    /// to: `true` notifies every pending nexus regardless of whether its
    /// value actually moved (ordinary Forced submissions, per scenario 5);
    /// `false` restricts the fan-out to nexuses whose stored value actually
    /// changed. `join` (§4.6) needs the latter — its Forced submission
    /// re-asserts the caller's own current value onto its own nexus just to
    /// run validation, and that nexus must not be treated as updated.
    pub(crate) fn run_pipeline(
        &self,
        cell: &RefCell<ManagerState>,
        requests: Vec<(Hook, Value)>,
        mode: SubmitMode,
        notify_unchanged: bool,
    ) -> Result<(), SubmitError> {
        // Steps 1-3: normalize, de-duplicate by nexus, filter no-ops. All
        // pure lookups against the current state; one shared borrow.
        let mut pending = PendingMap::default();
        {
            let state = cell.borrow();
            for (hook, value) in requests {
                check_registered(&value, &state.immutable_types)
                    .map_err(|e| SubmitError::new(SubmitErrorKind::Normalization, e))?;
                let nexus_id = state
                    .hooks
                    .get(&hook.id)
                    .ok_or_else(|| validation_error("hook does not belong to this manager"))?
                    .nexus;
                pending.insert_checked(nexus_id, value, |a, b| equal(a, b, &state.equality))?;
            }
            if mode == SubmitMode::Normal {
                pending.retain_changed(&state);
                if pending.is_empty() {
                    return Ok(());
                }
            }
        }

        // Step 4: completion to fixed point. Each round gathers owners and
        // their submitted/current views under a short borrow, drops it,
        // then calls `Owner::complete` with nothing borrowed.
        let mut owners: BTreeMap<OwnerKey, Arc<dyn Owner>> = BTreeMap::new();

        for round in 0..MAX_ITERATIONS {
            let round_inputs: Vec<(Arc<dyn Owner>, BTreeMap<Key, Value>, BTreeMap<Key, Value>)> = {
                let state = cell.borrow();
                collect_affected_owners(&state, &pending, &mut owners);
                owners
                    .values()
                    .map(|owner| {
                        let mut submitted: BTreeMap<Key, Value> = BTreeMap::new();
                        let mut current: BTreeMap<Key, Value> = BTreeMap::new();
                        for key in owner.keys() {
                            let Some(nexus_id) = owner_nexus_id(&state, owner, &key) else { continue };
                            match pending.get(nexus_id) {
                                Some(v) => {
                                    submitted.insert(key, v.clone());
                                }
                                None => {
                                    current.insert(key, state.nexuses[&nexus_id].stored_value.clone());
                                }
                            }
                        }
                        (owner.clone(), submitted, current)
                    })
                    .collect()
            };

            let mut added_any = false;
            for (owner, submitted, current) in round_inputs {
                let extra = owner.complete(&submitted, &current);
                for (key, value) in extra {
                    if submitted.contains_key(&key) {
                        // O2 says `complete` must never return a key already in
                        // `submitted`. Rather than silently dropping it, let it
                        // flow into `insert_checked` below: that nexus is
                        // already pending with the caller's submitted value, so
                        // a differing completion value surfaces as the same
                        // Conflict error any other disagreeing completion would
                        // (§4.4 Step 4), instead of masking it.
                        tracing::warn!(
                            target: "nexus",
                            "owner {:?} completion returned a key already present in \
                             submitted (violates O2)",
                            owner.id()
                        );
                    }
                    let state = cell.borrow();
                    check_registered(&value, &state.immutable_types)
                        .map_err(|e| SubmitError::new(SubmitErrorKind::Normalization, e))?;
                    let Some(nexus_id) = owner_nexus_id(&state, &owner, &key) else { continue };
                    if pending.insert_checked(nexus_id, value, |a, b| equal(a, b, &state.equality))? {
                        added_any = true;
                    }
                }
            }

            if !added_any {
                break;
            }
            if round == MAX_ITERATIONS - 1 {
                return Err(SubmitError::new(
                    SubmitErrorKind::CompletionCycle,
                    format!("completion did not converge within {MAX_ITERATIONS} rounds"),
                ));
            }
        }

        // Step 5: validate. Build each owner's complete view under a short
        // borrow, drop it, then call `Owner::validate` with nothing
        // borrowed.
        for owner in owners.values() {
            let complete_view: BTreeMap<Key, Value> = {
                let state = cell.borrow();
                let mut m = BTreeMap::new();
                for key in owner.keys() {
                    let Some(nexus_id) = owner_nexus_id(&state, owner, &key) else { continue };
                    let value = pending
                        .get(nexus_id)
                        .cloned()
                        .unwrap_or_else(|| state.nexuses[&nexus_id].stored_value.clone());
                    m.insert(key, value);
                }
                m
            };
            owner.validate(&complete_view).map_err(validation_error)?;
        }

        let floating_pending: Vec<(HookId, Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>, Value)> = {
            let state = cell.borrow();
            state
                .hooks
                .iter()
                .filter_map(|(id, data)| {
                    let cb = data.isolated_validation.as_ref()?;
                    if !data.is_floating() {
                        return None;
                    }
                    let value = pending.get(data.nexus)?;
                    Some((*id, cb.clone(), value.clone()))
                })
                .collect()
        };
        for (_hook_id, cb, value) in floating_pending {
            cb(&value).map_err(validation_error)?;
        }

        // Step 6: CheckOnly exits here without mutating state.
        if mode == SubmitMode::CheckOnly {
            return Ok(());
        }

        // Step 7: commit, in the pending map's deterministic order. Short
        // exclusive borrows; no external calls during this scope.
        let commits: Vec<(NexusId, Value)> = pending.iter().map(|(id, v)| (id, v.clone())).collect();
        let changed: Vec<bool> = {
            let state = cell.borrow();
            commits
                .iter()
                .map(|(id, v)| !equal(v, &state.nexuses[id].stored_value, &state.equality))
                .collect()
        };
        {
            let mut state = cell.borrow_mut();
            for (nexus_id, value) in &commits {
                state
                    .nexuses
                    .get_mut(nexus_id)
                    .expect("pending nexus vanished")
                    .write_stored(value.clone());
            }
        }
        let updated: Vec<NexusId> = if notify_unchanged {
            commits.iter().map(|(id, _)| *id).collect()
        } else {
            commits
                .iter()
                .zip(changed.iter())
                .filter(|(_, changed)| **changed)
                .map(|((id, _), _)| *id)
                .collect()
        };

        // Step 8: post-commit fan-out, still conceptually "inside" the
        // submission (the `SubmissionGuard` is still held by the caller),
        // but no step here holds a borrow of `ManagerState` while calling
        // external code.
        for owner in owners.values() {
            owner.invalidate();
        }

        let updated_set: HashSet<NexusId> = updated.iter().copied().collect();
        let reactions: Vec<(Arc<dyn Fn(&Value) + Send + Sync>, Value)> = {
            let state = cell.borrow();
            let mut out = Vec::new();
            for nexus_id in &updated {
                let value = state.nexuses[nexus_id].stored_value.clone();
                for hook_id in &state.nexuses[nexus_id].members {
                    if let Some(data) = state.hooks.get(hook_id) {
                        if let Some(reaction) = &data.reaction {
                            out.push((reaction.clone(), value.clone()));
                        }
                    }
                }
            }
            out
        };
        for (reaction, value) in reactions {
            reaction(&value);
        }

        // Owner listeners, then the owned hooks of updated nexuses.
        let mut owner_listener_batches: Vec<Vec<Arc<ListenerFn>>> = Vec::new();
        let mut owned_hook_listener_batches: Vec<Vec<Arc<ListenerFn>>> = Vec::new();
        {
            let mut state = cell.borrow_mut();
            for owner in owners.values() {
                if let Some(list) = state.owner_listeners.get_mut(&owner.id()) {
                    owner_listener_batches.push(list.drain_live());
                }
            }
            let owned_hook_ids: Vec<HookId> = owners
                .values()
                .flat_map(|o| o.keys().into_iter().filter_map(|k| o.hook(&k)))
                .map(|h| h.id)
                .collect();
            for hook_id in &owned_hook_ids {
                if let Some(data) = state.hooks.get_mut(hook_id) {
                    if updated_set.contains(&data.nexus) {
                        owned_hook_listener_batches.push(data.listeners.drain_live());
                    }
                }
            }
        }
        for batch in owner_listener_batches.into_iter().chain(owned_hook_listener_batches) {
            for listener in batch {
                call_listener(&listener);
            }
        }

        // Remaining (non-owned, floating) hooks of each updated nexus.
        let owned_hooks: BTreeSet<HookId> = owners
            .values()
            .flat_map(|o| o.keys().into_iter().filter_map(|k| o.hook(&k)))
            .map(|h| h.id)
            .collect();
        let mut floating_listener_batches: Vec<Vec<Arc<ListenerFn>>> = Vec::new();
        {
            let mut state = cell.borrow_mut();
            for nexus_id in &updated {
                let member_hooks: Vec<HookId> = state.nexuses[nexus_id].members.iter().copied().collect();
                for hook_id in member_hooks {
                    if owned_hooks.contains(&hook_id) {
                        continue;
                    }
                    if let Some(data) = state.hooks.get_mut(&hook_id) {
                        floating_listener_batches.push(data.listeners.drain_live());
                    }
                }
            }
        }
        for batch in floating_listener_batches {
            for listener in batch {
                call_listener(&listener);
            }
        }

        Ok(())
    }
}
