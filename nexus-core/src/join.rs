// Join / unjoin protocol (§4.6). Join runs a Forced submission against the
// would-be merged value *before* the merge becomes visible, so a rejected
// join never exposes the graph to an inconsistent in-between state.
// Isolate needs no validation: the value was already valid where it was.

use nexus_base::{SubmitError, SubmitErrorKind};

use crate::hook::Hook;
use crate::ids::{HookId, NexusId};
use crate::manager::{JoinPolicy, NexusManager, SubmitMode};
use crate::nexus::NexusData;

impl NexusManager {
    pub(crate) fn join(&self, a: &Hook, b: &Hook, policy: JoinPolicy) -> Result<(), SubmitError> {
        let guard = self.enter_for_submission();
        let cell = guard.cell();

        let (na, nb) = {
            let state = cell.borrow();
            (state.hooks[&a.id].nexus, state.hooks[&b.id].nexus)
        };
        if na == nb {
            return Ok(());
        }

        let v_target = {
            let state = cell.borrow();
            match policy {
                JoinPolicy::UseCallerValue => state.nexuses[&na].stored_value.clone(),
                JoinPolicy::UseTargetValue => state.nexuses[&nb].stored_value.clone(),
            }
        };

        // `notify_unchanged = false`: this Forced submission re-asserts
        // `v_target` onto both `a`'s and `b`'s current nexuses purely to run
        // completion/validation against the post-join world before the merge
        // is visible (§4.6 step 3); whichever of the two already held
        // `v_target` must not be treated as having changed, or its listeners
        // would fire for a value that never moved (§8 scenario 1).
        self.run_pipeline(
            cell,
            vec![(a.clone(), v_target.clone()), (b.clone(), v_target)],
            SubmitMode::Forced,
            false,
        )
        .map_err(|e| SubmitError::new(SubmitErrorKind::JoinRejected, format!("join rejected: {e}")))?;

        // Transfer Nb's hooks into Na, keeping Na's identity and stored
        // value, then discard Nb.
        let mut state = cell.borrow_mut();
        let nb_data = state.nexuses.remove(&nb).expect("nexus disappeared mid-join");
        for hook_id in &nb_data.members {
            if let Some(data) = state.hooks.get_mut(hook_id) {
                data.nexus = na;
            }
        }
        state
            .nexuses
            .get_mut(&na)
            .expect("target nexus disappeared mid-join")
            .members
            .extend(nb_data.members);

        Ok(())
    }

    pub(crate) fn isolate(&self, hook: HookId) {
        let guard = self.enter_for_submission();
        let cell = guard.cell();
        let mut state = cell.borrow_mut();

        let old_nexus_id = state.hooks[&hook].nexus;
        let value = state.nexuses[&old_nexus_id].stored_value.clone();

        if let Some(old) = state.nexuses.get_mut(&old_nexus_id) {
            old.members.remove(&hook);
            // (N1) a nexus with no members left is discarded.
            if old.members.is_empty() {
                state.nexuses.remove(&old_nexus_id);
            }
        }

        let new_id = NexusId(state.next_nexus_id);
        state.next_nexus_id += 1;
        state.nexuses.insert(new_id, NexusData::singleton(hook, value));
        state
            .hooks
            .get_mut(&hook)
            .expect("hook disappeared mid-isolate")
            .nexus = new_id;
    }
}
