// Nexus (§3, §4.2): an equivalence class of hooks sharing one stored value.
// Never exposed to callers directly — only through the `Hook` handles that
// point at it — since every access has to go through the manager's critical
// section anyway.

use std::collections::BTreeSet;

use nexus_value::Value;

use crate::ids::HookId;

pub(crate) struct NexusData {
    pub(crate) stored_value: Value,
    pub(crate) previous_stored_value: Option<Value>,
    pub(crate) members: BTreeSet<HookId>,
}

impl NexusData {
    pub(crate) fn singleton(hook: HookId, value: Value) -> Self {
        let mut members = BTreeSet::new();
        members.insert(hook);
        NexusData {
            stored_value: value,
            previous_stored_value: None,
            members,
        }
    }

    /// (N3) `write_stored`: only ever invoked by the pipeline under the
    /// critical section, with an already-normalized value.
    pub(crate) fn write_stored(&mut self, new_value: Value) {
        self.previous_stored_value = Some(self.stored_value.clone());
        self.stored_value = new_value;
    }
}
