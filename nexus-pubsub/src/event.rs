// The payload handed to subscribers (§6 Publisher/subscriber). A hook
// publisher broadcasts its single stored value; an owner publisher
// broadcasts its whole keyed view, mirroring `Owner::current_values`.

use std::collections::BTreeMap;

use nexus_core::Key;
use nexus_value::Value;

#[derive(Clone, Debug)]
pub enum PublishedEvent {
    Hook(Value),
    Owner(BTreeMap<Key, Value>),
}
