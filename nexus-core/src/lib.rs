// Nexus/Hook/Owner and the nexus-coordinated submission pipeline (§3, §4.2-
// §4.6) — the heart of the runtime, and the largest crate in the workspace
// by design (§2: "NexusManager ... ~40%", "Join/unjoin protocol ... ~22%").

mod hook;
mod ids;
mod join;
mod listener;
mod manager;
mod nexus;
mod owner;
mod pipeline;

pub use hook::Hook;
pub use ids::OwnerKey;
pub use listener::ListenerFn;
pub use manager::{JoinPolicy, NexusManager, SubmitMode};
pub use owner::{Key, Owner};
