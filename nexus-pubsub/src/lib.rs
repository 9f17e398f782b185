// Publisher/subscriber notification bridge (§2, "Publisher/Subscriber
// bridge ... ~6%"), decoupled from nexus-core the same way submerge-net
// sits beside submerge-txn: a separate crate consuming the core's public
// listener API instead of being wired into its pipeline.

mod event;
mod publisher;
mod subscriber;

pub use event::PublishedEvent;
pub use publisher::{DeliveryMode, Publisher};
pub use subscriber::Subscriber;
