// Publisher/subscriber bridge (§2 component, §6). Deliberately built on top
// of nexus-core's existing listener mechanism rather than wired specially
// into the pipeline: a `Publisher` is just another weak listener on a hook
// or an owner, so Step 8's "publish" fan-out is nothing more than "notify
// one more listener" from the pipeline's point of view.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use nexus_core::{Hook, ListenerFn, NexusManager, Owner};

use crate::event::PublishedEvent;
use crate::subscriber::Subscriber;

/// How a publish fans out to subscribers (§6: "delivery mode is one of
/// {direct, async, sync}"). Whichever mode, a subscriber's panic is caught
/// and logged rather than propagated — a broken subscriber must never be
/// able to affect the commit that triggered the publish.
///
/// `Direct` and `Sync` both run (or wait on) subscribers while the
/// triggering commit's critical section is still held; a subscriber that
/// calls back into the same `NexusManager` from another thread blocks
/// until the commit finishes rather than panicking (the re-entrancy guard
/// only catches same-thread re-entry), so a `Sync` subscriber doing that
/// deadlocks. Use `Async` for subscribers that touch the manager.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeliveryMode {
    /// Call every subscriber in the publishing thread, one after another.
    Direct,
    /// Call every subscriber on its own thread, waiting for all to finish
    /// before `publish` returns.
    Sync,
    /// Call every subscriber on its own thread without waiting.
    Async,
}

enum Source {
    Hook(Hook),
    Owner(Arc<dyn Owner>),
}

impl Source {
    fn current_event(&self) -> PublishedEvent {
        match self {
            Source::Hook(hook) => PublishedEvent::Hook(hook.value()),
            Source::Owner(owner) => PublishedEvent::Owner(owner.current_values()),
        }
    }
}

/// Broadcasts a hook's or an owner's value to a set of weakly-held
/// subscribers, automatically, after every commit that touches it.
pub struct Publisher {
    mode: DeliveryMode,
    source: Source,
    subscribers: Mutex<Vec<Weak<dyn Subscriber>>>,
    // Keeps the registration on the hook/owner's listener list alive for as
    // long as this Publisher is; the list itself only holds a Weak clone.
    _listener: Arc<ListenerFn>,
}

impl Publisher {
    /// Publishes `hook`'s value on every commit that changes it.
    pub fn for_hook(hook: Hook, mode: DeliveryMode) -> Arc<Publisher> {
        Arc::new_cyclic(|weak_self: &Weak<Publisher>| {
            let weak_self = weak_self.clone();
            let listener: Arc<ListenerFn> = Arc::new(move || {
                if let Some(publisher) = weak_self.upgrade() {
                    publisher.publish();
                }
            });
            hook.add_listener(&listener);
            Publisher {
                mode,
                source: Source::Hook(hook),
                subscribers: Mutex::new(Vec::new()),
                _listener: listener,
            }
        })
    }

    /// Publishes `owner`'s full keyed view on every commit that changes any
    /// of its hooks.
    pub fn for_owner(owner: Arc<dyn Owner>, manager: &NexusManager, mode: DeliveryMode) -> Arc<Publisher> {
        Arc::new_cyclic(|weak_self: &Weak<Publisher>| {
            let weak_self = weak_self.clone();
            let listener: Arc<ListenerFn> = Arc::new(move || {
                if let Some(publisher) = weak_self.upgrade() {
                    publisher.publish();
                }
            });
            manager.add_owner_listener(owner.as_ref(), &listener);
            Publisher {
                mode,
                source: Source::Owner(owner),
                subscribers: Mutex::new(Vec::new()),
                _listener: listener,
            }
        })
    }

    pub fn subscribe(&self, subscriber: &Arc<dyn Subscriber>) {
        self.subscribers.lock().push(Arc::downgrade(subscriber));
    }

    pub fn unsubscribe(&self, subscriber: &Arc<dyn Subscriber>) {
        self.subscribers.lock().retain(|weak| match weak.upgrade() {
            Some(live) => !Arc::ptr_eq(&live, subscriber),
            None => false,
        });
    }

    /// Delivers the current value (or owner view) to every live subscriber
    /// per this publisher's delivery mode. Normally triggered automatically
    /// by the hook/owner's listener firing; exposed directly too, for a
    /// caller that wants to force a re-broadcast of the current state.
    pub fn publish(&self) {
        let event = self.source.current_event();
        let live: Vec<Arc<dyn Subscriber>> = {
            let mut subs = self.subscribers.lock();
            subs.retain(|weak| weak.strong_count() > 0);
            subs.iter().filter_map(Weak::upgrade).collect()
        };

        match self.mode {
            DeliveryMode::Direct => {
                for subscriber in live {
                    deliver(subscriber, &event);
                }
            }
            DeliveryMode::Sync => {
                let handles: Vec<_> = live
                    .into_iter()
                    .map(|subscriber| {
                        let event = event.clone();
                        std::thread::spawn(move || deliver(subscriber, &event))
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.join();
                }
            }
            DeliveryMode::Async => {
                for subscriber in live {
                    let event = event.clone();
                    std::thread::spawn(move || deliver(subscriber, &event));
                }
            }
        }
    }
}

fn deliver(subscriber: Arc<dyn Subscriber>, event: &PublishedEvent) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        subscriber.on_publish(event);
    }));
    if let Err(panic) = result {
        let msg = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        tracing::warn!(target: "nexus", "subscriber panicked during publish: {msg}");
    }
}
