// Weak-callback listener lists (§5 shared-resource policy: "Listener lists
// use weak references to prevent lifecycle coupling; a listener whose
// target has been collected is silently skipped and lazily removed.")
//
// Callers hold the `Arc` that keeps a listener alive; the list itself only
// ever stores a `Weak` clone of it.

use std::sync::{Arc, Weak};

pub type ListenerFn = dyn Fn() + Send + Sync;

#[derive(Default)]
pub struct ListenerList(Vec<Weak<ListenerFn>>);

impl ListenerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: &Arc<ListenerFn>) {
        self.0.push(Arc::downgrade(listener));
    }

    pub fn remove(&mut self, listener: &Arc<ListenerFn>) {
        self.0.retain(|w| match w.upgrade() {
            Some(l) => !Arc::ptr_eq(&l, listener),
            None => false,
        });
    }

    /// Snapshots every live listener, lazily dropping any that have been
    /// collected, and hands them back for the caller to invoke. Split from
    /// actually calling them so the manager can release its state borrow
    /// first — a listener may call back into the manager for a read.
    pub fn drain_live(&mut self) -> Vec<Arc<ListenerFn>> {
        let mut live = Vec::with_capacity(self.0.len());
        self.0.retain(|w| match w.upgrade() {
            Some(l) => {
                live.push(l);
                true
            }
            None => false,
        });
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(test)]
    use test_log::test;

    #[test]
    fn fires_live_listeners_and_drops_collected_ones() {
        let mut list = ListenerList::new();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let calls2 = calls.clone();
        let live: Arc<ListenerFn> = Arc::new(move || {
            calls2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        list.add(&live);

        {
            let transient: Arc<ListenerFn> = Arc::new(|| panic!("should never fire"));
            list.add(&transient);
            // `transient` is dropped here; only its Weak remains in the list.
        }

        for listener in list.drain_live() {
            listener();
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(list.0.len(), 1);
    }

    #[test]
    fn remove_drops_matching_listener() {
        let mut list = ListenerList::new();
        let live: Arc<ListenerFn> = Arc::new(|| ());
        list.add(&live);
        list.remove(&live);
        assert_eq!(list.0.len(), 0);
    }
}
