use crate::event::PublishedEvent;

/// A subscriber to a [`crate::Publisher`]. Implementations must tolerate
/// being called from whatever thread the publisher's delivery mode picks.
pub trait Subscriber: Send + Sync {
    fn on_publish(&self, event: &PublishedEvent);
}

impl<F> Subscriber for F
where
    F: Fn(&PublishedEvent) + Send + Sync + 'static,
{
    fn on_publish(&self, event: &PublishedEvent) {
        self(event)
    }
}
