//! Discrete controller events and the listener registry they are dispatched to.
//!
//! Listeners run synchronously on the polling task. Anything UI-affine has to
//! be marshalled by the listener itself (for example by forwarding into a
//! channel), and a listener must not call back into the registry.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, trace};

use crate::controller::error::ControllerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerEvent {
    UpPressed,
    DownPressed,
    LeftPressed,
    RightPressed,
    LeftRepeat,
    RightRepeat,
    StartPressed,
    BackPressed,
    APressed,
    BPressed,
    XPressed,
    LeftTriggerPressed,
    RightTriggerPressed,
}

impl ControllerEvent {
    pub const ALL: [ControllerEvent; 13] = [
        ControllerEvent::UpPressed,
        ControllerEvent::DownPressed,
        ControllerEvent::LeftPressed,
        ControllerEvent::RightPressed,
        ControllerEvent::LeftRepeat,
        ControllerEvent::RightRepeat,
        ControllerEvent::StartPressed,
        ControllerEvent::BackPressed,
        ControllerEvent::APressed,
        ControllerEvent::BPressed,
        ControllerEvent::XPressed,
        ControllerEvent::LeftTriggerPressed,
        ControllerEvent::RightTriggerPressed,
    ];
}

impl fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Held-state booleans, refreshed whenever the device reports a new packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeldState {
    pub left_shoulder: bool,
    pub right_shoulder: bool,
    pub left_trigger: bool,
    pub right_trigger: bool,
    pub back: bool,
    pub b: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn() + Send + Sync>;

struct Entry {
    id: SubscriptionId,
    event: ControllerEvent,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    closed: bool,
    entries: Vec<Entry>,
}

/// Listener handles per event kind.
///
/// Dispatch holds the read lock for a whole tick's batch. [`close`] takes
/// the write lock, so once it returns no dispatch is running and none will
/// reach a listener again.
///
/// [`close`]: Subscriptions::close
#[derive(Default)]
pub struct Subscriptions {
    registry: RwLock<Registry>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(
        &self,
        event: ControllerEvent,
        listener: F,
    ) -> Result<SubscriptionId, ControllerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if registry.closed {
            return Err(ControllerError::Disposed);
        }
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.entries.push(Entry {
            id,
            event,
            listener: Box::new(listener),
        });
        debug!("Listener {:?} subscribed to {}", id, event);
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let before = registry.entries.len();
        registry.entries.retain(|entry| entry.id != id);
        before != registry.entries.len()
    }

    pub fn clear(&self) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.entries.clear();
    }

    /// Clears every listener and refuses new ones.
    pub fn close(&self) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.closed = true;
        let dropped = registry.entries.len();
        registry.entries.clear();
        debug!("Subscriptions closed, {} listeners dropped", dropped);
    }

    pub fn is_closed(&self) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    pub fn len(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes listeners for `events` in order and returns how many ran.
    pub fn dispatch(&self, events: &[ControllerEvent]) -> usize {
        if events.is_empty() {
            return 0;
        }
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        if registry.closed {
            return 0;
        }
        let mut invoked = 0;
        for event in events {
            trace!("Dispatching {}", event);
            for entry in registry.entries.iter().filter(|entry| entry.event == *event) {
                (entry.listener)();
                invoked += 1;
            }
        }
        invoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn dispatch_only_reaches_matching_kind() {
        let subs = Subscriptions::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let a2 = a.clone();
        let b2 = b.clone();
        subs.subscribe(ControllerEvent::APressed, move || {
            a2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        subs.subscribe(ControllerEvent::BPressed, move || {
            b2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let invoked = subs.dispatch(&[ControllerEvent::APressed, ControllerEvent::APressed]);
        assert_eq!(invoked, 2);
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listeners_fire_in_event_then_registration_order() {
        let subs = Subscriptions::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (event, tag) in [
            (ControllerEvent::LeftPressed, "left-1"),
            (ControllerEvent::APressed, "a"),
            (ControllerEvent::LeftPressed, "left-2"),
        ] {
            let log = log.clone();
            subs.subscribe(event, move || log.lock().unwrap().push(tag))
                .unwrap();
        }
        subs.dispatch(&[ControllerEvent::APressed, ControllerEvent::LeftPressed]);
        assert_eq!(*log.lock().unwrap(), vec!["a", "left-1", "left-2"]);
    }

    #[test]
    fn unsubscribe_removes_one_listener() {
        let subs = Subscriptions::new();
        let id = subs.subscribe(ControllerEvent::XPressed, || {}).unwrap();
        subs.subscribe(ControllerEvent::XPressed, || {}).unwrap();
        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id));
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn close_drops_listeners_and_rejects_new_ones() {
        let subs = Subscriptions::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        subs.subscribe(ControllerEvent::StartPressed, move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        subs.close();
        assert!(subs.is_closed());
        assert!(subs.is_empty());
        assert_eq!(subs.dispatch(&[ControllerEvent::StartPressed]), 0);
        assert!(matches!(
            subs.subscribe(ControllerEvent::StartPressed, || {}),
            Err(ControllerError::Disposed)
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clear_keeps_registry_open() {
        let subs = Subscriptions::new();
        subs.subscribe(ControllerEvent::UpPressed, || {}).unwrap();
        subs.clear();
        assert!(subs.is_empty());
        assert!(subs.subscribe(ControllerEvent::UpPressed, || {}).is_ok());
    }
}
