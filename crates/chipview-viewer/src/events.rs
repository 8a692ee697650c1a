//! Host event bus: page visibility, container resizes and pointer input

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chipview_core::Vec2;
use parking_lot::Mutex;

use crate::surface::SurfaceSize;

/// Event raised by the hosting page
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    /// Page became visible (`true`) or hidden (`false`)
    Visibility(bool),
    /// Container resized
    Resize(SurfaceSize),
    PointerDown,
    PointerUp,
    /// Pointer moved by `delta` pixels while pressed
    Drag { delta: Vec2 },
    /// Secondary-button or two-finger drag by `delta` pixels
    Pan { delta: Vec2 },
    /// Wheel scroll; positive zooms in
    Scroll(f32),
}

/// Handle identifying a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&HostEvent) + Send + Sync>;

/// Broadcasts host events to registered listeners
#[derive(Default)]
pub struct HostEvents {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl HostEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&HostEvent) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    pub fn is_subscribed(&self, id: ListenerId) -> bool {
        self.listeners.lock().iter().any(|(registered, _)| *registered == id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Deliver an event to every listener registered at the time of the call
    pub fn emit(&self, event: HostEvent) {
        // Listeners may (un)subscribe while handling the event
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_subscribe_emit_unsubscribe() {
        let events = HostEvents::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let id = events.subscribe(move |event| {
            if matches!(event, HostEvent::PointerDown) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        events.emit(HostEvent::PointerDown);
        events.emit(HostEvent::PointerUp);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(events.unsubscribe(id));
        assert!(!events.unsubscribe(id));
        events.emit(HostEvent::PointerDown);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn test_listener_can_unsubscribe_itself() {
        let events = Arc::new(HostEvents::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let bus = events.clone();
        let own_id = slot.clone();
        let id = events.subscribe(move |_| {
            if let Some(id) = *own_id.lock() {
                bus.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        events.emit(HostEvent::Visibility(false));
        assert!(!events.is_subscribed(id));
    }
}
