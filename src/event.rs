//! Controller state-change notifications.

use tokio::sync::broadcast;

use crate::mode::DisplayMode;

/// State changes published by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A new temperature sample, in Celsius.
    TemperatureSampled(f32),
    /// The fan relay accepted a power command.
    FanPowerChanged(bool),
    DisplayModeChanged(DisplayMode),
    InversionChanged(bool),
    /// The controller released its hardware.
    Stopped,
}

/// Event bus for publish-subscribe messaging.
///
/// # Example
///
/// ```no_run
/// use poe_hatd::event::{Event, EventBus};
///
/// let event_bus = EventBus::new();
/// let mut subscriber = event_bus.subscribe();
///
/// event_bus.publish(Event::FanPowerChanged(true));
///
/// // In async context, receive events:
/// // let event = subscriber.recv().await;
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new EventBus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new EventBus with custom capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Having no subscribers is normal, so the event is then dropped.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each subscriber receives all events published after subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
