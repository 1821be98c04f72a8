//! Event bus for host events
//!
//! The EventBus delivers the host's messages (kernel started, variable
//! updated), timer ticks and operator actions to the warning detector, and
//! carries the module's own published status back out.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};
use wm_core::{Event, EventData, EventKind};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// The event bus for publishing and subscribing to host events
///
/// Supports subscribing to one event kind, subscribing to every event, and
/// typed subscriptions that hand out deserialized event data.
pub struct EventBus {
    /// Senders per event kind
    listeners: DashMap<EventKind, broadcast::Sender<Event>>,
    /// Sender for subscribers of every event
    all_sender: broadcast::Sender<Event>,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            all_sender,
            capacity,
        }
    }

    /// Subscribe to events of one kind
    pub fn subscribe(&self, kind: EventKind) -> broadcast::Receiver<Event> {
        trace!(kind = %kind, "Subscribing to event kind");
        self.listeners
            .entry(kind)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to events carrying a specific data type
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::kind()))
    }

    /// Subscribe to every event
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.all_sender.subscribe()
    }

    /// Fire an event to the subscribers of its kind and to every-event subscribers
    pub fn fire(&self, event: Event) {
        debug!(kind = %event.kind, id = %event.id, "Firing event");

        if let Some(sender) = self.listeners.get(&event.kind) {
            // A send error only means there is no active receiver
            let _ = sender.send(event.clone());
        }
        let _ = self.all_sender.send(event);
    }

    /// Fire a typed event
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T) {
        let typed = Event::typed(data);
        self.fire(Event {
            id: typed.id,
            kind: typed.kind,
            data: serde_json::to_value(&typed.data).unwrap_or_default(),
            origin: typed.origin,
            time_fired: typed.time_fired,
        });
    }

    /// Number of event kinds with a subscription
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver for typed events
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<Event>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next event whose data deserializes into `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            match serde_json::from_value::<T>(event.data.clone()) {
                Ok(data) => {
                    return Ok(Event {
                        id: event.id,
                        kind: event.kind,
                        data,
                        origin: event.origin,
                        time_fired: event.time_fired,
                    })
                }
                Err(e) => trace!(error = %e, "Skipping event with unexpected payload"),
            }
        }
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wm_core::events::{KernelStartedData, VariableUpdatedData};
    use wm_core::ObjectId;

    fn variable_update(raw: i64) -> VariableUpdatedData {
        VariableUpdatedData {
            variable_id: ObjectId::new(raw).unwrap(),
            value: json!(true),
            changed: true,
            old_value: None,
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(EventKind::VariableUpdated);

        bus.fire_typed(variable_update(12345));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::VariableUpdated);
        assert_eq!(received.data["variable_id"], 12345);
    }

    #[tokio::test]
    async fn test_kind_filtering() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(EventKind::KernelStarted);

        bus.fire_typed(variable_update(12345));
        bus.fire_typed(KernelStartedData {});

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::KernelStarted);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_all() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_all();

        bus.fire_typed(KernelStartedData {});
        bus.fire_typed(variable_update(23456));

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::KernelStarted);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::VariableUpdated);
    }

    #[tokio::test]
    async fn test_typed_receiver() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<VariableUpdatedData>();

        bus.fire_typed(variable_update(34567));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.data.variable_id.get(), 34567);
        assert!(received.data.changed);
    }

    #[test]
    fn test_typed_receiver_skips_unexpected_payload() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_typed::<VariableUpdatedData>();

        bus.fire(Event::new(EventKind::VariableUpdated, json!({"variable_id": "nope"})));
        bus.fire_typed(variable_update(45678));

        let received = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(received.data.variable_id.get(), 45678);
    }

    #[test]
    fn test_fire_without_subscribers() {
        let bus = EventBus::new();
        bus.fire_typed(KernelStartedData {});
        assert_eq!(bus.listener_count(), 0);
    }
}
