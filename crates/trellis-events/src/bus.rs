//! Event bus for broadcasting framework notifications to subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{trace, warn};
use trellis_core::UnitId;

use crate::event::FrameworkEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event bus for broadcasting events to all subscribers.
///
/// Events are delivered asynchronously and in publication order. A receiver
/// that falls more than `capacity` events behind loses the oldest ones.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<FrameworkEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified capacity.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers that got the event.
    pub fn publish(&self, event: FrameworkEvent) -> usize {
        let event = Arc::new(event);
        trace!(event_type = %event.event_type(), "Publishing event");
        if let Ok(count) = self.sender.send(event) {
            count
        } else {
            // No receivers
            0
        }
    }

    /// Publish a batch of events in order.
    pub fn publish_all(&self, events: impl IntoIterator<Item = FrameworkEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    /// Subscribe to every event.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), None)
    }

    /// Subscribe to events concerning one unit.
    ///
    /// `PackagesRefreshed` carries no single unit and is delivered only if the
    /// unit took part in the refresh.
    #[must_use]
    pub fn subscribe_unit(&self, unit: UnitId) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), Some(unit))
    }

    /// Current number of receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for events from the event bus.
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<FrameworkEvent>>,
    unit: Option<UnitId>,
}

impl EventReceiver {
    fn new(receiver: broadcast::Receiver<Arc<FrameworkEvent>>, unit: Option<UnitId>) -> Self {
        Self { receiver, unit }
    }

    fn matches(&self, event: &FrameworkEvent) -> bool {
        let Some(unit) = self.unit else {
            return true;
        };
        match event {
            FrameworkEvent::PackagesRefreshed { units } => units.contains(&unit),
            other => other.unit_id() == Some(unit),
        }
    }

    /// Receive the next event.
    ///
    /// Lagged events are skipped with a warning. Returns `None` once every
    /// bus handle has been dropped.
    pub async fn recv(&mut self) -> Option<Arc<FrameworkEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive the next event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<FrameworkEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(event);
                    }
                },
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }

    /// Drain every event currently buffered.
    pub fn drain(&mut self) -> Vec<Arc<FrameworkEvent>> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::UnitEventKind;

    fn installed(id: u64) -> FrameworkEvent {
        FrameworkEvent::unit(UnitEventKind::Installed, UnitId(id))
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(EventBus::with_capacity(0).capacity(), 1);
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        assert_eq!(bus.publish(installed(1)), 1);

        let event = receiver.recv().await.unwrap();
        assert_eq!(*event, installed(1));
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(installed(1)), 0);
    }

    #[tokio::test]
    async fn test_order_is_preserved() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        bus.publish_all([installed(1), installed(2), installed(3)]);

        let ids: Vec<_> = receiver
            .drain()
            .iter()
            .filter_map(|e| e.unit_id())
            .collect();
        assert_eq!(ids, vec![UnitId(1), UnitId(2), UnitId(3)]);
    }

    #[tokio::test]
    async fn test_unit_subscription_filters() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe_unit(UnitId(2));
        bus.publish(installed(1));
        bus.publish(installed(2));
        bus.publish(FrameworkEvent::PackagesRefreshed {
            units: vec![UnitId(1)],
        });
        bus.publish(FrameworkEvent::PackagesRefreshed {
            units: vec![UnitId(2)],
        });

        let events = receiver.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(*events[0], installed(2));
        assert_eq!(events[1].event_type(), "packages_refreshed");
    }

    #[tokio::test]
    async fn test_lagged_receiver_skips_ahead() {
        let bus = EventBus::with_capacity(2);
        let mut receiver = bus.subscribe();
        for id in 1..=5 {
            bus.publish(installed(id));
        }
        let ids: Vec<_> = receiver
            .drain()
            .iter()
            .filter_map(|e| e.unit_id())
            .collect();
        assert_eq!(ids, vec![UnitId(4), UnitId(5)]);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();
        assert!(receiver.try_recv().is_none());
    }
}
