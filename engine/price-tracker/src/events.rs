//! Price-changed notifications

use crate::Direction;
use chrono::{DateTime, Utc};
use item_registry::ItemInstance;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Emitted after a confirmed trade moved the price of an item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceUpdateEvent {
    pub item: ItemInstance,
    pub direction: Direction,
    pub amount: u32,
    pub timestamp: DateTime<Utc>,
}

/// Fans events out to every subscriber; disconnected subscribers are dropped
#[derive(Debug, Default)]
pub struct PriceUpdateNotifier {
    subscribers: Vec<mpsc::UnboundedSender<PriceUpdateEvent>>,
}

impl PriceUpdateNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PriceUpdateEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.push(sender);
        receiver
    }

    pub fn publish(&mut self, event: PriceUpdateEvent) {
        let before = self.subscribers.len();
        self.subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        if self.subscribers.len() < before {
            debug!("Dropped {} closed price update subscribers", before - self.subscribers.len());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use item_registry::ItemType;

    fn event() -> PriceUpdateEvent {
        PriceUpdateEvent {
            item: ItemInstance::new(ItemType::parse("minecraft:diamond").unwrap()),
            direction: Direction::Purchase,
            amount: 3,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let mut notifier = PriceUpdateNotifier::new();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.publish(event());
        assert_eq!(first.try_recv().unwrap().amount, 3);
        assert_eq!(second.try_recv().unwrap().direction, Direction::Purchase);
    }

    #[test]
    fn test_closed_subscribers_are_dropped() {
        let mut notifier = PriceUpdateNotifier::new();
        let receiver = notifier.subscribe();
        let mut kept = notifier.subscribe();
        drop(receiver);

        notifier.publish(event());
        assert_eq!(notifier.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }
}
