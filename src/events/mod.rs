use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

/// Events emitted by the stock update engine after a movement commits.
/// Nothing is emitted for rejected movements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    MovementCommitted {
        movement_id: i64,
        direction: String,
        created_by: Uuid,
        line_count: usize,
    },
    StockChanged {
        warehouse_id: i32,
        product_id: i64,
        lot: String,
        quantity: i64,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Fan-out channel consumed by real-time subscribers (the delivery
/// transport itself lives outside this service).
pub type StockFeed = broadcast::Sender<Event>;

/// Creates the subscriber fan-out channel.
pub fn stock_feed(capacity: usize) -> StockFeed {
    broadcast::channel(capacity).0
}

/// Background event processor: drains the engine's channel and forwards
/// every event onto the subscriber feed.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, feed: StockFeed) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::MovementCommitted {
                movement_id,
                direction,
                line_count,
                ..
            } => {
                debug!(
                    movement_id = %movement_id,
                    direction = %direction,
                    lines = %line_count,
                    "Movement committed"
                );
            }
            Event::StockChanged {
                warehouse_id,
                product_id,
                lot,
                quantity,
            } => {
                debug!(
                    warehouse_id = %warehouse_id,
                    product_id = %product_id,
                    lot = %lot,
                    quantity = %quantity,
                    "Stock changed"
                );
            }
        }

        // A send error only means there are no subscribers right now.
        if feed.send(event).is_err() {
            warn!("No active stock feed subscribers; event dropped from feed");
        }
    }

    debug!("Event channel closed; processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_forwarded_to_the_feed() {
        let (tx, rx) = mpsc::channel(8);
        let feed = stock_feed(8);
        let mut sub = feed.subscribe();
        tokio::spawn(process_events(rx, feed));

        let sender = EventSender::new(tx);
        sender
            .send(Event::StockChanged {
                warehouse_id: 1,
                product_id: 7,
                lot: "L1".into(),
                quantity: 42,
            })
            .await
            .expect("send");

        match sub.recv().await.expect("feed recv") {
            Event::StockChanged { quantity, .. } => assert_eq!(quantity, 42),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
