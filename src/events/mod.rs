use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state_machine::ReturnStatus;

/// Domain events emitted after a transition commits. Consumed by the
/// notification and accounting collaborators; delivery is decoupled from the
/// audit timeline, which lives in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ReturnCreated(Uuid),
    ReturnApproved(Uuid),
    ReturnRejected(Uuid),
    ReturnStatusChanged {
        return_id: Uuid,
        old_status: ReturnStatus,
        new_status: ReturnStatus,
    },
    RefundInitiated {
        return_id: Uuid,
        refund_id: Uuid,
        amount: Decimal,
    },
    ReplacementInitiated {
        return_id: Uuid,
        replacement_order_id: Uuid,
    },
    ReturnCompleted(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Event processing loop: logs every event and fans out to downstream
/// consumers. Notification and accounting delivery hang off this loop; they
/// are external collaborators, so here each event is only recorded.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ReturnStatusChanged {
                return_id,
                old_status,
                new_status,
            } => {
                info!(
                    return_id = %return_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Return status changed"
                );
            }
            Event::RefundInitiated {
                return_id,
                refund_id,
                amount,
            } => {
                info!(
                    return_id = %return_id,
                    refund_id = %refund_id,
                    amount = %amount,
                    "Refund initiated for return"
                );
            }
            Event::ReplacementInitiated {
                return_id,
                replacement_order_id,
            } => {
                info!(
                    return_id = %return_id,
                    replacement_order_id = %replacement_order_id,
                    "Replacement order created for return"
                );
            }
            other => info!(event = ?other, "Return lifecycle event"),
        }
    }

    warn!("Event channel closed; event processing loop terminating");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.send(Event::ReturnCreated(id)).await.unwrap();

        match rx.recv().await {
            Some(Event::ReturnCreated(got)) => assert_eq!(got, id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender.send(Event::ReturnCompleted(Uuid::new_v4())).await;
        assert!(result.is_err());
    }
}
