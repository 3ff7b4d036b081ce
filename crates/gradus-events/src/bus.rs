use crate::types::EventRecord;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventRecord>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    pub fn publish(
        &self,
        event: EventRecord,
    ) -> Result<(), broadcast::error::SendError<EventRecord>> {
        self.sender.send(event).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventSource;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe();

        bus.publish(EventRecord {
            id: "evt_01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
            seq: 1,
            at: Utc::now(),
            correlation_id: None,
            source: EventSource::System,
            body: json!({"type": "ConnectivityChanged", "payload": {"online": true}}),
        })
        .unwrap();

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.seq, 1);
        assert_eq!(received.source, EventSource::System);
    }

    #[test]
    fn publish_without_subscribers_is_an_error() {
        let bus = EventBus::new(1);
        let result = bus.publish(EventRecord {
            id: "evt_01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
            seq: 1,
            at: Utc::now(),
            correlation_id: None,
            source: EventSource::Ui,
            body: json!({}),
        });
        assert!(result.is_err());
    }
}
