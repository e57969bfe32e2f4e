//! Section notification fan-out
//!
//! Every subscriber gets a small bounded mailbox. Publishing never waits:
//! a subscriber that cannot take a message right now (mailbox full, or its
//! receiving half already dropped) is unregistered on the spot. Once
//! unregistered it still drains what was queued, then its stream ends.

use crate::metrics;
use futures::Stream;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<String>,
}

/// Publish/subscribe hub for generated-section messages
pub struct Notifier {
    capacity: usize,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

/// Receiving half handed to one listener
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<String>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new listener
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.push(Subscriber { id, tx });
        tracing::debug!(subscriber = id, total = subscribers.len(), "Subscriber registered");

        Subscription { id, rx }
    }

    /// Offer `message` to every listener; returns how many accepted it
    pub fn publish(&self, message: impl Into<String>) -> usize {
        let message = message.into();
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());

        let mut delivered = 0;
        subscribers.retain(|subscriber| match subscriber.tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::info!(subscriber = subscriber.id, "Mailbox full, dropping subscriber");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber = subscriber.id, "Subscriber gone");
                false
            }
        });

        metrics::record_publish(subscribers.len());
        delivered
    }

    /// Number of currently registered listeners
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Wire form of a finished section: `{"<section>": {"contenu": "<content>"}}`
    pub fn section_message(section: &str, content: &str) -> String {
        json!({ section: { "contenu": content } }).to_string()
    }
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next message, or `None` once unregistered and drained
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Adapt into a `Stream` (for SSE bodies)
    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription.recv().await.map(|message| (message, subscription))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let notifier = Notifier::new(5);
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();

        assert_eq!(notifier.publish("hello"), 2);
        assert_eq!(a.recv().await.as_deref(), Some("hello"));
        assert_eq!(b.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let notifier = Notifier::new(5);
        assert_eq!(notifier.publish("nobody"), 0);
    }

    #[tokio::test]
    async fn test_messages_arrive_in_order() {
        let notifier = Notifier::new(5);
        let mut sub = notifier.subscribe();
        for i in 0..3 {
            notifier.publish(format!("m{}", i));
        }
        for i in 0..3 {
            assert_eq!(sub.recv().await, Some(format!("m{}", i)));
        }
    }

    #[tokio::test]
    async fn test_full_mailbox_prunes_subscriber() {
        let notifier = Notifier::new(1);
        let sub = notifier.subscribe();

        assert_eq!(notifier.publish("first"), 1);
        assert_eq!(notifier.publish("second"), 0);
        assert_eq!(notifier.subscriber_count(), 0);

        // queued message still drains, then the stream ends
        let received: Vec<String> = sub.into_stream().collect().await;
        assert_eq!(received, vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_affect_others() {
        let notifier = Notifier::new(2);
        let _slow = notifier.subscribe();
        let mut fast = notifier.subscribe();

        for i in 0..4 {
            notifier.publish(format!("m{}", i));
            assert_eq!(fast.recv().await, Some(format!("m{}", i)));
        }
        assert_eq!(notifier.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let notifier = Notifier::new(5);
        let sub = notifier.subscribe();
        drop(sub);

        assert_eq!(notifier.publish("x"), 0);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_never_blocks() {
        let notifier = Notifier::new(1);
        let _idle = notifier.subscribe();

        let result = tokio::time::timeout(Duration::from_millis(100), async {
            for i in 0..100 {
                notifier.publish(format!("m{}", i));
            }
        })
        .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_section_message_shape() {
        let message = Notifier::section_message("introduction", "<p>Hi \"there\"</p>");
        let value: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert_eq!(value["introduction"]["contenu"], "<p>Hi \"there\"</p>");
        assert_eq!(value.as_object().unwrap().len(), 1);
    }
}
