//! Event Publisher Seam
//!
//! The relay publishes through this trait; the broker transport behind it is
//! not this crate's concern. Implementations must be safe to call repeatedly
//! for the same message (delivery is at-least-once).

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Publish failure, recorded on the outbox row and retried with backoff
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct PublishError(pub String);

/// Transport seam for outbound domain events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publisher name for logging
    fn name(&self) -> &'static str;

    /// Publish one event. The event type doubles as the routing key.
    async fn publish(&self, event_type: &str, payload: &Value) -> Result<(), PublishError>;
}

/// Publisher that only logs. Default wiring for a walletd process with no
/// broker attached; every message is acknowledged immediately.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, event_type: &str, payload: &Value) -> Result<(), PublishError> {
        tracing::info!(event_type, %payload, "Publishing event");
        Ok(())
    }
}

/// Mock publisher for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct MockPublisher {
        /// Published (event_type, payload) pairs for verification
        published: Mutex<Vec<(String, Value)>>,
        publish_count: AtomicUsize,
        /// Fail the next N publish calls
        fail_remaining: AtomicUsize,
    }

    impl MockPublisher {
        pub fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
                publish_count: AtomicUsize::new(0),
                fail_remaining: AtomicUsize::new(0),
            }
        }

        /// Make the next `n` publish calls fail
        pub fn fail_next(&self, n: usize) {
            self.fail_remaining.store(n, Ordering::SeqCst);
        }

        pub fn publish_count(&self) -> usize {
            self.publish_count.load(Ordering::SeqCst)
        }

        pub fn published(&self) -> Vec<(String, Value)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventPublisher for MockPublisher {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn publish(&self, event_type: &str, payload: &Value) -> Result<(), PublishError> {
            self.publish_count.fetch_add(1, Ordering::SeqCst);

            let remaining = self.fail_remaining.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
                return Err(PublishError("Mock publish failure".to_string()));
            }

            self.published
                .lock()
                .unwrap()
                .push((event_type.to_string(), payload.clone()));
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[tokio::test]
        async fn test_mock_publisher_records_messages() {
            let publisher = MockPublisher::new();

            publisher
                .publish("FundsDeposited", &json!({"walletId": "user-1"}))
                .await
                .unwrap();

            assert_eq!(publisher.publish_count(), 1);
            assert_eq!(publisher.published()[0].0, "FundsDeposited");
        }

        #[tokio::test]
        async fn test_mock_publisher_fails_then_recovers() {
            let publisher = MockPublisher::new();
            publisher.fail_next(2);

            assert!(publisher.publish("X", &json!({})).await.is_err());
            assert!(publisher.publish("X", &json!({})).await.is_err());
            assert!(publisher.publish("X", &json!({})).await.is_ok());
            assert_eq!(publisher.publish_count(), 3);
            assert_eq!(publisher.published().len(), 1);
        }
    }
}

#[cfg(test)]
pub use mock::MockPublisher;
