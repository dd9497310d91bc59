//! Event bus abstraction and in-memory implementation.
//!
//! Server-side handlers are synchronous request/response, so registered
//! handlers are awaited inline during `publish`: when a logout publish
//! returns, its token-lifecycle side effects have already happened.
//! Subscriptions deliver through broadcast channels and are consumed at
//! the receiver's own pace.

use crate::types::Event;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

/// Event bus error types.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Failed to publish event.
    #[error("Failed to publish event: {0}")]
    PublishError(String),

    /// Failed to subscribe.
    #[error("Failed to subscribe: {0}")]
    SubscribeError(String),

    /// Channel closed.
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Subscription handle for receiving events.
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Topic pattern.
    pub topic: String,
    /// Event receiver.
    pub receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event.
    pub async fn recv(&mut self) -> EventBusResult<Event> {
        self.receiver
            .recv()
            .await
            .map_err(|_| EventBusError::ChannelClosed)
    }
}

/// Event handler trait for processing events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: Event) -> EventBusResult<()>;

    /// Get the topics this handler is interested in.
    fn topics(&self) -> Vec<String>;
}

/// Event bus trait for publish/subscribe operations.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event. Registered handlers run before this returns;
    /// subscription delivery is fire-and-forget.
    async fn publish(&self, event: Event) -> EventBusResult<()>;

    /// Subscribe to a topic pattern.
    ///
    /// Patterns support wildcards:
    /// - `*` matches any single segment
    /// - `#` matches zero or more segments
    ///
    /// Examples:
    /// - `authority.user.*` matches `authority.user.authenticated`
    /// - `authority.#` matches every authority event
    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription>;

    /// Register an event handler.
    async fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()>;
}

/// In-memory event bus.
///
/// Suitable for single-process deployments and testing.
pub struct MemoryEventBus {
    subscribers: RwLock<HashMap<String, broadcast::Sender<Event>>>,
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
    channel_capacity: usize,
}

impl std::fmt::Debug for MemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventBus")
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl MemoryEventBus {
    /// Create a new in-memory event bus.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create with custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            handlers: RwLock::new(Vec::new()),
            channel_capacity: capacity,
        }
    }

    /// Check if a topic matches a pattern.
    pub fn topic_matches(pattern: &str, topic: &str) -> bool {
        let pattern_parts: Vec<&str> = pattern.split('.').collect();
        let topic_parts: Vec<&str> = topic.split('.').collect();

        let mut p_idx = 0;
        let mut t_idx = 0;

        while p_idx < pattern_parts.len() && t_idx < topic_parts.len() {
            match pattern_parts[p_idx] {
                "*" => {
                    p_idx += 1;
                    t_idx += 1;
                }
                "#" => {
                    if p_idx == pattern_parts.len() - 1 {
                        return true;
                    }
                    for i in t_idx..=topic_parts.len() {
                        if Self::topic_matches(
                            &pattern_parts[p_idx + 1..].join("."),
                            &topic_parts[i..].join("."),
                        ) {
                            return true;
                        }
                    }
                    return false;
                }
                segment => {
                    if segment != topic_parts[t_idx] {
                        return false;
                    }
                    p_idx += 1;
                    t_idx += 1;
                }
            }
        }

        if p_idx < pattern_parts.len() && pattern_parts[p_idx] == "#" {
            p_idx += 1;
        }

        p_idx == pattern_parts.len() && t_idx == topic_parts.len()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) -> EventBusResult<()> {
        let topic = event.topic();

        // Fan out to matching subscribers. A send error only means nobody
        // is listening on that channel right now.
        {
            let subscribers = self.subscribers.read().await;
            for (pattern, sender) in subscribers.iter() {
                if Self::topic_matches(pattern, &topic) {
                    let _ = sender.send(event.clone());
                }
            }
        }

        // Run handlers inline so publish implies the side effects are done.
        let handlers: Vec<Arc<dyn EventHandler>> =
            self.handlers.read().await.iter().cloned().collect();
        for handler in handlers {
            if handler
                .topics()
                .iter()
                .any(|t| Self::topic_matches(t, &topic))
            {
                if let Err(e) = handler.handle(event.clone()).await {
                    tracing::error!(topic = %topic, error = %e, "event handler failed");
                }
            }
        }

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription> {
        let id = uuid::Uuid::now_v7().to_string();

        let receiver = {
            let mut subscribers = self.subscribers.write().await;
            if let Some(sender) = subscribers.get(topic) {
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(self.channel_capacity);
                subscribers.insert(topic.to_string(), sender);
                receiver
            }
        };

        Ok(Subscription {
            id,
            topic: topic.to_string(),
            receiver,
        })
    }

    async fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()> {
        self.handlers.write().await.push(handler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthEvent, Component};
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = MemoryEventBus::new();
        let mut sub = bus.subscribe("authority.user.*").await.unwrap();

        let event = AuthEvent::UserAuthenticated {
            owner_id: Uuid::now_v7(),
            roles: vec![],
        }
        .to_event();
        bus.publish(event).await.unwrap();

        let received =
            tokio::time::timeout(std::time::Duration::from_millis(100), sub.recv()).await;
        assert!(received.is_ok());
        assert_eq!(received.unwrap().unwrap().event_type, "user.authenticated");
    }

    #[tokio::test]
    async fn test_handlers_run_before_publish_returns() {
        struct CountingHandler(AtomicU32);

        #[async_trait]
        impl EventHandler for CountingHandler {
            async fn handle(&self, _event: Event) -> EventBusResult<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            fn topics(&self) -> Vec<String> {
                vec!["authority.user.logged_out".to_string()]
            }
        }

        let bus = MemoryEventBus::new();
        let handler = Arc::new(CountingHandler(AtomicU32::new(0)));
        bus.register_handler(handler.clone()).await.unwrap();

        let event = AuthEvent::UserLoggedOut {
            owner_id: Uuid::now_v7(),
        }
        .to_event();
        bus.publish(event).await.unwrap();

        // No sleep needed: publish awaits handlers.
        assert_eq!(handler.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_not_called_for_other_topics() {
        struct CountingHandler(AtomicU32);

        #[async_trait]
        impl EventHandler for CountingHandler {
            async fn handle(&self, _event: Event) -> EventBusResult<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            fn topics(&self) -> Vec<String> {
                vec!["authority.user.logged_out".to_string()]
            }
        }

        let bus = MemoryEventBus::new();
        let handler = Arc::new(CountingHandler(AtomicU32::new(0)));
        bus.register_handler(handler.clone()).await.unwrap();

        let event = Event::new("identity.updated", Component::Authority, serde_json::json!({}));
        bus.publish(event).await.unwrap();
        assert_eq!(handler.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_topic_matching() {
        // Exact match
        assert!(MemoryEventBus::topic_matches(
            "authority.user.authenticated",
            "authority.user.authenticated"
        ));

        // Single wildcard
        assert!(MemoryEventBus::topic_matches(
            "authority.user.*",
            "authority.user.authenticated"
        ));
        assert!(MemoryEventBus::topic_matches(
            "*.identity.updated",
            "authority.identity.updated"
        ));

        // Multi-segment wildcard
        assert!(MemoryEventBus::topic_matches("authority.#", "authority.user.logged_out"));
        assert!(MemoryEventBus::topic_matches("#", "authority.identity.updated"));

        // Non-matches
        assert!(!MemoryEventBus::topic_matches(
            "authority.user.logged_out",
            "authority.user.authenticated"
        ));
        assert!(!MemoryEventBus::topic_matches(
            "edge.user.*",
            "authority.user.authenticated"
        ));
    }
}
