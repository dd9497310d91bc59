//! # Bridge Events
//!
//! Authentication domain events and a pub/sub bus for the Bridge
//! identity-sync protocol.
//!
//! ## Overview
//!
//! The bridge-events crate handles:
//! - **Event Types**: `UserAuthenticated`, `UserLoggedOut`,
//!   `IdentityUpdated`, wrapped in a routed envelope
//! - **Event Bus**: publish/subscribe with topic wildcards
//! - **Token Lifecycle Listener**: keeps the persistent-token table
//!   consistent with login/logout, as an explicit subscriber rather than a
//!   side channel of authentication hooks
//!
//! ## Topic Patterns
//!
//! Topics are structured as `{component}.{event_type}`:
//! - `authority.user.authenticated` - specific event
//! - `authority.user.*` - all user lifecycle events
//! - `authority.#` - every authority event
//!
//! Wildcards:
//! - `*` matches exactly one segment
//! - `#` matches zero or more segments
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bridge_events::{AuthEvent, EventBus, MemoryEventBus};
//! use uuid::Uuid;
//!
//! # async fn example() {
//! let bus = MemoryEventBus::new();
//! let mut sub = bus.subscribe("authority.identity.updated").await.unwrap();
//!
//! bus.publish(AuthEvent::IdentityUpdated { owner_id: Uuid::now_v7() }.to_event())
//!     .await
//!     .unwrap();
//!
//! let event = sub.recv().await.unwrap();
//! assert_eq!(event.event_type, "identity.updated");
//! # }
//! ```

pub mod bus;
pub mod listener;
pub mod types;

// Re-export main types
pub use bus::{
    EventBus, EventBusError, EventBusResult, EventHandler, MemoryEventBus, Subscription,
};
pub use listener::TokenLifecycleListener;
pub use types::{AuthEvent, Component, Event};
