//! Event types for the sync protocol.
//!
//! Login and logout used to drive the token lifecycle as hidden side
//! effects of authentication hooks. Here they are explicit domain events
//! consumed by dedicated listeners instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Identifies which side of the bridge emitted an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// The identity authority: system of record for accounts and login.
    Authority,
    /// The edge application: cookie-isolated consumer of identity.
    Edge,
}

impl Component {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Authority => "authority",
            Component::Edge => "edge",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event envelope.
///
/// All events are wrapped in this envelope, which provides metadata for
/// routing and tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID.
    pub id: Uuid,

    /// Event type (e.g., "user.authenticated").
    pub event_type: String,

    /// Emitting component.
    pub source: Component,

    /// When the event was created.
    pub timestamp: DateTime<Utc>,

    /// Account the event concerns, where applicable.
    pub owner_id: Option<Uuid>,

    /// Correlation ID for tracing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Event payload.
    pub payload: serde_json::Value,

    /// Additional metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create a new event.
    pub fn new(
        event_type: impl Into<String>,
        source: Component,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            source,
            timestamp: Utc::now(),
            owner_id: None,
            correlation_id: None,
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Set the concerned account.
    pub fn with_owner(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    /// Set the correlation ID.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Get the topic for this event: `{source}.{event_type}`.
    pub fn topic(&self) -> String {
        format!("{}.{}", self.source.as_str(), self.event_type)
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Authentication lifecycle events emitted by the identity authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// A user completed a primary login.
    UserAuthenticated {
        /// Authority-side account ID.
        owner_id: Uuid,
        /// Roles held at login time.
        roles: Vec<String>,
    },
    /// A user logged out; their persistent sync token must die with the
    /// session.
    UserLoggedOut {
        /// Authority-side account ID.
        owner_id: Uuid,
    },
    /// The identity visible to the edge changed; subscribed edge clients
    /// should re-run reconciliation.
    IdentityUpdated {
        /// Authority-side account ID.
        owner_id: Uuid,
    },
}

impl AuthEvent {
    /// The account this event concerns.
    pub fn owner_id(&self) -> Uuid {
        match self {
            AuthEvent::UserAuthenticated { owner_id, .. }
            | AuthEvent::UserLoggedOut { owner_id }
            | AuthEvent::IdentityUpdated { owner_id } => *owner_id,
        }
    }

    /// Convert to the generic envelope.
    pub fn to_event(&self) -> Event {
        let event_type = match self {
            AuthEvent::UserAuthenticated { .. } => "user.authenticated",
            AuthEvent::UserLoggedOut { .. } => "user.logged_out",
            AuthEvent::IdentityUpdated { .. } => "identity.updated",
        };
        Event::new(
            event_type,
            Component::Authority,
            serde_json::to_value(self).unwrap(),
        )
        .with_owner(self.owner_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_topic() {
        let event = Event::new("user.authenticated", Component::Authority, serde_json::json!({}));
        assert_eq!(event.topic(), "authority.user.authenticated");
    }

    #[test]
    fn test_auth_event_roundtrip() {
        let owner = Uuid::now_v7();
        let auth = AuthEvent::UserAuthenticated {
            owner_id: owner,
            roles: vec!["member".to_string()],
        };
        let event = auth.to_event();

        assert_eq!(event.event_type, "user.authenticated");
        assert_eq!(event.owner_id, Some(owner));

        let parsed: AuthEvent = event.parse_payload().unwrap();
        assert_eq!(parsed.owner_id(), owner);
    }

    #[test]
    fn test_logout_event() {
        let owner = Uuid::now_v7();
        let event = AuthEvent::UserLoggedOut { owner_id: owner }.to_event();
        assert_eq!(event.topic(), "authority.user.logged_out");
        assert_eq!(event.owner_id, Some(owner));
    }
}
