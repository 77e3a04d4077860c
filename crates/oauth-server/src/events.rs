//! Audit event emission.
//!
//! Grants fire an event for every security-relevant rejection and every token
//! they issue. Emission is fire-and-forget: an emitter must never fail the
//! request it observes, and events are emitted before the corresponding error
//! is returned.

use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::broadcast;

use crate::http::OAuthRequest;

/// Default buffer size for the broadcast channel.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Events raised while handling a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestEvent {
    /// Client lookup or redirect URI validation failed.
    ClientAuthenticationFailed,
    /// Resource owner credentials were rejected.
    UserAuthenticationFailed,
    /// A refresh token was presented by a client it was not issued to.
    RefreshTokenClientFailed,
    /// An access token was issued.
    AccessTokenIssued,
    /// A refresh token was issued.
    RefreshTokenIssued,
}

impl RequestEvent {
    /// Event name as published on the bus.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientAuthenticationFailed => "auth:client.authentication.failed",
            Self::UserAuthenticationFailed => "auth:user.authentication.failed",
            Self::RefreshTokenClientFailed => "auth:refresh_token.client.failed",
            Self::AccessTokenIssued => "auth:access_token.issued",
            Self::RefreshTokenIssued => "auth:refresh_token.issued",
        }
    }

    /// Returns `true` for failure events.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ClientAuthenticationFailed
                | Self::UserAuthenticationFailed
                | Self::RefreshTokenClientFailed
        )
    }
}

impl fmt::Display for RequestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fire-and-forget sink for request events.
pub trait EventEmitter: Send + Sync {
    /// Emits `event` for `request`.
    fn emit(&self, event: RequestEvent, request: &dyn OAuthRequest);
}

/// Best-effort `client_id` of a request: query, then body, then Basic user.
#[must_use]
pub fn request_client_id(request: &dyn OAuthRequest) -> Option<String> {
    request
        .query_param("client_id")
        .or_else(|| request.body_param("client_id"))
        .map(str::to_string)
        .or_else(|| request.basic_auth_user())
}

// =============================================================================
// Tracing Emitter
// =============================================================================

/// Writes every event to `tracing` under the `oauth_server::audit` target.
///
/// Failures are logged at `warn`, issuance at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventEmitter;

impl EventEmitter for TracingEventEmitter {
    fn emit(&self, event: RequestEvent, request: &dyn OAuthRequest) {
        let client_id = request_client_id(request).unwrap_or_default();

        if event.is_failure() {
            tracing::warn!(
                target: "oauth_server::audit",
                event = %event,
                client_id = %client_id,
                "OAuth request rejected"
            );
        } else {
            tracing::info!(
                target: "oauth_server::audit",
                event = %event,
                client_id = %client_id,
                "OAuth token issued"
            );
        }
    }
}

// =============================================================================
// Broadcast Emitter
// =============================================================================

/// Owned snapshot of an emitted event.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    /// The event kind.
    pub event: RequestEvent,
    /// Client identifier taken from the request, if any.
    pub client_id: Option<String>,
    /// When the event was emitted.
    pub occurred_at: OffsetDateTime,
}

/// Publishes events on a tokio broadcast channel.
///
/// Sending never fails: with no subscribers the event is dropped.
#[derive(Clone)]
pub struct BroadcastEventEmitter {
    sender: broadcast::Sender<AuditEvent>,
}

impl BroadcastEventEmitter {
    /// Create a new emitter with default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new emitter with custom buffer size.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a new emitter wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BroadcastEventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastEventEmitter")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl EventEmitter for BroadcastEventEmitter {
    fn emit(&self, event: RequestEvent, request: &dyn OAuthRequest) {
        let _ = self.sender.send(AuditEvent {
            event,
            client_id: request_client_id(request),
            occurred_at: OffsetDateTime::now_utc(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RequestParams;

    #[test]
    fn test_event_names() {
        assert_eq!(
            RequestEvent::ClientAuthenticationFailed.as_str(),
            "auth:client.authentication.failed"
        );
        assert_eq!(
            RequestEvent::UserAuthenticationFailed.as_str(),
            "auth:user.authentication.failed"
        );
        assert_eq!(
            RequestEvent::RefreshTokenClientFailed.as_str(),
            "auth:refresh_token.client.failed"
        );
        assert_eq!(RequestEvent::AccessTokenIssued.as_str(), "auth:access_token.issued");
        assert_eq!(RequestEvent::RefreshTokenIssued.as_str(), "auth:refresh_token.issued");
    }

    #[test]
    fn test_request_client_id_precedence() {
        let request = RequestParams::new()
            .with_query("client_id", "from-query")
            .with_body("client_id", "from-body");
        assert_eq!(request_client_id(&request).as_deref(), Some("from-query"));

        let request = RequestParams::new().with_basic_auth("from-basic", "pw");
        assert_eq!(request_client_id(&request).as_deref(), Some("from-basic"));

        assert!(request_client_id(&RequestParams::new()).is_none());
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let emitter = BroadcastEventEmitter::new();
        assert_eq!(emitter.subscriber_count(), 0);
        emitter.emit(RequestEvent::AccessTokenIssued, &RequestParams::new());
    }

    #[tokio::test]
    async fn test_broadcast_send_receive() {
        let emitter = BroadcastEventEmitter::new();
        let mut receiver = emitter.subscribe();

        let request = RequestParams::new().with_body("client_id", "app");
        emitter.emit(RequestEvent::ClientAuthenticationFailed, &request);

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event, RequestEvent::ClientAuthenticationFailed);
        assert_eq!(event.client_id.as_deref(), Some("app"));
    }

    #[test]
    fn test_tracing_emitter_does_not_panic() {
        let request = RequestParams::new().with_query("client_id", "app");
        TracingEventEmitter.emit(RequestEvent::UserAuthenticationFailed, &request);
        TracingEventEmitter.emit(RequestEvent::RefreshTokenIssued, &request);
    }
}
