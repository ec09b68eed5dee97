//! Boundary to the backend-as-a-service.
//!
//! The console never owns authentication or storage. It talks to a backend
//! through the [`Backend`] trait: one connection per browser, carrying at most
//! one session, broadcasting [`AuthEvent`]s whenever that session changes.
//! [`Connector`] opens fresh connections so the web layer can give each
//! browser its own.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use crate::models::{AuthChange, AuthEvent, CountQuery, Session};

pub mod memory;
pub mod rest;

/// Capacity of the per-connection auth event channel
const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Unavailable(String),
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("backend returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected backend response: {0}")]
    Decode(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Current session, refreshing it first when it is about to expire
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Register a listener for session-change events
    fn subscribe(&self) -> Subscription;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Row count for `query`; `None` when the backend answered without a count
    async fn count(&self, query: &CountQuery) -> Result<Option<u64>, BackendError>;
}

/// Opens independent backend connections
pub trait Connector: Send + Sync {
    fn connect(&self) -> Arc<dyn Backend>;
}

/// Sender side of a connection's auth event channel
#[derive(Debug, Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, change: AuthChange, session: Option<Session>) {
        // No listeners is fine; events are only interesting to mounted views
        let _ = self.tx.send(AuthEvent { change, session });
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Listener registration; dropping it unsubscribes
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<AuthEvent>,
}

impl Subscription {
    /// Next event, or `None` once the connection is gone
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth event listener lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn session() -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 0,
            user: User {
                id: "u1".to_string(),
                email: Some("a@example.com".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_subscription_receives_events_in_order() {
        let events = AuthEvents::new();
        let mut subscription = events.subscribe();

        events.emit(AuthChange::SignedIn, Some(session()));
        events.emit(AuthChange::SignedOut, None);

        let first = subscription.recv().await.unwrap();
        assert_eq!(first.change, AuthChange::SignedIn);
        assert_eq!(first.session.unwrap().user.id, "u1");

        let second = subscription.recv().await.unwrap();
        assert_eq!(second.change, AuthChange::SignedOut);
        assert!(second.session.is_none());
    }

    #[tokio::test]
    async fn test_subscription_ends_when_sender_dropped() {
        let events = AuthEvents::new();
        let mut subscription = events.subscribe();
        drop(events);

        assert!(subscription.recv().await.is_none());
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let events = AuthEvents::new();
        let subscription = events.subscribe();
        assert_eq!(events.listener_count(), 1);

        drop(subscription);
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn test_error_messages_carry_backend_text() {
        let err = BackendError::Unavailable("network error".to_string());
        assert_eq!(err.to_string(), "network error");

        let err = BackendError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(err.to_string().contains("boom"));
    }
}
