use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::backend::{Backend, BackendError, Subscription};
use crate::models::{Session, User};
use crate::ui::{Navigator, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    Unknown,
    Present,
    Absent,
}

/// The view's cached, non-authoritative copy of the backend session
#[derive(Debug)]
struct SessionState {
    session: Option<Session>,
    /// True until the initial session check resolves
    loading: bool,
    presence: Presence,
    /// Ticket of the last applied update
    applied: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            session: None,
            loading: true,
            presence: Presence::Unknown,
            applied: 0,
        }
    }
}

struct Shared {
    backend: Arc<dyn Backend>,
    navigator: Arc<dyn Navigator>,
    tickets: AtomicU64,
    state: RwLock<SessionState>,
    users: watch::Sender<Option<User>>,
}

impl Shared {
    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Apply `session` unless a newer update already landed
    fn apply(&self, ticket: u64, session: Option<Session>) -> bool {
        let redirect = {
            let mut state = self.state.write();
            if ticket <= state.applied {
                debug!(ticket, applied = state.applied, "discarding stale session update");
                return false;
            }
            state.applied = ticket;

            let previous = state.presence;
            state.presence = if session.is_some() {
                Presence::Present
            } else {
                Presence::Absent
            };
            let user = session.as_ref().map(|s| s.user.clone());
            state.session = session;

            // Published under the guard so users arrive in ticket order
            self.users.send_replace(user);
            state.session.is_none() && previous != Presence::Absent
        };

        if redirect {
            self.navigator.navigate(Route::Auth);
        }
        true
    }
}

/// Keeps a view in sync with the backend's authentication state.
///
/// Mounting registers a session-change listener and then checks the current
/// session once. Both feed the same state under a monotonic ticket, so a slow
/// initial check cannot overwrite a newer event. Losing the session navigates
/// to [`Route::Auth`] once per transition. Dropping the watcher releases the
/// listener.
pub struct SessionWatcher {
    shared: Arc<Shared>,
    listener: JoinHandle<()>,
}

impl SessionWatcher {
    pub async fn mount(
        backend: Arc<dyn Backend>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, BackendError> {
        let subscription = backend.subscribe();
        let (users, _) = watch::channel(None);

        let shared = Arc::new(Shared {
            backend,
            navigator,
            tickets: AtomicU64::new(0),
            state: RwLock::new(SessionState::new()),
            users,
        });
        let listener = tokio::spawn(listen(shared.clone(), subscription));

        let watcher = Self { shared, listener };
        watcher.check().await?;
        Ok(watcher)
    }

    /// Ask the backend for the current session and apply the answer
    pub async fn check(&self) -> Result<(), BackendError> {
        let ticket = self.shared.next_ticket();
        let result = self.shared.backend.get_session().await;
        self.shared.state.write().loading = false;

        self.shared.apply(ticket, result?);
        Ok(())
    }

    pub fn session(&self) -> Option<Session> {
        self.shared.state.read().session.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.shared.users.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.read().loading
    }

    /// Every applied update publishes the current user here
    pub fn users(&self) -> watch::Receiver<Option<User>> {
        self.shared.users.subscribe()
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(shared: Arc<Shared>, mut subscription: Subscription) {
    while let Some(event) = subscription.recv().await {
        debug!(change = ?event.change, "auth state changed");
        let ticket = shared.next_ticket();
        shared.apply(ticket, event.session);
    }
}
