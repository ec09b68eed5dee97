pub mod auth;
pub mod components;
pub mod dashboard;
pub mod landing;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use dashmap::DashMap;
use maud::{html, Markup};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info, warn, Level};
use uuid::Uuid;

use crate::backend::{Backend, BackendError, Connector, Subscription};
use crate::config::Settings;
use crate::models::AuthChange;
use crate::monitoring;
use crate::ui::{Route, Toast};

use components::layout;

/// Connection cookie naming this browser's backend connection
pub const SID_COOKIE: &str = "sla_sid";
/// Toasts carried across a redirect
pub const FLASH_COOKIE: &str = "sla_flash";

/// A signed-in browser connection held in the registry
pub struct Connection {
    pub backend: Arc<dyn Backend>,
    last_seen: Mutex<Instant>,
}

impl Connection {
    fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            last_seen: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

type Connections = Arc<DashMap<Uuid, Connection>>;

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<dyn Connector>,
    /// Signed-in browser connections by connection cookie
    pub connections: Connections,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(connector: Arc<dyn Connector>, settings: Settings) -> Self {
        Self {
            connector,
            connections: Arc::new(DashMap::new()),
            settings: Arc::new(settings),
        }
    }

    /// This browser's connection, or a throw-away anonymous one
    pub fn connection(&self, jar: &CookieJar) -> Arc<dyn Backend> {
        session_id(jar)
            .and_then(|sid| {
                self.connections.get(&sid).map(|c| {
                    c.touch();
                    c.backend.clone()
                })
            })
            .unwrap_or_else(|| self.connector.connect())
    }

    /// Register a signed-in connection and point the browser at it.
    ///
    /// A connection this browser already had is signed out first so its
    /// refresh token does not outlive the cookie. The new entry leaves the
    /// registry by itself once its session ends.
    pub async fn remember(&self, jar: CookieJar, backend: Arc<dyn Backend>) -> CookieJar {
        let replaced = session_id(&jar)
            .and_then(|sid| self.connections.get(&sid).map(|c| c.backend.clone()));
        if let Some(replaced) = replaced {
            if let Err(e) = replaced.sign_out().await {
                warn!(error = %e, "Failed to sign out replaced connection");
            }
        }
        let jar = self.release(jar);

        let sid = Uuid::new_v4();
        let subscription = backend.subscribe();
        self.connections.insert(sid, Connection::new(backend));
        tokio::spawn(evict_on_sign_out(self.connections.clone(), sid, subscription));
        debug!(%sid, connections = self.connections.len(), "connection registered");

        jar.add(
            Cookie::build((SID_COOKIE, sid.to_string()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(self.settings.cookie_secure),
        )
    }

    /// Drop this browser's connection once it no longer carries a session
    pub fn release(&self, jar: CookieJar) -> CookieJar {
        if jar.get(SID_COOKIE).is_none() {
            return jar;
        }
        if let Some(sid) = session_id(&jar) {
            self.connections.remove(&sid);
            debug!(%sid, "connection released");
        }
        jar.remove(Cookie::build(SID_COOKIE).path("/"))
    }

    /// Evict connections without a live session, and sign out those unused
    /// for at least `idle`. Returns how many were evicted.
    pub async fn sweep(&self, idle: Duration) -> usize {
        let entries: Vec<(Uuid, Arc<dyn Backend>, Duration)> = self
            .connections
            .iter()
            .map(|c| (*c.key(), c.backend.clone(), c.idle_for()))
            .collect();

        let mut evicted = 0;
        for (sid, backend, idle_for) in entries {
            if idle_for >= idle {
                if let Err(e) = backend.sign_out().await {
                    warn!(%sid, error = %e, "Failed to sign out idle connection");
                }
            } else {
                match backend.get_session().await {
                    Ok(Some(_)) => continue,
                    Ok(None) => {}
                    Err(e) => {
                        debug!(%sid, error = %e, "session check failed, keeping connection");
                        continue;
                    }
                }
            }
            self.connections.remove(&sid);
            evicted += 1;
        }
        evicted
    }

    // Start background sweep task
    pub fn start_sweep_task(&self) {
        let state = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(state.settings.connection_sweep_interval());
            let idle = state.settings.connection_idle();
            loop {
                interval.tick().await;
                let evicted = state.sweep(idle).await;
                if evicted > 0 {
                    info!(
                        evicted,
                        remaining = state.connections.len(),
                        "Swept browser connections"
                    );
                }
            }
        });
    }
}

/// Remove `sid` from the registry when its session ends
async fn evict_on_sign_out(connections: Connections, sid: Uuid, mut subscription: Subscription) {
    while let Some(event) = subscription.recv().await {
        if event.change == AuthChange::SignedOut {
            if connections.remove(&sid).is_some() {
                debug!(%sid, "signed-out connection evicted");
            }
            return;
        }
    }
}

fn session_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SID_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

/// Queue toasts for the next rendered page
pub fn with_flash(jar: CookieJar, toasts: Vec<Toast>) -> CookieJar {
    if toasts.is_empty() {
        return jar;
    }
    let encoded = match serde_json::to_vec(&toasts) {
        Ok(bytes) => URL_SAFE_NO_PAD.encode(bytes),
        Err(e) => {
            error!("Failed to encode flash toasts: {}", e);
            return jar;
        }
    };

    jar.add(
        Cookie::build((FLASH_COOKIE, encoded))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Consume the queued toasts; a malformed cookie yields none
pub fn take_flash(jar: CookieJar) -> (CookieJar, Vec<Toast>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, Vec::new());
    };

    let toasts = URL_SAFE_NO_PAD
        .decode(cookie.value())
        .ok()
        .and_then(|bytes| serde_json::from_slice::<Vec<Toast>>(&bytes).ok())
        .unwrap_or_else(|| {
            debug!("ignoring malformed flash cookie");
            Vec::new()
        });

    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), toasts)
}

/// Redirect to `route`, carrying `toasts` along
pub fn redirect(jar: CookieJar, route: Route, toasts: Vec<Toast>) -> Response {
    (with_flash(jar, toasts), Redirect::to(route.path())).into_response()
}

/// Session check failed: the page cannot decide where the user belongs
pub fn unavailable(e: &BackendError) -> Response {
    error!(error = %e, "Backend unavailable");

    (
        StatusCode::SERVICE_UNAVAILABLE,
        layout::base(
            "Service Unavailable",
            html! {
                div class="min-h-screen flex items-center justify-center bg-slate-50" {
                    div class="max-w-md w-full text-center" {
                        div class="flex justify-center mb-6" { (layout::logo("h-12 w-12")) }
                        (layout::alert("Could not reach the authentication service. Please try again.", "error"))
                        a href="/" class="text-primary hover:text-sky-700 underline" { "Retry" }
                    }
                }
            },
        ),
    )
        .into_response()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(landing::home))
        .route("/auth", get(auth::page).post(auth::submit))
        .route("/dashboard", get(dashboard::show))
        .route("/logout", post(dashboard::sign_out))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "name": state.settings.app_name,
        "version": state.settings.version,
        "backend": state.settings.backend.as_str(),
        "connections": state.connections.len(),
    }))
}

pub async fn metrics_handler() -> Response {
    match monitoring::render() {
        Ok(body) => body.into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// 404 Not Found page
pub async fn not_found() -> (StatusCode, Markup) {
    (
        StatusCode::NOT_FOUND,
        layout::base(
            "404 Not Found",
            html! {
                div class="min-h-screen flex items-center justify-center bg-slate-50" {
                    div class="text-center" {
                        h1 class="text-6xl font-bold text-gray-900 mb-4" { "404" }
                        p class="text-xl text-gray-600 mb-8" { "Page not found" }
                        a href="/" class="text-primary hover:text-sky-700 underline" {
                            "Go back home"
                        }
                    }
                }
            },
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::helpers::{body_text, memory_store, settle, test_state, TEST_PASSWORD};
    use crate::ui::ToastVariant;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    #[test]
    fn test_flash_round_trip() {
        let jar = with_flash(
            CookieJar::new(),
            vec![Toast::destructive("Error", "network error")],
        );

        let (jar, toasts) = take_flash(jar);

        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].variant, ToastVariant::Destructive);
        assert!(jar.get(FLASH_COOKIE).is_none());
    }

    #[test]
    fn test_malformed_flash_is_ignored() {
        let jar = CookieJar::new().add(Cookie::new(FLASH_COOKIE, "%%%not-base64"));

        let (_, toasts) = take_flash(jar);

        assert!(toasts.is_empty());
    }

    #[tokio::test]
    async fn test_release_forgets_connection() {
        let store = memory_store();
        let state = test_state(&store);

        let jar = state.remember(CookieJar::new(), store.connect()).await;
        assert_eq!(state.connections.len(), 1);

        let jar = state.release(jar);
        assert!(state.connections.is_empty());
        assert!(jar.get(SID_COOKIE).is_none());
    }

    async fn signed_in_jar(state: &AppState, jar: CookieJar) -> CookieJar {
        let backend = state.connector.connect();
        backend
            .sign_in_with_password("u1@example.com", TEST_PASSWORD)
            .await
            .unwrap();
        state.remember(jar, backend).await
    }

    async fn wait_for_connections(state: &AppState, expected: usize) {
        settle(async {
            while state.connections.len() != expected {
                tokio::task::yield_now().await;
            }
        })
        .await;
    }

    #[tokio::test]
    async fn test_signed_out_connection_leaves_registry() {
        let store = memory_store();
        store
            .add_user_with_id("u1", "u1@example.com", TEST_PASSWORD)
            .unwrap();
        let state = test_state(&store);
        let jar = signed_in_jar(&state, CookieJar::new()).await;
        assert_eq!(state.connections.len(), 1);

        // Signed out without going through release
        state.connection(&jar).sign_out().await.unwrap();

        wait_for_connections(&state, 0).await;
    }

    #[tokio::test]
    async fn test_sweep_evicts_revoked_connections() {
        let store = memory_store();
        store
            .add_user_with_id("u1", "u1@example.com", TEST_PASSWORD)
            .unwrap();
        let state = test_state(&store);
        // Abandoned browsers: signed in once, never seen again
        for _ in 0..20 {
            signed_in_jar(&state, CookieJar::new()).await;
        }
        assert_eq!(state.connections.len(), 20);
        assert_eq!(state.sweep(Duration::from_secs(3600)).await, 0);

        store.revoke_user_sessions("u1");

        assert_eq!(state.sweep(Duration::from_secs(3600)).await, 20);
        assert!(state.connections.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_signs_out_idle_connections() {
        let store = memory_store();
        store
            .add_user_with_id("u1", "u1@example.com", TEST_PASSWORD)
            .unwrap();
        let state = test_state(&store);
        signed_in_jar(&state, CookieJar::new()).await;
        assert_eq!(store.active_sessions(), 1);

        assert_eq!(state.sweep(Duration::ZERO).await, 1);

        assert!(state.connections.is_empty());
        assert_eq!(store.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_signing_in_again_replaces_connection() {
        let store = memory_store();
        store
            .add_user_with_id("u1", "u1@example.com", TEST_PASSWORD)
            .unwrap();
        let state = test_state(&store);
        let first = signed_in_jar(&state, CookieJar::new()).await;
        let first_sid = session_id(&first);

        let second = signed_in_jar(&state, first).await;

        assert_ne!(session_id(&second), first_sid);
        assert_eq!(state.connections.len(), 1);
        assert_eq!(store.active_sessions(), 1);
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(test_state(&memory_store()));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("\"status\":\"healthy\""));
    }

    #[tokio::test]
    async fn test_metrics_exposed() {
        monitoring::SIGN_OUTS.with_label_values(&["success"]).inc();
        let app = router(test_state(&memory_store()));

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("securelog_sign_outs_total"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = router(test_state(&memory_store()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nope")
                    .header(header::ACCEPT, "text/html")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
