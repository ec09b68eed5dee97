#[cfg(test)]
pub mod helpers {
    use axum::body::Body;
    use axum::http::{header, Response};
    use chrono::Duration;
    use serde_json::json;
    use std::future::Future;
    use std::sync::{Arc, Once};

    use crate::backend::memory::{MemoryBackend, MemoryStore};
    use crate::backend::Backend;
    use crate::config::Settings;
    use crate::models::User;
    use crate::web::AppState;

    pub const TEST_PASSWORD: &str = "password123";

    static INIT: Once = Once::new();

    /// Quiet tracing output for the whole test binary
    pub fn init_tracing() {
        INIT.call_once(|| {
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::WARN)
                .with_test_writer()
                .try_init()
                .ok();
        });
    }

    /// Store with a cheap bcrypt cost so sign-ins stay fast
    pub fn memory_store() -> MemoryStore {
        init_tracing();
        MemoryStore::new("test-secret", Duration::hours(1)).with_password_cost(4)
    }

    /// Register `email` under `id` and sign a fresh connection in as them
    pub async fn signed_in_connection(
        store: &MemoryStore,
        id: &str,
        email: &str,
    ) -> (Arc<MemoryBackend>, User) {
        let user = store
            .add_user_with_id(id, email, TEST_PASSWORD)
            .expect("Failed to add user");
        let backend = Arc::new(store.connection());
        backend
            .sign_in_with_password(email, TEST_PASSWORD)
            .await
            .expect("Failed to sign in");
        (backend, user)
    }

    pub async fn signed_in(store: &MemoryStore, id: &str, email: &str) -> (Arc<dyn Backend>, User) {
        let (backend, user) = signed_in_connection(store, id, email).await;
        (backend as Arc<dyn Backend>, user)
    }

    /// Seed `logs` logs, `threats` open threats and `alerts` unread critical
    /// alerts for `user_id`, plus rows that must not be counted
    pub fn seed_counts(store: &MemoryStore, user_id: &str, logs: usize, threats: usize, alerts: usize) {
        for i in 0..logs {
            store
                .insert("logs", json!({ "user_id": user_id, "message": format!("log {}", i) }))
                .expect("Failed to insert log");
        }
        for _ in 0..threats {
            store
                .insert("threats", json!({ "user_id": user_id, "status": "open" }))
                .expect("Failed to insert threat");
        }
        for _ in 0..alerts {
            store
                .insert(
                    "alerts",
                    json!({ "user_id": user_id, "severity": "critical", "is_read": false }),
                )
                .expect("Failed to insert alert");
        }

        let noise = [
            ("logs", json!({ "user_id": "someone-else", "message": "not mine" })),
            ("threats", json!({ "user_id": user_id, "status": "resolved" })),
            ("threats", json!({ "user_id": "someone-else", "status": "open" })),
            ("alerts", json!({ "user_id": user_id, "severity": "critical", "is_read": true })),
            ("alerts", json!({ "user_id": user_id, "severity": "high", "is_read": false })),
        ];
        for (collection, row) in noise {
            store.insert(collection, row).expect("Failed to insert row");
        }
    }

    /// Await `fut`, failing the test if it takes more than five seconds
    pub async fn settle<F: Future>(fut: F) -> F::Output {
        tokio::time::timeout(std::time::Duration::from_secs(5), fut)
            .await
            .expect("future did not settle in time")
    }

    pub fn test_settings() -> Settings {
        Settings {
            cookie_secure: false,
            stats_timeout_ms: 2_000,
            ..Settings::new()
        }
    }

    pub fn test_state(store: &MemoryStore) -> AppState {
        AppState::new(Arc::new(store.clone()), test_settings())
    }

    /// `name=value` pairs from every Set-Cookie header, ready for a Cookie header
    pub fn cookies_from(response: &Response<Body>) -> String {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(str::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub async fn body_text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
