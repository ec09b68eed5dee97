use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AuthEvents, Backend, BackendError, Connector, Subscription};
use crate::config::Settings;
use crate::models::{AuthChange, CountQuery, Session, User};

/// JWT access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Session ID, unique per issued token
    pub sid: String,
}

struct StoredUser {
    id: String,
    email: String,
    password_hash: String,
}

#[derive(Default)]
struct Faults {
    session: Option<BackendError>,
    sign_out: Option<BackendError>,
    count: Option<BackendError>,
    withheld: HashSet<String>,
}

struct StoreInner {
    jwt_secret: String,
    session_ttl: Duration,
    password_cost: u32,
    users: RwLock<HashMap<String, StoredUser>>,
    rows: RwLock<HashMap<String, Vec<Map<String, Value>>>>,
    /// Live refresh tokens mapped to their user ID
    refresh_tokens: RwLock<HashMap<String, String>>,
    queries: Mutex<Vec<CountQuery>>,
    faults: Mutex<Faults>,
}

/// In-process backend: users, rows and sessions shared by every connection
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub fn new(jwt_secret: &str, session_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                jwt_secret: jwt_secret.to_string(),
                session_ttl,
                password_cost: DEFAULT_COST,
                users: RwLock::new(HashMap::new()),
                rows: RwLock::new(HashMap::new()),
                refresh_tokens: RwLock::new(HashMap::new()),
                queries: Mutex::new(Vec::new()),
                faults: Mutex::new(Faults::default()),
            }),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.jwt_secret,
            Duration::seconds(settings.session_ttl_secs),
        )
    }

    /// Override the bcrypt cost; only valid before any user is added
    pub fn with_password_cost(self, cost: u32) -> Self {
        let inner = match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.password_cost = cost;
                inner
            }
            Err(shared) => return Self { inner: shared },
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Open a typed connection (the [`Connector`] impl erases the type)
    pub fn connection(&self) -> MemoryBackend {
        MemoryBackend {
            store: self.clone(),
            session: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            events: AuthEvents::new(),
        }
    }

    pub fn add_user(&self, email: &str, password: &str) -> Result<User, BackendError> {
        self.add_user_with_id(&Uuid::new_v4().to_string(), email, password)
    }

    pub fn add_user_with_id(
        &self,
        id: &str,
        email: &str,
        password: &str,
    ) -> Result<User, BackendError> {
        let password_hash = hash(password, self.inner.password_cost)
            .map_err(|e| BackendError::Unavailable(format!("Password hashing failed: {}", e)))?;
        let id = id.to_string();

        self.inner.users.write().insert(
            email.to_lowercase(),
            StoredUser {
                id: id.clone(),
                email: email.to_string(),
                password_hash,
            },
        );

        Ok(User {
            id,
            email: Some(email.to_string()),
        })
    }

    /// Insert a row; rows must be JSON objects
    pub fn insert(&self, collection: &str, row: Value) -> Result<(), BackendError> {
        let Value::Object(row) = row else {
            return Err(BackendError::Decode(format!(
                "row for {} must be an object",
                collection
            )));
        };
        self.inner
            .rows
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(row);
        Ok(())
    }

    /// Seed a demo analyst with logs, threats and alerts
    pub fn seed_demo(&self, email: &str, password: &str) -> Result<User, BackendError> {
        let user = self.add_user(email, password)?;
        let sources = ["syslog", "ftp", "usb"];

        for i in 0..240 {
            self.insert(
                "logs",
                json!({
                    "user_id": user.id,
                    "source": sources[i % sources.len()],
                    "message": format!("event #{}", i),
                }),
            )?;
        }
        for (i, status) in ["open", "open", "open", "open", "resolved", "resolved"]
            .iter()
            .enumerate()
        {
            self.insert(
                "threats",
                json!({ "user_id": user.id, "status": status, "name": format!("threat-{}", i) }),
            )?;
        }
        for (severity, is_read) in [
            ("critical", false),
            ("critical", true),
            ("critical", true),
            ("high", false),
            ("medium", false),
        ] {
            self.insert(
                "alerts",
                json!({ "user_id": user.id, "severity": severity, "is_read": is_read }),
            )?;
        }

        info!(email, user_id = %user.id, "Seeded demo analyst");
        Ok(user)
    }

    /// Invalidate every refresh token held by `user_id`
    pub fn revoke_user_sessions(&self, user_id: &str) {
        self.inner
            .refresh_tokens
            .write()
            .retain(|_, owner| owner != user_id);
    }

    /// Count queries served so far, in arrival order
    pub fn issued_queries(&self) -> Vec<CountQuery> {
        self.inner.queries.lock().clone()
    }

    /// Number of live refresh tokens across all users
    pub fn active_sessions(&self) -> usize {
        self.inner.refresh_tokens.read().len()
    }

    pub fn fail_next_session_check(&self, error: BackendError) {
        self.inner.faults.lock().session = Some(error);
    }

    pub fn fail_next_sign_out(&self, error: BackendError) {
        self.inner.faults.lock().sign_out = Some(error);
    }

    pub fn fail_next_count(&self, error: BackendError) {
        self.inner.faults.lock().count = Some(error);
    }

    /// Answer counts on `collection` without a count
    pub fn withhold_count(&self, collection: &str) {
        self.inner
            .faults
            .lock()
            .withheld
            .insert(collection.to_string());
    }

    fn take_fault(
        &self,
        pick: impl FnOnce(&mut Faults) -> Option<BackendError>,
    ) -> Result<(), BackendError> {
        match pick(&mut self.inner.faults.lock()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn issue_session(&self, user_id: &str, email: &str) -> Result<Session, BackendError> {
        let now = Utc::now();
        let exp = now + self.inner.session_ttl;

        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: Some(email.to_string()),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            sid: Uuid::new_v4().to_string(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.inner.jwt_secret.as_bytes()),
        )
        .map_err(|e| BackendError::Unavailable(format!("Failed to sign session token: {}", e)))?;

        let refresh_token = Uuid::new_v4().simple().to_string();
        self.inner
            .refresh_tokens
            .write()
            .insert(refresh_token.clone(), user_id.to_string());

        Ok(Session {
            access_token,
            refresh_token,
            expires_at: claims.exp,
            user: User {
                id: user_id.to_string(),
                email: Some(email.to_string()),
            },
        })
    }

    fn verify_access_token(&self, token: &str) -> Result<AccessClaims, BackendError> {
        // Expiry is decided by the session's expires_at so refresh can kick in
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(self.inner.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| BackendError::Decode(format!("Invalid session token: {}", e)))
    }

    /// Rotate a refresh token; `None` when it is no longer valid
    fn refresh(&self, refresh_token: &str) -> Result<Option<Session>, BackendError> {
        let Some(user_id) = self.inner.refresh_tokens.write().remove(refresh_token) else {
            return Ok(None);
        };
        let email = self
            .inner
            .users
            .read()
            .values()
            .find(|u| u.id == user_id)
            .map(|u| u.email.clone());

        match email {
            Some(email) => self.issue_session(&user_id, &email).map(Some),
            None => Ok(None),
        }
    }

    fn is_live(&self, refresh_token: &str) -> bool {
        self.inner.refresh_tokens.read().contains_key(refresh_token)
    }

    fn revoke(&self, refresh_token: &str) {
        self.inner.refresh_tokens.write().remove(refresh_token);
    }

    fn count_rows(&self, user_id: &str, query: &CountQuery) -> u64 {
        let rows = self.inner.rows.read();
        let Some(rows) = rows.get(&query.collection) else {
            return 0;
        };

        rows.iter()
            .filter(|row| row.get("user_id").and_then(Value::as_str) == Some(user_id))
            .filter(|row| {
                query
                    .filters
                    .iter()
                    .all(|f| row.get(&f.column) == Some(&f.value))
            })
            .count() as u64
    }
}

impl Connector for MemoryStore {
    fn connect(&self) -> Arc<dyn Backend> {
        Arc::new(self.connection())
    }
}

/// One client connection to a [`MemoryStore`]
pub struct MemoryBackend {
    store: MemoryStore,
    session: RwLock<Option<Session>>,
    /// Serializes session checks so a refresh token is rotated once
    refresh_lock: tokio::sync::Mutex<()>,
    events: AuthEvents,
}

impl MemoryBackend {
    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }

    fn end_session(&self) {
        *self.session.write() = None;
        self.events.emit(AuthChange::SignedOut, None);
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        self.store.take_fault(|f| f.session.take())?;
        let _guard = self.refresh_lock.lock().await;

        let Some(session) = self.session.read().clone() else {
            return Ok(None);
        };

        if let Err(e) = self.store.verify_access_token(&session.access_token) {
            debug!(error = %e, "dropping session with unverifiable token");
            self.end_session();
            return Ok(None);
        }

        if !self.store.is_live(&session.refresh_token) {
            debug!(user_id = %session.user.id, "session was revoked");
            self.end_session();
            return Ok(None);
        }

        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        match self.store.refresh(&session.refresh_token)? {
            Some(fresh) => {
                *self.session.write() = Some(fresh.clone());
                self.events
                    .emit(AuthChange::TokenRefreshed, Some(fresh.clone()));
                Ok(Some(fresh))
            }
            None => {
                self.end_session();
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let (user_id, user_email) = {
            let users = self.store.inner.users.read();
            let user = users
                .get(&email.to_lowercase())
                .ok_or(BackendError::InvalidCredentials)?;

            let valid = verify(password, &user.password_hash).map_err(|e| {
                BackendError::Unavailable(format!("Password verification failed: {}", e))
            })?;
            if !valid {
                return Err(BackendError::InvalidCredentials);
            }
            (user.id.clone(), user.email.clone())
        };

        let session = self.store.issue_session(&user_id, &user_email)?;
        *self.session.write() = Some(session.clone());
        self.events
            .emit(AuthChange::SignedIn, Some(session.clone()));

        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.store.take_fault(|f| f.sign_out.take())?;

        let previous = self.session.read().clone();
        if let Some(session) = previous {
            self.store.revoke(&session.refresh_token);
        }
        self.end_session();
        Ok(())
    }

    async fn count(&self, query: &CountQuery) -> Result<Option<u64>, BackendError> {
        self.store.inner.queries.lock().push(query.clone());
        self.store.take_fault(|f| f.count.take())?;

        if self
            .store
            .inner
            .faults
            .lock()
            .withheld
            .contains(&query.collection)
        {
            return Ok(None);
        }

        // Row-level security: a connection only sees its own user's rows
        let user_id = self.session.read().as_ref().map(|s| s.user.id.clone());
        Ok(Some(match user_id {
            Some(user_id) => self.store.count_rows(&user_id, query),
            None => 0,
        }))
    }
}
