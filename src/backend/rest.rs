use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{AuthEvents, Backend, BackendError, Connector, Subscription};
use crate::config::Settings;
use crate::models::{AuthChange, CountQuery, Session, User};

/// Sessions expiring within this many seconds are refreshed before use
const REFRESH_MARGIN_SECS: i64 = 10;

#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// Public (anon) API key sent with every request
    pub anon_key: String,
    pub timeout: Duration,
}

impl RestConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            url: settings.backend_url.clone(),
            anon_key: settings.backend_anon_key.clone(),
            timeout: settings.backend_timeout(),
        }
    }
}

/// Opens [`RestBackend`] connections sharing one HTTP client
#[derive(Clone)]
pub struct RestConnector {
    client: Client,
    config: Arc<RestConfig>,
}

impl RestConnector {
    pub fn new(config: RestConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            config: Arc::new(config),
        }
    }

    pub fn connection(&self) -> RestBackend {
        RestBackend {
            client: self.client.clone(),
            config: self.config.clone(),
            session: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            events: AuthEvents::new(),
        }
    }
}

impl Connector for RestConnector {
    fn connect(&self) -> Arc<dyn Backend> {
        Arc::new(self.connection())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| Utc::now().timestamp() + self.expires_in.unwrap_or(3600));

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// Client for Supabase-compatible auth (`/auth/v1`) and data (`/rest/v1`) APIs
pub struct RestBackend {
    client: Client,
    config: Arc<RestConfig>,
    session: RwLock<Option<Session>>,
    /// Held while a refresh grant is in flight; refresh tokens are single-use
    refresh_lock: tokio::sync::Mutex<()>,
    events: AuthEvents,
}

impl RestBackend {
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.url.trim_end_matches('/'), path)
    }

    /// Access token of the current session, or the anon key
    fn bearer(&self) -> String {
        self.session
            .read()
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    fn end_session(&self) {
        *self.session.write() = None;
        self.events.emit(AuthChange::SignedOut, None);
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> Result<Session, BackendError> {
        let response = self
            .client
            .post(self.endpoint(&format!("/auth/v1/token?grant_type={}", grant_type)))
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(token.into_session())
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(session) = self.session.read().clone() else {
            return Ok(None);
        };

        if !session.expires_within(Utc::now(), REFRESH_MARGIN_SECS) {
            return Ok(Some(session));
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed or signed out while we waited
        let Some(session) = self.session.read().clone() else {
            return Ok(None);
        };
        if !session.expires_within(Utc::now(), REFRESH_MARGIN_SECS) {
            return Ok(Some(session));
        }

        debug!(user_id = %session.user.id, "refreshing session");
        match self
            .token_grant(
                "refresh_token",
                json!({ "refresh_token": session.refresh_token }),
            )
            .await
        {
            Ok(fresh) => {
                *self.session.write() = Some(fresh.clone());
                self.events
                    .emit(AuthChange::TokenRefreshed, Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(BackendError::Api { status, message }) if (400..500).contains(&status) => {
                warn!(status, %message, "session refresh rejected, signing out");
                self.end_session();
                Ok(None)
            }
            Err(e) => Err(e),
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
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await
            .map_err(|e| match e {
                BackendError::Api { status: 400, .. } | BackendError::Api { status: 401, .. } => {
                    BackendError::InvalidCredentials
                }
                other => other,
            })?;

        *self.session.write() = Some(session.clone());
        self.events
            .emit(AuthChange::SignedIn, Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let access_token = self.session.read().as_ref().map(|s| s.access_token.clone());
        let Some(access_token) = access_token else {
            self.end_session();
            return Ok(());
        };

        let response = self
            .client
            .post(self.endpoint("/auth/v1/logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            // The session is already gone server-side
            s if s.is_success() || s == StatusCode::UNAUTHORIZED || s == StatusCode::NOT_FOUND => {
                self.end_session();
                Ok(())
            }
            _ => Err(api_error(response).await),
        }
    }

    async fn count(&self, query: &CountQuery) -> Result<Option<u64>, BackendError> {
        let mut url = self.endpoint(&format!(
            "/rest/v1/{}?select=id",
            urlencoding::encode(&query.collection)
        ));
        for filter in &query.filters {
            url.push_str(&format!(
                "&{}=eq.{}",
                urlencoding::encode(&filter.column),
                urlencoding::encode(&filter.value_text())
            ));
        }

        let response = self
            .client
            .head(url)
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer())
            .header("Prefer", "count=exact")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range))
    }
}

/// Total from a `Content-Range` header (`0-9/120`, `*/0`); `*/*` has none
pub fn parse_content_range(value: &str) -> Option<u64> {
    value
        .rsplit_once('/')
        .and_then(|(_, total)| total.trim().parse().ok())
}

async fn api_error(response: Response) -> BackendError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();

    let message = body
        .error_description
        .or(body.msg)
        .or(body.message)
        .or(body.error)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    BackendError::Api {
        status: status.as_u16(),
        message,
    }
}
