use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

use crate::stats::FailurePolicy;

/// Which backend adapter the console talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process store seeded with a demo analyst (offline mode)
    Memory,
    /// Supabase-compatible auth and data HTTP APIs
    Rest,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Rest => "rest",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(BackendKind::Memory),
            "rest" | "supabase" => Some(BackendKind::Rest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    // App Settings
    pub app_name: String,
    pub version: String,

    // Server Settings
    pub host: String,
    pub port: u16,
    pub cookie_secure: bool,
    pub log_json: bool,
    /// How often signed-in browser connections are swept
    pub connection_sweep_secs: u64,
    /// Connections unused for this long are signed out
    pub connection_idle_secs: u64,

    // Backend Settings
    pub backend: BackendKind,
    pub backend_url: String,
    pub backend_anon_key: String,
    pub backend_timeout_ms: u64,

    // Memory backend
    pub jwt_secret: String,
    pub session_ttl_secs: i64,
    pub demo_email: String,
    pub demo_password: String,

    // Dashboard
    pub stats_failure_policy: FailurePolicy,
    pub stats_timeout_ms: u64,
}

impl Settings {
    pub fn new() -> Self {
        Settings {
            app_name: get_env("APP_NAME", "SecureLogAnalyzer"),
            version: env!("CARGO_PKG_VERSION").to_string(),

            host: get_env("HOST", "0.0.0.0"),
            port: get_env_u64("PORT", 8080) as u16,
            cookie_secure: get_env_bool("COOKIE_SECURE", false),
            log_json: get_env_bool("LOG_JSON", false),
            connection_sweep_secs: get_env_u64("CONNECTION_SWEEP_SECS", 300),
            connection_idle_secs: get_env_u64("CONNECTION_IDLE_SECS", 86_400),

            backend: BackendKind::parse(&get_env("BACKEND", "memory"))
                .unwrap_or(BackendKind::Memory),
            backend_url: get_env("BACKEND_URL", "http://localhost:54321"),
            backend_anon_key: get_env("BACKEND_ANON_KEY", ""),
            backend_timeout_ms: get_env_u64("BACKEND_TIMEOUT_MS", 10_000),

            jwt_secret: get_env(
                "JWT_SECRET",
                "change-this-to-a-secure-random-key-in-production",
            ),
            session_ttl_secs: get_env_u64("SESSION_TTL_SECS", 3600) as i64,
            demo_email: get_env("DEMO_EMAIL", "analyst@securelog.local"),
            demo_password: get_env("DEMO_PASSWORD", "changeme"),

            stats_failure_policy: get_env("STATS_FAILURE_POLICY", "silent")
                .parse()
                .unwrap_or_default(),
            stats_timeout_ms: get_env_u64("STATS_TIMEOUT_MS", 5_000),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    pub fn stats_timeout(&self) -> Duration {
        Duration::from_millis(self.stats_timeout_ms)
    }

    /// Never zero; `tokio::time::interval` rejects an empty period
    pub fn connection_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.connection_sweep_secs.max(1))
    }

    pub fn connection_idle(&self) -> Duration {
        Duration::from_secs(self.connection_idle_secs)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::new);

pub fn get_settings() -> &'static Settings {
    &SETTINGS
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
