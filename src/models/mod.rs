use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity record supplied by the backend alongside a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Backend-issued proof of authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiration time (Unix timestamp)
    pub expires_at: i64,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp()
    }

    /// True when the session expires within `margin_secs` of `now`
    pub fn expires_within(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        self.expires_at - margin_secs <= now.timestamp()
    }
}

/// Kind of authentication state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChange {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Session-change notification: the transition and the session after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub change: AuthChange,
    pub session: Option<Session>,
}

/// Dashboard view-model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_logs: u64,
    pub active_threats: u64,
    pub critical_alerts: u64,
    pub systems_monitored: u64,
}

/// Equality filter on a single column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    /// Value as it appears on the wire (`eq.<value>`)
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Count-only query: returns a row count without transferring row bodies
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountQuery {
    pub collection: String,
    pub filters: Vec<Filter>,
}

impl CountQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Value of the equality filter on `column`, if any
    pub fn filter_value(&self, column: &str) -> Option<&Value> {
        self.filters
            .iter()
            .find(|f| f.column == column)
            .map(|f| &f.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_count_query_builder() {
        let query = CountQuery::new("alerts")
            .eq("user_id", "u1")
            .eq("severity", "critical")
            .eq("is_read", false);

        assert_eq!(query.collection, "alerts");
        assert_eq!(query.filters.len(), 3);
        assert_eq!(query.filter_value("user_id"), Some(&Value::from("u1")));
        assert_eq!(query.filters[2].value_text(), "false");
        assert_eq!(query.filters[1].value_text(), "critical");
        assert!(query.filter_value("status").is_none());
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let session = Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_at: 1_700_000_005,
            user: User {
                id: "u1".to_string(),
                email: None,
            },
        };

        assert!(!session.is_expired(now));
        assert!(session.expires_within(now, 10));
        assert!(!session.expires_within(now, 2));
    }
}
