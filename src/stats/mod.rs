//! Dashboard statistics: three concurrent count queries merged into a view-model.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::backend::Backend;
use crate::models::{CountQuery, DashboardStats};
use crate::monitoring;
use crate::ui::{Notifier, Toast};

/// Placeholder until monitored systems are tracked by the backend
pub const SYSTEMS_MONITORED: u64 = 3;

/// What happens when a stats fetch fails. Stats keep their previous values either way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log only
    #[default]
    Silent,
    /// Log and show a destructive toast
    Notify,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(FailurePolicy::Silent),
            "notify" => Ok(FailurePolicy::Notify),
            other => Err(format!("Invalid stats failure policy: {}", other)),
        }
    }
}

/// Latest stats plus how many fetch attempts have settled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub stats: DashboardStats,
    pub completed: u64,
    pub last_error: Option<String>,
}

/// The three count queries behind the dashboard cards, all scoped to `user_id`
pub fn queries_for(user_id: &str) -> [CountQuery; 3] {
    [
        CountQuery::new("logs").eq("user_id", user_id),
        CountQuery::new("threats")
            .eq("user_id", user_id)
            .eq("status", "open"),
        CountQuery::new("alerts")
            .eq("user_id", user_id)
            .eq("severity", "critical")
            .eq("is_read", false),
    ]
}

pub struct StatsAggregator {
    backend: Arc<dyn Backend>,
    notifier: Arc<dyn Notifier>,
    policy: FailurePolicy,
    snapshot: watch::Sender<StatsSnapshot>,
}

impl StatsAggregator {
    pub fn new(
        backend: Arc<dyn Backend>,
        notifier: Arc<dyn Notifier>,
        policy: FailurePolicy,
    ) -> Self {
        let (snapshot, _) = watch::channel(StatsSnapshot::default());
        Self {
            backend,
            notifier,
            policy,
            snapshot,
        }
    }

    pub fn stats(&self) -> DashboardStats {
        self.snapshot.borrow().stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatsSnapshot> {
        self.snapshot.subscribe()
    }

    /// Fetch and merge the counts for `user_id`.
    ///
    /// Returns the new stats, or `None` when there is no user or the fetch
    /// failed (the previous stats are kept).
    pub async fn refresh(&self, user_id: Option<&str>) -> Option<DashboardStats> {
        let user_id = user_id?;
        let [logs, threats, alerts] = queries_for(user_id);

        let started = Instant::now();
        let result = tokio::try_join!(
            self.backend.count(&logs),
            self.backend.count(&threats),
            self.backend.count(&alerts),
        );
        monitoring::STATS_LATENCY.observe(started.elapsed().as_secs_f64());

        match result {
            Ok((total_logs, active_threats, critical_alerts)) => {
                let stats = DashboardStats {
                    total_logs: total_logs.unwrap_or(0),
                    active_threats: active_threats.unwrap_or(0),
                    critical_alerts: critical_alerts.unwrap_or(0),
                    systems_monitored: SYSTEMS_MONITORED,
                };
                debug!(user_id, ?stats, "dashboard stats updated");
                monitoring::STATS_FETCHES
                    .with_label_values(&["success"])
                    .inc();

                self.snapshot.send_modify(|s| {
                    s.stats = stats;
                    s.completed += 1;
                    s.last_error = None;
                });
                Some(stats)
            }
            Err(e) => {
                error!(user_id, error = %e, "Error fetching stats");
                monitoring::STATS_FETCHES
                    .with_label_values(&["failure"])
                    .inc();

                if self.policy == FailurePolicy::Notify {
                    self.notifier.notify(Toast::destructive(
                        "Could not load statistics",
                        e.to_string(),
                    ));
                }
                self.snapshot.send_modify(|s| {
                    s.completed += 1;
                    s.last_error = Some(e.to_string());
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryStore;
    use crate::backend::BackendError;
    use crate::models::User;
    use crate::test_utils::helpers::{memory_store, seed_counts, signed_in};
    use crate::ui::ViewContext;
    use serde_json::Value;

    async fn aggregator(
        store: &MemoryStore,
        policy: FailurePolicy,
    ) -> (StatsAggregator, User, Arc<crate::ui::Recorder>) {
        let (backend, user) = signed_in(store, "u1", "u1@example.com").await;
        let (ctx, recorder) = ViewContext::recording();
        (
            StatsAggregator::new(backend, ctx.notifier, policy),
            user,
            recorder,
        )
    }

    #[test]
    fn test_failure_policy_parse() {
        assert_eq!("silent".parse::<FailurePolicy>(), Ok(FailurePolicy::Silent));
        assert_eq!(" Notify ".parse::<FailurePolicy>(), Ok(FailurePolicy::Notify));
        assert!("loud".parse::<FailurePolicy>().is_err());
    }

    #[tokio::test]
    async fn test_merges_counts_with_constant() {
        let store = memory_store();
        let (stats, user, _) = aggregator(&store, FailurePolicy::Silent).await;
        seed_counts(&store, &user.id, 120, 4, 1);

        let result = stats.refresh(Some("u1")).await.unwrap();

        assert_eq!(
            result,
            DashboardStats {
                total_logs: 120,
                active_threats: 4,
                critical_alerts: 1,
                systems_monitored: 3,
            }
        );
        assert_eq!(stats.stats(), result);
        assert_eq!(stats.snapshot().completed, 1);
    }

    #[tokio::test]
    async fn test_issues_exactly_three_scoped_queries() {
        let store = memory_store();
        let (stats, user, _) = aggregator(&store, FailurePolicy::Silent).await;

        stats.refresh(Some(&user.id)).await;

        let queries = store.issued_queries();
        assert_eq!(queries.len(), 3);
        for query in &queries {
            assert_eq!(
                query.filter_value("user_id"),
                Some(&Value::from(user.id.as_str()))
            );
        }
        let collections: Vec<_> = queries.iter().map(|q| q.collection.as_str()).collect();
        assert_eq!(collections, vec!["logs", "threats", "alerts"]);
        assert_eq!(queries[1].filter_value("status"), Some(&Value::from("open")));
        assert_eq!(queries[2].filter_value("is_read"), Some(&Value::from(false)));
    }

    #[tokio::test]
    async fn test_null_counts_map_to_zero() {
        let store = memory_store();
        let (stats, user, _) = aggregator(&store, FailurePolicy::Silent).await;
        seed_counts(&store, &user.id, 7, 2, 5);
        store.withhold_count("threats");
        store.withhold_count("alerts");

        let result = stats.refresh(Some(&user.id)).await.unwrap();

        assert_eq!(result.total_logs, 7);
        assert_eq!(result.active_threats, 0);
        assert_eq!(result.critical_alerts, 0);
    }

    #[tokio::test]
    async fn test_no_user_is_a_no_op() {
        let store = memory_store();
        let (stats, _, _) = aggregator(&store, FailurePolicy::Silent).await;

        assert!(stats.refresh(None).await.is_none());
        assert!(store.issued_queries().is_empty());
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let store = memory_store();
        let (stats, user, _) = aggregator(&store, FailurePolicy::Silent).await;
        seed_counts(&store, &user.id, 10, 1, 0);

        let first = stats.refresh(Some(&user.id)).await;
        let second = stats.refresh(Some(&user.id)).await;

        assert_eq!(first, second);
        assert_eq!(stats.snapshot().completed, 2);
    }

    #[tokio::test]
    async fn test_silent_failure_keeps_previous_stats() {
        let store = memory_store();
        let (stats, user, recorder) = aggregator(&store, FailurePolicy::Silent).await;
        seed_counts(&store, &user.id, 3, 2, 1);
        let before = stats.refresh(Some(&user.id)).await.unwrap();

        store.fail_next_count(BackendError::Unavailable("network error".to_string()));
        assert!(stats.refresh(Some(&user.id)).await.is_none());

        assert_eq!(stats.stats(), before);
        assert!(recorder.toasts().is_empty());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.last_error.as_deref(), Some("network error"));
    }

    #[tokio::test]
    async fn test_failure_before_first_fetch_stays_zero() {
        let store = memory_store();
        let (stats, user, _) = aggregator(&store, FailurePolicy::Silent).await;
        store.fail_next_count(BackendError::Unavailable("network error".to_string()));

        stats.refresh(Some(&user.id)).await;

        assert_eq!(stats.stats(), DashboardStats::default());
    }

    #[tokio::test]
    async fn test_notify_policy_shows_toast() {
        let store = memory_store();
        let (stats, user, recorder) = aggregator(&store, FailurePolicy::Notify).await;
        store.fail_next_count(BackendError::Unavailable("network error".to_string()));

        stats.refresh(Some(&user.id)).await;

        let toasts = recorder.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].variant, crate::ui::ToastVariant::Destructive);
        assert!(toasts[0].description.contains("network error"));
    }
}
