use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::auth::{self, SessionWatcher};
use crate::backend::{Backend, BackendError};
use crate::models::{DashboardStats, User};
use crate::stats::{FailurePolicy, StatsAggregator};
use crate::ui::ViewContext;

/// What the dashboard renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub loading: bool,
    pub user: Option<User>,
    pub stats: DashboardStats,
}

/// Session gate, statistics and sign-out for the dashboard screen
pub struct DashboardController {
    backend: Arc<dyn Backend>,
    ctx: ViewContext,
    watcher: SessionWatcher,
    stats: Arc<StatsAggregator>,
    refresher: JoinHandle<()>,
}

impl DashboardController {
    pub async fn mount(
        backend: Arc<dyn Backend>,
        ctx: ViewContext,
        policy: FailurePolicy,
    ) -> Result<Self, BackendError> {
        let watcher = SessionWatcher::mount(backend.clone(), ctx.navigator.clone()).await?;
        let stats = Arc::new(StatsAggregator::new(
            backend.clone(),
            ctx.notifier.clone(),
            policy,
        ));
        let refresher = tokio::spawn(refresh_on_user_change(watcher.users(), stats.clone()));

        Ok(Self {
            backend,
            ctx,
            watcher,
            stats,
            refresher,
        })
    }

    pub fn view(&self) -> DashboardView {
        DashboardView {
            loading: self.watcher.is_loading(),
            user: self.watcher.user(),
            stats: self.stats.stats(),
        }
    }

    /// Wait until at least one stats fetch has settled; false on timeout
    pub async fn wait_for_stats(&self, timeout: Duration) -> bool {
        let mut snapshots = self.stats.subscribe();
        let settled = tokio::time::timeout(timeout, snapshots.wait_for(|s| s.completed > 0)).await;

        match settled {
            Ok(Ok(_)) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                warn!(?timeout, "dashboard stats did not settle in time");
                false
            }
        }
    }

    pub async fn sign_out(&self) -> Result<(), BackendError> {
        auth::sign_out(self.backend.as_ref(), &self.ctx).await
    }
}

impl Drop for DashboardController {
    fn drop(&mut self) {
        self.refresher.abort();
    }
}

/// Refetch stats for every published user, starting with the current one
async fn refresh_on_user_change(mut users: watch::Receiver<Option<User>>, stats: Arc<StatsAggregator>) {
    loop {
        let user = users.borrow_and_update().clone();
        if let Some(user) = user {
            stats.refresh(Some(&user.id)).await;
        }
        if users.changed().await.is_err() {
            break;
        }
    }
}
