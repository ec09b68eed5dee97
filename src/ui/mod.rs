//! Navigation and notification seams between controllers and the renderer.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::monitoring;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    Landing,
    Auth,
    Dashboard,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Auth => "/auth",
            Route::Dashboard => "/dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToastVariant {
    #[default]
    Default,
    Destructive,
}

/// Transient notification shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub variant: ToastVariant,
}

impl Toast {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Default,
        }
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Destructive,
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// What a view may do to its surroundings
#[derive(Clone)]
pub struct ViewContext {
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
}

impl ViewContext {
    /// Context backed by a fresh [`Recorder`]
    pub fn recording() -> (Self, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let ctx = Self {
            navigator: recorder.clone(),
            notifier: recorder.clone(),
        };
        (ctx, recorder)
    }
}

/// Collects navigations and toasts for the renderer to act on
#[derive(Debug, Default)]
pub struct Recorder {
    routes: Mutex<Vec<Route>>,
    toasts: Mutex<Vec<Toast>>,
}

impl Recorder {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().clone()
    }

    pub fn last_route(&self) -> Option<Route> {
        self.routes.lock().last().copied()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().clone()
    }

    pub fn take_toasts(&self) -> Vec<Toast> {
        std::mem::take(&mut *self.toasts.lock())
    }
}

impl Navigator for Recorder {
    fn navigate(&self, route: Route) {
        monitoring::REDIRECTS
            .with_label_values(&[route.path()])
            .inc();
        self.routes.lock().push(route);
    }
}

impl Notifier for Recorder {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().push(toast);
    }
}
