use crate::backend::{Backend, BackendError};
use crate::ui::{Navigator, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// No session: show the marketing content
    Marketing,
    /// Session found: navigation to the dashboard was issued
    Redirecting,
}

/// Check for an existing session once and redirect signed-in users
pub async fn load(backend: &dyn Backend, navigator: &dyn Navigator) -> Result<Landing, BackendError> {
    match backend.get_session().await? {
        Some(_) => {
            navigator.navigate(Route::Dashboard);
            Ok(Landing::Redirecting)
        }
        None => Ok(Landing::Marketing),
    }
}
