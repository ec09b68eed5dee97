use tracing::{info, warn};

use crate::backend::{Backend, BackendError};
use crate::monitoring;
use crate::ui::{Route, Toast, ViewContext};

pub mod watcher;

pub use watcher::SessionWatcher;

/// Terminate the session and return to the authentication screen.
///
/// On failure the user stays where they are, with an error toast carrying
/// the backend's message.
pub async fn sign_out(backend: &dyn Backend, ctx: &ViewContext) -> Result<(), BackendError> {
    match backend.sign_out().await {
        Ok(()) => {
            info!("User signed out");
            monitoring::SIGN_OUTS.with_label_values(&["success"]).inc();

            ctx.notifier.notify(Toast::info(
                "Signed out",
                "You have been successfully signed out",
            ));
            ctx.navigator.navigate(Route::Auth);
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Sign-out failed");
            monitoring::SIGN_OUTS.with_label_values(&["failure"]).inc();

            ctx.notifier.notify(Toast::destructive("Error", e.to_string()));
            Err(e)
        }
    }
}
