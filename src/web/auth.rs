use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use maud::{html, Markup};
use serde::Deserialize;
use tracing::{info, warn};

use crate::backend::BackendError;
use crate::ui::{Route, Toast};

use super::components::layout;
use super::{redirect, take_flash, unavailable, AppState};

/// Sign-in form data
#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

/// Show the sign-in page; a live session skips straight to the dashboard
pub async fn page(State(state): State<AppState>, jar: CookieJar) -> Response {
    let backend = state.connection(&jar);

    match backend.get_session().await {
        Ok(Some(_)) => redirect(jar, Route::Dashboard, Vec::new()),
        Ok(None) => {
            let jar = state.release(jar);
            let (jar, toasts) = take_flash(jar);
            (jar, sign_in_form(None, &toasts)).into_response()
        }
        Err(e) => unavailable(&e),
    }
}

/// Handle sign-in form submission
pub async fn submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> Response {
    let backend = state.connector.connect();

    match backend
        .sign_in_with_password(form.email.trim(), &form.password)
        .await
    {
        Ok(session) => {
            info!(user_id = %session.user.id, "User signed in");
            let jar = state.remember(jar, backend).await;
            redirect(jar, Route::Dashboard, Vec::new())
        }
        Err(e) => {
            warn!(email = %form.email, error = %e, "Sign-in failed");
            let status = match e {
                BackendError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            let toast = Toast::destructive("Sign in failed", e.to_string());

            (status, jar, sign_in_form(Some(&form.email), &[toast])).into_response()
        }
    }
}

fn sign_in_form(email: Option<&str>, toasts: &[Toast]) -> Markup {
    layout::base(
        "Sign In",
        html! {
            div class="min-h-screen flex items-center justify-center bg-slate-50 py-12 px-4 sm:px-6 lg:px-8" {
                div class="max-w-md w-full space-y-8" {
                    div {
                        div class="flex justify-center" { (layout::logo("h-12 w-12")) }
                        h2 class="mt-6 text-center text-3xl font-extrabold text-gray-900" {
                            "Sign in to SecureLogAnalyzer"
                        }
                        p class="mt-2 text-center text-sm text-gray-600" {
                            "Security Operations Center access"
                        }
                    }

                    form class="mt-8 space-y-6" action=(Route::Auth.path()) method="POST" {
                        div class="rounded-md shadow-sm -space-y-px" {
                            div {
                                label for="email" class="sr-only" { "Email address" }
                                input
                                    id="email"
                                    name="email"
                                    type="email"
                                    autocomplete="email"
                                    required
                                    value=[email]
                                    class="appearance-none rounded-none relative block w-full px-3 py-2 border border-gray-300 placeholder-gray-500 text-gray-900 rounded-t-md focus:outline-none focus:ring-primary focus:border-primary focus:z-10 sm:text-sm"
                                    placeholder="Email address";
                            }
                            div {
                                label for="password" class="sr-only" { "Password" }
                                input
                                    id="password"
                                    name="password"
                                    type="password"
                                    autocomplete="current-password"
                                    required
                                    class="appearance-none rounded-none relative block w-full px-3 py-2 border border-gray-300 placeholder-gray-500 text-gray-900 rounded-b-md focus:outline-none focus:ring-primary focus:border-primary focus:z-10 sm:text-sm"
                                    placeholder="Password";
                            }
                        }

                        div {
                            button
                                type="submit"
                                class="group relative w-full flex justify-center py-2 px-4 border border-transparent text-sm font-medium rounded-md text-white bg-primary hover:bg-sky-600 focus:outline-none focus:ring-2 focus:ring-offset-2 focus:ring-primary" {
                                "Sign in"
                            }
                        }
                    }

                    a href=(Route::Landing.path()) class="block text-center text-sm text-gray-500 hover:text-gray-700" {
                        "← Back to home"
                    }
                }
            }
            (layout::toasts(toasts))
        },
    )
}
