use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use maud::{html, Markup};

use crate::auth;
use crate::ui::{Route, Toast, ViewContext};
use crate::views::{DashboardController, DashboardView};

use super::components::layout;
use super::{redirect, take_flash, unavailable, AppState};

/// Show the dashboard, or send an anonymous visitor to sign in
pub async fn show(State(state): State<AppState>, jar: CookieJar) -> Response {
    let backend = state.connection(&jar);
    let (ctx, recorder) = ViewContext::recording();

    let dashboard =
        match DashboardController::mount(backend, ctx, state.settings.stats_failure_policy).await {
            Ok(dashboard) => dashboard,
            Err(e) => return unavailable(&e),
        };

    if let Some(route) = recorder.last_route() {
        let jar = state.release(jar);
        return redirect(jar, route, recorder.take_toasts());
    }

    dashboard.wait_for_stats(state.settings.stats_timeout()).await;
    let view = dashboard.view();

    let (jar, mut toasts) = take_flash(jar);
    toasts.extend(recorder.take_toasts());
    (jar, page(&view, &toasts)).into_response()
}

/// Sign out; on failure the user lands back on the dashboard with the error
pub async fn sign_out(State(state): State<AppState>, jar: CookieJar) -> Response {
    let backend = state.connection(&jar);
    let (ctx, recorder) = ViewContext::recording();

    let jar = match auth::sign_out(backend.as_ref(), &ctx).await {
        Ok(()) => state.release(jar),
        Err(_) => jar,
    };
    redirect(
        jar,
        recorder.last_route().unwrap_or(Route::Dashboard),
        recorder.take_toasts(),
    )
}

fn page(view: &DashboardView, toasts: &[Toast]) -> Markup {
    let email = view
        .user
        .as_ref()
        .and_then(|u| u.email.as_deref())
        .unwrap_or_default();
    let stats = &view.stats;

    layout::base("Dashboard", html! {
        (layout::navbar(email))
        (layout::container(html! {
            div class="grid grid-cols-1 md:grid-cols-2 lg:grid-cols-4 gap-6 mb-8" {
                (stat_card("Total Logs", stats.total_logs, "Collected and analyzed", "text-gray-900"))
                (stat_card("Active Threats", stats.active_threats, "Requiring attention", "text-threat-high"))
                (stat_card("Critical Alerts", stats.critical_alerts, "Unread critical", "text-threat-critical"))
                (stat_card("Systems", stats.systems_monitored, "Currently monitored", "text-gray-900"))
            }

            (layout::card("Quick Actions", html! {
                p class="text-sm text-gray-500 mb-4" { "Get started with log analysis" }
                div class="flex flex-wrap gap-4" {
                    @for (label, primary) in [
                        ("Upload Logs", true),
                        ("View All Logs", false),
                        ("Active Threats", false),
                        ("Generate Report", false),
                    ] {
                        button
                            type="button"
                            class=(if primary {
                                "inline-flex items-center px-4 py-2 text-sm font-medium rounded-md text-white bg-primary hover:bg-sky-600"
                            } else {
                                "inline-flex items-center px-4 py-2 text-sm font-medium rounded-md border border-gray-300 text-gray-700 bg-white hover:bg-gray-50"
                            }) {
                            (label)
                        }
                    }
                }
            }))

            div class="mt-6 bg-white border border-gray-200 rounded-lg p-6" {
                div class="flex items-start gap-4" {
                    div class="p-3 bg-sky-50 rounded-full" { (layout::logo("h-6 w-6")) }
                    div class="flex-1" {
                        h3 class="font-semibold text-lg mb-2" { "Welcome to SecureLogAnalyzer" }
                        p class="text-gray-600 mb-4" {
                            "Your portable, self-contained log analysis tool for cyber security monitoring. "
                            "Upload logs from various sources (Syslog, FTP, USB) and detect threats using "
                            "advanced analysis techniques including signature, anomaly, and behavioral detection."
                        }
                        div class="flex flex-wrap gap-2" {
                            @for tag in ["Offline Capable", "Multi-source Collection", "Real-time Analysis"] {
                                span class="px-3 py-1 bg-sky-50 text-sky-700 text-sm rounded-full" { (tag) }
                            }
                        }
                    }
                }
            }
        }))
        (layout::toasts(toasts))
    })
}

fn stat_card(title: &str, value: u64, caption: &str, value_class: &str) -> Markup {
    html! {
        div class="bg-white border border-gray-200 rounded-lg p-6 hover:shadow-lg transition-all" {
            p class="text-sm font-medium text-gray-500" { (title) }
            div class=(format!("text-3xl font-bold mt-2 {}", value_class)) data-stat=(title) {
                (layout::format_count(value))
            }
            p class="text-xs text-gray-500 mt-1" { (caption) }
        }
    }
}
