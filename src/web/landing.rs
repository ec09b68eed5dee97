use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use maud::{html, Markup};

use crate::ui::{Route, Toast, ViewContext};
use crate::views::landing::{self, Landing};

use super::components::layout;
use super::{redirect, take_flash, unavailable, AppState};

/// Home page: signed-in visitors go straight to the dashboard
pub async fn home(State(state): State<AppState>, jar: CookieJar) -> Response {
    let backend = state.connection(&jar);
    let (ctx, recorder) = ViewContext::recording();

    match landing::load(backend.as_ref(), ctx.navigator.as_ref()).await {
        Ok(Landing::Redirecting) => redirect(
            jar,
            recorder.last_route().unwrap_or(Route::Dashboard),
            recorder.take_toasts(),
        ),
        Ok(Landing::Marketing) => {
            let jar = state.release(jar);
            let (jar, toasts) = take_flash(jar);
            (jar, page(&toasts)).into_response()
        }
        Err(e) => unavailable(&e),
    }
}

const FEATURES: [(&str, &str); 6] = [
    (
        "Multi-source Collection",
        "Collect logs from Syslog, FTP, USB, and network devices using standard protocols",
    ),
    (
        "Advanced Analysis",
        "Detect threats using signature, anomaly, heuristic, and behavioral analysis techniques",
    ),
    (
        "Real-time Monitoring",
        "Continuous monitoring with near real-time threat detection and alerting",
    ),
    (
        "Isolated Network Support",
        "Fully functional without internet access, perfect for air-gapped environments",
    ),
    (
        "Secure & Private",
        "All data stays within your infrastructure with optional authentication controls",
    ),
    (
        "Portable Deployment",
        "Easy deployment across Windows, Linux, and Mac with minimal setup required",
    ),
];

fn page(toasts: &[Toast]) -> Markup {
    layout::base(
        "Log Analysis for Isolated Networks",
        html! {
            div class="min-h-screen" {
                // Hero
                div class="bg-gradient-to-br from-sky-50 via-white to-indigo-50" {
                    div class="max-w-4xl mx-auto px-4 py-20 text-center" {
                        div class="flex justify-center mb-6" {
                            div class="p-4 bg-sky-100 rounded-2xl" { (layout::logo("h-16 w-16")) }
                        }
                        h1 class="text-5xl md:text-6xl font-bold text-gray-900 mb-6" {
                            "SecureLogAnalyzer"
                        }
                        p class="text-xl md:text-2xl text-gray-600 mb-8 max-w-2xl mx-auto" {
                            "Advanced portable log analysis tool for isolated network monitoring and threat detection"
                        }
                        div class="flex flex-wrap gap-4 justify-center mb-12" {
                            a
                                href=(Route::Auth.path())
                                class="inline-flex items-center px-8 py-3 text-lg font-medium rounded-md shadow-sm text-white bg-primary hover:bg-sky-600" {
                                "Get Started"
                            }
                            a
                                href=(Route::Auth.path())
                                class="inline-flex items-center px-8 py-3 text-lg font-medium rounded-md border border-gray-300 text-gray-700 bg-white hover:bg-gray-50" {
                                "Sign In"
                            }
                        }
                        div class="flex flex-wrap gap-3 justify-center text-sm" {
                            @for badge in ["Offline Capable", "Secure by Design", "Real-time Detection"] {
                                span class="px-4 py-2 bg-white border border-gray-200 rounded-full" { (badge) }
                            }
                        }
                    }
                }

                // Features
                div class="max-w-7xl mx-auto px-4 py-20" {
                    div class="text-center mb-16" {
                        h2 class="text-3xl md:text-4xl font-bold text-gray-900 mb-4" { "Key Features" }
                        p class="text-lg text-gray-600 max-w-2xl mx-auto" {
                            "Comprehensive security monitoring designed for isolated networks and central SOC operations"
                        }
                    }
                    div class="grid md:grid-cols-2 lg:grid-cols-3 gap-8" {
                        @for (title, description) in FEATURES {
                            (feature_card(title, description))
                        }
                    }
                }

                // Call to action
                div class="max-w-3xl mx-auto px-4 py-20 text-center" {
                    div class="p-12 bg-gradient-to-br from-sky-50 to-indigo-50 rounded-2xl border border-gray-200" {
                        h2 class="text-3xl md:text-4xl font-bold text-gray-900 mb-4" { "Ready to Secure Your Network?" }
                        p class="text-lg text-gray-600 mb-8" {
                            "Start monitoring your systems and detecting threats today"
                        }
                        a
                            href=(Route::Auth.path())
                            class="inline-flex items-center px-8 py-3 text-lg font-medium rounded-md shadow-sm text-white bg-primary hover:bg-sky-600" {
                            "Get Started Now"
                        }
                    }
                }

                footer class="border-t border-gray-200 bg-white mt-20" {
                    div class="max-w-7xl mx-auto px-4 py-8 flex flex-col md:flex-row justify-between items-center gap-4" {
                        div class="flex items-center gap-2" {
                            (layout::logo("h-5 w-5"))
                            span class="font-semibold" { "SecureLogAnalyzer" }
                        }
                        p class="text-sm text-gray-500" {
                            "© 2025 SecureLogAnalyzer. Advanced Security Monitoring Platform."
                        }
                    }
                }
            }
            (layout::toasts(toasts))
        },
    )
}

fn feature_card(title: &str, description: &str) -> Markup {
    html! {
        div class="p-6 bg-white border border-gray-200 rounded-lg hover:shadow-lg transition-all" {
            h3 class="text-xl font-semibold text-gray-900 mb-2" {
                (title)
            }
            p class="text-gray-600" {
                (description)
            }
        }
    }
}
