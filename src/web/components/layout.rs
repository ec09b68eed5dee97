use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::ui::{Toast, ToastVariant};

/// Base HTML layout with Tailwind CSS
pub fn base(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " - SecureLogAnalyzer" }

                script src="https://cdn.tailwindcss.com" {}

                script {
                    (PreEscaped(r#"
                    tailwind.config = {
                        theme: {
                            extend: {
                                colors: {
                                    primary: '#0ea5e9',
                                    'threat-critical': '#dc2626',
                                    'threat-high': '#ea580c',
                                    'threat-medium': '#ca8a04',
                                    'threat-low': '#16a34a',
                                    'threat-info': '#6366f1',
                                }
                            }
                        }
                    }
                    "#))
                }
            }
            body class="bg-slate-50 min-h-screen" {
                (content)
            }
        }
    }
}

/// Shield mark used in headers and placeholders
pub fn logo(size: &str) -> Markup {
    html! {
        svg class=(format!("{} text-primary", size)) fill="none" stroke="currentColor" viewBox="0 0 24 24" {
            path stroke-linecap="round" stroke-linejoin="round" stroke-width="2" d="M12 22s8-4 8-10V5l-8-3-8 3v7c0 6 8 10 8 10z" {}
        }
    }
}

/// Header for authenticated pages
pub fn navbar(user_email: &str) -> Markup {
    html! {
        header class="border-b border-gray-200 bg-white" {
            div class="max-w-7xl mx-auto px-4 py-4 flex items-center justify-between" {
                div class="flex items-center gap-3" {
                    div class="p-2 bg-sky-50 rounded-lg" {
                        (logo("h-6 w-6"))
                    }
                    div {
                        a href="/dashboard" class="text-xl font-bold text-gray-900" { "SecureLogAnalyzer" }
                        p class="text-sm text-gray-500" { "Security Operations Center" }
                    }
                }
                div class="flex items-center gap-4" {
                    div class="text-right hidden sm:block" {
                        p class="text-sm font-medium text-gray-900" { (user_email) }
                        p class="text-xs text-gray-500" { "Security Analyst" }
                    }
                    form action="/logout" method="post" {
                        button
                            type="submit"
                            class="inline-flex items-center px-3 py-1.5 border border-gray-300 text-sm font-medium rounded-md text-gray-700 bg-white hover:bg-gray-50" {
                            "Sign Out"
                        }
                    }
                }
            }
        }
    }
}

/// Container for main content
pub fn container(content: Markup) -> Markup {
    html! {
        main class="max-w-7xl mx-auto px-4 sm:px-6 lg:px-8 py-8" {
            (content)
        }
    }
}

/// Card component
pub fn card(title: &str, content: Markup) -> Markup {
    html! {
        div class="bg-white overflow-hidden shadow rounded-lg border border-gray-200" {
            div class="px-4 py-5 sm:p-6" {
                h3 class="text-lg leading-6 font-medium text-gray-900 mb-4" {
                    (title)
                }
                (content)
            }
        }
    }
}

/// Alert message component
pub fn alert(message: &str, alert_type: &str) -> Markup {
    let (bg_class, text_class) = match alert_type {
        "success" => ("bg-green-50 border-green-200", "text-green-800"),
        "error" => ("bg-red-50 border-red-200", "text-red-800"),
        "warning" => ("bg-yellow-50 border-yellow-200", "text-yellow-800"),
        _ => ("bg-blue-50 border-blue-200", "text-blue-800"),
    };

    html! {
        div class=(format!("rounded-md p-4 mb-4 border {}", bg_class)) role="alert" {
            p class=(format!("text-sm font-medium {}", text_class)) {
                (message)
            }
        }
    }
}

/// Pending toasts, stacked in the bottom-right corner
pub fn toasts(toasts: &[Toast]) -> Markup {
    html! {
        @if !toasts.is_empty() {
            div class="fixed bottom-4 right-4 z-50 space-y-2 w-80" id="toasts" {
                @for toast in toasts {
                    div class=(format!("rounded-md border p-4 shadow-lg {}", toast_class(toast.variant))) role="status" {
                        p class="text-sm font-semibold" { (toast.title) }
                        p class="text-sm opacity-90" { (toast.description) }
                    }
                }
            }
        }
    }
}

fn toast_class(variant: ToastVariant) -> &'static str {
    match variant {
        ToastVariant::Default => "bg-white border-gray-200 text-gray-900",
        ToastVariant::Destructive => "bg-red-600 border-red-700 text-white toast-destructive",
    }
}

/// Format a count with thousands separators (1234567 -> "1,234,567")
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
