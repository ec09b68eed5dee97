use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use securelog::backend::memory::MemoryStore;
use securelog::backend::rest::{RestConfig, RestConnector};
use securelog::backend::Connector;
use securelog::config::{self, BackendKind, Settings};
use securelog::web::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    if let Err(e) = dotenvy::dotenv() {
        println!("No .env file found, using environment variables: {}", e);
    }

    let settings = config::get_settings();
    init_tracing(settings);

    info!("Starting {} {}...", settings.app_name, settings.version);

    let connector = build_connector(settings)?;
    let state = AppState::new(connector, settings.clone());
    state.start_sweep_task();
    info!(
        "Connection sweep every {}s, idle limit {}s",
        settings.connection_sweep_secs, settings.connection_idle_secs
    );
    let app = web::router(state);

    let addr: SocketAddr = settings.address().parse()?;
    info!("{} started on http://{}", settings.app_name, addr);

    // Start server with graceful shutdown
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));

    if settings.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_connector(settings: &Settings) -> anyhow::Result<Arc<dyn Connector>> {
    match settings.backend {
        BackendKind::Memory => {
            info!("Using in-memory backend (offline mode)");
            let store = MemoryStore::from_settings(settings);
            let analyst = store.seed_demo(&settings.demo_email, &settings.demo_password)?;
            info!(email = ?analyst.email, "Demo analyst ready");
            Ok(Arc::new(store))
        }
        BackendKind::Rest => {
            if settings.backend_anon_key.is_empty() {
                anyhow::bail!("BACKEND_ANON_KEY is required for the rest backend");
            }
            info!("Using REST backend at {}", settings.backend_url);
            Ok(Arc::new(RestConnector::new(RestConfig::from_settings(settings))))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutting down SecureLogAnalyzer...");
        },
        _ = terminate => {
            info!("Shutting down SecureLogAnalyzer...");
        },
    }
}
