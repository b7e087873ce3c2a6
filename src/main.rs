//! Storefront back binary entrypoint: serves either the domain services or the
//! API gateway, depending on `STOREFRONT_ROLE`.

use std::net::SocketAddr;

use anyhow::Context;
use axum::{Router, ServiceExt, extract::Request};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_back::{
    config::{AppConfig, Role},
    gateway::{self, GatewayState},
    routes,
    services::{recommendations_service, storage_supervisor},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let port = config.port;
    let app = match config.role {
        Role::Services => build_services(config).await,
        Role::Gateway => build_gateway(config).await,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let app = routes::trailing_slash_tolerant(app);
    let service = ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app);
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Mount the configured domains and start supervising storage in the background.
async fn build_services(config: AppConfig) -> Router<()> {
    info!(
        domains = ?config.domains.iter().map(|domain| domain.name()).collect::<Vec<_>>(),
        "serving domain services"
    );
    let backend = config.storage.clone();
    let state = AppState::new(config);

    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let backend = backend.clone();
        async move { storage_supervisor::connect_backend(&backend).await }
    }));
    recommendations_service::load_persisted_model(&state).await;

    with_layers(routes::router(state))
}

async fn build_gateway(config: AppConfig) -> Router<()> {
    let limiter = gateway::build_limiter(&config.gateway).await;
    info!(
        upstreams = config.gateway.upstreams.len(),
        limit = config.gateway.rate_limit_per_minute,
        "serving API gateway"
    );
    with_layers(gateway::router(GatewayState::new(&config.gateway, limiter)))
}

/// Attach cross-cutting middleware layers.
fn with_layers(router: Router<()>) -> Router<()> {
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
