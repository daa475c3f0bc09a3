//! campus-desk server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{Router, middleware};
use campus_api::{AppState, auth_middleware, router as api_router};
use campus_common::{
    Config,
    config::{IdentityConfig, IdentityProviderKind},
};
use campus_core::{
    ComplaintEvent, ComplaintService, CredentialDelivery, IdentityProviderService,
    IdentityService, InMemoryIdentityProvider, MailCredentialDelivery, RestIdentityProvider, Role,
};
use tokio::{signal, sync::broadcast};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn identity_provider(config: &IdentityConfig) -> anyhow::Result<IdentityProviderService> {
    match config.provider {
        IdentityProviderKind::Memory => {
            info!("Using in-memory identity provider");
            Ok(Arc::new(InMemoryIdentityProvider::new()))
        }
        IdentityProviderKind::Rest => {
            let api_key = config
                .api_key
                .clone()
                .context("identity.api_key is required for the rest provider")?;
            info!(endpoint = %config.endpoint, "Using REST identity provider");
            Ok(Arc::new(RestIdentityProvider::new(&config.endpoint, api_key)?))
        }
    }
}

/// Provision the configured administrators on a fresh in-memory provider.
async fn bootstrap_admins(identity: &IdentityService, config: &IdentityConfig) {
    for email in &config.admin_emails {
        match identity.sign_up(email, Role::Admin).await {
            Ok(()) => info!(email = %email, "Administrator provisioned"),
            Err(e) => warn!(email = %email, error = %e, "Failed to provision administrator"),
        }
    }
}

/// Log complaint activity until the service goes away.
async fn log_complaint_events(mut events: broadcast::Receiver<ComplaintEvent>) {
    loop {
        match events.recv().await {
            Ok(ComplaintEvent::Submitted(c)) => {
                debug!(complaint_id = %c.id, "Complaint received");
            }
            Ok(ComplaintEvent::StatusChanged(c)) => {
                debug!(complaint_id = %c.id, status = %c.status, "Complaint status changed");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Complaint event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting campus-desk server...");

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    let provider = identity_provider(&config.identity)?;
    let delivery: Option<Arc<dyn CredentialDelivery>> = match config.mail.clone() {
        Some(mail) => Some(Arc::new(MailCredentialDelivery::new(mail))),
        None => {
            warn!("No mail configuration; account provisioning is disabled");
            None
        }
    };
    let identity_service = IdentityService::new(provider, delivery, config.identity.clone());

    if config.identity.provider == IdentityProviderKind::Memory {
        bootstrap_admins(&identity_service, &config.identity).await;
    }

    let complaint_service = ComplaintService::from_config(&config.complaints);
    tokio::spawn(log_complaint_events(complaint_service.subscribe()));

    let state = AppState::new(complaint_service, identity_service);

    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server.host: {}", config.server.host))?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
