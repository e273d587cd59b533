// Main entry point for the OTP server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use otp_core::kernel::{
    connect_store, create_rate_limiter, start_scheduler, BaseNotifier, LogNotifier, ServerDeps,
    TwilioAdapter,
};
use otp_core::{server::build_app, Config};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twilio::{TwilioOptions, TwilioService};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,otp_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting OTP server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let store = connect_store(&config.store_uri, config.store_max_connections).await?;

    let notifier: Arc<dyn BaseNotifier> = match &config.twilio {
        Some(twilio) => {
            tracing::info!("Delivering codes by SMS via Twilio");
            let service = TwilioService::new(TwilioOptions {
                account_sid: twilio.account_sid.clone(),
                auth_token: twilio.auth_token.clone(),
                from: twilio.from_number.clone(),
            });
            Arc::new(TwilioAdapter::new(Arc::new(service), config.otp_ttl()))
        }
        None => Arc::new(LogNotifier::new()),
    };

    let deps = Arc::new(ServerDeps::new(
        store.clone(),
        notifier,
        config.otp_ttl(),
        config.otp_max_attempts,
    ));

    let mut scheduler = start_scheduler(store.clone(), deps.clock.clone(), &config.sweep_schedule)
        .await
        .context("Failed to start scheduled tasks")?;

    let app = build_app(
        deps,
        create_rate_limiter(config.rate_limit_per_minute),
        Duration::from_secs(config.request_timeout_seconds),
        config.trust_proxy_headers,
    );

    tracing::info!("Starting server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .context("Failed to bind to address")?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.changed().await;
    });
    let mut server_task = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server_task => {
            result.context("Server task panicked")?.context("Server error")?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            let grace = Duration::from_secs(config.shutdown_grace_seconds);

            match tokio::time::timeout(grace, &mut server_task).await {
                Ok(result) => {
                    result.context("Server task panicked")?.context("Server error")?;
                    tracing::info!("In-flight requests drained");
                }
                Err(_) => {
                    tracing::warn!(
                        grace_secs = config.shutdown_grace_seconds,
                        "Grace period elapsed, dropping remaining connections"
                    );
                    server_task.abort();
                }
            }
        }
    }

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Failed to stop scheduled tasks");
    }
    store.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
