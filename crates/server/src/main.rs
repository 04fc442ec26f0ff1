//! Contact-center server entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use contact_center_config::{load_settings, Settings};
use contact_center_escalation::{EscalationEngine, TimeoutAction};
use contact_center_persistence::{Archiver, Snapshot};
use contact_center_server::{create_router, init_metrics, AppState};

/// How often overdue escalations are swept and queues re-offered
const ESCALATION_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env} > config/default > defaults
    let env = std::env::var("CONTACT_CENTER_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => {
            // Tracing not yet initialized
            eprintln!(
                "Loaded configuration (env: {})",
                env.as_deref().unwrap_or("default")
            );
            settings
        },
        Err(e) => {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };

    init_tracing(&settings);

    tracing::info!("Starting contact-center server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?settings.environment,
        nlu_provider = ?settings.nlu.provider,
        "Configuration loaded"
    );

    let metrics_handle = if settings.observability.metrics_enabled {
        init_metrics()
    } else {
        None
    };

    let state = AppState::build(settings.clone())
        .await?
        .with_metrics(metrics_handle);

    if let Some(path) = &settings.persistence.snapshot_path {
        match Snapshot::read(path).await {
            Ok(Some(snapshot)) => state.restore(snapshot),
            Ok(None) => tracing::info!(path = %path, "No snapshot found, starting empty"),
            Err(e) => tracing::error!(path = %path, error = %e, "Failed to read snapshot"),
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let archiver = Archiver::new(state.sessions.clone(), &settings.persistence).spawn(shutdown_rx.clone());
    let sweeper = spawn_escalation_sweeper(state.escalation.clone(), shutdown_rx);

    let app = create_router(state.clone());
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(archiver, sweeper);

    if let Some(path) = &settings.persistence.snapshot_path {
        if let Err(e) = state.snapshot().write(path).await {
            tracing::error!(path = %path, error = %e, "Failed to write snapshot");
        }
    }
    state.notifications.shutdown().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Periodic timeout handling and queue dispatch for escalations
fn spawn_escalation_sweeper(
    engine: Arc<EscalationEngine>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ESCALATION_SWEEP_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = chrono::Utc::now();
                    for action in engine.handle_timeouts(now) {
                        match action {
                            TimeoutAction::Supervisor { escalation_id, agent_id } => {
                                tracing::info!(%escalation_id, %agent_id, "Overdue escalation sent to supervisor")
                            },
                            TimeoutAction::SupervisorUnavailable { escalation_id } => {
                                tracing::warn!(%escalation_id, "Overdue escalation, no supervisor available")
                            },
                            TimeoutAction::Callback { escalation_id, callback_at } => {
                                tracing::info!(%escalation_id, %callback_at, "Callback scheduled")
                            },
                        }
                    }
                    let assigned = engine.dispatch_pending(now);
                    if !assigned.is_empty() {
                        tracing::info!(count = assigned.len(), "Queued escalations assigned");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("Escalation sweeper stopping");
                        break;
                    }
                }
            }
        }
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("contact_center={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
