//! Dispatch Worker Service
//!
//! Background worker that sends email campaigns queued by the API.
//!
//! ## Architecture
//!
//! ```text
//! Redis (email-queue)
//!   ↓ reserve, heartbeat, complete/fail
//! QueueWorker<DispatchJob, DispatchProcessor>
//!   ↓
//! CampaignScheduler → PacedSender → SES / SMTP
//!   ↓
//! PostgreSQL (campaigns, email_logs, suppressions)
//! ```
//!
//! One job runs at a time and recipients are sent strictly in sequence, so
//! throughput is scaled by running more worker instances.

pub mod connect;
pub mod settings;

use crate::connect::{RetryPolicy, connect_database, connect_redis};
use crate::settings::WorkerSettings;
use core_config::database::DatabaseConfig;
use core_config::redis::RedisConfig;
use core_config::server::HealthServerConfig;
use core_config::{Environment, FromEnv};
use domain_campaigns::transport::AttachmentFetcher;
use domain_campaigns::{
    CampaignQueue, CampaignScheduler, DispatchConfig, DispatchJob, DispatchProcessor,
    EnvelopeBuilder, EnvelopeConfig, PacedSender, PgDeliveryJournal, PgSuppressionStore,
    SuppressionGate, TokioPacer, TransportRegistry,
};
use eyre::{Result, WrapErr};
use job_queue::{HealthState, QueueDef, QueueWorker, RedisJobQueue, health_router, init_metrics};
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

const APP_NAME: &str = env!("CARGO_PKG_NAME");
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Serve `/health`, `/ready`, `/metrics` and `/jobs/{id}`
async fn start_health_server(state: HealthState, config: HealthServerConfig) -> Result<()> {
    let address = config.address();
    let listener = TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {address}"))?;

    info!(address = %address, "Health server listening");

    axum::serve(listener, health_router(state))
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Run the dispatch worker until SIGINT or SIGTERM.
///
/// The job in progress when the signal arrives is finished before returning.
///
/// # Errors
///
/// Fails on invalid configuration, when PostgreSQL or Redis stay unreachable
/// past the retry budget, or when migrations fail.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);
    init_metrics().wrap_err("Failed to install the metrics recorder")?;

    info!(name = APP_NAME, version = APP_VERSION, ?environment, "Starting dispatch worker");

    let settings = WorkerSettings::from_env().wrap_err("Failed to load worker configuration")?;
    let dispatch = DispatchConfig::from_env().wrap_err("Failed to load dispatch configuration")?;
    let envelope = EnvelopeConfig::from_env().wrap_err("Failed to load envelope configuration")?;
    let health =
        HealthServerConfig::from_env().wrap_err("Failed to load health server configuration")?;
    info!(
        inter_send_delay_ms = dispatch.inter_send_delay.as_millis() as u64,
        inter_batch_pause_ms = dispatch.inter_batch_pause.as_millis() as u64,
        batch_size = dispatch.batch_size,
        bulk_threshold = dispatch.bulk_threshold,
        skip_non_pending = dispatch.skip_non_pending,
        frontend_url = %envelope.frontend_url,
        "Dispatch configuration loaded"
    );

    let retry = RetryPolicy::default();

    let db_config =
        DatabaseConfig::from_env().wrap_err("Failed to load PostgreSQL configuration")?;
    let db = connect_database(&db_config, &retry)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;

    if settings.run_migrations {
        info!("Applying pending migrations");
        Migrator::up(&db, None)
            .await
            .wrap_err("Failed to run migrations")?;
    }

    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;
    let redis = connect_redis(&redis_config, &retry)
        .await
        .wrap_err("Failed to connect to Redis")?;

    let queue = Arc::new(
        RedisJobQueue::<DispatchJob>::new(redis, settings.queue.queue_name.clone())
            .with_retention_secs(CampaignQueue::RETENTION_SECS),
    );

    let pacer = Arc::new(TokioPacer);
    let sender = Arc::new(PacedSender::new(
        Arc::new(PgDeliveryJournal::new(db.clone())),
        SuppressionGate::new(Arc::new(PgSuppressionStore::new(db))),
        pacer.clone(),
        EnvelopeBuilder::new(envelope),
        dispatch.inter_send_delay,
    ));
    let scheduler = Arc::new(CampaignScheduler::new(sender.clone(), pacer, dispatch));

    let fetcher = AttachmentFetcher::new().wrap_err("Failed to build the attachment client")?;
    let transports = Arc::new(TransportRegistry::from_env(fetcher).await);
    let processor = Arc::new(DispatchProcessor::new(scheduler, sender, transports));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let health_state = HealthState::new(queue.clone(), APP_NAME, APP_VERSION);
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, health).await {
            error!(error = %e, "Health server stopped");
        }
    });

    info!(
        queue = %settings.queue.queue_name,
        consumer_id = %settings.queue.consumer_id,
        "Consuming dispatch jobs"
    );
    QueueWorker::new(queue, processor, settings.queue)
        .run(shutdown_rx)
        .await
        .wrap_err("Queue worker failed")?;

    info!("Dispatch worker stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, finishing current job"),
        _ = terminate => info!("Received SIGTERM, finishing current job"),
    }
}
