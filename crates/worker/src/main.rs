use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use envmon_core::telemetry::{init_tracing, shutdown_signal};
use envmon_db::PgReadingStore;
use envmon_delivery::{EmailNotifier, MqttForwarder, NotifierSet, SnsNotifier, WebhookNotifier};
use envmon_pipeline::{ingest_channel, Dispatcher, Pipeline};
use envmon_worker::config::WorkerConfig;
use envmon_worker::error::WorkerError;
use envmon_worker::subscriber;
use tokio_util::sync::CancellationToken;

/// Grace period for the subscriber and forwarder tasks to stop.
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long queued messages may take to drain after intake stops.
const QUEUE_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing("envmon_worker=info,envmon_pipeline=info,envmon_delivery=info");

    match run().await {
        Ok(()) => {
            tracing::info!("Graceful shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Worker failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), WorkerError> {
    // --- Configuration ---
    let config = WorkerConfig::from_env()?;
    tracing::info!(
        inbound_host = %config.inbound.host,
        inbound_topic = %config.inbound_topic,
        forward_host = %config.forward.host,
        forward_topic = %config.pipeline.forward_topic,
        channels = ?config.channel_names(),
        max_in_flight = config.max_in_flight,
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = envmon_db::create_pool(&config.database_url).await?;
    envmon_db::health_check(&pool).await?;
    envmon_db::run_migrations(&pool).await?;
    tracing::info!("Database ready, migrations applied");

    // --- Notification channels ---
    let notifier = build_notifiers(&config).await?;
    tracing::info!(channels = ?notifier.channel_names(), "Notification channels ready");

    // --- Forwarding ---
    let forward_cancel = CancellationToken::new();
    let (forwarder, forward_handle) = MqttForwarder::start(&config.forward, forward_cancel.clone())?;

    // --- Pipeline + dispatcher ---
    let pipeline = Arc::new(Pipeline::new(
        config.thresholds,
        Arc::new(PgReadingStore::new(pool.clone())),
        Arc::new(notifier),
        Arc::new(forwarder),
        config.pipeline.clone(),
    ));
    let (queue_tx, queue_rx) = ingest_channel(config.queue_capacity);
    let dispatch_cancel = CancellationToken::new();
    let mut dispatch_handle = tokio::spawn(
        Dispatcher::new(pipeline, config.max_in_flight).run(queue_rx, dispatch_cancel.clone()),
    );

    // --- Subscriber ---
    let subscribe_cancel = CancellationToken::new();
    let subscribe_handle = subscriber::start(
        &config.inbound,
        config.inbound_topic.clone(),
        queue_tx,
        subscribe_cancel.clone(),
    )?;
    tracing::info!("Worker running");

    shutdown_signal().await;

    // Stop intake first; dropping the subscriber's sender closes the queue
    // so the dispatcher finishes what is already queued and returns.
    subscribe_cancel.cancel();
    let _ = tokio::time::timeout(TASK_STOP_TIMEOUT, subscribe_handle).await;
    tracing::info!("Subscriber stopped");

    if tokio::time::timeout(QUEUE_DRAIN_TIMEOUT, &mut dispatch_handle)
        .await
        .is_err()
    {
        tracing::warn!("Queue did not drain in time, stopping dispatcher");
        dispatch_cancel.cancel();
        let _ = dispatch_handle.await;
    }

    // Outbound connections close last so in-flight forwards can complete.
    forward_cancel.cancel();
    let _ = tokio::time::timeout(TASK_STOP_TIMEOUT, forward_handle).await;
    tracing::info!("Forwarding connection closed");

    pool.close().await;
    Ok(())
}

/// Build the fan-out over every configured notification channel.
async fn build_notifiers(config: &WorkerConfig) -> Result<NotifierSet, WorkerError> {
    let mut notifiers = NotifierSet::new();

    if let Some(sns) = config.sns.clone() {
        notifiers = notifiers.with_channel("sns", Arc::new(SnsNotifier::connect(sns).await));
    }
    if let Some(email) = config.email.clone() {
        notifiers = notifiers.with_channel("email", Arc::new(EmailNotifier::new(email)?));
    }
    if let Some(url) = &config.webhook_url {
        notifiers = notifiers.with_channel("webhook", Arc::new(WebhookNotifier::new(url.as_str())?));
    }

    Ok(notifiers)
}
