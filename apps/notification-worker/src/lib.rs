//! Notification Worker Service
//!
//! A background worker that processes notification jobs from the
//! "notifications" queue topic.
//!
//! ## Architecture
//!
//! ```text
//! Redis (notifications topic)
//!   ↓ (lease/ack/fail)
//! QueueWorker<NotificationIntent, NotificationProcessor>
//!   ↓ (persists the record, resolves the recipient)
//! MongoDB (notifications + users collections)
//!   ↓ (dispatches by type)
//! SMTP channel (email) / logged extension points (sms, push)
//! ```
//!
//! ## Features
//!
//! - Lease-based delivery with redelivery of stalled jobs
//! - Retry with per-job backoff, terminal failed state when exhausted
//! - Graceful shutdown handling (SIGINT/SIGTERM drains in-flight slots)
//! - Health check endpoints for Kubernetes probes
//! - Prometheus metrics

use axum::Router;
use core_config::{app_info, Environment, FromEnv};
use database::mongodb::MongoConfig;
use database::redis::RedisConfig;
use domain_notifications::{
    MongoNotificationStore, MongoRecipientDirectory, NotificationIntent, NotificationProcessor,
    NotificationTopic, SmtpChannel, SmtpConfig,
};
use eyre::{Result, WrapErr};
use job_queue::{health_router, metrics, HealthState, JobQueue, QueueConfig, QueueWorker, TopicDef};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// Start the health HTTP server
///
/// Provides endpoints for:
/// - Liveness probes: `/health`, `/healthz`
/// - Readiness probes: `/ready`, `/readyz`
/// - Queue monitoring: `/queue/counts`
/// - Prometheus metrics: `/metrics`
async fn start_health_server(health_state: HealthState, port: u16) -> Result<()> {
    let app: Router = health_router(health_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", addr))?;

    info!(port = %port, "Health server listening");

    axum::serve(listener, app)
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Run the notification worker
///
/// This is the main entry point for the worker. It:
/// 1. Sets up structured logging (env-aware: JSON for prod, pretty for dev)
/// 2. Connects to Redis (queue) and MongoDB (records + recipients)
/// 3. Builds the SMTP channel from the environment
/// 4. Runs the worker with graceful shutdown handling
///
/// # Errors
///
/// Returns an error if any configuration is invalid, a connection
/// fails, or the worker encounters a fatal error.
pub async fn run() -> Result<()> {
    // Initialize tracing (env-aware: JSON for prod, pretty for dev)
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    // Initialize Prometheus metrics
    metrics::init_metrics();

    let app_info = app_info!();
    info!(
        name = %app_info.name,
        version = %app_info.version,
        environment = ?environment,
        "Starting notification worker service"
    );

    // Health server port (default 8082)
    let health_port: u16 = std::env::var("WORKER_HEALTH_PORT")
        .or_else(|_| std::env::var("HEALTH_PORT"))
        .unwrap_or_else(|_| "8082".to_string())
        .parse()
        .unwrap_or(8082);

    // Connect to Redis with retry logic
    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;
    info!("Connecting to Redis...");
    let redis = database::redis::connect_from_config_with_retry(&redis_config, None)
        .await
        .wrap_err("Failed to connect to Redis")?;

    // Connect to MongoDB with retry logic
    let mongo_config = MongoConfig::from_env().wrap_err("Failed to load MongoDB configuration")?;
    info!("Connecting to MongoDB...");
    let mongo = database::mongodb::connect_from_config_with_retry(&mongo_config, None)
        .await
        .wrap_err("Failed to connect to MongoDB")?;
    let db = mongo.database(&mongo_config.database);

    // Record store and recipient directory
    let store = MongoNotificationStore::new(&db);
    store
        .ensure_indexes()
        .await
        .wrap_err("Failed to create notification indexes")?;
    let directory = MongoRecipientDirectory::new(&db);

    // Email channel; the transport itself is built lazily on first send
    let smtp_config = SmtpConfig::from_env().wrap_err("Failed to load SMTP configuration")?;
    info!(host = %smtp_config.host, port = %smtp_config.port, "Email channel configured");
    let mailer = SmtpChannel::new(smtp_config);

    // Queue and worker configuration from the topic definition
    let queue = Arc::new(JobQueue::<NotificationIntent>::from_topic_def::<
        NotificationTopic,
    >(redis.clone()));

    let batch_size: usize = core_config::env_parse_or("WORKER_BATCH_SIZE", 10)
        .wrap_err("Invalid WORKER_BATCH_SIZE")?;
    let max_concurrent_jobs: usize = core_config::env_parse_or("WORKER_CONCURRENCY", 4)
        .wrap_err("Invalid WORKER_CONCURRENCY")?;

    let worker_config = QueueConfig::from_topic_def::<NotificationTopic>()
        .with_batch_size(batch_size)
        .with_max_concurrent_jobs(max_concurrent_jobs);
    info!(
        topic = %worker_config.topic,
        consumer_id = %worker_config.consumer_id,
        batch_size = %worker_config.batch_size,
        max_concurrent_jobs = %worker_config.max_concurrent_jobs,
        "Worker configuration loaded"
    );

    let processor = NotificationProcessor::new(store, directory, mailer);

    // Set up the shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    // Start health server in background
    let health_state = HealthState::new(
        Arc::new(redis.clone()),
        app_info.name,
        app_info.version,
        NotificationTopic::NAME,
    );
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, health_port).await {
            error!(error = %e, "Health server failed");
        }
    });

    // Run the worker; returns once in-flight slots have drained
    info!("Starting notification processor...");
    let worker = QueueWorker::new(queue.clone(), processor, worker_config);
    worker
        .run(shutdown_rx)
        .await
        .wrap_err("Worker encountered a fatal error")?;

    queue.close().await.wrap_err("Failed to close the queue")?;

    info!("Notification worker service stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}
