//! Receipt service
//!
//! One process runs both halves of the pipeline:
//! - `POST /v1/receipt` validates a receipt and produces it to the receipts topic
//! - a stream worker consumes the topic and mails each receipt to its customer
//!
//! Shutdown order: HTTP stops accepting, the worker finishes its cycle, then the
//! producer and the consumer are closed.

pub mod broker;
pub mod config;
pub mod shutdown;

use axum::Router;
use axum::http::StatusCode;
use config::AppConfig;
use core_config::FromEnv;
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_receipts::{Receipt, ReceiptService, handlers};
use email::{EmailProvider, HttpMailProvider, MailConfig, MailProviderKind, MockEmailProvider, ReceiptNotifier};
use eyre::WrapErr;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{EventProducer, HealthState, ProducerConfig, StreamWorker, WorkerConfig, health_router, init_metrics};
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, warn};

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const BANNER: &str = r"
  ____                _       _
 |  _ \ ___  ___ ___ (_)_ __ | |_
 | |_) / _ \/ __/ _ \| | '_ \| __|
 |  _ <  __/ (_|  __/| | |_) | |_
 |_| \_\___|\___\___||_| .__/ \__|
                       |_|
";

type Notifier = ReceiptNotifier<dyn EmailProvider>;

/// Intake and health routes behind the tracing and handler timeout layers.
pub fn router(service: Arc<ReceiptService>, handler_timeout: Duration) -> Router {
    handlers::router(service)
        .merge(health_router(HealthState::new(APP_NAME, APP_VERSION)))
        .layer(TimeoutLayer::with_status_code(StatusCode::SERVICE_UNAVAILABLE, handler_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

fn mail_provider(config: &MailConfig) -> eyre::Result<Arc<dyn EmailProvider>> {
    Ok(match config.provider {
        MailProviderKind::Http => {
            Arc::new(HttpMailProvider::from_config(config).wrap_err("failed to build mail provider")?)
        }
        MailProviderKind::Mock => {
            warn!("Using the mock mail provider; receipts are not delivered");
            Arc::new(MockEmailProvider::new())
        }
    })
}

pub async fn run() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let config = AppConfig::from_env().wrap_err("failed to load configuration")?;
    init_tracing(&config.environment, &config.log_level);

    println!("{BANNER}");
    info!(version = APP_VERSION, config = ?config, "Configuration loaded");

    init_metrics();

    let producer_config =
        ProducerConfig::new(&config.broker.topic).with_min_insync_replicas(config.broker.min_insync_replicas);
    let worker_config = WorkerConfig::new(&config.broker.topic, &config.broker.consumer_group);

    let clients = broker::connect(&config.broker, &producer_config, &worker_config)
        .await
        .wrap_err("failed to connect to broker")?;

    let producer = EventProducer::new(clients.admin, clients.writer, producer_config);
    producer
        .init_topic(config.broker.partitions, config.broker.replication_factor)
        .await
        .wrap_err_with(|| format!("failed to provision topic {:?}", config.broker.topic))?;

    let notifier: Arc<Notifier> = Arc::new(
        ReceiptNotifier::new(mail_provider(&config.mail)?, &config.mail.from).with_concurrency(config.mail.concurrency),
    );
    let mut worker: StreamWorker<Receipt, Notifier> = StreamWorker::new(clients.reader, notifier, worker_config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown::spawn_signal_listener(shutdown_tx.clone());

    let worker_shutdown = shutdown_rx.clone();
    let worker_task = tokio::spawn(async move {
        let result = worker.run(worker_shutdown).await;
        (worker, result)
    });

    let service = Arc::new(ReceiptService::new(producer, config.broker.produce_timeout));
    let app = router(service.clone(), config.server.handler_timeout);

    let serve_result = serve(app, &config, shutdown_rx).await;
    shutdown_tx.send_replace(true);

    match worker_task.await {
        Ok((worker, result)) => {
            if let Err(e) = result {
                error!(error = %e, "Consumer stopped with error");
            }
            if let Err(e) = service.producer().close().await {
                error!(error = %e, "Failed to close producer");
            }
            if let Err(e) = worker.close().await {
                error!(error = %e, "Failed to close consumer");
            }
        }
        Err(e) => {
            error!(error = %e, "Consumer task panicked");
            if let Err(e) = service.producer().close().await {
                error!(error = %e, "Failed to close producer");
            }
        }
    }

    serve_result?;
    info!("Receipt service shutdown complete");
    Ok(())
}

/// Serve until shutdown, then drain in-flight requests for at most the configured timeout.
async fn serve(app: Router, config: &AppConfig, shutdown: watch::Receiver<bool>) -> eyre::Result<()> {
    let bind = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .wrap_err_with(|| format!("failed to bind {bind}"))?;
    info!(addr = %listener.local_addr()?, "Receipt service listening");

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::triggered(shutdown.clone()))
        .into_future();
    tokio::pin!(server);

    let drain_timeout = config.server.shutdown_timeout;
    let deadline = async {
        shutdown::triggered(shutdown).await;
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = &mut server => result.wrap_err("HTTP server error")?,
        _ = deadline => warn!(timeout = ?drain_timeout, "Graceful shutdown timed out, dropping open connections"),
    }

    info!("HTTP server stopped");
    Ok(())
}
