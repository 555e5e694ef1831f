use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use outbox_relay::{http, InMemoryStore, LogBroker, Outbox, OutboxConfig};

#[derive(Parser)]
#[command(name = "order_service", about = "Order service relaying events through a transactional outbox")]
struct Cli {
    /// Run as the dispatching (leader) instance.
    #[arg(long, env = "OUTBOX_LEADER")]
    leader: bool,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "PORT")]
    port: u16,

    /// Milliseconds between outbox dispatch ticks.
    #[arg(long, default_value_t = 10_000, env = "OUTBOX_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// Maximum messages claimed per dispatch cycle.
    #[arg(long, default_value_t = outbox_relay::DEFAULT_BATCH_SIZE, env = "OUTBOX_BATCH_SIZE")]
    batch_size: usize,

    /// Identity stamped on claimed messages.
    #[arg(long, env = "OUTBOX_WORKER_ID")]
    worker_id: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = OutboxConfig::default()
        .with_poll_interval(Duration::from_millis(cli.poll_interval_ms))
        .with_batch_size(cli.batch_size);
    if let Some(worker_id) = cli.worker_id {
        config = config.with_worker_id(worker_id);
    }

    let outbox = Arc::new(Outbox::from_config(
        InMemoryStore::new(),
        LogBroker::new(),
        config,
    ));
    outbox.set_leader(cli.leader);
    if let Err(e) = outbox.start() {
        tracing::error!(error = %e, "failed to start outbox dispatcher");
        std::process::exit(1);
    }

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %addr, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %addr, leader = cli.leader, worker_id = %outbox.worker_id(), "starting server");

    let app = http::router(outbox.clone());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down...");
        })
        .await;
    if let Err(e) = served {
        tracing::error!(error = %e, "server error");
    }

    match tokio::task::spawn_blocking(move || outbox.stop()).await {
        Ok(Ok(stats)) => tracing::info!(
            ticks = stats.ticks,
            messages_sent = stats.messages_sent,
            publish_failures = stats.publish_failures,
            "outbox dispatcher stopped"
        ),
        Ok(Err(e)) => tracing::error!(error = %e, "outbox dispatcher failed to stop cleanly"),
        Err(e) => tracing::error!(error = %e, "outbox shutdown task failed"),
    }
}
