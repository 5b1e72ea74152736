use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;

use reminder_api::state::AppState;
use reminder_common::config::{AppConfig, DirectorySource};
use reminder_common::db;
use reminder_engine::directory::{PgDirectory, RecipientDirectory, StaticDirectory};
use reminder_engine::ledger::DeliveryLedger;
use reminder_engine::processor::EventProcessor;
use reminder_notifier::gateway::{GatewayConfig, RaspiSmsGateway};
use reminder_scheduler::scheduler::ReminderScheduler;
use reminder_scheduler::signal::ShutdownSignal;
use reminder_scheduler::source::HttpEventSource;

#[derive(Parser)]
#[command(name = "reminder-scheduler", version, about = "Calendar event SMS reminders")]
struct Cli {
    /// Override the delivery ledger path (LEDGER_PATH)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll on a fixed interval until SIGINT or SIGTERM (default)
    Run,
    /// Run a single cycle and exit; a stop signal waits for the cycle
    Once,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "reminder_scheduler=info,reminder_engine=info,reminder_notifier=info,reminder_api=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    // Before any cycle can start: a stop request must never land between a
    // gateway acknowledgment and the ledger write.
    let mut shutdown = ShutdownSignal::install()?;

    tracing::info!("Reminder scheduler starting...");

    // Load configuration
    let mut config = AppConfig::from_env()?;
    if let Some(path) = cli.ledger {
        config.ledger_path = path;
    }

    // An unreadable ledger is fatal: running without it would re-notify everyone.
    let ledger = match DeliveryLedger::load(&config.ledger_path) {
        Ok(ledger) => Arc::new(ledger),
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start with an untrustworthy ledger");
            return Err(e.into());
        }
    };

    let directory: Arc<dyn RecipientDirectory> = match &config.directory {
        DirectorySource::Postgres { database_url } => {
            let pool = db::create_pool(database_url, config.db_max_connections).await?;
            Arc::new(PgDirectory::new(pool))
        }
        DirectorySource::File { path } => Arc::new(StaticDirectory::from_json_file(path)?),
    };

    let gateway = RaspiSmsGateway::new(GatewayConfig {
        url: config.gateway_url.clone(),
        api_key: config.gateway_api_key.clone(),
        phone_id: config.gateway_phone_id.clone(),
        timeout: config.http_timeout(),
    })?;
    let source = HttpEventSource::new(config.events_url.clone(), config.http_timeout())?;

    let processor = EventProcessor::new(
        directory,
        ledger.clone(),
        Arc::new(gateway),
        config.send_delay(),
    )
    .with_lookup_timeout(config.http_timeout());
    let scheduler = Arc::new(ReminderScheduler::new(
        Arc::new(source),
        processor,
        config.poll_interval(),
    ));

    match cli.command.unwrap_or(Command::Run) {
        Command::Once => {
            let report = scheduler
                .run_cycle_until(async {
                    let name = shutdown.recv().await;
                    tracing::info!(signal = name, "Stop requested");
                })
                .await;
            tracing::info!(report = %serde_json::to_string(&report)?, "Single cycle finished");
        }
        Command::Run => run(scheduler, ledger, &config, shutdown).await?,
    }

    tracing::info!("Reminder scheduler stopped.");
    Ok(())
}

async fn run(
    scheduler: Arc<ReminderScheduler>,
    ledger: Arc<DeliveryLedger>,
    config: &AppConfig,
    mut shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    if let Some(addr) = &config.status_addr {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| anyhow::anyhow!("STATUS_ADDR must be a socket address, got {addr}"))?;
        let state = AppState::new(ledger, scheduler.status());
        tokio::spawn(async move {
            if let Err(e) = reminder_api::serve(addr, state).await {
                tracing::error!(error = %e, "Status API exited with error");
            }
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    let name = shutdown.recv().await;
    tracing::info!(signal = name, "Received shutdown signal, finishing current cycle...");
    let _ = shutdown_tx.send(true);

    worker.await?;
    Ok(())
}
