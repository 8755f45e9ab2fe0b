use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use warden::cli::{Cli, Commands};
use warden::config::AppConfig;
use warden::domain::{AlertEvent, Severity};
use warden::error::Result;
use warden::status::StatusServer;
use warden::{Supervisor, WardenError};

const DEFAULT_STATUS_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::CheckConfig) => {
            init_logging_simple();
            let config = load_validated(&cli.config)?;
            println!(
                "configuration OK: {} service(s), {} channel(s) enabled",
                config.services.len(),
                enabled_channels(&config)
            );
            Ok(())
        }
        Some(Commands::Check { service }) => {
            init_logging_simple();
            let config = load_validated(&cli.config)?;
            let supervisor = Supervisor::new(config)?;
            let result = supervisor.check_once(service).await?;
            if result.healthy {
                println!("{service}: healthy");
            } else {
                println!(
                    "{service}: unhealthy ({})",
                    result.detail.as_deref().unwrap_or("no detail")
                );
            }
            Ok(())
        }
        Some(Commands::Run) | None => {
            let config = load_validated(&cli.config)?;
            init_logging(&config);
            run_supervisor(config).await
        }
    }
}

async fn run_supervisor(config: AppConfig) -> Result<()> {
    let port = config.status_port.unwrap_or(DEFAULT_STATUS_PORT);
    let supervisor = Arc::new(Supervisor::new(config)?);
    info!(
        services = supervisor.specs().len(),
        "warden starting"
    );

    // Startup notification so operators see supervision gaps
    supervisor
        .ingest_alert(AlertEvent::new(
            Severity::Info,
            "warden",
            "started",
            format!("warden started, supervising {} service(s)", supervisor.specs().len()),
            chrono::Utc::now(),
        ))
        .await;

    let server = StatusServer::new(Arc::clone(&supervisor), port);
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Status server failed: {}", e);
        }
    });

    let loops = Arc::clone(&supervisor);
    tokio::select! {
        _ = loops.run() => {}
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping");
        }
    }

    server_task.abort();
    supervisor
        .ingest_alert(AlertEvent::new(
            Severity::Info,
            "warden",
            "stopped",
            "warden shutting down, services are unsupervised",
            chrono::Utc::now(),
        ))
        .await;
    info!("warden stopped");
    Ok(())
}

fn load_validated(config_dir: &str) -> Result<AppConfig> {
    let config = AppConfig::load_from(config_dir)?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("config error: {e}");
        }
        return Err(WardenError::InvalidConfig(format!(
            "{} validation error(s)",
            errors.len()
        )));
    }
    Ok(config)
}

fn enabled_channels(config: &AppConfig) -> usize {
    [
        config.notifications.email.enabled,
        config.notifications.chat.enabled,
        config.notifications.webhook.enabled,
    ]
    .iter()
    .filter(|e| **e)
    .count()
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,warden={}", config.logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
