use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tada_calendar::{create_app, AppState, CalendarConfig, TaskStore};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tada Calendar - Serve synced tasks as an iCalendar feed
#[derive(Parser, Debug)]
#[command(name = "tada-calendar")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host address to bind the server to
    #[arg(long, short = 'H', default_value = "127.0.0.1", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "8787", env = "PORT")]
    port: u16,

    /// JSON file holding the last synced tasks
    #[arg(long, default_value = "tada-calendar.json", env = "TADA_CALENDAR_DATA")]
    data: PathBuf,

    /// Alarm offset from the start of the due day (negative fires the evening before)
    #[arg(
        long,
        default_value = "540",
        env = "TADA_REMINDER_MINUTES",
        allow_negative_numbers = true
    )]
    reminder_minutes: i64,

    /// Calendar display name
    #[arg(long, default_value = "Tada", env = "TADA_CALENDAR_NAME")]
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tada_calendar=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = TaskStore::new(&cli.data);
    let calendar = CalendarConfig {
        calendar_name: cli.name,
        reminder_minutes: cli.reminder_minutes,
    };
    let state = AppState::load(store, calendar)
        .await
        .with_context(|| format!("failed to load `{}`", cli.data.display()))?;
    tracing::info!(
        tasks = state.tasks.read().await.len(),
        data = %cli.data.display(),
        "loaded synced tasks"
    );

    let app = create_app(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
