//! Taskdeck: offline-tolerant personal task tracker.
//!
//! Runs one command against the local task set and exits. Configuration
//! via CLI flags, environment variables, or config file
//! (`~/.config/taskdeck/config.toml`).
//!
//! ```bash
//! taskdeck add "Write report" --due 2025-01-10 --category work
//! taskdeck list --filter status:pending --sort priority:desc
//! taskdeck advance task-0192...
//! taskdeck dashboard
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use taskdeck::app::{App, AppError};
use taskdeck::cache::{FileKeyValueStore, KeyValueStore, TaskCache};
use taskdeck::config::{CliArgs, ClientConfig};
use taskdeck::gateway::memory::InMemoryGateway;
use taskdeck::session::Session;
use taskdeck::tasks::{ReconciliationEngine, TaskStore};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Logs go to a file so they never interleave with command output.
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskdeck.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(cli: CliArgs) -> Result<(), AppError> {
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };
    tracing::info!(storage_dir = %config.storage_dir.display(), "taskdeck starting");

    let kv: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(&config.storage_dir));
    let session = Arc::new(Session::init(Arc::clone(&kv)));
    let cache = TaskCache::new(kv);

    // The in-process API starts from the last known set.
    let seed = cache
        .load()
        .into_iter()
        .filter(|t| !t.id.is_placeholder())
        .collect();
    let gateway = Arc::new(InMemoryGateway::with_tasks(seed));

    let (store, mut notifications) = TaskStore::new(
        ReconciliationEngine::new(cache),
        Arc::clone(&gateway),
        Arc::clone(&session),
        config.store.clone(),
    );
    let refresh = session.spawn_refresh_task(gateway, config.token_refresh_interval);

    let app = App::new(store, session);
    app.store().hydrate().await?;
    let result = app
        .run(cli.command.unwrap_or_default(), Utc::now())
        .await;

    app.store().shutdown();
    refresh.abort();

    while let Ok(notification) = notifications.try_recv() {
        if notification.is_error() {
            eprintln!("{notification}");
        } else {
            println!("{notification}");
        }
    }
    for line in result? {
        println!("{line}");
    }

    tracing::info!("taskdeck exiting");
    Ok(())
}
