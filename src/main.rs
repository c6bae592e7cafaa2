use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use todolist::config::{self, LoggingConfig, StoreBackend};
use todolist::error::AppError;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[derive(Debug, Parser)]
#[command(name = "todolist", version, about = "Terminal to-do list with deadline countdowns")]
struct Args {
    /// Config file; defaults apply when it does not exist.
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Overrides `store.backend`.
    #[arg(long, value_enum)]
    store: Option<StoreBackend>,

    /// Overrides `ui.tick_ms`.
    #[arg(long)]
    tick_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = real_main().await {
        eprintln!("todolist: {e}");
        std::process::exit(1);
    }
}

async fn real_main() -> Result<(), AppError> {
    let args = Args::parse();
    let mut cfg = config::load(&args.config)?;
    if let Some(backend) = args.store {
        cfg.store.backend = backend;
    }
    if let Some(tick_ms) = args.tick_ms {
        cfg.ui.tick_ms = tick_ms;
    }
    cfg.validate()?;

    init_tracing(&cfg.logging).map_err(AppError::Logging)?;
    tracing::info!(config = %args.config.display(), backend = ?cfg.store.backend, "starting");

    todolist::app::run(cfg).await
}

/// The terminal belongs to the UI, so logs only go to a file.
fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let dir = match logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(d) => PathBuf::from(d),
        None => std::env::temp_dir().join("todolist"),
    };
    std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;

    let appender = tracing_appender::rolling::never(dir, "todolist.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    Ok(())
}
