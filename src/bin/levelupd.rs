//! levelupd: XP and leveling daemon
//!
//! Usage:
//!   levelupd run [--config levelup.toml]   → read activity events on stdin
//!   levelupd curve [--max-level 60]        → print the level threshold table
//!   levelupd config                        → print the default config as TOML

use clap::{Parser, Subcommand};
use levelup::driver;
use levelup_core::{required, xp_step, LevelingConfig};
use levelup_engine::{InMemoryBackend, LevelingEngine, SystemClock, TracingNotifier};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "levelupd",
    about = "XP and leveling engine driven by message and voice activity",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine over newline-delimited JSON events read from stdin
    Run {
        /// Path to config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write logs to a file (in addition to stderr)
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// Emit logs as JSON
        #[arg(long, default_value_t = false)]
        json_logs: bool,
    },
    /// Print cumulative XP required per level
    Curve {
        #[arg(long, default_value_t = 60)]
        max_level: u32,
    },
    /// Print the default configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, log_file, json_logs } => {
            let _guard = init_tracing(log_file.as_deref(), json_logs)?;
            run(config).await?;
        }
        Commands::Curve { max_level } => {
            println!("{:>6} {:>14} {:>10}", "level", "required", "step");
            for level in 1..=max_level {
                println!("{:>6} {:>14} {:>10}", level, required(level), xp_step(level));
            }
        }
        Commands::Config => {
            print!("{}", LevelingConfig::default().to_toml());
        }
    }

    Ok(())
}

fn init_tracing(
    log_file: Option<&std::path::Path>,
    json: bool,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "levelup=info,levelup_engine=info,levelup_core=info".into());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("log file path has no file name"))?;
            let appender =
                tracing_appender::rolling::never(dir.unwrap_or(std::path::Path::new(".")), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let (plain, structured) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .with(file_layer)
        .init();
    Ok(guard)
}

async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from("levelup.toml"));
    let config = LevelingConfig::load(&config_path);

    let backend = InMemoryBackend::new();
    let collaborators = backend.collaborators_with(Arc::new(SystemClock), Arc::new(TracingNotifier));
    let engine = LevelingEngine::new(&config, collaborators);
    let sweepers = engine.start();

    let cancel = sweepers.cancel_token();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            ctrl_c.cancel();
        }
    });

    info!("levelupd v{} reading events from stdin", env!("CARGO_PKG_VERSION"));
    let stats = driver::run(
        &engine,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        cancel,
    )
    .await;

    engine.voice.shutdown_flush().await;
    sweepers.shutdown().await;

    let stats = stats?;
    info!(
        "Handled {} events ({} failed, {} malformed)",
        stats.handled, stats.failed, stats.malformed
    );
    Ok(())
}
