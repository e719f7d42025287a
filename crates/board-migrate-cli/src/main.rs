//! board-migrate CLI - Rhymix/XE to GNUBoard forum migration.

use board_migrate::{Config, MigrateError, MigrationResult, Orchestrator};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "board-migrate")]
#[command(about = "Migrate a Rhymix/XE forum into GNUBoard")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Also write logs to this file (no ANSI colors)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate boards, posts, menus, members and the site title
    Run {
        /// Log every write without touching the destination
        #[arg(long)]
        dry_run: bool,

        /// Override rows fetched per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override the memory budget used to cap the batch size
        #[arg(long, env = "BOARD_MIGRATE_MEMORY_LIMIT_MB")]
        memory_limit_mb: Option<u64>,
    },

    /// Detect the legacy prefix and list the boards a run would migrate
    Detect,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format, cli.log_file.as_deref())?;

    let mut config = Config::load(&cli.config)?.with_auto_tuning();
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            dry_run,
            batch_size,
            memory_limit_mb,
        } => {
            if let Some(size) = batch_size {
                config.migration.batch_size = Some(size);
            }
            if let Some(limit) = memory_limit_mb {
                config.migration.memory_limit_mb = Some(limit);
            }
            config.validate()?;

            let cancel_token = setup_signal_handler()?;
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.run(cancel_token, dry_run).await;
            orchestrator.close().await;
            let result = result?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result);
            }

            if result.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }
        }

        Commands::Detect => {
            let orchestrator = Orchestrator::new(config).await?;
            let report = orchestrator.detect().await;
            orchestrator.close().await;
            let report = report?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Legacy prefix: {}", report.prefix);
                println!("Boards: {}", report.boards.len());
                for board in &report.boards {
                    println!(
                        "  {} <- module_srl={} ({}), {} documents{}{}",
                        board.board_key,
                        board.module_srl,
                        board.title,
                        board.documents,
                        if board.board_exists { ", board exists" } else { "" },
                        if board.post_table_exists {
                            ", post table exists"
                        } else {
                            ""
                        }
                    );
                }
            }
        }

        Commands::HealthCheck => {
            let result = Orchestrator::health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source ({}): {} ({}ms)",
                    config.source.endpoint(),
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target ({}): {} ({}ms)",
                    config.target.endpoint(),
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::pool("Health check failed", "health-check"));
            }
        }
    }

    Ok(())
}

fn print_summary(result: &MigrationResult) {
    let status_msg = match (result.is_cancelled(), result.dry_run) {
        (true, _) => "Migration cancelled.",
        (false, true) => "Dry run completed!",
        (false, false) => "Migration completed!",
    };
    let stats = &result.stats;

    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Legacy prefix: {}", result.source_prefix);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Boards: {} created, {} existing ({} found)",
        stats.boards_created, stats.boards_existing, result.boards_total
    );
    println!(
        "  Posts: {} created, {} existing, {} deleted skipped",
        stats.posts_created, stats.posts_existing, stats.documents_deleted
    );
    println!(
        "  Menus: {} created, {} existing",
        stats.menus_created, stats.menus_existing
    );
    println!(
        "  Members: {} created, {} existing, {} invalid",
        stats.members_created, stats.members_existing, stats.members_invalid
    );
    if result.dry_run {
        println!("  Planned mutations: {}", result.planned_mutations.len());
    }
    if let (Some(title), Some(action)) = (&result.site_title, result.site_config) {
        println!("  Site title: {} ({:?})", title, action);
    }
    if !result.truncated_bodies.is_empty() {
        println!("  Truncated bodies:");
        for t in &result.truncated_bodies {
            println!(
                "    {} wr_id={} document_srl={}: {} -> {} characters",
                t.table,
                t.post_id,
                t.document_srl
                    .map(|srl| srl.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                t.original_chars,
                t.stored_chars
            );
        }
    }
}

fn setup_logging(verbosity: &str, format: &str, log_file: Option<&Path>) -> Result<(), MigrateError> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = fmt::layer().with_target(false).with_writer(std::io::stderr);
    if format == "json" {
        layers.push(console.json().with_filter(level).boxed());
    } else {
        layers.push(console.with_filter(level).boxed());
    }

    if let Some(path) = log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .with_filter(level)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| MigrateError::Config(format!("Failed to initialize logging: {}", e)))
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token_int = cancel_token.clone();
    tokio::spawn(async move {
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Finishing the current row and stopping...");
        token_int.cancel();
    });

    let token_term = cancel_token.clone();
    tokio::spawn(async move {
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Finishing the current row and stopping...");
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing the current row and stopping...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
