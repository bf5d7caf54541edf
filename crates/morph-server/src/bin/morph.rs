//! MorphDB command-line front end
//!
//! The `morph` binary opens a database, runs one request through the
//! router and prints the response status and JSON body.
//!
//! # Usage
//!
//! ```bash
//! # Create a table in a persistent data directory
//! morph --data-dir /var/lib/morphdb POST table/ '{"fields": {"name": "STR"}}'
//!
//! # Add a row
//! morph --data-dir /var/lib/morphdb POST table/<id>/row '{"fields": {"name": "Adam"}}'
//!
//! # Read it back, body from stdin works too
//! morph --data-dir /var/lib/morphdb GET table/<id>/rows
//!
//! # Show the effective configuration
//! morph --config /etc/morphdb/morph.toml --print-config
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use morph_server::config::ServerConfig;
use morph_server::database::Database;
use morph_server::router::Router;

/// MorphDB command-line front end
#[derive(Parser, Debug)]
#[command(
    name = "morph",
    author = "MorphDB Team",
    version,
    about = "MorphDB runtime-defined tables",
    long_about = "MorphDB stores tables whose fields are defined and changed at runtime.\n\n\
                  Each invocation executes one request (create table, edit table, add row\n\
                  or list rows) and prints the status code and JSON response."
)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE", env = "MORPH_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for persistent storage
    #[arg(short = 'd', long, value_name = "DIR", env = "MORPH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Run in memory-only mode (no persistence), overriding --data-dir
    #[arg(long)]
    memory: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "MORPH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Table lock timeout in milliseconds
    #[arg(long, value_name = "MS", env = "MORPH_LOCK_TIMEOUT_MS")]
    lock_timeout_ms: Option<u64>,

    /// Print configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Request method (GET, POST, PUT)
    #[arg(required_unless_present = "print_config")]
    method: Option<String>,

    /// Request path, e.g. table/<id>/rows
    #[arg(required_unless_present = "print_config")]
    path: Option<String>,

    /// JSON request body; "-" reads it from stdin
    body: Option<String>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;

    // Print config and exit if requested
    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    init_logging(&args, &config);
    run_request(&args, &config)
}

fn init_logging(args: &Args, config: &ServerConfig) {
    let level = if args.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };

    let filter = EnvFilter::try_new(format!(
        "morph_server={level},morph_engine={level},morph_storage={level},morph_txn={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    // Start with defaults
    let mut config = if let Some(path) = &args.config {
        ServerConfig::from_file(path).context("Failed to load config file")?
    } else {
        ServerConfig::default()
    };

    // Override with command-line arguments
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = Some(dir.clone());
    }

    if args.memory {
        config.storage.data_dir = None;
    }

    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    if let Some(ms) = args.lock_timeout_ms {
        config.engine.lock_timeout_ms = ms;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn read_body(args: &Args) -> Result<Option<String>> {
    match args.body.as_deref() {
        Some("-") => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read request body from stdin")?;
            Ok(Some(body))
        }
        other => Ok(other.map(str::to_string)),
    }
}

fn run_request(args: &Args, config: &ServerConfig) -> Result<ExitCode> {
    let (Some(method), Some(path)) = (args.method.as_deref(), args.path.as_deref()) else {
        anyhow::bail!("METHOD and PATH are required");
    };
    let body = read_body(args)?;

    let db = Arc::new(Database::open(config).context("Failed to open database")?);
    let router = Router::new(Arc::clone(&db));

    let response = router.handle(method, path, body.as_deref());
    info!(method, path, status = response.status, "request complete");

    println!("{}", response.status);
    println!(
        "{}",
        serde_json::to_string_pretty(&response.body).context("Failed to render response")?
    );

    drop(router);
    if let Ok(db) = Arc::try_unwrap(db) {
        db.close();
    }

    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
