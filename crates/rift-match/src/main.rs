//! Rift predicate matching CLI
//!
//! Validates imposter definitions and resolves normalized requests against
//! them, printing one JSON match report per resolution.
//!
//! Usage:
//!   rift-match check <imposter>
//!   rift-match resolve <imposter> <requests>... [--times N]

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rift_match::imposter::{Imposter, ImposterConfig};
use rift_match::request::load_requests;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Rift predicate matching engine
#[derive(Parser, Debug)]
#[command(name = "rift-match")]
#[command(
    author,
    version,
    about = "Resolve requests against Mountebank-compatible imposter definitions"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn", env = "RIFT_LOG_LEVEL")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate an imposter definition (JSON or YAML)
    Check {
        /// Path to the imposter file
        imposter: PathBuf,
    },
    /// Resolve requests against an imposter, in order
    Resolve {
        /// Path to the imposter file
        imposter: PathBuf,

        /// Request files: one object or an array of objects each
        #[arg(required = true)]
        requests: Vec<PathBuf>,

        /// Resolve the whole request sequence this many times
        #[arg(short, long, default_value_t = 1)]
        times: u32,

        /// Report what would match without advancing response cursors
        #[arg(long)]
        preview: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Text => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

fn build_imposter(path: &Path) -> anyhow::Result<Imposter> {
    let config = ImposterConfig::from_file(path)?;
    Imposter::from_config(&config)
        .with_context(|| format!("Invalid imposter definition: {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_format);

    match args.command {
        Command::Check { imposter } => {
            let built = build_imposter(&imposter)?;
            println!(
                "{}: ok ({} protocol, {} stubs)",
                imposter.display(),
                built.protocol,
                built.stubs().len()
            );
        }
        Command::Resolve {
            imposter,
            requests,
            times,
            preview,
        } => {
            let built = build_imposter(&imposter)?;

            let mut loaded = Vec::new();
            for path in &requests {
                loaded.extend(load_requests(path)?);
            }
            info!("Resolving {} requests x{}", loaded.len(), times);

            for _ in 0..times {
                for request in &loaded {
                    let report = if preview {
                        built.preview(request).report(None)
                    } else {
                        built.resolve_report(request)
                    };
                    println!("{}", serde_json::to_string(&report)?);
                }
            }
        }
    }

    Ok(())
}
