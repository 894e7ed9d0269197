//! citetree CLI
//!
//! Builds a local citation graph from seed papers and inspects it.
//! Exit codes: 0 success, 1 not found, 2 input error, 3 API error,
//! 4 rate limited.

mod commands;
mod input;
mod plan;

use citetree_common::config::ObservabilityConfig;
use citetree_common::errors::{AppError, Result};
use citetree_common::{metrics, AppConfig};
use clap::Parser;
use commands::AddArgs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// citetree: incremental citation-graph crawler
#[derive(Parser, Debug)]
#[command(name = "citetree", version, about, long_about = None)]
struct Cli {
    /// SQLite database path (defaults to database.url, i.e. citetree.db)
    #[arg(short, long, global = true)]
    db: Option<PathBuf>,

    /// Configuration file (defaults to config/default, config/local and CITETREE__ variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Add paper(s) as roots and crawl their citation trees
    ///
    /// Stores all edges at each level but only traverses influential ones.
    Add(AddArgs),
    /// List exploration roots
    Roots,
    /// Show database statistics
    Status,
    /// Full-text search over stored papers (JSON lines)
    Search {
        /// Search terms, all of which must match
        query: String,

        /// Maximum results
        #[arg(short, long, default_value_t = 20)]
        limit: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    init_tracing(&config.observability, cli.quiet, cli.json_logs);
    metrics::register_metrics();
    debug!(version = citetree_common::VERSION, "Starting citetree");

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.code().as_code(), error = %e, "Command failed");
            eprintln!("Error: {}", e);
            if e.is_rate_limited() {
                eprintln!("Wait a moment and retry, or set S2_API_KEY.");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let db = cli.db.as_deref();
    match cli.command {
        Commands::Add(args) => commands::add(args, db, config, cli.quiet).await,
        Commands::Roots => commands::roots(db, config).await,
        Commands::Status => commands::status(db, config).await,
        Commands::Search { query, limit } => commands::search(db, config, &query, limit).await,
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => {
            let path = path.to_str().ok_or_else(|| AppError::InvalidInput {
                message: format!("Config path is not valid UTF-8: {}", path.display()),
            })?;
            AppConfig::from_file(path)?
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

/// Logs go to stderr so stdout stays data-only; RUST_LOG overrides the level
fn init_tracing(config: &ObservabilityConfig, quiet: bool, json: bool) {
    let level = if quiet { "warn" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json || config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add() {
        let cli = Cli::parse_from([
            "citetree",
            "add",
            "arXiv:1706.03762",
            "--db",
            "papers.db",
            "--depth",
            "3",
            "-I",
        ]);

        assert_eq!(cli.db, Some(PathBuf::from("papers.db")));
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.ids, vec!["arXiv:1706.03762"]);
                assert_eq!(args.depth, Some(3));
                assert!(args.influential_only);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::parse_from(["citetree", "-q", "search", "graph neural", "--limit", "5"]);
        assert!(cli.quiet);
        assert_eq!(cli.db, None);
        assert!(matches!(cli.command, Commands::Search { limit: 5, .. }));
    }
}
