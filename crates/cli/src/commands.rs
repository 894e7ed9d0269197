//! Command handlers
//!
//! Results go to stdout; progress and diagnostics go to stderr.

use crate::input::read_stdin_ids;
use crate::plan::CrawlPlan;
use citetree_common::config::{sqlite_path, CrawlerConfig};
use citetree_common::errors::{AppError, Result};
use citetree_common::scholar::SemanticScholarClient;
use citetree_common::{AppConfig, DbPool, Direction, Repository, ScholarClient};
use citetree_crawler::{CrawlParams, ExplorationPipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Arguments of `citetree add`
#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Paper ids: DOI:, arXiv:, PMID:, PMCID:, ACL:, MAG:, CorpusId:, URLs or
    /// native ids. Read from stdin when omitted.
    pub ids: Vec<String>,

    /// Maximum traversal depth
    #[arg(long)]
    pub depth: Option<u32>,

    /// Traversal direction: citations (up, default) or references (down)
    #[arg(long)]
    pub direction: Option<String>,

    /// Maximum citations/references per paper (API max: 1000)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Only store influential edges (traversal is always influential-only)
    #[arg(short = 'I', long)]
    pub influential_only: bool,

    /// YAML crawl plan with settings and papers
    #[arg(long)]
    pub plan: Option<PathBuf>,
}

/// Flags win over the plan, the plan wins over configuration
pub fn crawl_params(args: &AddArgs, plan: &CrawlPlan, defaults: &CrawlerConfig) -> Result<CrawlParams> {
    let mut params = CrawlParams::from_config(defaults);

    let direction = match &args.direction {
        Some(raw) => Some(raw.parse::<Direction>()?),
        None => plan.direction,
    };

    params.depth = args.depth.or(plan.depth).unwrap_or(params.depth);
    params.direction = direction.unwrap_or(params.direction);
    params.limit = args.limit.or(plan.limit).unwrap_or(params.limit);
    params.influential_only =
        args.influential_only || plan.influential_only.unwrap_or(params.influential_only);

    Ok(params)
}

/// `--db` wins over `database.url` from configuration
pub fn store_config(db: Option<&Path>, config: AppConfig) -> AppConfig {
    match db {
        Some(path) => config.with_database_path(path),
        None => config,
    }
}

/// File path of the configured store, or its URL when it has none
fn store_label(config: &AppConfig) -> String {
    match sqlite_path(&config.database.url) {
        Some(path) => path.display().to_string(),
        None => config.database.url.clone(),
    }
}

pub async fn add(args: AddArgs, db: Option<&Path>, config: AppConfig, quiet: bool) -> Result<()> {
    let plan = match &args.plan {
        Some(path) => CrawlPlan::load(path)?,
        None => CrawlPlan::default(),
    };
    let params = crawl_params(&args, &plan, &config.crawler)?;

    let mut ids = args.ids.clone();
    ids.extend(plan.papers.iter().cloned());
    if ids.is_empty() {
        ids = read_stdin_ids()?;
    }
    if ids.is_empty() {
        return Err(AppError::InvalidInput {
            message: "No paper IDs provided".to_string(),
        });
    }

    let config = store_config(db, config);
    let repository = Repository::new(DbPool::new(&config.database).await?);
    let client: Arc<dyn ScholarClient> = Arc::new(SemanticScholarClient::new(&config.scholar)?);

    info!(
        db = %store_label(&config),
        roots = ids.len(),
        depth = params.depth,
        direction = %params.direction,
        "Adding roots"
    );

    let pipeline = ExplorationPipeline::new(repository.clone(), client, &config);
    let summary = pipeline.run(&ids, &params).await?;

    if !quiet {
        for root in &summary.roots {
            eprintln!("Resolved {} -> {}", root.original_id, root.paper_id);
        }
        for id in &summary.unresolved {
            eprintln!("Warning: Could not resolve {}", id);
        }
        if !summary.failed.is_empty() {
            eprintln!("Warning: {} papers could not be fetched", summary.failed.len());
        }

        let stats = repository.stats().await?;
        eprintln!();
        eprintln!("Done!");
        eprintln!("  Discovered: {} ({} new edges)", summary.discovered, summary.edges_written);
        eprintln!("  Roots: {}", stats.roots);
        eprintln!("  Papers: {}", stats.papers);
        eprintln!("  Edges: {}", stats.edges);
    }

    Ok(())
}

pub async fn roots(db: Option<&Path>, config: AppConfig) -> Result<()> {
    let repository = open_existing(&store_config(db, config)).await?;
    let roots = repository.list_roots().await?;

    if roots.is_empty() {
        eprintln!("No roots in database");
        return Ok(());
    }

    println!("Roots ({}):\n", roots.len());
    for summary in roots {
        let root = &summary.root;
        println!("  {}", root.original_id);
        println!("    S2 ID: {}", root.paper_id);
        println!("    Title: {}", truncate(&summary.title, 60));
        println!("    Depth: {} ({})", root.depth, root.direction);
        println!("    Limit: {}{}", root.fetch_limit, if root.influential_only { ", influential only" } else { "" });
        println!("    Added: {}", root.added_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!();
    }

    Ok(())
}

pub async fn status(db: Option<&Path>, config: AppConfig) -> Result<()> {
    let config = store_config(db, config);
    let repository = open_existing(&config).await?;
    let stats = repository.stats().await?;

    println!("Database: {}", store_label(&config));
    println!("  Roots: {}", stats.roots);
    println!("  Papers: {}", stats.papers);
    println!("  Edges: {} ({} influential)", stats.edges, stats.influential_edges);

    Ok(())
}

/// One JSON object per hit, best match first
pub async fn search(db: Option<&Path>, config: AppConfig, query: &str, limit: u64) -> Result<()> {
    let repository = open_existing(&store_config(db, config)).await?;
    let hits = repository.search_papers(query, limit).await?;

    if hits.is_empty() {
        eprintln!("No matching papers");
    }
    for hit in hits {
        println!("{}", serde_json::to_string(&hit)?);
    }

    Ok(())
}

/// Read-only commands never create a database
async fn open_existing(config: &AppConfig) -> Result<Repository> {
    if let Some(path) = sqlite_path(&config.database.url) {
        if !path.exists() {
            return Err(AppError::InvalidInput {
                message: format!("Database not found: {}", path.display()),
            });
        }
    }
    Ok(Repository::new(DbPool::new(&config.database).await?))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
