use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use s2sql_resolver::semantic::loader;
use s2sql_resolver::{DraftRequest, DraftResponse, ResolutionCoordinator, ResolveRequest, ResolverConfig};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "s2sql-resolve")]
#[command(about = "Bind a drafted SQL query to the semantic catalog")]
struct Args {
    /// Path to the catalog JSON file
    #[arg(long)]
    catalog: PathBuf,

    /// Path to a resolve request JSON file
    #[arg(long, conflicts_with_all = ["sql", "question"])]
    request: Option<PathBuf>,

    /// Draft SQL over business names
    #[arg(long, requires = "question")]
    sql: Option<String>,

    /// The natural-language question the draft answers
    #[arg(long, requires = "sql")]
    question: Option<String>,

    /// Model cluster hint
    #[arg(long)]
    cluster: Option<String>,

    /// Reference date for default windows, YYYY-MM-DD (default: today)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Path to a resolver config JSON file (default: S2SQL_* environment)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn build_request(args: &Args) -> Result<ResolveRequest> {
    if let Some(path) = &args.request {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request {}", path.display()))?;
        return serde_json::from_str(&contents).context("failed to parse request JSON");
    }

    let (sql, question) = match (&args.sql, &args.question) {
        (Some(sql), Some(question)) => (sql, question),
        _ => anyhow::bail!("either --request or both --sql and --question are required"),
    };
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let mut draft = DraftRequest::new(question, date);
    if let Some(cluster) = &args.cluster {
        draft = draft.with_cluster_hint(cluster);
    }
    Ok(ResolveRequest::new(draft, DraftResponse::new(sql)))
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ResolverConfig::from_file(path)?,
        None => ResolverConfig::from_env()?,
    };
    let (catalog, values) = loader::load_from_file(&args.catalog)?;
    info!(
        clusters = catalog.clusters().count(),
        metrics = catalog.metric_count(),
        dimensions = catalog.dimension_count(),
        values = values.len(),
        "loaded catalog"
    );

    let request = build_request(&args)?;
    let coordinator = ResolutionCoordinator::from_catalog(catalog, values, config);

    match coordinator.resolve(&request) {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            error!(kind = ?e.kind(), "resolution failed");
            eprintln!("{:?}: {}", e.kind(), e);
            std::process::exit(1);
        }
    }
}
