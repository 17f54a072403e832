//! Command-line driver for the geneagraph crawler.
//!
//! Builds a genealogy graph from the seed record ids given on the
//! command line, renders a progress bar on stderr while the crawl is
//! running, and prints the finished graph as JSON on stdout.

mod cache;
mod error;
mod progress;

use crate::cache::SledCache;
use crate::error::CliError;
use crate::progress::ProgressBar;
use clap::{Parser, ValueEnum};
use geneagraph_core::{
    build_graph, BuildOptions, RecordId, TraverseDirection, TraverseItem,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "geneagraph")]
#[command(about = "Build a mathematician genealogy graph from seed record ids")]
#[command(version)]
struct Cli {
    /// Seed record ids to start the crawl from
    #[arg(required = true)]
    ids: Vec<u32>,

    /// Which neighbor links to follow from every record
    #[arg(long, value_enum, default_value = "advisors")]
    direction: DirectionArg,

    /// Stop committing records once the graph holds this many
    #[arg(long)]
    max_records: Option<usize>,

    /// Maximum number of in-flight HTTP requests
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// User-Agent header sent with every request
    #[arg(long)]
    user_agent: Option<String>,

    /// Persist fetched records in a sled database at this path
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Suppress the stderr progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DirectionArg {
    Advisors,
    Descendants,
    Both,
}

impl From<DirectionArg> for TraverseDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Advisors => TraverseDirection::ADVISORS,
            DirectionArg::Descendants => TraverseDirection::DESCENDANTS,
            DirectionArg::Both => TraverseDirection::ADVISORS | TraverseDirection::DESCENDANTS,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let direction = TraverseDirection::from(cli.direction);
    let seeds = cli
        .ids
        .iter()
        .map(|&id| TraverseItem::new(RecordId(id), direction))
        .collect::<Result<Vec<_>, _>>()?;

    let mut options =
        BuildOptions::new().with_http_gate(Arc::new(Semaphore::new(cli.concurrency)));
    if let Some(max_records) = cli.max_records {
        options = options.with_max_records(max_records);
    }
    if let Some(user_agent) = cli.user_agent {
        options = options.with_user_agent(user_agent);
    }
    if let Some(path) = &cli.cache {
        options = options.with_cache(Arc::new(SledCache::open(path)?));
    }
    if !cli.quiet {
        options = options.with_progress_observer(Arc::new(ProgressBar::new()));
    }

    info!(seeds = cli.ids.len(), "starting crawl");
    let graph = build_graph(&seeds, options).await?;
    if !cli.quiet {
        // Terminate the progress bar line before the JSON output.
        eprintln!();
    }
    info!(nodes = graph.nodes.len(), status = ?graph.status, "crawl finished");

    println!("{}", serde_json::to_string(&graph)?);
    Ok(())
}
