//! Ferret CLI entry point.

mod repl;

use clap::Parser;
use ferret_core::config::{FerretConfig, project_dirs};
use ferret_core::providers::OpenAiCompatibleClient;
use ferret_core::{FileCheckpointer, ResearchAgent, ResearchGraph, RunConfig, ToolRegistry};
use ferret_tools::TavilySearch;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Ferret - a research agent that searches the web and cites its sources.
#[derive(Parser, Debug)]
#[command(name = "ferret", version, about, long_about = None)]
struct Cli {
    /// Question to answer. Starts an interactive session when omitted.
    query: Option<String>,

    /// Researcher iterations before findings are handed back
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Override the LLM model
    #[arg(short, long)]
    model: Option<String>,

    /// Conversation thread to continue
    #[arg(short, long)]
    thread: Option<String>,

    /// Persist conversation threads as JSON files in this directory
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Additional config file layered over the user and workspace configs
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_overrides(&self, config: &mut FerretConfig) {
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(max) = self.max_iterations {
            config.research.max_iterations = max;
        }
        if let Some(dir) = &self.checkpoint_dir {
            config.research.checkpoint_dir = Some(dir.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = ferret_core::load_config(Some(&workspace), cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    cli.apply_overrides(&mut config);

    let _guard = init_tracing(cli.verbose, &config);

    let agent = build_agent(&config)?;
    let thread_id = cli
        .thread
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if let Some(query) = cli.query {
        repl::run_single_query(&agent, &thread_id, &query).await
    } else {
        repl::run_interactive(&agent, &thread_id).await
    }
}

/// Human-readable stderr logs plus JSON logs in a daily rolling file.
///
/// The returned guard flushes the file writer and must outlive the run.
fn init_tracing(verbose: u8, config: &FerretConfig) -> Option<WorkerGuard> {
    let filter = match verbose {
        0 => config.logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = config
        .logging
        .file
        .then(|| project_dirs().map(|d| d.data_dir().join("logs")))
        .flatten()
        .filter(|dir| std::fs::create_dir_all(dir).is_ok());

    let Some(log_dir) = log_dir else {
        tracing_subscriber::registry().with(stderr_layer).init();
        return None;
    };

    let file_appender = tracing_appender::rolling::daily(&log_dir, "ferret.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();
    Some(guard)
}

fn build_agent(config: &FerretConfig) -> anyhow::Result<ResearchAgent> {
    let client = OpenAiCompatibleClient::new(&config.llm)
        .map_err(|e| anyhow::anyhow!("LLM provider init failed: {}", e))?;
    let search = TavilySearch::new(&config.search)
        .map_err(|e| anyhow::anyhow!("Search provider init failed: {}", e))?;

    let registry: Arc<ToolRegistry> = Arc::new(ferret_tools::default_registry(
        Arc::new(search),
        config.search.timeout(),
    ));
    let mut graph = ResearchGraph::standard(
        Arc::new(client),
        registry,
        ferret_tools::researcher_tools(),
    )?
    .with_step_limit(config.research.recursion_limit);

    if let Some(dir) = &config.research.checkpoint_dir {
        tracing::debug!(dir = %dir.display(), "Using file checkpoints");
        graph = graph.with_checkpointer(Arc::new(FileCheckpointer::new(dir)));
    }

    Ok(ResearchAgent::new(
        Arc::new(graph),
        RunConfig::new(config.research.max_iterations),
    ))
}
