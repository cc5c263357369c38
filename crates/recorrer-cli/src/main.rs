//! Recorredor: CLI for graph-guided browser exploration.
//!
//! ## Usage
//!
//! ```bash
//! recorredor --targets targets.json --target library --graph graph.json \
//!     --budget 300 --interval 60            # time series: 60s, 120s ... 300s
//! recorredor --target library --graph graph.json --strategy random --budget 300
//! ```
//!
//! Configuration problems (unknown target, missing or empty graph) abort
//! before any browser session opens.

mod sink;

use clap::Parser;
use recorrer::{
    BrowserDriver, CdpDriver, CdpSettings, ExplorationRun, NoReporter, PageGraph, RecorrerError,
    RecorrerResult, RunOptions, Strategy, TargetRegistry,
};
use sink::JsonDirSink;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "recorredor",
    version,
    about = "Explore a web application along its page-transition graph, under a time budget"
)]
struct Cli {
    /// Targets file: JSON map of target name to configuration
    #[arg(long, value_name = "FILE", default_value = "targets.json")]
    targets: PathBuf,

    /// Name of the target to explore
    #[arg(long)]
    target: String,

    /// Page-transition graph produced by the analysis stage
    #[arg(long, value_name = "FILE")]
    graph: PathBuf,

    /// Exploration strategy: graph or random
    #[arg(long, default_value = "graph")]
    strategy: Strategy,

    /// Wall-clock budget in seconds
    #[arg(long, default_value_t = 300)]
    budget: u64,

    /// Snapshot interval in seconds; omit for a single final snapshot
    #[arg(long)]
    interval: Option<u64>,

    /// Directory run records are written under
    #[arg(long, value_name = "DIR", default_value = "runs")]
    out: PathBuf,

    /// Show the browser window instead of running headless
    #[arg(long)]
    headed: bool,

    /// Chromium binary override
    #[arg(long, env = "CHROMIUM_PATH")]
    chromium: Option<String>,

    /// Disable the chromium sandbox (containers/CI)
    #[arg(long)]
    no_sandbox: bool,

    /// Seed for random element selection
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Log filter (tracing env-filter syntax)
    #[arg(long, env = "RECORRER_LOG", default_value = "info")]
    log: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(filter: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> RecorrerResult<()> {
    // fatal startup validation, before any browser session opens
    let registry = TargetRegistry::from_path(&cli.targets)?;
    let config = match registry.get(&cli.target) {
        Ok(config) => config.clone(),
        Err(e) => {
            if let RecorrerError::UnknownTarget { .. } = e {
                error!(available = ?registry.names(), "target not found");
            }
            return Err(e);
        }
    };
    let graph = PageGraph::from_path(&cli.graph)?;
    info!(
        target = %cli.target,
        pages = graph.node_count(),
        edges = graph.edge_count(),
        "loaded transition graph"
    );

    let run_id = sink::make_run_id(&cli.target, cli.strategy);
    let sink = Arc::new(JsonDirSink::new(cli.out.join(&run_id), cli.strategy)?);
    info!(dir = %sink.dir().display(), "writing run records");

    let options = RunOptions {
        strategy: cli.strategy,
        budget: Duration::from_secs(cli.budget),
        snapshot_interval: cli.interval.map(Duration::from_secs),
        seed: cli.seed,
    };

    let mut settings = CdpSettings::default().with_headless(!cli.headed);
    if let Some(path) = cli.chromium {
        settings = settings.with_chromium_path(path);
    }
    if cli.no_sandbox {
        settings = settings.with_no_sandbox();
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let driver = Arc::new(CdpDriver::launch(settings).await?);
        let page: Arc<dyn BrowserDriver> = driver.clone();

        let exploration = ExplorationRun::new(
            page,
            Arc::new(graph),
            config,
            Arc::new(NoReporter),
            sink.clone(),
        );
        let outcome = exploration.execute(&options).await;

        if let Err(e) = driver.close().await {
            warn!(error = %e, "browser shutdown failed");
        }

        let report = outcome?;
        sink.write_report(&report)?;
        info!(
            pages = report.pages_visited,
            total_pages = report.total_pages,
            edges = report.edges_covered,
            total_edges = report.total_edges,
            actions = report.final_snapshot.action_number,
            page_coverage = report.final_snapshot.page_coverage,
            "exploration complete"
        );
        Ok(())
    })
}
