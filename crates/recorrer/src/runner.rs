//! Run orchestration.
//!
//! Wires one target, one graph and one driver into a bounded exploration:
//! dialog policy and session seeding first, then the chosen strategy racing
//! the snapshot coordinator until the deadline, then the unconditional final
//! snapshot. The run always completes at (or immediately after) its deadline
//! and always emits that final record, even if every individual action
//! failed.

use crate::auth;
use crate::config::TargetConfig;
use crate::coverage::CoverageReporter;
use crate::deadline::Deadline;
use crate::dialog::DialogPolicy;
use crate::driver::BrowserDriver;
use crate::explore::{Explorer, GraphGuidedExplorer};
use crate::graph::PageGraph;
use crate::random::RandomExplorer;
use crate::result::{RecorrerError, RecorrerResult};
use crate::route::RouteNormalizer;
use crate::snapshot::{Snapshot, SnapshotCoordinator, SnapshotSink};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Cap for the initial landing navigation, before the budget clock starts
const INITIAL_NAV_CAP: Duration = Duration::from_secs(5);
/// Settle pause after the initial landing
const INITIAL_SETTLE: Duration = Duration::from_millis(1500);

/// Which exploration strategy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Graph-guided exploration
    Graph,
    /// Random-click baseline
    Random,
}

impl std::str::FromStr for Strategy {
    type Err = RecorrerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "graph" => Ok(Self::Graph),
            "random" => Ok(Self::Random),
            other => Err(RecorrerError::Config {
                message: format!("unknown strategy {other}, expected graph or random"),
            }),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Graph => write!(f, "graph"),
            Self::Random => write!(f, "random"),
        }
    }
}

/// Options for one exploration run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Strategy to run
    pub strategy: Strategy,
    /// Wall-clock budget
    pub budget: Duration,
    /// Snapshot cadence; `None` means single-shot (final snapshot only)
    pub snapshot_interval: Option<Duration>,
    /// Seed for random element selection
    pub seed: u64,
}

/// Totals reported after the run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// The unconditional end-of-run snapshot
    pub final_snapshot: Snapshot,
    /// Distinct pages visited
    pub pages_visited: usize,
    /// Pages in the graph
    pub total_pages: usize,
    /// Graph edges with both endpoints visited
    pub edges_covered: usize,
    /// Edges in the graph
    pub total_edges: usize,
}

/// One configured exploration run over a shared browser page
pub struct ExplorationRun {
    driver: Arc<dyn BrowserDriver>,
    graph: Arc<PageGraph>,
    config: TargetConfig,
    reporter: Arc<dyn CoverageReporter>,
    sink: Arc<dyn SnapshotSink>,
}

impl ExplorationRun {
    /// Assemble a run from its collaborators
    #[must_use]
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        graph: Arc<PageGraph>,
        config: TargetConfig,
        reporter: Arc<dyn CoverageReporter>,
        sink: Arc<dyn SnapshotSink>,
    ) -> Self {
        Self {
            driver,
            graph,
            config,
            reporter,
            sink,
        }
    }

    /// Execute the run to completion.
    ///
    /// # Errors
    ///
    /// Only startup-grade problems fail: an empty graph or an unusable
    /// target configuration. Everything after the browser session starts is
    /// absorbed as "no progress".
    pub async fn execute(&self, opts: &RunOptions) -> RecorrerResult<RunReport> {
        if self.graph.nodes.is_empty() {
            return Err(RecorrerError::EmptyGraph);
        }
        let routes = RouteNormalizer::new(&self.config)?;

        if let Err(e) = self.driver.set_dialog_policy(DialogPolicy::AcceptAll).await {
            warn!(error = %e, "could not register dialog policy");
        }
        if let Err(e) = auth::bootstrap(self.driver.as_ref(), &self.config, &routes).await {
            warn!(error = %e, "auth bootstrap failed, continuing unauthenticated");
        }

        // land on the start page before the budget clock starts
        let start_key = routes.normalize(&self.config.start_page);
        let start_url = routes.build_url(&start_key);
        if let Err(e) = self.driver.navigate(&start_url, INITIAL_NAV_CAP).await {
            warn!(error = %e, url = %start_url, "initial navigation failed");
        }
        tokio::time::sleep(INITIAL_SETTLE).await;

        let mut explorer: Box<dyn Explorer> = match opts.strategy {
            Strategy::Graph => Box::new(GraphGuidedExplorer::new(
                Arc::clone(&self.driver),
                Arc::clone(&self.graph),
                &self.config,
                opts.seed,
            )?),
            Strategy::Random => Box::new(RandomExplorer::new(
                Arc::clone(&self.driver),
                RouteNormalizer::new(&self.config)?,
                opts.seed,
            )),
        };

        let deadline = Deadline::after(opts.budget);
        let coordinator = Arc::new(SnapshotCoordinator::new(
            Arc::clone(&self.driver),
            explorer.progress(),
            self.graph.node_count(),
            Arc::clone(&self.reporter),
            Arc::clone(&self.sink),
            opts.snapshot_interval.unwrap_or(opts.budget),
        ));

        info!(strategy = %opts.strategy, budget_secs = opts.budget.as_secs(), "run starting");

        let ticker = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.run(deadline).await })
        };
        let outcome = explorer.explore(deadline).await;
        ticker.abort();

        // unconditional, the instant the explorer's run loop ends
        let final_snapshot = coordinator.take(true).await;
        outcome?;

        let edges_covered = self.graph.edges_covered(explorer.visited(), &routes);
        let report = RunReport {
            pages_visited: final_snapshot.pages_visited,
            total_pages: self.graph.node_count(),
            edges_covered,
            total_edges: self.graph.edge_count(),
            final_snapshot,
        };
        info!(
            pages = report.pages_visited,
            total_pages = report.total_pages,
            edges = report.edges_covered,
            actions = report.final_snapshot.action_number,
            "run finished"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for ExplorationRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplorationRun")
            .field("pages", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .finish_non_exhaustive()
    }
}
