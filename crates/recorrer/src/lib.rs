//! Recorrer: graph-guided browser exploration engine.
//!
//! Drives a remotely controlled browser through a web application under a
//! wall-clock time budget, using a precomputed page-transition graph (nodes
//! are logical pages, edges are UI actions that move between them) to decide
//! what to click next, and emitting periodic coverage/visitation snapshots.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  graph + target config                                            │
//! │        │                                                          │
//! │        ▼                                                          │
//! │  Explorer (graph-guided | random) ──► BrowserDriver (CDP | mock)  │
//! │        │  shared counters                                         │
//! │        ▼                                                          │
//! │  SnapshotCoordinator ──► SnapshotSink (external writer)           │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The graph itself is produced by an external static-analysis stage; this
//! crate only consumes it.

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod auth;
mod config;
mod coverage;
mod deadline;
mod dialog;
mod driver;
mod explore;
mod graph;
mod guard;
mod random;
mod result;
mod reveal;
mod route;
mod runner;
mod snapshot;
mod state;

#[cfg(feature = "browser")]
mod cdp;

pub use auth::bootstrap;
pub use config::{AuthDescriptor, RouteMode, StorageItem, TargetConfig, TargetRegistry};
pub use coverage::{page_coverage, read_artifact, CoverageReporter, NoReporter, ARTIFACT_PROBE};
pub use deadline::{settle, Deadline};
pub use dialog::{DialogDecision, DialogKind, DialogPolicy};
pub use driver::{BrowserDriver, Cookie, ElementHandle, MockDriver, MockElement};
pub use explore::{Explorer, GraphGuidedExplorer, INTERACTIVE_ELEMENTS};
pub use graph::{PageGraph, PageNode, TransitionEdge, NO_ELEMENT_SELECTOR};
pub use guard::{is_auth_related, is_disabled};
pub use random::RandomExplorer;
pub use result::{RecorrerError, RecorrerResult};
pub use reveal::{
    expand_all_submenus, RevealChain, RevealCtx, RevealOutcome, RevealStrategy,
};
pub use route::{RouteKey, RouteNormalizer};
pub use runner::{ExplorationRun, RunOptions, RunReport, Strategy};
pub use snapshot::{MemorySink, Snapshot, SnapshotCoordinator, SnapshotSink};
pub use state::{ExplorationState, Progress};

#[cfg(feature = "browser")]
pub use cdp::{CdpDriver, CdpSettings};
