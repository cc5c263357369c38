//! Exploration state and shared progress counters.
//!
//! One explorer instance exclusively owns an [`ExplorationState`] and is its
//! only writer. The snapshot coordinator only ever needs two numbers from it
//! (cumulative pages visited and actions performed), which are mirrored into
//! a [`Progress`] handle backed by atomics, so the coordinator reads them
//! concurrently without any lock.

use crate::route::RouteKey;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Read-only view of exploration progress, shared with the coordinator
#[derive(Debug, Default)]
pub struct Progress {
    pages_visited: AtomicUsize,
    actions: AtomicU64,
}

impl Progress {
    /// Cumulative count of distinct pages visited
    #[must_use]
    pub fn pages_visited(&self) -> usize {
        self.pages_visited.load(Ordering::Relaxed)
    }

    /// Total successful actions performed
    #[must_use]
    pub fn actions(&self) -> u64 {
        self.actions.load(Ordering::Relaxed)
    }
}

/// Mutable state of one exploration run, owned by its explorer
#[derive(Debug)]
pub struct ExplorationState {
    round_visited: HashSet<RouteKey>,
    cumulative_visited: HashSet<RouteKey>,
    expanded_submenus: HashSet<String>,
    opened_dropdown_once: bool,
    all_menus_expanded_once: bool,
    progress: Arc<Progress>,
}

impl ExplorationState {
    /// Fresh state with zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self {
            round_visited: HashSet::new(),
            cumulative_visited: HashSet::new(),
            expanded_submenus: HashSet::new(),
            opened_dropdown_once: false,
            all_menus_expanded_once: false,
            progress: Arc::new(Progress::default()),
        }
    }

    /// Handle the snapshot coordinator reads counters through
    #[must_use]
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Start a new round: the round set clears, the cumulative set never does
    pub fn begin_round(&mut self) {
        self.round_visited.clear();
    }

    /// Record a visit in both sets. Returns `true` when the key is new to
    /// this round.
    pub fn record_visit(&mut self, key: RouteKey) -> bool {
        let new_this_round = self.round_visited.insert(key.clone());
        self.cumulative_visited.insert(key);
        self.progress
            .pages_visited
            .store(self.cumulative_visited.len(), Ordering::Relaxed);
        new_this_round
    }

    /// Whether the key was already handled this round
    #[must_use]
    pub fn visited_this_round(&self, key: &RouteKey) -> bool {
        self.round_visited.contains(key)
    }

    /// Count one successful action
    pub fn count_action(&mut self) -> u64 {
        self.progress.actions.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Distinct pages visited over the whole run
    #[must_use]
    pub fn cumulative_count(&self) -> usize {
        self.cumulative_visited.len()
    }

    /// The cumulative visited set
    #[must_use]
    pub fn cumulative_visited(&self) -> &HashSet<RouteKey> {
        &self.cumulative_visited
    }

    /// Whether a dropdown trigger was already opened this run
    #[must_use]
    pub fn dropdown_opened(&self) -> bool {
        self.opened_dropdown_once
    }

    /// Remember that a dropdown trigger was opened; sticky for the run
    pub fn mark_dropdown_opened(&mut self) {
        self.opened_dropdown_once = true;
    }

    /// Whether the run-wide menu expansion already succeeded
    #[must_use]
    pub fn menus_expanded(&self) -> bool {
        self.all_menus_expanded_once
    }

    /// Mark the run-wide menu expansion as done
    pub fn mark_menus_expanded(&mut self) {
        self.all_menus_expanded_once = true;
    }

    /// Whether this submenu was already expanded this run
    #[must_use]
    pub fn submenu_expanded(&self, key: &str) -> bool {
        self.expanded_submenus.contains(key)
    }

    /// Remember a submenu as expanded for the rest of the run
    pub fn mark_submenu_expanded(&mut self, key: impl Into<String>) {
        self.expanded_submenus.insert(key.into());
    }
}

impl Default for ExplorationState {
    fn default() -> Self {
        Self::new()
    }
}
