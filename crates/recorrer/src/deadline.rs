//! Wall-clock budget tracking.
//!
//! The deadline is computed once at run start as an absolute instant. Every
//! remote operation's timeout is the minimum of its per-operation cap and the
//! time remaining, and an operation is skipped outright once nothing remains,
//! so a run overshoots its budget by at most one in-flight operation's cap.

use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// PACING
// =============================================================================

/// Settle time after a click
pub const AFTER_CLICK: Duration = Duration::from_millis(100);
/// Settle time after an observed navigation
pub const AFTER_NAVIGATION: Duration = Duration::from_millis(300);
/// Pause between consecutive actions
pub const BEFORE_NEXT_ACTION: Duration = Duration::from_millis(200);
/// Settle time after expanding a menu
pub const MENU_EXPAND: Duration = Duration::from_millis(300);
/// Settle time after expanding a submenu title
pub const SUBMENU_EXPAND: Duration = Duration::from_millis(120);
/// Settle time after a direct navigation
pub const AFTER_GOTO: Duration = Duration::from_millis(300);

/// Cap for direct navigations
pub const GOTO_CAP: Duration = Duration::from_millis(4000);
/// Cap for edge-selector clicks and back-navigations
pub const CLICK_CAP: Duration = Duration::from_millis(2000);
/// Cap for probe/random clicks, visibility checks and reveal clicks
pub const PROBE_CAP: Duration = Duration::from_millis(1200);
/// Cap for last-resort reveal clicks
pub const REVEAL_CAP: Duration = Duration::from_millis(800);

// =============================================================================
// DEADLINE
// =============================================================================

/// Absolute end-of-run instant, cheap to copy through every call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    end: Instant,
}

impl Deadline {
    /// Deadline `budget` from now
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            end: Instant::now() + budget,
        }
    }

    /// Time left, zero once passed
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }

    /// Whether the budget is exhausted
    #[must_use]
    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Clamp a per-operation cap to the remaining budget.
    ///
    /// Returns `None` when nothing remains, which callers treat as "skip the
    /// operation entirely".
    #[must_use]
    pub fn cap(&self, op_cap: Duration) -> Option<Duration> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return None;
        }
        Some(op_cap.min(remaining))
    }
}

/// Sleep for `pause`, truncated to the remaining budget.
pub async fn settle(deadline: Deadline, pause: Duration) {
    if let Some(capped) = deadline.cap(pause) {
        tokio::time::sleep(capped).await;
    }
}
