//! Random exploration baseline.
//!
//! Same external contract as the graph-guided strategy but no graph
//! consultation, no backtracking and no per-round bookkeeping. This is the
//! contrast the engine measures the guided strategy against.

use crate::deadline::{settle, Deadline, AFTER_CLICK, PROBE_CAP};
use crate::driver::BrowserDriver;
use crate::explore::{Explorer, INTERACTIVE_ELEMENTS};
use crate::guard::{is_auth_related, is_disabled};
use crate::result::RecorrerResult;
use crate::route::{RouteKey, RouteNormalizer};
use crate::state::{ExplorationState, Progress};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Candidate draws per loop iteration
const SELECTION_TRIES: usize = 10;

/// Simple xorshift64 PRNG for deterministic element selection
#[derive(Debug, Clone)]
pub(crate) struct Xorshift64 {
    state: u64,
}

impl Xorshift64 {
    pub(crate) const fn new(seed: u64) -> Self {
        // Ensure non-zero state
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    pub(crate) fn next_index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.next() % len as u64) as usize
    }
}

/// Baseline strategy: click random visible interactive elements until the
/// deadline passes.
pub struct RandomExplorer {
    driver: Arc<dyn BrowserDriver>,
    routes: RouteNormalizer,
    state: ExplorationState,
    rng: Xorshift64,
}

impl RandomExplorer {
    /// Build the baseline explorer
    #[must_use]
    pub fn new(driver: Arc<dyn BrowserDriver>, routes: RouteNormalizer, seed: u64) -> Self {
        Self {
            driver,
            routes,
            state: ExplorationState::new(),
            rng: Xorshift64::new(seed),
        }
    }

    async fn current_key(&self) -> Option<RouteKey> {
        self.driver
            .current_url()
            .await
            .ok()
            .map(|url| self.routes.normalize(&url))
    }

    /// One random click: up to [`SELECTION_TRIES`] draws, skipping disabled
    /// and logout/login elements, trial-clicking before the real click.
    async fn click_once(&mut self, deadline: Deadline) {
        let Some(timeout) = deadline.cap(PROBE_CAP) else {
            return;
        };
        let Ok(candidates) = self.driver.locate(INTERACTIVE_ELEMENTS).await else {
            return;
        };
        if candidates.is_empty() {
            return;
        }

        let tries = candidates.len().min(SELECTION_TRIES);
        for _ in 0..tries {
            let element = &candidates[self.rng.next_index(candidates.len())];
            if is_disabled(element) {
                continue;
            }
            if is_auth_related(element) {
                debug!(id = %element.id, "skip logout/login element");
                continue;
            }
            if self.driver.scroll_into_view(element).await.is_err() {
                continue;
            }
            // dry run first: confirm the click would land before committing
            if !self
                .driver
                .can_click(element, timeout)
                .await
                .unwrap_or(false)
            {
                continue;
            }
            if self.driver.click(element, timeout).await.is_ok() {
                let actions = self.state.count_action();
                debug!(actions, id = %element.id, "random click landed");
                return;
            }
        }
    }
}

#[async_trait]
impl Explorer for RandomExplorer {
    async fn explore(&mut self, deadline: Deadline) -> RecorrerResult<()> {
        debug!("starting random exploration");
        while !deadline.expired() {
            if let Some(key) = self.current_key().await {
                self.state.record_visit(key);
            }
            self.click_once(deadline).await;
            settle(deadline, AFTER_CLICK).await;
        }
        Ok(())
    }

    fn progress(&self) -> Arc<Progress> {
        self.state.progress()
    }

    fn visited(&self) -> &HashSet<RouteKey> {
        self.state.cumulative_visited()
    }
}

impl std::fmt::Debug for RandomExplorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomExplorer")
            .field("visited", &self.state.cumulative_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthDescriptor, RouteMode, TargetConfig};
    use crate::driver::{MockDriver, MockElement};
    use std::time::Duration;

    fn routes() -> RouteNormalizer {
        RouteNormalizer::new(&TargetConfig {
            route_mode: RouteMode::History,
            base_url: "http://app".to_string(),
            start_page: "/".to_string(),
            auth: AuthDescriptor::None,
            dynamic_route_patterns: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_xorshift_is_deterministic() {
        let mut a = Xorshift64::new(42);
        let mut b = Xorshift64::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_index(7), b.next_index(7));
        }
    }

    #[test]
    fn test_xorshift_zero_seed_still_advances() {
        let mut rng = Xorshift64::new(0);
        let first = rng.next_index(1000);
        let second = rng.next_index(1000);
        assert!(first != second || rng.next_index(1000) != second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_pages_and_clicks() {
        let driver = Arc::new(MockDriver::new("http://app/"));
        driver.add_element(
            "http://app/",
            MockElement::new("go", "a")
                .with_selector("a:visible")
                .navigates_to("http://app/list"),
        );
        driver.add_element(
            "http://app/list",
            MockElement::new("stay", "button").with_selector("button:visible"),
        );

        let mut explorer = RandomExplorer::new(driver.clone(), routes(), 7);
        let progress = explorer.progress();
        explorer
            .explore(Deadline::after(Duration::from_secs(3)))
            .await
            .unwrap();

        assert!(progress.actions() >= 2);
        assert!(progress.pages_visited() >= 2);
        assert!(explorer.visited().contains(&routes().normalize("/list")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_clicks_logout_even_as_only_element() {
        let driver = Arc::new(MockDriver::new("http://app/"));
        driver.add_element(
            "http://app/",
            MockElement::new("quit", "button")
                .with_selector("button:visible")
                .with_text("退出登录")
                .navigates_to("http://app/login"),
        );

        let mut explorer = RandomExplorer::new(driver.clone(), routes(), 99);
        explorer
            .explore(Deadline::after(Duration::from_secs(2)))
            .await
            .unwrap();

        assert!(!driver.was_called("click:quit"));
        assert_eq!(explorer.progress().actions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_disabled_elements() {
        let driver = Arc::new(MockDriver::new("http://app/"));
        driver.add_element(
            "http://app/",
            MockElement::new("off", "button")
                .with_selector("button:visible")
                .with_attr("disabled", ""),
        );

        let mut explorer = RandomExplorer::new(driver.clone(), routes(), 3);
        explorer
            .explore(Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(!driver.was_called("click:off"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_click_gates_real_click() {
        let driver = Arc::new(MockDriver::new("http://app/"));
        driver.add_element(
            "http://app/",
            MockElement::new("dead", "button")
                .with_selector("button:visible")
                .unclickable(),
        );

        let mut explorer = RandomExplorer::new(driver.clone(), routes(), 3);
        explorer
            .explore(Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap();
        // the dry run rejects it, so no real click is ever issued
        assert!(!driver.was_called("click:dead"));
    }
}
