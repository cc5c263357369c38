//! Graph-guided exploration.
//!
//! The explorer walks the target application in rounds. Each round starts
//! from the chosen start page and follows transition-graph edges depth-first,
//! probing every visited page with a fixed number of generic clicks and
//! backtracking through browser history (or forced navigation when history
//! does not restore the page). Traversal is an explicit frame stack rather
//! than recursion: a frame is pushed when a click lands on a page not yet
//! seen this round and popped after the page's leave step, with the
//! remaining budget threaded through every operation.

use crate::deadline::{
    settle, Deadline, AFTER_CLICK, AFTER_GOTO, AFTER_NAVIGATION, BEFORE_NEXT_ACTION, CLICK_CAP,
    GOTO_CAP, PROBE_CAP,
};
use crate::driver::BrowserDriver;
use crate::graph::{PageGraph, TransitionEdge};
use crate::guard::{is_auth_related, is_disabled};
use crate::random::Xorshift64;
use crate::result::RecorrerResult;
use crate::reveal::{expand_all_submenus, RevealChain, RevealCtx};
use crate::route::{RouteKey, RouteNormalizer};
use crate::state::{ExplorationState, Progress};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Fixed selector set for generic interactive elements: buttons, links,
/// menu items, pagers.
pub const INTERACTIVE_ELEMENTS: &str = "button:visible, a:visible, \
    [role=\"button\"]:visible, input[type=\"button\"]:visible, \
    input[type=\"submit\"]:visible, .el-button:visible, .el-menu-item:visible, \
    .el-sub-menu__title:visible, .el-submenu__title:visible, \
    .el-dropdown-menu__item:visible, .el-link:visible, .el-pager li:visible";

/// Close affordances tried before falling back to the Escape key
const MODAL_CLOSE_SELECTORS: &[&str] = &[
    ".el-dialog__close",
    ".el-message-box__close",
    ".el-drawer__close-btn",
    "[aria-label=\"Close\"]",
    "button.close",
    ".modal-close",
    "[class*=\"close\"]:visible",
    "button:has-text(\"取消\")",
    "button:has-text(\"Cancel\")",
    "button:has-text(\"关闭\")",
    "button:has-text(\"Close\")",
];

/// Probing clicks performed on every visited page
const PROBE_CLICKS: u32 = 10;
/// Candidate draws per probing click
const PROBE_TRIES: usize = 10;
/// Close stray modals after this many successful probe clicks
const MODAL_CLOSE_EVERY: u32 = 3;
/// Visibility cap while hunting for modal close buttons
const MODAL_VISIBILITY_CAP: Duration = Duration::from_millis(500);
/// Click cap for modal close buttons
const MODAL_CLICK_CAP: Duration = Duration::from_millis(1000);

/// An exploration strategy; both implementations share this contract.
#[async_trait]
pub trait Explorer: Send {
    /// Drive the browser until the deadline passes. Individual failures are
    /// absorbed as "no progress"; only startup-grade problems return errors.
    async fn explore(&mut self, deadline: Deadline) -> RecorrerResult<()>;

    /// Counters shared with the snapshot coordinator
    fn progress(&self) -> Arc<Progress>;

    /// Cumulative visited set at this instant
    fn visited(&self) -> &HashSet<RouteKey>;
}

/// One page being worked through on the traversal stack
#[derive(Debug)]
struct Frame {
    key: RouteKey,
    edges: VecDeque<TransitionEdge>,
    probes_left: u32,
    successful_probes: u32,
    /// Page a probe-originated descent must restore on pop
    return_to: Option<RouteKey>,
}

/// What one probing click accomplished
enum ProbeOutcome {
    /// Nothing clickable on the page; stop probing this frame
    NoCandidates,
    /// All draws were rejected or failed
    NotClicked,
    /// A click landed; `descend` carries (new page, page to restore)
    Clicked {
        descend: Option<(RouteKey, RouteKey)>,
    },
}

/// Strategy that consults the transition graph to decide what to click next
pub struct GraphGuidedExplorer {
    driver: Arc<dyn BrowserDriver>,
    graph: Arc<PageGraph>,
    routes: RouteNormalizer,
    state: ExplorationState,
    reveal: RevealChain,
    rng: Xorshift64,
    configured_start: RouteKey,
    root: RouteKey,
}

impl GraphGuidedExplorer {
    /// Build the explorer for one run.
    ///
    /// # Errors
    ///
    /// Fails when the target configuration cannot produce a normalizer.
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        graph: Arc<PageGraph>,
        config: &crate::config::TargetConfig,
        seed: u64,
    ) -> RecorrerResult<Self> {
        let routes = RouteNormalizer::new(config)?;
        let configured_start = routes.normalize(&config.start_page);
        let root = routes.normalize("/");
        Ok(Self {
            driver,
            graph,
            routes,
            state: ExplorationState::new(),
            reveal: RevealChain::standard(),
            rng: Xorshift64::new(seed),
            configured_start,
            root,
        })
    }

    /// Pick the page every round starts from: the configured page when it
    /// has outgoing edges, otherwise the max-out-degree node (ties broken by
    /// first-seen order), otherwise the first graph node, otherwise `/`.
    #[must_use]
    pub fn start_page(&self) -> RouteKey {
        let degrees = self.graph.out_degrees(&self.routes);
        let degree_of = |key: &RouteKey| {
            degrees
                .iter()
                .find(|(k, _)| k == key)
                .map_or(0, |(_, d)| *d)
        };

        if degree_of(&self.configured_start) > 0 {
            return self.configured_start.clone();
        }
        if degree_of(&self.configured_start) == 0 && !degrees.is_empty() {
            debug!(
                start = %self.configured_start,
                "configured start page has no outgoing edges, falling back"
            );
        }

        let mut best: Option<(&RouteKey, usize)> = None;
        for (key, degree) in &degrees {
            if best.map_or(true, |(_, d)| *degree > d) {
                best = Some((key, *degree));
            }
        }
        if let Some((key, _)) = best {
            return key.clone();
        }

        self.graph
            .nodes
            .first()
            .map_or_else(|| self.root.clone(), |node| self.routes.normalize(&node.name))
    }

    async fn current_raw_url(&self) -> Option<String> {
        self.driver.current_url().await.ok()
    }

    async fn current_key(&self) -> Option<RouteKey> {
        self.current_raw_url()
            .await
            .map(|url| self.routes.normalize(&url))
    }

    /// Direct navigation to a route key; `true` when the page landed there
    async fn goto(&self, key: &RouteKey, deadline: Deadline) -> bool {
        let Some(timeout) = deadline.cap(GOTO_CAP) else {
            return false;
        };
        let url = self.routes.build_url(key);
        debug!(%url, "direct navigation");
        if let Err(e) = self.driver.navigate(&url, timeout).await {
            debug!(error = %e, %url, "navigation failed");
        }
        settle(deadline, AFTER_GOTO).await;
        self.current_key().await.as_ref() == Some(key)
    }

    /// Go back one history step; when the page does not change (or goes
    /// blank), force a direct navigation to `fallback` instead.
    async fn back_or_goto(&self, fallback: &RouteKey, deadline: Deadline) {
        settle(deadline, BEFORE_NEXT_ACTION).await;
        let before = self.current_key().await;

        if let Some(timeout) = deadline.cap(CLICK_CAP) {
            if let Err(e) = self.driver.go_back(timeout).await {
                debug!(error = %e, "back navigation failed");
            }
        }
        settle(deadline, BEFORE_NEXT_ACTION).await;

        let raw = self.current_raw_url().await;
        let blank = raw.as_deref() == Some("about:blank");
        let after = raw.map(|url| self.routes.normalize(&url));

        if blank || after == before {
            self.goto(fallback, deadline).await;
            settle(deadline, BEFORE_NEXT_ACTION).await;
        }
    }

    /// Run-wide sticky menu expansion; once it succeeds it is never redone
    async fn ensure_menus_expanded(&mut self, deadline: Deadline) {
        if self.state.menus_expanded() {
            return;
        }
        if expand_all_submenus(self.driver.as_ref(), deadline).await {
            self.state.mark_menus_expanded();
        }
    }

    async fn run_reveal(&mut self, selector: &str, deadline: Deadline) -> bool {
        let mut cx = RevealCtx {
            driver: self.driver.as_ref(),
            state: &mut self.state,
            deadline,
        };
        self.reveal.run(&mut cx, selector).await
    }

    /// Close whatever modal the last click may have opened, falling back to
    /// the Escape key.
    async fn close_open_modals(&self, deadline: Deadline) {
        for selector in MODAL_CLOSE_SELECTORS.iter().copied() {
            let Ok(found) = self.driver.locate(selector).await else {
                continue;
            };
            let Some(first) = found.first() else {
                continue;
            };
            let Some(vis_timeout) = deadline.cap(MODAL_VISIBILITY_CAP) else {
                return;
            };
            if !self
                .driver
                .is_visible(first, vis_timeout)
                .await
                .unwrap_or(false)
            {
                continue;
            }
            let Some(click_timeout) = deadline.cap(MODAL_CLICK_CAP) else {
                return;
            };
            if self.driver.click(first, click_timeout).await.is_ok() {
                debug!(selector, "closed modal");
                settle(deadline, AFTER_NAVIGATION).await;
                return;
            }
        }
        if self.driver.press_key("Escape").await.is_ok() {
            debug!("pressed escape to close modal");
        }
    }

    /// Enter a page: either the already-visited back-out, or record the
    /// visit and push a frame with its pending edges and probe budget.
    async fn enter(
        &mut self,
        key: RouteKey,
        return_to: Option<RouteKey>,
        stack: &mut Vec<Frame>,
        deadline: Deadline,
    ) {
        if deadline.expired() {
            return;
        }
        debug!(page = %key, "visiting page");

        if self.state.visited_this_round(&key) {
            debug!(page = %key, "already visited this round");
            self.back_or_goto(&key, deadline).await;
            return;
        }

        self.state.record_visit(key.clone());
        self.ensure_menus_expanded(deadline).await;

        let edges = if self.state.cumulative_count() < self.graph.node_count() {
            let all = self.graph.edges_from(&key, &self.routes);
            let total = all.len();
            let kept: VecDeque<TransitionEdge> = all
                .into_iter()
                .filter(|e| {
                    !self
                        .state
                        .visited_this_round(&self.routes.normalize(&e.to))
                })
                .collect();
            debug!(page = %key, edges = total, pruned = total - kept.len(), "edge work list");
            kept
        } else {
            debug!(page = %key, "all pages visited - skipping edge traversal");
            VecDeque::new()
        };

        stack.push(Frame {
            key,
            edges,
            probes_left: PROBE_CLICKS,
            successful_probes: 0,
            return_to,
        });
    }

    /// Leave step run when a frame pops: back-navigate off non-root pages
    /// and restore the probe origin when the descent came from a probe.
    async fn leave(&mut self, frame: &Frame, deadline: Deadline) {
        if deadline.expired() {
            return;
        }
        if frame.key != self.root {
            let start = self.start_page();
            self.back_or_goto(&start, deadline).await;
        }
        if let Some(ret) = &frame.return_to {
            if self.current_key().await.as_ref() != Some(ret) {
                self.goto(ret, deadline).await;
                settle(deadline, AFTER_NAVIGATION).await;
            }
        }
    }

    /// Traverse one graph edge. Returns the key to descend into when the
    /// click (or redirect) landed on a page not yet seen this round.
    async fn traverse_edge(
        &mut self,
        edge: &TransitionEdge,
        from: &RouteKey,
        deadline: Deadline,
    ) -> Option<RouteKey> {
        if deadline.expired() {
            return None;
        }
        debug!(from = %edge.from, to = %edge.to, selector = %edge.selector, "traversing edge");

        if edge.has_no_element() {
            if edge.is_router_redirect() {
                let to_key = self.routes.normalize(&edge.to);
                debug!(to = %to_key, "treating edge as router redirect");
                if self.goto(&to_key, deadline).await {
                    self.state.count_action();
                    if !self.state.visited_this_round(&to_key) {
                        return Some(to_key);
                    }
                }
            } else {
                debug!("skip: no realizable ui action");
            }
            return None;
        }

        let timeout = deadline.cap(CLICK_CAP)?;

        let mut found = self.driver.locate(&edge.selector).await.unwrap_or_default();
        if found.is_empty() && self.run_reveal(&edge.selector, deadline).await {
            found = self.driver.locate(&edge.selector).await.unwrap_or_default();
        }
        let Some(first) = found.into_iter().next() else {
            debug!(selector = %edge.selector, "skip: element not found");
            return None;
        };

        let mut visible = self
            .driver
            .is_visible(&first, timeout)
            .await
            .unwrap_or(false);
        if !visible && self.run_reveal(&edge.selector, deadline).await {
            let recheck = deadline.cap(PROBE_CAP)?;
            visible = self
                .driver
                .is_visible(&first, recheck)
                .await
                .unwrap_or(false);
        }
        if !visible {
            debug!(selector = %edge.selector, "skip: element exists but not visible");
            return None;
        }

        if is_auth_related(&first) {
            debug!(selector = %edge.selector, "skip: logout/login affordance");
            return None;
        }

        if self.driver.click(&first, timeout).await.is_err() {
            debug!(selector = %edge.selector, "skip: click failed");
            return None;
        }
        self.state.count_action();
        settle(deadline, AFTER_CLICK).await;

        let observed = self.current_key().await?;
        let expected = self.routes.normalize(&edge.to);
        debug!(%observed, %expected, current = %from, "edge click outcome");

        if observed == expected && !self.state.visited_this_round(&expected) {
            Some(expected)
        } else if observed != *from
            && observed != expected
            && !self.state.visited_this_round(&observed)
        {
            // the click caused an unanticipated but real navigation
            Some(observed)
        } else {
            debug!("no navigation / already visited / path not matched");
            None
        }
    }

    /// One probing click on generic interactive elements
    async fn probe_click(&mut self, deadline: Deadline) -> ProbeOutcome {
        let Some(timeout) = deadline.cap(PROBE_CAP) else {
            return ProbeOutcome::NoCandidates;
        };
        let before = self.current_key().await;

        let candidates = self
            .driver
            .locate(INTERACTIVE_ELEMENTS)
            .await
            .unwrap_or_default();
        if candidates.is_empty() {
            debug!("no clickable elements found");
            return ProbeOutcome::NoCandidates;
        }

        let tries = candidates.len().min(PROBE_TRIES);
        for _ in 0..tries {
            let element = &candidates[self.rng.next_index(candidates.len())];
            if is_disabled(element) || is_auth_related(element) {
                continue;
            }
            if self.driver.scroll_into_view(element).await.is_err() {
                continue;
            }
            if self.driver.click(element, timeout).await.is_err() {
                continue;
            }

            let actions = self.state.count_action();
            debug!(actions, id = %element.id, "probe click landed");
            settle(deadline, AFTER_CLICK).await;

            let after = self.current_key().await;
            let descend = match (&before, &after) {
                (Some(b), Some(a)) if a != b && !self.state.visited_this_round(a) => {
                    debug!(page = %a, "probe click navigated to a new page");
                    Some((a.clone(), b.clone()))
                }
                _ => None,
            };
            return ProbeOutcome::Clicked { descend };
        }
        ProbeOutcome::NotClicked
    }

    /// One depth-first sweep from `entry`, driven by the explicit stack
    async fn visit(&mut self, entry: RouteKey, deadline: Deadline) {
        let mut stack: Vec<Frame> = Vec::new();
        self.enter(entry, None, &mut stack, deadline).await;

        loop {
            if deadline.expired() {
                debug!("time budget exhausted during traversal");
                break;
            }

            enum Step {
                Edge(TransitionEdge, RouteKey),
                Probe,
                Pop,
            }

            let step = match stack.last_mut() {
                None => break,
                Some(top) => {
                    if let Some(edge) = top.edges.pop_front() {
                        Step::Edge(edge, top.key.clone())
                    } else if top.probes_left > 0 {
                        top.probes_left -= 1;
                        Step::Probe
                    } else {
                        Step::Pop
                    }
                }
            };

            match step {
                Step::Edge(edge, from) => {
                    if let Some(next) = self.traverse_edge(&edge, &from, deadline).await {
                        self.enter(next, None, &mut stack, deadline).await;
                    }
                }
                Step::Probe => {
                    let outcome = self.probe_click(deadline).await;
                    let mut descend = None;
                    if let Some(top) = stack.last_mut() {
                        match outcome {
                            ProbeOutcome::NoCandidates => top.probes_left = 0,
                            ProbeOutcome::NotClicked => {
                                self.close_open_modals(deadline).await;
                            }
                            ProbeOutcome::Clicked { descend: d } => {
                                top.successful_probes += 1;
                                if top.successful_probes % MODAL_CLOSE_EVERY == 0 {
                                    self.close_open_modals(deadline).await;
                                }
                                descend = d;
                            }
                        }
                    }
                    if let Some((next, came_from)) = descend {
                        self.enter(next, Some(came_from), &mut stack, deadline)
                            .await;
                    }
                }
                Step::Pop => {
                    if let Some(frame) = stack.pop() {
                        self.leave(&frame, deadline).await;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Explorer for GraphGuidedExplorer {
    async fn explore(&mut self, deadline: Deadline) -> RecorrerResult<()> {
        let start = self.start_page();
        info!(start = %start, pages = self.graph.node_count(), edges = self.graph.edge_count(),
            "starting graph-guided exploration");

        self.goto(&start, deadline).await;
        settle(deadline, AFTER_NAVIGATION).await;

        let mut all_visited_logged = false;
        while !deadline.expired() {
            debug!(remaining_ms = deadline.remaining().as_millis() as u64, "new round");
            self.state.begin_round();
            self.ensure_menus_expanded(deadline).await;
            self.goto(&start, deadline).await;
            self.visit(start.clone(), deadline).await;

            if !all_visited_logged && self.state.cumulative_count() >= self.graph.node_count() {
                all_visited_logged = true;
                info!(
                    pages = self.graph.node_count(),
                    "all graph pages visited, continuing in exploration-only mode"
                );
            }
            settle(deadline, BEFORE_NEXT_ACTION).await;
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

impl std::fmt::Debug for GraphGuidedExplorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphGuidedExplorer")
            .field("visited", &self.state.cumulative_count())
            .field("pages", &self.graph.node_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthDescriptor, RouteMode, TargetConfig};
    use crate::driver::{MockDriver, MockElement};
    use crate::graph::{PageNode, NO_ELEMENT_SELECTOR};

    fn config(start_page: &str) -> TargetConfig {
        TargetConfig {
            route_mode: RouteMode::History,
            base_url: "http://app".to_string(),
            start_page: start_page.to_string(),
            auth: AuthDescriptor::None,
            dynamic_route_patterns: Vec::new(),
        }
    }

    fn node(name: &str) -> PageNode {
        PageNode {
            name: name.to_string(),
        }
    }

    fn edge(from: &str, to: &str, selector: &str) -> TransitionEdge {
        TransitionEdge {
            from: from.to_string(),
            to: to.to_string(),
            selector: selector.to_string(),
            event: "click".to_string(),
            selector_kind: "CSS".to_string(),
            note: String::new(),
        }
    }

    fn explorer(
        driver: Arc<MockDriver>,
        graph: PageGraph,
        start_page: &str,
    ) -> GraphGuidedExplorer {
        GraphGuidedExplorer::new(driver, Arc::new(graph), &config(start_page), 11).unwrap()
    }

    mod start_page_tests {
        use super::*;

        #[test]
        fn test_max_out_degree_wins_without_config() {
            let graph = PageGraph {
                nodes: vec![node("/A"), node("/B"), node("/C")],
                edges: vec![edge("/A", "/B", ".1"), edge("/A", "/C", ".2"), edge("/B", "/C", ".3")],
            };
            let driver = Arc::new(MockDriver::new("about:blank"));
            // configured start normalizes to a key with no outgoing edges
            let ex = explorer(driver, graph, "/unknown");
            assert_eq!(ex.start_page().as_str(), "/A");
        }

        #[test]
        fn test_configured_start_with_edges_is_kept() {
            let graph = PageGraph {
                nodes: vec![node("/A"), node("/B")],
                edges: vec![edge("/A", "/B", ".1"), edge("/B", "/A", ".2")],
            };
            let driver = Arc::new(MockDriver::new("about:blank"));
            let ex = explorer(driver, graph, "/B");
            assert_eq!(ex.start_page().as_str(), "/B");
        }

        #[test]
        fn test_configured_start_without_edges_falls_back() {
            let graph = PageGraph {
                nodes: vec![node("/A"), node("/sink")],
                edges: vec![edge("/A", "/sink", ".1")],
            };
            let driver = Arc::new(MockDriver::new("about:blank"));
            let ex = explorer(driver, graph, "/sink");
            assert_eq!(ex.start_page().as_str(), "/A");
        }

        #[test]
        fn test_no_edges_falls_back_to_first_node() {
            let graph = PageGraph {
                nodes: vec![node("/landing"), node("/other")],
                edges: Vec::new(),
            };
            let driver = Arc::new(MockDriver::new("about:blank"));
            let ex = explorer(driver, graph, "/nowhere");
            assert_eq!(ex.start_page().as_str(), "/landing");
        }

        #[test]
        fn test_tie_breaks_by_first_seen_order() {
            let graph = PageGraph {
                nodes: vec![node("/A"), node("/B")],
                edges: vec![
                    edge("/B", "/A", ".1"),
                    edge("/A", "/B", ".2"),
                    edge("/B", "/B", ".3"),
                    edge("/A", "/A", ".4"),
                ],
            };
            let driver = Arc::new(MockDriver::new("about:blank"));
            let ex = explorer(driver, graph, "/nowhere");
            // both have degree 2; /B was seen first in the edge scan
            assert_eq!(ex.start_page().as_str(), "/B");
        }
    }

    mod traversal_tests {
        use super::*;
        use std::time::Duration;

        fn chain_app() -> (Arc<MockDriver>, PageGraph) {
            let driver = Arc::new(MockDriver::new("about:blank"));
            driver.add_element(
                "http://app/",
                MockElement::new("btn1", "button")
                    .with_selector(".btn1")
                    .navigates_to("http://app/a"),
            );
            driver.add_element(
                "http://app/a",
                MockElement::new("btn2", "button")
                    .with_selector(".btn2")
                    .navigates_to("http://app/b"),
            );
            let graph = PageGraph {
                nodes: vec![node("/"), node("/a"), node("/b")],
                edges: vec![edge("/", "/a", ".btn1"), edge("/a", "/b", ".btn2")],
            };
            (driver, graph)
        }

        #[tokio::test(start_paused = true)]
        async fn test_full_chain_is_covered() {
            let (driver, graph) = chain_app();
            let total = graph.node_count();
            let mut ex = explorer(driver, graph, "/");
            let progress = ex.progress();

            ex.explore(Deadline::after(Duration::from_secs(10)))
                .await
                .unwrap();

            assert_eq!(progress.pages_visited(), 3);
            assert!(progress.actions() >= 2);
            let coverage = crate::coverage::page_coverage(progress.pages_visited(), total);
            assert!((coverage - 1.0).abs() < f64::EPSILON);
        }

        #[tokio::test(start_paused = true)]
        async fn test_visited_set_is_monotone_across_rounds() {
            let (driver, graph) = chain_app();
            let mut ex = explorer(driver, graph, "/");
            let progress = ex.progress();

            // long enough for many rounds
            ex.explore(Deadline::after(Duration::from_secs(30)))
                .await
                .unwrap();
            assert_eq!(progress.pages_visited(), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_router_redirect_edge_is_navigated() {
            let driver = Arc::new(MockDriver::new("about:blank"));
            let mut redirect = edge("/", "/home", NO_ELEMENT_SELECTOR);
            redirect.event = "routeRedirect".to_string();
            let graph = PageGraph {
                nodes: vec![node("/"), node("/home")],
                edges: vec![redirect],
            };
            let mut ex = explorer(driver.clone(), graph, "/");
            ex.explore(Deadline::after(Duration::from_secs(3)))
                .await
                .unwrap();

            assert!(driver.was_called("navigate:http://app/home"));
            assert_eq!(ex.progress().pages_visited(), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_sentinel_click_edge_is_skipped() {
            let driver = Arc::new(MockDriver::new("about:blank"));
            let graph = PageGraph {
                nodes: vec![node("/"), node("/home")],
                edges: vec![edge("/", "/home", NO_ELEMENT_SELECTOR)],
            };
            let mut ex = explorer(driver.clone(), graph, "/");
            ex.explore(Deadline::after(Duration::from_secs(2)))
                .await
                .unwrap();

            assert!(!driver.was_called("navigate:http://app/home"));
            assert_eq!(ex.progress().pages_visited(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_missing_selector_is_skipped_without_fatal() {
            let driver = Arc::new(MockDriver::new("about:blank"));
            let graph = PageGraph {
                nodes: vec![node("/"), node("/a")],
                edges: vec![edge("/", "/a", ".never-there")],
            };
            let mut ex = explorer(driver, graph, "/");
            ex.explore(Deadline::after(Duration::from_secs(2)))
                .await
                .unwrap();
            assert_eq!(ex.progress().pages_visited(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_logout_edge_target_is_never_clicked() {
            let driver = Arc::new(MockDriver::new("about:blank"));
            driver.add_element(
                "http://app/",
                MockElement::new("quit", "button")
                    .with_selector(".quit")
                    .with_selector("button:visible")
                    .with_text("退出登录")
                    .navigates_to("http://app/login"),
            );
            let graph = PageGraph {
                nodes: vec![node("/"), node("/login")],
                edges: vec![edge("/", "/login", ".quit")],
            };
            let mut ex = explorer(driver.clone(), graph, "/");
            ex.explore(Deadline::after(Duration::from_secs(5)))
                .await
                .unwrap();

            assert!(!driver.was_called("click:quit"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_unexpected_navigation_is_still_explored() {
            let driver = Arc::new(MockDriver::new("about:blank"));
            // the edge says /a but the click actually lands on /surprise
            driver.add_element(
                "http://app/",
                MockElement::new("btn1", "button")
                    .with_selector(".btn1")
                    .navigates_to("http://app/surprise"),
            );
            let graph = PageGraph {
                nodes: vec![node("/"), node("/a"), node("/surprise")],
                edges: vec![edge("/", "/a", ".btn1")],
            };
            let mut ex = explorer(driver, graph, "/");
            let progress = ex.progress();
            ex.explore(Deadline::after(Duration::from_secs(3)))
                .await
                .unwrap();

            assert_eq!(progress.pages_visited(), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_probe_descends_and_returns() {
            let driver = Arc::new(MockDriver::new("about:blank"));
            // no graph edges at all; only a generic link found by probing
            driver.add_element(
                "http://app/",
                MockElement::new("link", "a")
                    .with_selector("a:visible")
                    .navigates_to("http://app/found"),
            );
            let graph = PageGraph {
                nodes: vec![node("/"), node("/found")],
                edges: vec![edge("/", "/nowhere", ".absent")],
            };
            let mut ex = explorer(driver, graph, "/");
            let progress = ex.progress();
            ex.explore(Deadline::after(Duration::from_secs(5)))
                .await
                .unwrap();

            assert!(progress.pages_visited() >= 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_terminates_at_deadline() {
            let (driver, graph) = chain_app();
            let mut ex = explorer(driver, graph, "/");
            let budget = Duration::from_secs(4);
            let started = tokio::time::Instant::now();
            ex.explore(Deadline::after(budget)).await.unwrap();
            let elapsed = started.elapsed();
            // cooperative stop: at most one capped operation past the deadline
            assert!(elapsed >= budget);
            assert!(elapsed < budget + Duration::from_secs(5));
        }
    }
}
