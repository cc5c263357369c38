//! Reveal heuristics for hidden edge targets.
//!
//! Menu items frequently sit behind collapsed submenus or closed dropdowns,
//! so a selector from the transition graph can match nothing even though the
//! action exists. Before giving an edge up, the explorer runs an ordered
//! chain of [`RevealStrategy`] handlers; each either reveals something,
//! declares itself not applicable to the selector, or fails, and the chain
//! stops at the first success.

use crate::deadline::{
    settle, Deadline, BEFORE_NEXT_ACTION, MENU_EXPAND, PROBE_CAP, REVEAL_CAP, SUBMENU_EXPAND,
};
use crate::driver::{BrowserDriver, ElementHandle};
use crate::state::ExplorationState;
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

/// Dropdown triggers, most specific first
const DROPDOWN_TRIGGERS: &[&str] = &[
    ".el-dropdown:visible",
    ".el-dropdown-link:visible",
    ".el-dropdown-selfdefine:visible",
    ".el-avatar:visible",
    "[class*=\"el-dropdown\"]:visible",
];

/// Submenu container, old and new component naming
pub const SUBMENU_ANCESTOR: &str = ".el-submenu, .el-sub-menu";

/// Clickable submenu titles
pub const SUBMENU_TITLES: &str = ".el-submenu__title, .el-sub-menu__title";

/// Visible submenu titles
pub const SUBMENU_TITLES_VISIBLE: &str = ".el-submenu__title:visible, .el-sub-menu__title:visible";

/// Most submenus a single expand-all sweep will open
const EXPAND_ALL_LIMIT: usize = 12;

/// Outcome of one reveal attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Something was opened; re-query the selector
    Revealed,
    /// The strategy does not handle this kind of selector
    NotApplicable,
    /// The strategy applied but could not reveal anything
    Failed,
}

/// Everything a strategy may touch while revealing
pub struct RevealCtx<'a> {
    /// Shared browser page
    pub driver: &'a dyn BrowserDriver,
    /// Run state carrying the sticky dropdown/submenu memory
    pub state: &'a mut ExplorationState,
    /// Remaining budget
    pub deadline: Deadline,
}

impl std::fmt::Debug for RevealCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealCtx").finish_non_exhaustive()
    }
}

/// One best-effort UI interaction that may make a hidden element
/// interactable
#[async_trait]
pub trait RevealStrategy: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Try to reveal whatever `selector` points at
    async fn attempt(&self, cx: &mut RevealCtx<'_>, selector: &str) -> RevealOutcome;
}

fn mentions_submenu(selector: &str) -> bool {
    let lower = selector.to_lowercase();
    lower.contains("el-submenu") || lower.contains("el-sub-menu") || lower.contains("el-menu-item")
}

/// Identity under which an expanded submenu is remembered for the run
fn submenu_memory_key(submenu: &ElementHandle) -> String {
    submenu
        .attr("data-index")
        .filter(|v| !v.is_empty())
        .or_else(|| submenu.attr("class").filter(|v| !v.is_empty()))
        .map_or_else(|| submenu.id.clone(), ToString::to_string)
}

fn is_opened(submenu: &ElementHandle) -> bool {
    submenu
        .attr("class")
        .is_some_and(|class| class.contains("is-opened"))
}

// =============================================================================
// STRATEGIES
// =============================================================================

/// Open the nearest dropdown trigger, once per run
#[derive(Debug, Default)]
pub struct OpenDropdown;

#[async_trait]
impl RevealStrategy for OpenDropdown {
    fn name(&self) -> &'static str {
        "open-dropdown"
    }

    async fn attempt(&self, cx: &mut RevealCtx<'_>, selector: &str) -> RevealOutcome {
        if !selector.to_lowercase().contains("el-dropdown-menu__item") {
            return RevealOutcome::NotApplicable;
        }
        if cx.state.dropdown_opened() {
            return RevealOutcome::Failed;
        }
        let Some(timeout) = cx.deadline.cap(PROBE_CAP) else {
            return RevealOutcome::Failed;
        };

        for trigger in DROPDOWN_TRIGGERS {
            let Ok(found) = cx.driver.locate(trigger).await else {
                continue;
            };
            let Some(first) = found.first() else {
                continue;
            };
            if !cx.driver.is_visible(first, timeout).await.unwrap_or(false) {
                continue;
            }
            if cx.driver.click(first, timeout).await.is_ok() {
                cx.state.mark_dropdown_opened();
                settle(cx.deadline, MENU_EXPAND).await;
                return RevealOutcome::Revealed;
            }
        }
        RevealOutcome::Failed
    }
}

/// Expand the submenu containing the menu item named inside a
/// `:has-text("...")` selector
#[derive(Debug)]
pub struct ExpandSubmenuByItemText {
    has_text: Regex,
}

impl Default for ExpandSubmenuByItemText {
    fn default() -> Self {
        Self {
            // has-text('x') / has-text("x")
            has_text: Regex::new(r#"has-text\('([^']*)'\)|has-text\("([^"]*)"\)"#)
                .unwrap_or_else(|_| unreachable!("static regex")),
        }
    }
}

#[async_trait]
impl RevealStrategy for ExpandSubmenuByItemText {
    fn name(&self) -> &'static str {
        "expand-submenu-by-item-text"
    }

    async fn attempt(&self, cx: &mut RevealCtx<'_>, selector: &str) -> RevealOutcome {
        if !mentions_submenu(selector) {
            return RevealOutcome::NotApplicable;
        }
        let Some(text) = self
            .has_text
            .captures(selector)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string())
        else {
            return RevealOutcome::NotApplicable;
        };
        let Some(timeout) = cx.deadline.cap(PROBE_CAP) else {
            return RevealOutcome::Failed;
        };

        let item_selector = format!(".el-menu-item:has-text(\"{text}\")");
        let Ok(items) = cx.driver.locate(&item_selector).await else {
            return RevealOutcome::Failed;
        };
        let Some(item) = items.first() else {
            return RevealOutcome::Failed;
        };
        let Ok(Some(submenu)) = cx.driver.closest(item, SUBMENU_ANCESTOR).await else {
            return RevealOutcome::Failed;
        };
        let Ok(Some(title)) = cx.driver.find_in(&submenu, SUBMENU_TITLES).await else {
            return RevealOutcome::Failed;
        };

        if cx.driver.click(&title, timeout).await.is_err() {
            debug!(selector, "submenu title did not take the click");
        }
        settle(cx.deadline, MENU_EXPAND).await;
        RevealOutcome::Revealed
    }
}

/// Expand the submenu that is an ancestor of the selector's first match
#[derive(Debug, Default)]
pub struct ExpandAncestorSubmenu;

#[async_trait]
impl RevealStrategy for ExpandAncestorSubmenu {
    fn name(&self) -> &'static str {
        "expand-ancestor-submenu"
    }

    async fn attempt(&self, cx: &mut RevealCtx<'_>, selector: &str) -> RevealOutcome {
        if !mentions_submenu(selector) {
            return RevealOutcome::NotApplicable;
        }
        let Some(timeout) = cx.deadline.cap(PROBE_CAP) else {
            return RevealOutcome::Failed;
        };

        let Ok(items) = cx.driver.locate(selector).await else {
            return RevealOutcome::Failed;
        };
        let Some(item) = items.first() else {
            return RevealOutcome::Failed;
        };
        let Ok(Some(submenu)) = cx.driver.closest(item, SUBMENU_ANCESTOR).await else {
            return RevealOutcome::Failed;
        };

        let memory_key = submenu_memory_key(&submenu);
        if cx.state.submenu_expanded(&memory_key) {
            return RevealOutcome::Failed;
        }
        let Ok(Some(title)) = cx.driver.find_in(&submenu, SUBMENU_TITLES).await else {
            return RevealOutcome::Failed;
        };

        if is_opened(&submenu) {
            cx.state.mark_submenu_expanded(memory_key);
            return RevealOutcome::Failed;
        }
        if cx.driver.click(&title, timeout).await.is_ok() {
            cx.state.mark_submenu_expanded(memory_key);
            settle(cx.deadline, MENU_EXPAND).await;
            return RevealOutcome::Revealed;
        }
        RevealOutcome::Failed
    }
}

/// Last resort: expand up to 3 visible submenu titles blind
#[derive(Debug, Default)]
pub struct ExpandVisibleTitles;

#[async_trait]
impl RevealStrategy for ExpandVisibleTitles {
    fn name(&self) -> &'static str {
        "expand-visible-titles"
    }

    async fn attempt(&self, cx: &mut RevealCtx<'_>, selector: &str) -> RevealOutcome {
        if !mentions_submenu(selector) {
            return RevealOutcome::NotApplicable;
        }
        let Ok(titles) = cx.driver.locate(SUBMENU_TITLES_VISIBLE).await else {
            return RevealOutcome::Failed;
        };
        if titles.is_empty() {
            return RevealOutcome::Failed;
        }
        for title in titles.iter().take(3) {
            let Some(timeout) = cx.deadline.cap(REVEAL_CAP) else {
                break;
            };
            let _ = cx.driver.click(title, timeout).await;
            settle(cx.deadline, BEFORE_NEXT_ACTION).await;
        }
        RevealOutcome::Revealed
    }
}

// =============================================================================
// CHAIN
// =============================================================================

/// Ordered reveal chain tried before an edge is skipped
pub struct RevealChain {
    strategies: Vec<Box<dyn RevealStrategy>>,
}

impl RevealChain {
    /// Standard chain: dropdown trigger, submenu by item text, ancestor
    /// submenu, blind title expansion.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            strategies: vec![
                Box::new(OpenDropdown),
                Box::new(ExpandSubmenuByItemText::default()),
                Box::new(ExpandAncestorSubmenu),
                Box::new(ExpandVisibleTitles),
            ],
        }
    }

    /// Chain with explicit strategies, for tests and extensions
    #[must_use]
    pub fn with_strategies(strategies: Vec<Box<dyn RevealStrategy>>) -> Self {
        Self { strategies }
    }

    /// Run the chain; `true` once any strategy reveals something
    pub async fn run(&self, cx: &mut RevealCtx<'_>, selector: &str) -> bool {
        for strategy in &self.strategies {
            match strategy.attempt(cx, selector).await {
                RevealOutcome::Revealed => {
                    debug!(strategy = strategy.name(), selector, "reveal succeeded");
                    return true;
                }
                RevealOutcome::NotApplicable | RevealOutcome::Failed => {}
            }
        }
        false
    }
}

impl std::fmt::Debug for RevealChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("RevealChain").field("strategies", &names).finish()
    }
}

/// Expand every collapsed submenu title on the page, up to a sweep limit.
/// Returns `true` when any title existed to expand.
pub async fn expand_all_submenus(driver: &dyn BrowserDriver, deadline: Deadline) -> bool {
    if deadline.cap(PROBE_CAP).is_none() {
        return false;
    }
    let Ok(titles) = driver.locate(SUBMENU_TITLES).await else {
        return false;
    };

    let limit = titles.len().min(EXPAND_ALL_LIMIT);
    for title in titles.iter().take(limit) {
        let opened = match driver.closest(title, SUBMENU_ANCESTOR).await {
            Ok(Some(submenu)) => is_opened(&submenu),
            _ => false,
        };
        if opened {
            continue;
        }
        let Some(timeout) = deadline.cap(PROBE_CAP) else {
            break;
        };
        let _ = driver.click(title, timeout).await;
        settle(deadline, SUBMENU_EXPAND).await;
    }
    limit > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockElement};
    use std::time::Duration;

    fn ctx<'a>(driver: &'a MockDriver, state: &'a mut ExplorationState) -> RevealCtx<'a> {
        RevealCtx {
            driver,
            state,
            deadline: Deadline::after(Duration::from_secs(30)),
        }
    }

    #[tokio::test]
    async fn test_dropdown_opens_once_per_run() {
        let driver = MockDriver::new("http://app/");
        driver.add_element(
            "http://app/",
            MockElement::new("dd", "div").with_selector(".el-dropdown:visible"),
        );
        let mut state = ExplorationState::new();

        let strategy = OpenDropdown;
        let outcome = strategy
            .attempt(&mut ctx(&driver, &mut state), ".el-dropdown-menu__item:has-text(\"Profile\")")
            .await;
        assert_eq!(outcome, RevealOutcome::Revealed);
        assert!(driver.was_called("click:dd"));

        // second attempt is spent
        let outcome = strategy
            .attempt(&mut ctx(&driver, &mut state), ".el-dropdown-menu__item")
            .await;
        assert_eq!(outcome, RevealOutcome::Failed);
    }

    #[tokio::test]
    async fn test_dropdown_ignores_other_selectors() {
        let driver = MockDriver::new("http://app/");
        let mut state = ExplorationState::new();
        let outcome = OpenDropdown
            .attempt(&mut ctx(&driver, &mut state), ".el-menu-item")
            .await;
        assert_eq!(outcome, RevealOutcome::NotApplicable);
    }

    #[tokio::test]
    async fn test_submenu_by_item_text_clicks_title() {
        let driver = MockDriver::new("http://app/");
        let submenu = ElementHandle::new("sub", "li").with_attr("class", "el-submenu");
        let title = ElementHandle::new("title", "div");
        driver.add_element(
            "http://app/",
            MockElement::new("item", "li")
                .with_selector(".el-menu-item:has-text(\"Books\")")
                .with_ancestor(".el-submenu", submenu.clone()),
        );
        let mut sub_el = MockElement::new("sub", "li");
        sub_el.handle = submenu;
        driver.add_element(
            "http://app/",
            sub_el.with_descendant(".el-submenu__title", title),
        );
        driver.add_element("http://app/", MockElement::new("title", "div"));

        let mut state = ExplorationState::new();
        let outcome = ExpandSubmenuByItemText::default()
            .attempt(
                &mut ctx(&driver, &mut state),
                ".el-menu-item:has-text(\"Books\")",
            )
            .await;
        assert_eq!(outcome, RevealOutcome::Revealed);
        assert!(driver.was_called("click:title"));
    }

    #[tokio::test]
    async fn test_ancestor_submenu_remembers_expansion() {
        let driver = MockDriver::new("http://app/");
        let submenu = ElementHandle::new("sub", "li")
            .with_attr("class", "el-submenu")
            .with_attr("data-index", "3");
        let title = ElementHandle::new("title", "div");
        driver.add_element(
            "http://app/",
            MockElement::new("item", "li")
                .with_selector(".el-menu-item.books")
                .with_ancestor(".el-submenu", submenu.clone()),
        );
        let mut sub_el = MockElement::new("sub", "li");
        sub_el.handle = submenu;
        driver.add_element(
            "http://app/",
            sub_el.with_descendant(".el-submenu__title", title),
        );
        driver.add_element("http://app/", MockElement::new("title", "div"));

        let mut state = ExplorationState::new();
        let strategy = ExpandAncestorSubmenu;
        let outcome = strategy
            .attempt(&mut ctx(&driver, &mut state), ".el-menu-item.books")
            .await;
        assert_eq!(outcome, RevealOutcome::Revealed);
        assert!(state.submenu_expanded("3"));

        let outcome = strategy
            .attempt(&mut ctx(&driver, &mut state), ".el-menu-item.books")
            .await;
        assert_eq!(outcome, RevealOutcome::Failed);
    }

    #[tokio::test]
    async fn test_visible_titles_expands_at_most_three() {
        let driver = MockDriver::new("http://app/");
        for i in 0..5 {
            driver.add_element(
                "http://app/",
                MockElement::new(format!("t{i}"), "div")
                    .with_selector(".el-submenu__title:visible"),
            );
        }
        let mut state = ExplorationState::new();
        let outcome = ExpandVisibleTitles
            .attempt(&mut ctx(&driver, &mut state), ".el-menu-item.books")
            .await;
        assert_eq!(outcome, RevealOutcome::Revealed);
        let clicks = driver
            .calls()
            .iter()
            .filter(|c| c.starts_with("click:"))
            .count();
        assert_eq!(clicks, 3);
    }

    #[tokio::test]
    async fn test_chain_stops_at_first_reveal() {
        let driver = MockDriver::new("http://app/");
        driver.add_element(
            "http://app/",
            MockElement::new("dd", "div").with_selector(".el-dropdown:visible"),
        );
        let mut state = ExplorationState::new();
        let chain = RevealChain::standard();
        let revealed = chain
            .run(&mut ctx(&driver, &mut state), ".el-dropdown-menu__item.profile")
            .await;
        assert!(revealed);
        // dropdown strategy consumed it; nothing else ran
        assert_eq!(
            driver
                .calls()
                .iter()
                .filter(|c| c.starts_with("click:"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_chain_gives_up_on_plain_selectors() {
        let driver = MockDriver::new("http://app/");
        let mut state = ExplorationState::new();
        let chain = RevealChain::standard();
        assert!(!chain.run(&mut ctx(&driver, &mut state), ".btn.save").await);
    }

    #[tokio::test]
    async fn test_expand_all_skips_opened_submenus() {
        let driver = MockDriver::new("http://app/");
        let opened = ElementHandle::new("sub-open", "li")
            .with_attr("class", "el-submenu is-opened");
        let collapsed = ElementHandle::new("sub-closed", "li").with_attr("class", "el-submenu");
        driver.add_element(
            "http://app/",
            MockElement::new("t1", "div")
                .with_selector(".el-submenu__title")
                .with_ancestor(".el-submenu", opened),
        );
        driver.add_element(
            "http://app/",
            MockElement::new("t2", "div")
                .with_selector(".el-submenu__title")
                .with_ancestor(".el-submenu", collapsed),
        );
        let mut state = ExplorationState::new();
        let deadline = Deadline::after(Duration::from_secs(30));
        assert!(expand_all_submenus(&driver, deadline).await);
        assert!(!driver.was_called("click:t1"));
        assert!(driver.was_called("click:t2"));
    }
}
