//! Abstract browser-control trait.
//!
//! The engine drives a single shared page through this trait. Every
//! operation may suspend and may time out; implementations use interior
//! mutability so one instance can serve the explorer and the snapshot
//! coordinator concurrently. All operations are fallible; callers treat
//! failure as "no effect" and never let it escape the exploration loop.
//!
//! A CDP implementation lives behind the `browser` feature ([`crate::cdp`]);
//! [`MockDriver`] is always available and scriptable for unit testing.

use crate::dialog::DialogPolicy;
use crate::result::{RecorrerError, RecorrerResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Handle to a located DOM element, with the attribute snapshot the
/// exploration heuristics inspect (text, href, onclick, class, id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-scoped element identifier
    pub id: String,
    /// Lower-case tag name
    pub tag: String,
    /// Trimmed text content
    #[serde(default)]
    pub text: String,
    /// Attribute snapshot taken at lookup time
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

impl ElementHandle {
    /// Create a handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            text: String::new(),
            attrs: BTreeMap::new(),
        }
    }

    /// Set the text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Attribute value, if captured
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// Cookie injected by the auth bootstrap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Host, defaulting to the target origin's host
    #[serde(default)]
    pub domain: Option<String>,
    /// Cookie path
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// `HttpOnly` flag
    #[serde(default)]
    pub http_only: Option<bool>,
    /// `Secure` flag
    #[serde(default)]
    pub secure: Option<bool>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// Remote browser-control channel consumed by the exploration engine
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate the shared page to `url`
    async fn navigate(&self, url: &str, timeout: Duration) -> RecorrerResult<()>;

    /// URL the page is currently showing
    async fn current_url(&self) -> RecorrerResult<String>;

    /// One step back in session history
    async fn go_back(&self, timeout: Duration) -> RecorrerResult<()>;

    /// All elements matching a comma-separated selector list, in DOM order
    async fn locate(&self, selector: &str) -> RecorrerResult<Vec<ElementHandle>>;

    /// Whether the element is visible within `timeout`
    async fn is_visible(&self, element: &ElementHandle, timeout: Duration) -> RecorrerResult<bool>;

    /// Click the element
    async fn click(&self, element: &ElementHandle, timeout: Duration) -> RecorrerResult<()>;

    /// Trial hit-test: would a click reach this element? No state change.
    async fn can_click(&self, element: &ElementHandle, timeout: Duration) -> RecorrerResult<bool>;

    /// Scroll the element into the viewport
    async fn scroll_into_view(&self, element: &ElementHandle) -> RecorrerResult<()>;

    /// Nearest ancestor (or self) matching `selector`
    async fn closest(
        &self,
        element: &ElementHandle,
        selector: &str,
    ) -> RecorrerResult<Option<ElementHandle>>;

    /// First descendant of `element` matching `selector`
    async fn find_in(
        &self,
        element: &ElementHandle,
        selector: &str,
    ) -> RecorrerResult<Option<ElementHandle>>;

    /// Evaluate a script in the page, returning its JSON value
    async fn evaluate(&self, script: &str) -> RecorrerResult<serde_json::Value>;

    /// Dispatch a keyboard key (used to close stray modals)
    async fn press_key(&self, key: &str) -> RecorrerResult<()>;

    /// Seed cookies into the browsing context
    async fn set_cookies(&self, cookies: &[Cookie]) -> RecorrerResult<()>;

    /// Attach extra headers to every subsequent request
    async fn set_extra_headers(&self, headers: &[(String, String)]) -> RecorrerResult<()>;

    /// Register the dialog policy applied to every JavaScript dialog
    async fn set_dialog_policy(&self, policy: DialogPolicy) -> RecorrerResult<()>;
}

// =============================================================================
// MOCK DRIVER
// =============================================================================

/// One scripted element of a [`MockDriver`] page
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Handle returned from lookups
    pub handle: ElementHandle,
    /// Selector strings (single parts, not comma lists) that locate it
    pub selectors: Vec<String>,
    /// Whether the element reports visible
    pub visible: bool,
    /// Whether clicks on it succeed
    pub clickable: bool,
    /// URL the page moves to when the element is clicked
    pub navigates_to: Option<String>,
    /// Ancestors findable through `closest`, keyed by selector
    pub ancestors: Vec<(String, ElementHandle)>,
    /// Descendants findable through `find_in`, keyed by selector
    pub descendants: Vec<(String, ElementHandle)>,
}

impl MockElement {
    /// Visible, clickable element with no click effect
    #[must_use]
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            handle: ElementHandle::new(id, tag),
            selectors: Vec::new(),
            visible: true,
            clickable: true,
            navigates_to: None,
            ancestors: Vec::new(),
            descendants: Vec::new(),
        }
    }

    /// Register a selector that locates this element
    #[must_use]
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.handle.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.handle.attrs.insert(name.into(), value.into());
        self
    }

    /// Make clicks navigate to `url`
    #[must_use]
    pub fn navigates_to(mut self, url: impl Into<String>) -> Self {
        self.navigates_to = Some(url.into());
        self
    }

    /// Mark the element hidden
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Make clicks on the element fail
    #[must_use]
    pub fn unclickable(mut self) -> Self {
        self.clickable = false;
        self
    }

    /// Attach an ancestor reachable through `closest(selector)`
    #[must_use]
    pub fn with_ancestor(mut self, selector: impl Into<String>, handle: ElementHandle) -> Self {
        self.ancestors.push((selector.into(), handle));
        self
    }

    /// Attach a descendant reachable through `find_in(selector)`
    #[must_use]
    pub fn with_descendant(mut self, selector: impl Into<String>, handle: ElementHandle) -> Self {
        self.descendants.push((selector.into(), handle));
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    pages: BTreeMap<String, Vec<MockElement>>,
    current: String,
    history: Vec<String>,
    eval_results: Vec<(String, serde_json::Value)>,
    calls: Vec<String>,
    dialog_policy: DialogPolicy,
    cookies: Vec<Cookie>,
    headers: Vec<(String, String)>,
}

/// Scriptable in-memory driver: a fake application defined as pages of
/// elements with click → navigation effects, plus a call log for
/// verification.
#[derive(Debug)]
pub struct MockDriver {
    state: std::sync::Mutex<MockState>,
}

impl MockDriver {
    /// Driver currently showing `start_url`
    #[must_use]
    pub fn new(start_url: impl Into<String>) -> Self {
        let state = MockState {
            current: start_url.into(),
            ..MockState::default()
        };
        Self {
            state: std::sync::Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add an element to the page served at `url`
    pub fn add_element(&self, url: impl Into<String>, element: MockElement) {
        self.lock().pages.entry(url.into()).or_default().push(element);
    }

    /// Script an evaluation result for scripts containing `needle`
    pub fn set_eval_result(&self, needle: impl Into<String>, value: serde_json::Value) {
        self.lock().eval_results.push((needle.into(), value));
    }

    /// Recorded driver calls, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Whether any recorded call starts with `prefix`
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().calls.iter().any(|c| c.starts_with(prefix))
    }

    /// Registered dialog policy
    #[must_use]
    pub fn dialog_policy(&self) -> DialogPolicy {
        self.lock().dialog_policy
    }

    /// Cookies seeded so far
    #[must_use]
    pub fn cookies(&self) -> Vec<Cookie> {
        self.lock().cookies.clone()
    }

    /// Extra headers registered so far
    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        self.lock().headers.clone()
    }

    fn find_on_current(state: &MockState, id: &str) -> Option<MockElement> {
        state
            .pages
            .get(&state.current)
            .and_then(|els| els.iter().find(|e| e.handle.id == id))
            .cloned()
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(&self, url: &str, _timeout: Duration) -> RecorrerResult<()> {
        let mut state = self.lock();
        state.calls.push(format!("navigate:{url}"));
        let previous = std::mem::replace(&mut state.current, url.to_string());
        state.history.push(previous);
        Ok(())
    }

    async fn current_url(&self) -> RecorrerResult<String> {
        Ok(self.lock().current.clone())
    }

    async fn go_back(&self, _timeout: Duration) -> RecorrerResult<()> {
        let mut state = self.lock();
        state.calls.push("go_back".to_string());
        if let Some(previous) = state.history.pop() {
            state.current = previous;
        }
        Ok(())
    }

    async fn locate(&self, selector: &str) -> RecorrerResult<Vec<ElementHandle>> {
        let state = self.lock();
        let Some(elements) = state.pages.get(&state.current) else {
            return Ok(Vec::new());
        };
        let parts: Vec<&str> = selector.split(',').map(str::trim).collect();
        Ok(elements
            .iter()
            .filter(|e| parts.iter().any(|p| e.selectors.iter().any(|s| s == p)))
            .map(|e| e.handle.clone())
            .collect())
    }

    async fn is_visible(&self, element: &ElementHandle, _timeout: Duration) -> RecorrerResult<bool> {
        let state = self.lock();
        Ok(Self::find_on_current(&state, &element.id).is_some_and(|e| e.visible))
    }

    async fn click(&self, element: &ElementHandle, _timeout: Duration) -> RecorrerResult<()> {
        let mut state = self.lock();
        state.calls.push(format!("click:{}", element.id));
        let Some(found) = Self::find_on_current(&state, &element.id) else {
            return Err(RecorrerError::Element {
                message: format!("{} is not on the current page", element.id),
            });
        };
        if !found.clickable {
            return Err(RecorrerError::Element {
                message: format!("{} did not receive the click", element.id),
            });
        }
        if let Some(url) = found.navigates_to {
            let previous = std::mem::replace(&mut state.current, url);
            state.history.push(previous);
        }
        Ok(())
    }

    async fn can_click(&self, element: &ElementHandle, _timeout: Duration) -> RecorrerResult<bool> {
        let state = self.lock();
        Ok(Self::find_on_current(&state, &element.id)
            .is_some_and(|e| e.clickable && e.visible))
    }

    async fn scroll_into_view(&self, _element: &ElementHandle) -> RecorrerResult<()> {
        Ok(())
    }

    async fn closest(
        &self,
        element: &ElementHandle,
        selector: &str,
    ) -> RecorrerResult<Option<ElementHandle>> {
        let state = self.lock();
        let parts: Vec<&str> = selector.split(',').map(str::trim).collect();
        Ok(Self::find_on_current(&state, &element.id).and_then(|e| {
            e.ancestors
                .iter()
                .find(|(s, _)| parts.contains(&s.as_str()))
                .map(|(_, handle)| handle.clone())
        }))
    }

    async fn find_in(
        &self,
        element: &ElementHandle,
        selector: &str,
    ) -> RecorrerResult<Option<ElementHandle>> {
        let state = self.lock();
        let parts: Vec<&str> = selector.split(',').map(str::trim).collect();
        Ok(Self::find_on_current(&state, &element.id).and_then(|e| {
            e.descendants
                .iter()
                .find(|(s, _)| parts.contains(&s.as_str()))
                .map(|(_, handle)| handle.clone())
        }))
    }

    async fn evaluate(&self, script: &str) -> RecorrerResult<serde_json::Value> {
        let mut state = self.lock();
        state.calls.push(format!("evaluate:{script}"));
        Ok(state
            .eval_results
            .iter()
            .find(|(needle, _)| script.contains(needle))
            .map_or(serde_json::Value::Null, |(_, value)| value.clone()))
    }

    async fn press_key(&self, key: &str) -> RecorrerResult<()> {
        self.lock().calls.push(format!("press_key:{key}"));
        Ok(())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> RecorrerResult<()> {
        self.lock().cookies.extend_from_slice(cookies);
        Ok(())
    }

    async fn set_extra_headers(&self, headers: &[(String, String)]) -> RecorrerResult<()> {
        self.lock().headers.extend_from_slice(headers);
        Ok(())
    }

    async fn set_dialog_policy(&self, policy: DialogPolicy) -> RecorrerResult<()> {
        let mut state = self.lock();
        state.calls.push(format!("dialog_policy:{policy:?}"));
        state.dialog_policy = policy;
        Ok(())
    }
}
