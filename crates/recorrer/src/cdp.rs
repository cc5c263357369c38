//! Chromium driver over the Chrome DevTools Protocol.
//!
//! Real [`BrowserDriver`] implementation backed by chromiumoxide. Elements
//! are addressed by tagging them with a `data-recorrer-id` attribute at
//! lookup time, so a handle stays resolvable for follow-up visibility
//! checks and clicks. Compiled only with the `browser` feature.

use crate::dialog::{DialogDecision, DialogKind, DialogPolicy};
use crate::driver::{BrowserDriver, Cookie, ElementHandle};
use crate::result::{RecorrerError, RecorrerResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, Headers, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    DialogType, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Launch settings for the CDP driver
#[derive(Debug, Clone)]
pub struct CdpSettings {
    /// Run in headless mode
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for CdpSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl CdpSettings {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Script returning located elements as `{id, tag, text, attrs}` records.
/// `__PARTS__` is replaced with a JSON array of selector parts.
const LOCATE_SCRIPT: &str = r#"(() => {
    const parts = __PARTS__;
    window.__recorrer_seq = window.__recorrer_seq || 0;
    const isVisible = (el) => {
        if (!el.getClientRects().length) return false;
        const style = getComputedStyle(el);
        return style.visibility !== 'hidden' && style.display !== 'none';
    };
    const describe = (el) => {
        if (!el.dataset.recorrerId) {
            el.dataset.recorrerId = String(++window.__recorrer_seq);
        }
        const attrs = {};
        for (const name of ['href', 'onclick', 'class', 'id', 'disabled', 'aria-disabled', 'data-index']) {
            const v = el.getAttribute(name);
            if (v !== null) attrs[name] = v;
        }
        return {
            id: el.dataset.recorrerId,
            tag: el.tagName.toLowerCase(),
            text: (el.textContent || '').trim().slice(0, 200),
            attrs,
        };
    };
    const seen = new Set();
    const out = [];
    for (const part of parts) {
        let sel = part.trim();
        let requireVisible = false;
        if (sel.endsWith(':visible')) {
            requireVisible = true;
            sel = sel.slice(0, -8);
        }
        let hasText = null;
        const m = sel.match(/:has-text\((['"])(.*?)\1\)/);
        if (m) {
            hasText = m[2];
            sel = sel.replace(m[0], '');
        }
        let found;
        try {
            found = document.querySelectorAll(sel || '*');
        } catch (e) {
            continue;
        }
        for (const el of found) {
            if (requireVisible && !isVisible(el)) continue;
            if (hasText !== null && !(el.textContent || '').includes(hasText)) continue;
            if (seen.has(el)) continue;
            seen.add(el);
            out.push(describe(el));
        }
    }
    return out;
})()"#;

#[derive(Debug, Deserialize)]
struct LocatedElement {
    id: String,
    tag: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
}

impl From<LocatedElement> for ElementHandle {
    fn from(el: LocatedElement) -> Self {
        Self {
            id: el.id,
            tag: el.tag,
            text: el.text,
            attrs: el.attrs,
        }
    }
}

/// Chromium-backed driver for one shared page
pub struct CdpDriver {
    browser: Arc<Mutex<CdpBrowser>>,
    page: CdpPage,
    #[allow(dead_code)]
    handler: tokio::task::JoinHandle<()>,
}

impl CdpDriver {
    /// Launch a browser and open the shared page.
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::BrowserLaunch`] when chromium cannot start.
    pub async fn launch(settings: CdpSettings) -> RecorrerResult<Self> {
        let mut builder = CdpConfig::builder();
        if !settings.headless {
            builder = builder.with_head();
        }
        if !settings.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = settings.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(|e| RecorrerError::BrowserLaunch {
            message: e.to_string(),
        })?;

        let (browser, mut events) =
            CdpBrowser::launch(config)
                .await
                .map_err(|e| RecorrerError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page =
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| RecorrerError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            page,
            handler,
        })
    }

    /// Close the browser
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::BrowserLaunch`] when shutdown fails.
    pub async fn close(&self) -> RecorrerResult<()> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| RecorrerError::BrowserLaunch {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn bounded<T, F>(timeout: Duration, operation: F) -> RecorrerResult<T>
    where
        F: Future<Output = RecorrerResult<T>>,
    {
        tokio::time::timeout(timeout, operation)
            .await
            .map_err(|_| RecorrerError::Timeout {
                ms: timeout.as_millis() as u64,
            })?
    }

    async fn eval(&self, script: &str) -> RecorrerResult<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| RecorrerError::Evaluation {
                message: e.to_string(),
            })?;
        result
            .into_value()
            .map_err(|e| RecorrerError::Evaluation {
                message: e.to_string(),
            })
    }

    fn by_handle(element: &ElementHandle) -> String {
        format!("[data-recorrer-id=\"{}\"]", element.id)
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn navigate(&self, url: &str, timeout: Duration) -> RecorrerResult<()> {
        Self::bounded(timeout, async {
            self.page
                .goto(url)
                .await
                .map_err(|e| RecorrerError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        })
        .await
    }

    async fn current_url(&self) -> RecorrerResult<String> {
        let url = self.page.url().await.map_err(|e| RecorrerError::Evaluation {
            message: e.to_string(),
        })?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn go_back(&self, timeout: Duration) -> RecorrerResult<()> {
        // chromiumoxide exposes no history call; the observed URL is re-read
        // by the caller afterwards, which is all it relies on
        Self::bounded(timeout, async {
            self.eval("history.back()").await?;
            Ok(())
        })
        .await
    }

    async fn locate(&self, selector: &str) -> RecorrerResult<Vec<ElementHandle>> {
        let parts: Vec<&str> = selector.split(',').map(str::trim).collect();
        let script = LOCATE_SCRIPT.replace("__PARTS__", &serde_json::to_string(&parts)?);
        let value = self.eval(&script).await?;
        let located: Vec<LocatedElement> = serde_json::from_value(value)?;
        Ok(located.into_iter().map(ElementHandle::from).collect())
    }

    async fn is_visible(&self, element: &ElementHandle, timeout: Duration) -> RecorrerResult<bool> {
        let script = format!(
            "(() => {{ const el = document.querySelector('{}'); \
             if (!el) return false; \
             if (!el.getClientRects().length) return false; \
             const style = getComputedStyle(el); \
             return style.visibility !== 'hidden' && style.display !== 'none'; }})()",
            Self::by_handle(element)
        );
        Self::bounded(timeout, async {
            Ok(self.eval(&script).await?.as_bool().unwrap_or(false))
        })
        .await
    }

    async fn click(&self, element: &ElementHandle, timeout: Duration) -> RecorrerResult<()> {
        let selector = Self::by_handle(element);
        Self::bounded(timeout, async {
            let found =
                self.page
                    .find_element(&selector)
                    .await
                    .map_err(|e| RecorrerError::Element {
                        message: format!("{selector}: {e}"),
                    })?;
            found.click().await.map_err(|e| RecorrerError::Element {
                message: format!("click {selector}: {e}"),
            })?;
            Ok(())
        })
        .await
    }

    async fn can_click(&self, element: &ElementHandle, timeout: Duration) -> RecorrerResult<bool> {
        // hit-test the element's center without dispatching anything
        let script = format!(
            "(() => {{ const el = document.querySelector('{}'); \
             if (!el) return false; \
             const r = el.getBoundingClientRect(); \
             if (!r.width || !r.height) return false; \
             const hit = document.elementFromPoint(r.left + r.width / 2, r.top + r.height / 2); \
             return hit === el || el.contains(hit); }})()",
            Self::by_handle(element)
        );
        Self::bounded(timeout, async {
            Ok(self.eval(&script).await?.as_bool().unwrap_or(false))
        })
        .await
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> RecorrerResult<()> {
        let script = format!(
            "(() => {{ const el = document.querySelector('{}'); \
             if (el) el.scrollIntoView({{block: 'center', inline: 'nearest'}}); }})()",
            Self::by_handle(element)
        );
        self.eval(&script).await?;
        Ok(())
    }

    async fn closest(
        &self,
        element: &ElementHandle,
        selector: &str,
    ) -> RecorrerResult<Option<ElementHandle>> {
        self.relative_lookup(element, selector, "closest").await
    }

    async fn find_in(
        &self,
        element: &ElementHandle,
        selector: &str,
    ) -> RecorrerResult<Option<ElementHandle>> {
        self.relative_lookup(element, selector, "querySelector").await
    }

    async fn evaluate(&self, script: &str) -> RecorrerResult<serde_json::Value> {
        self.eval(script).await
    }

    async fn press_key(&self, key: &str) -> RecorrerResult<()> {
        let literal = serde_json::to_string(key)?;
        let script = format!(
            "document.dispatchEvent(new KeyboardEvent('keydown', {{key: {literal}, bubbles: true}}))"
        );
        self.eval(&script).await?;
        Ok(())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> RecorrerResult<()> {
        let mut params = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            let mut builder = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .path(cookie.path.clone());
            if let Some(ref domain) = cookie.domain {
                builder = builder.domain(domain.clone());
            }
            if let Some(http_only) = cookie.http_only {
                builder = builder.http_only(http_only);
            }
            if let Some(secure) = cookie.secure {
                builder = builder.secure(secure);
            }
            params.push(builder.build().map_err(|e| RecorrerError::Config {
                message: format!("invalid cookie {}: {e}", cookie.name),
            })?);
        }
        self.page
            .set_cookies(params)
            .await
            .map_err(|e| RecorrerError::Evaluation {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn set_extra_headers(&self, headers: &[(String, String)]) -> RecorrerResult<()> {
        let mut map = serde_json::Map::new();
        for (name, value) in headers {
            map.insert(name.clone(), serde_json::Value::String(value.clone()));
        }
        self.page
            .execute(SetExtraHttpHeadersParams {
                headers: Headers::new(serde_json::Value::Object(map)),
            })
            .await
            .map_err(|e| RecorrerError::Evaluation {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn set_dialog_policy(&self, policy: DialogPolicy) -> RecorrerResult<()> {
        let mut dialogs = self
            .page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(|e| RecorrerError::Evaluation {
                message: e.to_string(),
            })?;
        let page = self.page.clone();
        tokio::spawn(async move {
            while let Some(event) = dialogs.next().await {
                let kind = match event.r#type {
                    DialogType::Alert => DialogKind::Alert,
                    DialogType::Confirm => DialogKind::Confirm,
                    DialogType::Prompt => DialogKind::Prompt,
                    DialogType::Beforeunload => DialogKind::BeforeUnload,
                };
                debug!(kind = %kind, message = %event.message, "dialog opened");
                let decision = policy.decide(kind, event.default_prompt.as_deref());
                let params = match decision {
                    DialogDecision::Accept => HandleJavaScriptDialogParams::builder()
                        .accept(true)
                        .build(),
                    DialogDecision::AcceptWith(text) => HandleJavaScriptDialogParams::builder()
                        .accept(true)
                        .prompt_text(text)
                        .build(),
                    DialogDecision::Dismiss => HandleJavaScriptDialogParams::builder()
                        .accept(false)
                        .build(),
                };
                match params {
                    Ok(params) => {
                        if let Err(e) = page.execute(params).await {
                            warn!(error = %e, "failed to handle dialog");
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to build dialog response"),
                }
            }
        });
        Ok(())
    }
}

impl CdpDriver {
    async fn relative_lookup(
        &self,
        element: &ElementHandle,
        selector: &str,
        method: &str,
    ) -> RecorrerResult<Option<ElementHandle>> {
        // strip the :visible pseudo-class, which only exists in our
        // locate-script dialect
        let cleaned: Vec<String> = selector
            .split(',')
            .map(|part| part.trim().trim_end_matches(":visible").to_string())
            .collect();
        let origin = Self::by_handle(element);
        let script = format!(
            r#"(() => {{
                const origin = document.querySelector('{origin}');
                if (!origin) return null;
                const target = origin.{method}({sel});
                if (!target) return null;
                window.__recorrer_seq = window.__recorrer_seq || 0;
                if (!target.dataset.recorrerId) {{
                    target.dataset.recorrerId = String(++window.__recorrer_seq);
                }}
                const attrs = {{}};
                for (const name of ['href', 'onclick', 'class', 'id', 'disabled', 'aria-disabled', 'data-index']) {{
                    const v = target.getAttribute(name);
                    if (v !== null) attrs[name] = v;
                }}
                return {{
                    id: target.dataset.recorrerId,
                    tag: target.tagName.toLowerCase(),
                    text: (target.textContent || '').trim().slice(0, 200),
                    attrs,
                }};
            }})()"#,
            sel = serde_json::to_string(&cleaned.join(", "))?,
        );
        let value = self.eval(&script).await?;
        if value.is_null() {
            return Ok(None);
        }
        let located: LocatedElement = serde_json::from_value(value)?;
        Ok(Some(located.into()))
    }
}

impl std::fmt::Debug for CdpDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdpDriver").finish_non_exhaustive()
    }
}
