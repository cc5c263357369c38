//! One-time session seeding before exploration starts.
//!
//! The auth descriptor is declarative: a cookie list, storage key/value
//! pairs, or a bearer-token scheme. Failure here is non-fatal: the caller
//! logs a warning and explores unauthenticated.

use crate::config::{AuthDescriptor, StorageItem, TargetConfig};
use crate::driver::{BrowserDriver, Cookie};
use crate::result::RecorrerResult;
use crate::route::RouteNormalizer;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Navigation cap while landing on the origin to reach its storage
const BOOTSTRAP_NAV_CAP: Duration = Duration::from_secs(15);

/// Perform the one-time session seeding described by the target's auth
/// descriptor.
///
/// # Errors
///
/// Propagates driver failures; callers surface them as a logged warning and
/// continue the run.
pub async fn bootstrap(
    driver: &dyn BrowserDriver,
    config: &TargetConfig,
    routes: &RouteNormalizer,
) -> RecorrerResult<()> {
    match &config.auth {
        AuthDescriptor::None => Ok(()),
        AuthDescriptor::Cookies { cookies } => {
            let host = Url::parse(&config.base_url)
                .ok()
                .and_then(|u| u.host_str().map(ToString::to_string));
            let resolved: Vec<Cookie> = cookies
                .iter()
                .cloned()
                .map(|mut cookie| {
                    if cookie.domain.is_none() {
                        cookie.domain.clone_from(&host);
                    }
                    cookie
                })
                .collect();
            debug!(count = resolved.len(), "seeding cookies");
            driver.set_cookies(&resolved).await
        }
        AuthDescriptor::SessionStorage { items } => {
            seed_storage(driver, routes, "sessionStorage", items).await
        }
        AuthDescriptor::LocalStorage { items } => {
            seed_storage(driver, routes, "localStorage", items).await
        }
        AuthDescriptor::Bearer { token, scheme } => {
            let header = if token.starts_with(&format!("{scheme} ")) {
                token.clone()
            } else {
                format!("{scheme} {token}")
            };
            debug!("attaching authorization header");
            driver
                .set_extra_headers(&[("Authorization".to_string(), header)])
                .await
        }
    }
}

/// Web storage only exists per origin, so land on the origin first, then
/// write every item through one script.
async fn seed_storage(
    driver: &dyn BrowserDriver,
    routes: &RouteNormalizer,
    store: &str,
    items: &[StorageItem],
) -> RecorrerResult<()> {
    if items.is_empty() {
        return Ok(());
    }

    driver
        .navigate(&format!("{}/", routes.origin()), BOOTSTRAP_NAV_CAP)
        .await?;

    let script = storage_script(store, items)?;
    debug!(store, count = items.len(), "seeding web storage");
    driver.evaluate(&script).await?;
    Ok(())
}

fn storage_script(store: &str, items: &[StorageItem]) -> RecorrerResult<String> {
    let mut script = String::from("(() => {\n");
    for item in items {
        let stored = match &item.value {
            serde_json::Value::String(s) => s.clone(),
            other => serde_json::to_string(other)?,
        };
        let key_literal = serde_json::to_string(&item.key)?;
        let value_literal = serde_json::to_string(&stored)?;
        script.push_str(&format!("  {store}.setItem({key_literal}, {value_literal});\n"));
    }
    script.push_str("})()");
    Ok(script)
}
