//! Per-target configuration and the named-target repository.

use crate::driver::Cookie;
use crate::result::{RecorrerError, RecorrerResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// How the target application routes between pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    /// HTML5 history routing (`/users/3`)
    History,
    /// Hash-fragment routing (`/#/users/3`)
    Hash,
}

/// One key/value pair seeded into web storage before exploration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageItem {
    /// Storage key
    pub key: String,
    /// Value; non-string values are serialized to their JSON text
    pub value: serde_json::Value,
}

/// Declarative session bootstrap performed before the explorer starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AuthDescriptor {
    /// No seeding required
    #[default]
    None,
    /// Inject cookies into the browser context
    Cookies {
        /// Cookies to set against the target origin
        cookies: Vec<Cookie>,
    },
    /// Seed `sessionStorage` on the target origin
    SessionStorage {
        /// Items to write
        items: Vec<StorageItem>,
    },
    /// Seed `localStorage` on the target origin
    LocalStorage {
        /// Items to write
        items: Vec<StorageItem>,
    },
    /// Attach an authorization header to every request
    Bearer {
        /// Raw token, with or without the scheme prefix
        token: String,
        /// Header scheme, `Bearer` unless overridden
        #[serde(default = "default_scheme")]
        scheme: String,
    },
}

fn default_scheme() -> String {
    "Bearer".to_string()
}

fn default_start_page() -> String {
    "/".to_string()
}

/// Configuration for one target application, immutable for the run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    /// Routing style of the target
    pub route_mode: RouteMode,
    /// Origin the target is served from
    pub base_url: String,
    /// Preferred entry page
    #[serde(default = "default_start_page")]
    pub start_page: String,
    /// Session seeding descriptor
    #[serde(default)]
    pub auth: AuthDescriptor,
    /// Path templates with named segments (`/user/:id`), tested in order
    #[serde(default)]
    pub dynamic_route_patterns: Vec<String>,
}

/// Repository of named target configurations, loaded once and injected
/// into the engine at construction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetRegistry {
    targets: HashMap<String, TargetConfig>,
}

impl TargetRegistry {
    /// Load a registry from a JSON file mapping target name to config.
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::Config`] when the file is missing or does
    /// not parse; fatal at startup.
    pub fn from_path(path: &Path) -> RecorrerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| RecorrerError::Config {
            message: format!("cannot read targets file {}: {e}", path.display()),
        })?;
        serde_json::from_str(&raw).map_err(|e| RecorrerError::Config {
            message: format!("invalid targets file {}: {e}", path.display()),
        })
    }

    /// Look up a target by name.
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::UnknownTarget`] for names not in the file.
    pub fn get(&self, name: &str) -> RecorrerResult<&TargetConfig> {
        self.targets
            .get(name)
            .ok_or_else(|| RecorrerError::UnknownTarget {
                name: name.to_string(),
            })
    }

    /// All known target names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.targets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Insert or replace a target
    pub fn insert(&mut self, name: impl Into<String>, config: TargetConfig) {
        self.targets.insert(name.into(), config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TARGETS_JSON: &str = r#"{
        "library": {
            "routeMode": "history",
            "baseUrl": "http://localhost:9876",
            "startPage": "/dashboard",
            "auth": {
                "type": "sessionStorage",
                "items": [{"key": "user", "value": {"id": 17, "role": 1}}]
            },
            "dynamicRoutePatterns": ["/book/:id"]
        },
        "dormitory": {
            "routeMode": "hash",
            "baseUrl": "http://localhost:9999",
            "auth": {"type": "bearer", "token": "abc123"}
        }
    }"#;

    #[test]
    fn test_registry_round_trip() {
        let registry: TargetRegistry = serde_json::from_str(TARGETS_JSON).unwrap();
        let library = registry.get("library").unwrap();
        assert_eq!(library.route_mode, RouteMode::History);
        assert_eq!(library.start_page, "/dashboard");
        assert_eq!(library.dynamic_route_patterns, vec!["/book/:id"]);
        match &library.auth {
            AuthDescriptor::SessionStorage { items } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].key, "user");
            }
            other => panic!("unexpected auth: {other:?}"),
        }
    }

    #[test]
    fn test_bearer_scheme_defaults() {
        let registry: TargetRegistry = serde_json::from_str(TARGETS_JSON).unwrap();
        match &registry.get("dormitory").unwrap().auth {
            AuthDescriptor::Bearer { token, scheme } => {
                assert_eq!(token, "abc123");
                assert_eq!(scheme, "Bearer");
            }
            other => panic!("unexpected auth: {other:?}"),
        }
    }

    #[test]
    fn test_start_page_and_auth_default() {
        let config: TargetConfig = serde_json::from_str(
            r#"{"routeMode": "history", "baseUrl": "http://localhost:1"}"#,
        )
        .unwrap();
        assert_eq!(config.start_page, "/");
        assert!(matches!(config.auth, AuthDescriptor::None));
    }

    #[test]
    fn test_unknown_target_is_reported_by_name() {
        let registry: TargetRegistry = serde_json::from_str(TARGETS_JSON).unwrap();
        match registry.get("nope") {
            Err(RecorrerError::UnknownTarget { name }) => assert_eq!(name, "nope"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{TARGETS_JSON}").unwrap();
        let registry = TargetRegistry::from_path(file.path()).unwrap();
        assert_eq!(registry.names(), vec!["dormitory", "library"]);
    }

    #[test]
    fn test_from_path_missing_file_is_config_error() {
        let err = TargetRegistry::from_path(Path::new("/nonexistent/targets.json")).unwrap_err();
        assert!(matches!(err, RecorrerError::Config { .. }));
    }
}
