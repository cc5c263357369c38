//! Route-key normalization.
//!
//! Distinct raw URLs (`/user/42`, `/user/7`, `http://host/#/user/9?tab=2`)
//! collapse into one comparable [`RouteKey`] so the engine can equate what it
//! observes in the browser with the nodes of the transition graph.

use crate::config::{RouteMode, TargetConfig};
use crate::result::{RecorrerError, RecorrerResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Canonical, comparable identity of a logical page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    /// View the key as a path-like string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the underlying string
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Wrap an already-normalized string. Callers outside this module go
    /// through [`RouteNormalizer::normalize`] instead.
    pub(crate) fn from_raw(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One dynamic route pattern (`/user/:id`) with its compiled matcher
#[derive(Debug, Clone)]
struct DynamicPattern {
    template: String,
    matcher: Regex,
}

/// Canonicalizes URLs, paths and hash fragments into [`RouteKey`]s.
#[derive(Debug, Clone)]
pub struct RouteNormalizer {
    mode: RouteMode,
    origin: String,
    patterns: Vec<DynamicPattern>,
}

impl RouteNormalizer {
    /// Build a normalizer for one target.
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::Config`] if the base URL has no parseable
    /// origin or a dynamic route pattern does not compile.
    pub fn new(config: &TargetConfig) -> RecorrerResult<Self> {
        let origin = Url::parse(&config.base_url)
            .map_err(|e| RecorrerError::Config {
                message: format!("invalid baseUrl {}: {e}", config.base_url),
            })?
            .origin()
            .ascii_serialization();

        let segment = Regex::new(":[^/]+").map_err(|e| RecorrerError::Config {
            message: e.to_string(),
        })?;

        let mut patterns = Vec::with_capacity(config.dynamic_route_patterns.len());
        for template in &config.dynamic_route_patterns {
            let wildcarded = segment.replace_all(template, "[^/]+");
            let matcher =
                Regex::new(&format!("^{wildcarded}$")).map_err(|e| RecorrerError::Config {
                    message: format!("invalid dynamic route pattern {template}: {e}"),
                })?;
            patterns.push(DynamicPattern {
                template: template.clone(),
                matcher,
            });
        }

        Ok(Self {
            mode: config.route_mode,
            origin,
            patterns,
        })
    }

    /// Canonicalize any URL, path or hash fragment into a route key.
    ///
    /// Absolute URLs reduce to the fragment (hash routing) or the path
    /// (history routing); the result is query/fragment-stripped, forced to a
    /// leading `/`, trailing-slash-trimmed, then collapsed onto the first
    /// matching dynamic pattern. A matching pattern wins over the literal
    /// path, which is what folds `/user/42` and `/user/7` into `/user/:id`.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> RouteKey {
        let mut s = raw.trim().to_string();

        let absolute = s
            .get(..7)
            .is_some_and(|p| p.eq_ignore_ascii_case("http://"))
            || s
                .get(..8)
                .is_some_and(|p| p.eq_ignore_ascii_case("https://"));
        if absolute {
            if let Ok(u) = Url::parse(&s) {
                let fragment = u.fragment().filter(|f| !f.is_empty());
                s = match (self.mode, fragment) {
                    (RouteMode::Hash, Some(f)) => f.to_string(),
                    _ => u.path().to_string(),
                };
            }
        }

        if let Some(rest) = s.strip_prefix('#') {
            s = rest.to_string();
        }
        if s.starts_with("/#/") {
            s = s[2..].to_string();
        }
        if !s.starts_with('/') {
            s.insert(0, '/');
        }

        if let Some(cut) = s.find(['?', '#']) {
            s.truncate(cut);
        }
        if s.len() > 1 && s.ends_with('/') {
            s.pop();
        }

        for pattern in &self.patterns {
            if pattern.matcher.is_match(&s) {
                return RouteKey(pattern.template.clone());
            }
        }

        RouteKey(s)
    }

    /// Reconstruct a navigable URL from a route key.
    #[must_use]
    pub fn build_url(&self, key: &RouteKey) -> String {
        match self.mode {
            RouteMode::Hash => format!("{}/#{}", self.origin, key.as_str()),
            RouteMode::History => format!("{}{}", self.origin, key.as_str()),
        }
    }

    /// The origin (`scheme://host:port`) every built URL is anchored to
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }
}
