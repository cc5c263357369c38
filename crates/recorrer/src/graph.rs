//! Page-transition graph model.
//!
//! The graph is produced by an external static-analysis stage and loaded
//! once per run: nodes are logical pages, edges are UI actions observed to
//! move between them. The engine never mutates it.

use crate::result::{RecorrerError, RecorrerResult};
use crate::route::{RouteKey, RouteNormalizer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Selector sentinel marking a transition with no realizable UI element
pub const NO_ELEMENT_SELECTOR: &str = "-";

/// One logical page in the transition graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageNode {
    /// Route-key-like page name (`/dashboard`, `/user/:id`)
    pub name: String,
}

/// One UI action moving between two pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEdge {
    /// Source page name
    pub from: String,
    /// Target page name
    pub to: String,
    /// DOM locator, or [`NO_ELEMENT_SELECTOR`] for programmatic transitions
    pub selector: String,
    /// Triggering event (`click`, `routeRedirect`, ...)
    #[serde(default)]
    pub event: String,
    /// How the selector was derived by the analysis stage
    #[serde(default)]
    pub selector_kind: String,
    /// Free-form annotation from the analysis stage
    #[serde(default)]
    pub note: String,
}

impl TransitionEdge {
    /// Whether this edge has no clickable element at all
    #[must_use]
    pub fn has_no_element(&self) -> bool {
        self.selector == NO_ELEMENT_SELECTOR
    }

    /// Classify a sentinel-selector edge as a router-level redirect.
    ///
    /// Only redirect-shaped metadata makes the edge traversable by direct
    /// navigation; any other element-less edge is skipped outright.
    #[must_use]
    pub fn is_router_redirect(&self) -> bool {
        if !self.has_no_element() {
            return false;
        }
        let event = self.event.to_lowercase();
        let note = self.note.to_lowercase();
        event.contains("redirect")
            || event.contains("route")
            || self.selector_kind.eq_ignore_ascii_case("router")
            || note.contains("redirect")
    }
}

/// Immutable page-transition graph for one exploration run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageGraph {
    /// Logical pages
    #[serde(default)]
    pub nodes: Vec<PageNode>,
    /// UI transitions, in analysis order
    #[serde(default)]
    pub edges: Vec<TransitionEdge>,
}

impl PageGraph {
    /// Load a graph from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RecorrerError::GraphLoad`] when the file is missing or not
    /// valid JSON, and [`RecorrerError::EmptyGraph`] when it has no nodes.
    /// Both are fatal at startup, before any browser session opens.
    pub fn from_path(path: &Path) -> RecorrerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| RecorrerError::GraphLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let graph: Self = serde_json::from_str(&raw).map_err(|e| RecorrerError::GraphLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if graph.nodes.is_empty() {
            return Err(RecorrerError::EmptyGraph);
        }
        Ok(graph)
    }

    /// Number of logical pages
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of transitions
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All edges whose source normalizes to `key`, in graph order
    #[must_use]
    pub fn edges_from(&self, key: &RouteKey, routes: &RouteNormalizer) -> Vec<TransitionEdge> {
        self.edges
            .iter()
            .filter(|e| routes.normalize(&e.from) == *key)
            .cloned()
            .collect()
    }

    /// Out-degree per normalized source key, preserving first-seen order
    #[must_use]
    pub fn out_degrees(&self, routes: &RouteNormalizer) -> Vec<(RouteKey, usize)> {
        let mut order: Vec<RouteKey> = Vec::new();
        let mut degrees: HashMap<RouteKey, usize> = HashMap::new();
        for edge in &self.edges {
            let key = routes.normalize(&edge.from);
            if !degrees.contains_key(&key) {
                order.push(key.clone());
            }
            *degrees.entry(key).or_insert(0) += 1;
        }
        order
            .into_iter()
            .map(|key| {
                let degree = degrees[&key];
                (key, degree)
            })
            .collect()
    }

    /// Count edges whose both endpoints are in `visited` (normalized)
    #[must_use]
    pub fn edges_covered(
        &self,
        visited: &std::collections::HashSet<RouteKey>,
        routes: &RouteNormalizer,
    ) -> usize {
        self.edges
            .iter()
            .filter(|e| {
                visited.contains(&routes.normalize(&e.from))
                    && visited.contains(&routes.normalize(&e.to))
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthDescriptor, RouteMode, TargetConfig};
    use std::collections::HashSet;
    use std::io::Write;

    fn routes() -> RouteNormalizer {
        RouteNormalizer::new(&TargetConfig {
            route_mode: RouteMode::History,
            base_url: "http://localhost:9876".to_string(),
            start_page: "/".to_string(),
            auth: AuthDescriptor::None,
            dynamic_route_patterns: Vec::new(),
        })
        .unwrap()
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

    mod redirect_tests {
        use super::*;

        #[test]
        fn test_sentinel_with_redirect_event_is_router_redirect() {
            let mut e = edge("/", "/home", NO_ELEMENT_SELECTOR);
            e.event = "routeRedirect".to_string();
            assert!(e.is_router_redirect());
        }

        #[test]
        fn test_sentinel_with_click_event_is_not_redirect() {
            let e = edge("/", "/home", NO_ELEMENT_SELECTOR);
            assert!(e.has_no_element());
            assert!(!e.is_router_redirect());
        }

        #[test]
        fn test_router_kind_counts_regardless_of_case() {
            let mut e = edge("/", "/home", NO_ELEMENT_SELECTOR);
            e.event = String::new();
            e.selector_kind = "router".to_string();
            assert!(e.is_router_redirect());
            e.selector_kind = "ROUTER".to_string();
            assert!(e.is_router_redirect());
        }

        #[test]
        fn test_note_mentioning_redirect_counts() {
            let mut e = edge("/", "/home", NO_ELEMENT_SELECTOR);
            e.event = String::new();
            e.note = "guard Redirects anonymous users".to_string();
            assert!(e.is_router_redirect());
        }

        #[test]
        fn test_real_selector_never_classifies_as_redirect() {
            let mut e = edge("/", "/home", ".btn");
            e.event = "routeRedirect".to_string();
            assert!(!e.is_router_redirect());
        }
    }

    mod graph_tests {
        use super::*;

        #[test]
        fn test_edges_from_normalizes_sources() {
            let graph = PageGraph {
                nodes: vec![PageNode {
                    name: "/list".to_string(),
                }],
                edges: vec![edge("/list/", "/a", ".x"), edge("/other", "/b", ".y")],
            };
            let routes = routes();
            let found = graph.edges_from(&routes.normalize("/list"), &routes);
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].to, "/a");
        }

        #[test]
        fn test_out_degrees_first_seen_order() {
            let graph = PageGraph {
                nodes: Vec::new(),
                edges: vec![
                    edge("/a", "/b", ".1"),
                    edge("/b", "/c", ".2"),
                    edge("/a", "/c", ".3"),
                ],
            };
            let routes = routes();
            let degrees = graph.out_degrees(&routes);
            assert_eq!(degrees[0].0.as_str(), "/a");
            assert_eq!(degrees[0].1, 2);
            assert_eq!(degrees[1].0.as_str(), "/b");
            assert_eq!(degrees[1].1, 1);
        }

        #[test]
        fn test_edges_covered_requires_both_endpoints() {
            let graph = PageGraph {
                nodes: Vec::new(),
                edges: vec![edge("/a", "/b", ".1"), edge("/b", "/c", ".2")],
            };
            let routes = routes();
            let visited: HashSet<RouteKey> =
                [routes.normalize("/a"), routes.normalize("/b")].into();
            assert_eq!(graph.edges_covered(&visited, &routes), 1);
        }

        #[test]
        fn test_from_path_rejects_empty_graph() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(file, r#"{{"nodes": [], "edges": []}}"#).unwrap();
            let err = PageGraph::from_path(file.path()).unwrap_err();
            assert!(matches!(err, RecorrerError::EmptyGraph));
        }

        #[test]
        fn test_from_path_missing_file_is_load_error() {
            let err = PageGraph::from_path(Path::new("/nonexistent/graph.json")).unwrap_err();
            assert!(matches!(err, RecorrerError::GraphLoad { .. }));
        }

        #[test]
        fn test_from_path_parses_analysis_output() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            write!(
                file,
                r#"{{
                    "nodes": [{{"name": "/", "confidence": 0.9}}, {{"name": "/list"}}],
                    "edges": [{{
                        "from": "/", "to": "/list", "selector": ".go",
                        "event": "click", "selectorKind": "CSS",
                        "note": "", "sourceFile": "App.vue"
                    }}]
                }}"#
            )
            .unwrap();
            let graph = PageGraph::from_path(file.path()).unwrap();
            assert_eq!(graph.node_count(), 2);
            assert_eq!(graph.edge_count(), 1);
            assert_eq!(graph.edges[0].selector_kind, "CSS");
        }
    }
}
