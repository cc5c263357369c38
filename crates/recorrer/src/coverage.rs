//! Coverage artifact capture and coverage figures.
//!
//! The instrumented target exposes its statement-coverage artifact on the
//! live page; the engine only reads it and hands it on. Turning the artifact
//! into a statement-coverage percentage is an external tool's job, reached
//! through [`CoverageReporter`] and degrading to zero when absent.

use crate::driver::BrowserDriver;
use async_trait::async_trait;
use tracing::warn;

/// Script reading the instrumentation artifact from the page
pub const ARTIFACT_PROBE: &str = "window.__coverage__ || null";

/// Read the coverage artifact from the live page, degrading to `None` when
/// the page is not instrumented or the read fails.
pub async fn read_artifact(driver: &dyn BrowserDriver) -> Option<serde_json::Value> {
    match driver.evaluate(ARTIFACT_PROBE).await {
        Ok(serde_json::Value::Null) => {
            warn!("coverage artifact is absent - instrumentation may not be enabled");
            None
        }
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "failed to read coverage artifact");
            None
        }
    }
}

/// External statement-coverage report tool
#[async_trait]
pub trait CoverageReporter: Send + Sync {
    /// Statement coverage in `[0,1]` for one artifact, `None` when the tool
    /// produces nothing
    async fn statement_coverage(&self, artifact: &serde_json::Value) -> Option<f64>;
}

/// Reporter used when no report tool is wired in; always produces nothing,
/// so snapshots carry a statement coverage of zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReporter;

#[async_trait]
impl CoverageReporter for NoReporter {
    async fn statement_coverage(&self, _artifact: &serde_json::Value) -> Option<f64> {
        None
    }
}

/// Share of graph pages visited, clamped to `[0,1]` and zero for an empty
/// graph.
#[must_use]
pub fn page_coverage(visited: usize, total_pages: usize) -> f64 {
    if total_pages == 0 {
        return 0.0;
    }
    (visited as f64 / total_pages as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;

    #[test]
    fn test_page_coverage_formula() {
        assert!((page_coverage(3, 5) - 0.6).abs() < f64::EPSILON);
        assert!((page_coverage(5, 5) - 1.0).abs() < f64::EPSILON);
        assert!(page_coverage(0, 5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_page_coverage_empty_graph_is_zero() {
        assert!(page_coverage(3, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_page_coverage_clamps_overcount() {
        // visiting pages the graph never knew about cannot exceed 1.0
        assert!((page_coverage(7, 5) - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_read_artifact_returns_instrumentation_data() {
        let driver = MockDriver::new("http://app/");
        driver.set_eval_result("__coverage__", serde_json::json!({"src/App.vue": {}}));
        let artifact = read_artifact(&driver).await;
        assert!(artifact.is_some());
    }

    #[tokio::test]
    async fn test_read_artifact_degrades_to_none() {
        let driver = MockDriver::new("http://app/");
        assert!(read_artifact(&driver).await.is_none());
    }

    #[tokio::test]
    async fn test_no_reporter_produces_nothing() {
        let reporter = NoReporter;
        assert!(reporter
            .statement_coverage(&serde_json::json!({}))
            .await
            .is_none());
    }
}
