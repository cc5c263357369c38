//! Result and error types for Recorrer.

use thiserror::Error;

/// Result type for Recorrer operations
pub type RecorrerResult<T> = Result<T, RecorrerError>;

/// Errors that can occur in Recorrer
#[derive(Debug, Error)]
pub enum RecorrerError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Element lookup or interaction error
    #[error("Element error: {message}")]
    Element {
        /// Error message
        message: String,
    },

    /// Script evaluation error
    #[error("Evaluation failed: {message}")]
    Evaluation {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Target name not present in the registry
    #[error("Unknown target: {name}")]
    UnknownTarget {
        /// Requested target name
        name: String,
    },

    /// Transition graph could not be loaded
    #[error("Failed to load transition graph from {path}: {message}")]
    GraphLoad {
        /// Path that was read
        path: String,
        /// Error message
        message: String,
    },

    /// Transition graph has no nodes
    #[error("Transition graph is empty")]
    EmptyGraph,

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Snapshot could not be handed to the sink
    #[error("Snapshot sink error: {message}")]
    SnapshotSink {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
