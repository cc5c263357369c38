//! JavaScript dialog handling.
//!
//! Exploration clicks trigger confirm/alert dialogs that would otherwise
//! freeze the page. The driver forwards each dialog to a [`DialogPolicy`]
//! registered before the run and applies the decision synchronously, within
//! the dialog's lifecycle.

use serde::{Deserialize, Serialize};

/// Type of browser dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogKind {
    /// Alert dialog (OK only)
    Alert,
    /// Confirm dialog (OK/Cancel)
    Confirm,
    /// Prompt dialog (text input)
    Prompt,
    /// Before-unload dialog (Leave/Stay)
    BeforeUnload,
}

impl std::fmt::Display for DialogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
            Self::Prompt => write!(f, "prompt"),
            Self::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// What the driver should do with a dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogDecision {
    /// Press OK/Leave
    Accept,
    /// Press OK with input text (prompts)
    AcceptWith(String),
    /// Press Cancel/Stay
    Dismiss,
}

/// Fixed decision table applied to every dialog of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogPolicy {
    /// Accept everything; prompts get their default value or empty text.
    /// Exploration runs use this so no dialog can stall the page.
    #[default]
    AcceptAll,
    /// Dismiss everything
    DismissAll,
}

impl DialogPolicy {
    /// Decide the fate of one dialog
    #[must_use]
    pub fn decide(&self, kind: DialogKind, default_value: Option<&str>) -> DialogDecision {
        match self {
            Self::AcceptAll => match kind {
                DialogKind::Prompt => {
                    DialogDecision::AcceptWith(default_value.unwrap_or("").to_string())
                }
                _ => DialogDecision::Accept,
            },
            Self::DismissAll => DialogDecision::Dismiss,
        }
    }
}
