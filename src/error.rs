//! Error types for the synchronization engine and its widget collaborator.
//!
//! Errors never escape the engine's host-facing operations. They are logged,
//! recorded as [`SyncEngine::last_error`](crate::SyncEngine::last_error) and
//! surfaced through outcome enums instead.

use crate::engine::Phase;
use thiserror::Error;

/// Errors reported by an [`EditorWidget`](crate::EditorWidget) or its loader.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WidgetError {
    /// The widget could not be constructed in its container.
    #[error("widget construction failed: {0}")]
    Construction(String),

    /// A buffer model could not be created.
    #[error("model creation failed: {0}")]
    ModelCreation(String),

    /// The referenced model does not exist (already disposed).
    #[error("unknown model #{0}")]
    UnknownModel(u64),

    /// The widget has been disposed.
    #[error("widget disposed")]
    Disposed,

    /// Layout or rendering failed inside the widget.
    #[error("layout failed: {0}")]
    Layout(String),
}

/// Errors raised inside the synchronization engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Widget initialization failed; the guard has been reset.
    #[error("initialization failed: {0}")]
    Init(#[source] WidgetError),

    /// Model creation failed after all retry attempts.
    #[error("model creation failed after {attempts} attempts: {source}")]
    ModelCreation {
        /// Number of attempts made.
        attempts: u32,
        /// Last error reported by the widget.
        #[source]
        source: WidgetError,
    },

    /// An operation needed a widget but none is initialized.
    #[error("editor not initialized")]
    NotInitialized,

    /// Visibility restoration failed and fell back to reduced recovery.
    #[error("restoration failed: {0}")]
    Restoration(#[source] WidgetError),

    /// A widget call failed outside of the paths above.
    #[error(transparent)]
    Widget(#[from] WidgetError),

    /// The lifecycle phase machine rejected a transition.
    #[error("invalid transition from {from:?} on {signal}")]
    InvalidTransition {
        /// Phase the engine was in.
        from: Phase,
        /// Name of the rejected signal.
        signal: &'static str,
    },

    /// The driver thread is no longer receiving messages.
    #[error("sync driver has stopped")]
    DriverClosed,

    /// The driver thread panicked.
    #[error("sync driver thread panicked")]
    DriverPanicked,
}

/// Result alias for engine-internal operations.
pub type SyncResult<T> = Result<T, SyncError>;
