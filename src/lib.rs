//! # editsync
//!
//! Flicker-free content synchronization between a host that streams text and
//! a stateful code-editor widget.
//!
//! The host pushes its view of the world ([`HostProps`]) whenever it changes;
//! the engine decides the cheapest way to make the widget match, keeps the
//! user's cursor and scroll position intact, follows streamed output only
//! while the user is at the bottom, and rebuilds the editor correctly after
//! it has been hidden.
//!
//! ## Core Concepts
//!
//! - **Fingerprints**: cheap head/tail signatures short-circuit redundant work
//! - **Fast path**: streamed chunks replace the buffer value without touching the model
//! - **Scroll intent**: hysteretic auto-follow that never fights the user
//! - **Restoration**: a cancellable, frame-stepped state machine after show
//! - **Driver**: an optional thread that owns the engine behind a bounded queue
//!
//! ## Example
//!
//! ```rust
//! use editsync::{Capabilities, CapabilitySubscription, Container, HeadlessLoader, HostProps, SyncConfig, SyncEngine};
//!
//! let mut engine = SyncEngine::new(
//!     HeadlessLoader::new(),
//!     CapabilitySubscription::fixed(Capabilities::empty()),
//!     SyncConfig::default(),
//! );
//! engine.initialize(&Container::new(1, 800, 600));
//! engine.update(&HostProps::new("notes.md", "# Notes").language("markdown"));
//! assert_eq!(engine.session().unwrap().content(), "# Notes");
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod capability;
pub mod clock;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod scheduler;
pub mod widget;

// Re-exports for convenience
pub use capability::{Capabilities, CapabilityProvider, CapabilitySubscription, DeviceProfile, EditorOptions};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use driver::{DriverConfig, HostMessage, SyncDriver};
pub use engine::{
    ContentAction, HostProps, InitStatus, Phase, ReconcileOutcome, RevealOutcome, StreamOutcome, SyncEngine, SyncStats,
};
pub use error::{SyncError, SyncResult, WidgetError};
pub use fingerprint::ContentFingerprint;
pub use widget::{Container, EditorWidget, HeadlessEditor, HeadlessLoader, WidgetLoader};
