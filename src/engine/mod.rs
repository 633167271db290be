//! Synchronization engine: keeps one editor widget in step with its host.
//!
//! The host pushes [`HostProps`] on every relevant state change and drives
//! the engine with [`SyncEngine::on_frame`]. The engine decides, per update,
//! whether to do nothing, write through the streaming fast path, update the
//! buffer in place, or recreate the buffer model outright.
//!
//! # Architecture
//!
//! ```text
//!   HostProps ──▶ update() ──▶ reconcile() ──┬─▶ streaming fast path
//!                    │                       ├─▶ in-place update
//!                    │                       └─▶ model recreation
//!                    ▼
//!             hide() / show() ──▶ RestorationTask ──▶ on_frame()
//!                                                       │
//!   widget events ◀──────────── pump_events() ◀─────────┘
//! ```
//!
//! Everything runs on the host's thread. Deferred work sits in a
//! [`Scheduler`] and runs when the host calls `on_frame`.

mod init;
mod phase;
mod reconcile;
mod reveal;
mod scroll;
mod snapshot;
mod streaming;
mod visibility;

pub use init::InitStatus;
pub use phase::{Phase, Signal};
pub use reconcile::{ContentAction, ReconcileOutcome};
pub use reveal::RevealOutcome;
pub use scroll::{auto_scroll_behavior, ScrollState, ScrollTransition};
pub use snapshot::{EditorStateSnapshot, RestoreMethod};
pub use streaming::{StreamOutcome, StreamState};
pub use visibility::{RestoreStep, VisibilitySnapshot};

use crate::capability::{CapabilitySubscription, EditorOptions};
use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::{SyncError, WidgetError};
use crate::fingerprint::ContentFingerprint;
use crate::scheduler::Scheduler;
use crate::widget::{DecorationId, EditorWidget, ModelId, WidgetEvent, WidgetLoader};
use init::InitGuard;
use reconcile::RecreateRequest;
use std::sync::Arc;
use std::time::Instant;
use visibility::VisibilityController;

/// Opaque view-state type of the widget built by `L`.
pub type ViewStateOf<L> = <<L as WidgetLoader>::Widget as EditorWidget>::ViewState;

/// Callback fired for user-originated edits.
pub type ContentCallback = Box<dyn FnMut(&str) + Send>;

/// Everything the host knows about the file being shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProps {
    /// Name of the file.
    pub file_name: String,
    /// Full current content.
    pub content: String,
    /// Language tag.
    pub language: String,
    /// Whether the user may edit.
    pub editable: bool,
    /// Whether content is still being generated.
    pub is_streaming: bool,
    /// Whether the editor is on screen.
    pub is_visible: bool,
    /// Line to jump to, if any.
    pub requested_line: Option<u32>,
}

impl HostProps {
    /// Visible, read-only, non-streaming plain text.
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
            language: String::from("plaintext"),
            editable: false,
            is_streaming: false,
            is_visible: true,
            requested_line: None,
        }
    }

    /// Set the language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the editable flag.
    #[must_use]
    pub const fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Set the streaming flag.
    #[must_use]
    pub const fn streaming(mut self, streaming: bool) -> Self {
        self.is_streaming = streaming;
        self
    }

    /// Set the visibility flag.
    #[must_use]
    pub const fn visible(mut self, visible: bool) -> Self {
        self.is_visible = visible;
        self
    }

    /// Request a line reveal.
    #[must_use]
    pub const fn requested_line(mut self, line: Option<u32>) -> Self {
        self.requested_line = line;
        self
    }

    /// Replace the content.
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

/// The live association between the host container and the widget's model.
#[derive(Debug, Clone)]
pub struct EditorSession {
    file_name: String,
    content: String,
    language: Option<String>,
    editable: bool,
    theme: String,
    model: Option<ModelId>,
    fingerprint: Option<ContentFingerprint>,
}

impl EditorSession {
    fn new(theme: String, editable: bool) -> Self {
        Self {
            file_name: String::new(),
            content: String::new(),
            language: None,
            editable,
            theme,
            model: None,
            fingerprint: None,
        }
    }

    /// Current file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Last content written to, or reported by, the widget.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Last language applied.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Current editable flag.
    pub const fn editable(&self) -> bool {
        self.editable
    }

    /// Current theme.
    pub fn theme(&self) -> &str {
        &self.theme
    }

    /// Installed model, if any.
    pub const fn model(&self) -> Option<ModelId> {
        self.model
    }
}

/// Counters describing what the engine has done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStats {
    /// Full model recreations.
    pub recreations: u64,
    /// In-place buffer replacements outside streaming.
    pub in_place_updates: u64,
    /// Writes through the streaming fast path.
    pub stream_updates: u64,
    /// Streaming writes skipped because the user was typing.
    pub stream_skipped_typing: u64,
    /// Option-only updates (editable toggles, capability changes).
    pub option_updates: u64,
    /// Auto-scrolls performed.
    pub auto_scrolls: u64,
    /// User edits reported to the host.
    pub user_edits: u64,
    /// Restorations completed.
    pub restorations: u64,
    /// Restorations that fell back to reduced recovery.
    pub restoration_fallbacks: u64,
    /// Model creations that failed every attempt.
    pub model_failures: u64,
}

impl SyncStats {
    /// Total buffer mutations of any kind.
    pub const fn buffer_mutations(&self) -> u64 {
        self.recreations + self.in_place_updates + self.stream_updates
    }
}

/// Deferred work.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Task {
    AutoScroll,
    RetryModel { attempt: u32 },
    ClearHighlight(DecorationId),
    RevealRetry { line: u32 },
    CorrectivePass,
}

/// Keeps one editor widget synchronized with host-supplied content.
pub struct SyncEngine<L: WidgetLoader> {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    loader: L,
    caps: CapabilitySubscription,
    phase: Phase,
    init: InitGuard,
    widget: Option<L::Widget>,
    session: Option<EditorSession>,
    stream: StreamState,
    scroll: ScrollState,
    visibility: VisibilityController<ViewStateOf<L>>,
    scheduler: Scheduler<Task>,
    pending_recreation: Option<RecreateRequest<ViewStateOf<L>>>,
    pending_props: Option<HostProps>,
    setting_content: bool,
    last_user_edit: Option<Instant>,
    last_requested_line: Option<u32>,
    highlight: Option<DecorationId>,
    on_change: Option<ContentCallback>,
    frame: u64,
    stats: SyncStats,
    last_error: Option<SyncError>,
}

impl<L: WidgetLoader> SyncEngine<L> {
    /// Create an engine using the wall clock.
    pub fn new(loader: L, caps: CapabilitySubscription, config: SyncConfig) -> Self {
        Self::with_clock(loader, caps, config, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit clock.
    pub fn with_clock(
        loader: L,
        caps: CapabilitySubscription,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            clock,
            loader,
            caps,
            phase: Phase::Uninitialized,
            init: InitGuard::default(),
            widget: None,
            session: None,
            stream: StreamState::Inactive,
            scroll: ScrollState::default(),
            visibility: VisibilityController::default(),
            scheduler: Scheduler::new(),
            pending_recreation: None,
            pending_props: None,
            setting_content: false,
            last_user_edit: None,
            last_requested_line: None,
            highlight: None,
            on_change: None,
            frame: 0,
            stats: SyncStats::default(),
            last_error: None,
        }
    }

    /// Register the callback for user-originated edits.
    pub fn on_content_change(&mut self, callback: impl FnMut(&str) + Send + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    // ── Accessors ──────────────────────────────────────────────────────

    /// Current lifecycle phase.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a widget is installed and usable.
    pub const fn is_ready(&self) -> bool {
        self.phase.is_ready()
    }

    /// The widget, once initialized.
    pub const fn widget(&self) -> Option<&L::Widget> {
        self.widget.as_ref()
    }

    /// Mutable access to the widget, once initialized.
    pub fn widget_mut(&mut self) -> Option<&mut L::Widget> {
        self.widget.as_mut()
    }

    /// The loader.
    pub const fn loader(&self) -> &L {
        &self.loader
    }

    /// Mutable access to the loader.
    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    /// The session, once initialized.
    pub const fn session(&self) -> Option<&EditorSession> {
        self.session.as_ref()
    }

    /// Stream state.
    pub const fn stream_state(&self) -> StreamState {
        self.stream
    }

    /// Scroll intent.
    pub const fn scroll_state(&self) -> ScrollState {
        self.scroll
    }

    /// Whether the widget is on screen.
    pub const fn is_visible(&self) -> bool {
        self.visibility.is_visible()
    }

    /// Snapshot captured at the last hide, while hidden.
    pub fn visibility_snapshot(&self) -> Option<&VisibilitySnapshot> {
        self.visibility.snapshot()
    }

    /// Current restoration step, while restoring.
    pub fn restore_step(&self) -> Option<RestoreStep> {
        self.visibility.restore_step()
    }

    /// Counters.
    pub const fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Most recent internal error.
    pub const fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    /// Frames seen so far.
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether the user edited within the typing cool-down.
    pub fn is_user_typing(&self, now: Instant) -> bool {
        self.last_user_edit
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.typing_cooldown)
    }

    // ── Host entry points ──────────────────────────────────────────────

    /// Apply a new set of host inputs.
    ///
    /// Before initialization completes the props are kept and applied once
    /// the widget is ready; only the latest set survives.
    pub fn update(&mut self, props: &HostProps) {
        if !self.is_ready() {
            tracing::trace!(file = %props.file_name, "props buffered until ready");
            self.pending_props = Some(props.clone());
            return;
        }
        self.pump_events();
        self.apply_stream_signal(props.is_streaming);

        if props.is_visible != self.visibility.is_visible() {
            if props.is_visible {
                self.show(&props.file_name);
            } else {
                self.hide();
            }
        }

        self.reconcile(&props.file_name, &props.content, &props.language, props.editable);

        if props.requested_line != self.last_requested_line {
            self.last_requested_line = props.requested_line;
            if let Some(line) = props.requested_line {
                self.reveal_line(line);
            }
        }
    }

    /// Apply a color theme.
    pub fn set_theme(&mut self, theme: &str) {
        if let Some(session) = self.session.as_mut() {
            theme.clone_into(&mut session.theme);
        }
        if let Some(widget) = self.widget.as_mut() {
            widget.set_theme(theme);
        }
    }

    /// Advance deferred work by one rendering frame.
    pub fn on_frame(&mut self) {
        self.frame += 1;

        if let Some(caps) = self.caps.poll() {
            self.apply_capabilities();
            tracing::debug!(?caps, "capabilities applied");
        }
        if self.phase == Phase::Initializing {
            self.poll_init();
        }
        if self.is_ready() {
            self.pump_events();
            self.advance_restoration();
        }

        let now = self.clock.now();
        for task in self.scheduler.take_due(now) {
            self.run_task(task);
        }
    }

    /// Tear down the widget and model. The engine can be initialized again.
    pub fn dispose(&mut self) {
        if self.phase == Phase::Disposed {
            return;
        }
        self.teardown();
        self.pending_props = None;
        self.signal(Signal::Disposed);
        tracing::info!("editor disposed");
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn run_task(&mut self, task: Task) {
        match task {
            Task::AutoScroll => self.run_auto_scroll(),
            Task::RetryModel { attempt } => self.retry_recreation(attempt),
            Task::ClearHighlight(id) => self.clear_highlight(id),
            Task::RevealRetry { line } => {
                self.reveal_line_once(line, false);
            }
            Task::CorrectivePass => self.corrective_pass(),
        }
    }

    /// Drain widget events. Outside a programmatic write, content changes
    /// come from the user.
    fn pump_events(&mut self) {
        let Some(widget) = self.widget.as_mut() else {
            return;
        };
        let events = widget.poll_events();
        for event in events {
            match event {
                WidgetEvent::ContentChanged(content) => self.handle_user_edit(content),
                WidgetEvent::Scrolled(metrics) => self.handle_scroll(&metrics),
            }
        }
    }

    fn handle_user_edit(&mut self, content: String) {
        if self.setting_content {
            return;
        }
        let now = self.clock.now();
        self.last_user_edit = Some(now);
        self.stats.user_edits += 1;
        if let Some(session) = self.session.as_mut() {
            session.fingerprint = Some(ContentFingerprint::compute(
                &session.file_name,
                &content,
                self.config.fingerprint_window,
            ));
            session.content.clone_from(&content);
        }
        if let Some(callback) = self.on_change.as_mut() {
            callback(&content);
        }
    }

    /// Run a programmatic write on the widget. Change events it produces are
    /// discarded so they never reach the user callback.
    fn guarded_write<T>(
        &mut self,
        write: impl FnOnce(&mut L::Widget) -> Result<T, WidgetError>,
    ) -> Result<T, WidgetError> {
        // Edits queued before this write belong to the user.
        self.pump_events();
        let widget = self.widget.as_mut().ok_or(WidgetError::Disposed)?;
        self.setting_content = true;
        let result = write(widget);
        let swallowed = widget
            .poll_events()
            .into_iter()
            .filter(|event| matches!(event, WidgetEvent::ContentChanged(_)))
            .count();
        self.setting_content = false;
        tracing::trace!(swallowed, "programmatic write");
        result
    }

    fn options(&self, editable: bool) -> EditorOptions {
        EditorOptions::for_capabilities(self.caps.current(), editable)
    }

    fn apply_capabilities(&mut self) {
        let editable = self.session.as_ref().is_some_and(|s| s.editable);
        let options = self.options(editable);
        if let Some(widget) = self.widget.as_mut() {
            widget.apply_options(&options);
            if let Err(err) = widget.layout() {
                tracing::warn!(%err, "layout after capability change failed");
            }
            self.stats.option_updates += 1;
        }
    }

    fn signal(&mut self, signal: Signal) {
        match self.phase.transition(signal) {
            Ok(next) => {
                if next != self.phase {
                    tracing::trace!(from = ?self.phase, to = ?next, "phase");
                }
                self.phase = next;
            }
            Err(err) => {
                tracing::warn!(%err, "phase transition rejected");
                self.last_error = Some(err);
            }
        }
    }

    fn record_error(&mut self, err: SyncError) {
        self.last_error = Some(err);
    }

    /// Dispose widget, model and every piece of per-widget state.
    fn teardown(&mut self) {
        self.visibility.cancel_restoration();
        self.visibility = VisibilityController::default();
        self.scheduler.clear();
        self.pending_recreation = None;
        self.highlight = None;
        self.stream = StreamState::Inactive;
        self.scroll = ScrollState::default();
        self.last_requested_line = None;
        self.init.abandon(&mut self.loader);

        if let Some(mut widget) = self.widget.take() {
            if let Some(model) = self.session.as_ref().and_then(|s| s.model) {
                widget.dispose_model(model);
            }
            widget.dispose();
        }
        self.session = None;
    }
}

impl<L: WidgetLoader> Drop for SyncEngine<L> {
    fn drop(&mut self) {
        if let Some(widget) = self.widget.as_mut() {
            widget.dispose();
        }
    }
}
