//! Visibility lifecycle: snapshot on hide, stepwise restoration on show.
//!
//! A hidden editor loses its layout, so showing it again runs a
//! [`RestoreStep`] machine, one waiting step per frame:
//!
//! ```text
//!   Settle(n) ─▶ ApplyTheme ─▶ RecreateModel ─▶ Pause ─▶ ReapplyEditable
//!       ─▶ Layout(n) ─▶ RestoreView ─▶ MobileHeight ─▶ ProbeHighlight ─▶ Done
//! ```
//!
//! Any failing step switches to reduced recovery (theme, language and a few
//! layout passes). Hiding again cancels the machine and every timer it
//! scheduled.

use super::{EditorStateSnapshot, Signal, SyncEngine, Task, ViewStateOf};
use crate::capability::ViewportHeight;
use crate::error::{SyncError, WidgetError};
use crate::scheduler::CancellationToken;
use crate::widget::{EditorWidget, WidgetLoader};
use std::collections::VecDeque;
use std::time::Instant;

/// Language that carries no syntax markers.
const PLAIN_TEXT: &str = "plaintext";

/// Reopen candidates remembered at once; the oldest is forgotten first.
const REOPEN_LIMIT: usize = 32;

/// Session state captured when the editor was hidden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilitySnapshot {
    /// File visible right before hiding.
    pub last_visible_file: String,
    /// Content at hide time.
    pub content: String,
    /// Language at hide time.
    pub language: Option<String>,
    /// Theme at hide time.
    pub theme: String,
    /// Editable flag at hide time.
    pub editable: bool,
    /// When the editor was hidden.
    pub last_hidden_at: Instant,
    /// Whether showing again must run a full restoration.
    pub needs_full_restoration: bool,
    /// Whether the next reconcile must recreate the model.
    pub force_next_update: bool,
}

/// Current step of a running restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStep {
    /// Waiting for the host to settle.
    Settle {
        /// Frames still to wait.
        frames_left: u32,
    },
    /// Re-apply the color theme.
    ApplyTheme,
    /// Recreate the buffer model.
    RecreateModel,
    /// Short pause before layout.
    Pause {
        /// End of the pause.
        until: Instant,
    },
    /// Re-apply the editable option if it changed while hidden.
    ReapplyEditable,
    /// Layout passes, one per frame.
    Layout {
        /// Passes still to run.
        passes_left: u32,
    },
    /// Put cursor, scroll and selection back.
    RestoreView,
    /// Recompute the editor height on mobile.
    MobileHeight,
    /// Check syntax markers and schedule a corrective pass if missing.
    ProbeHighlight,
    /// Finished.
    Done,
}

enum Flow {
    /// Run the next step now.
    Continue,
    /// Wait for the next frame.
    Yield,
}

/// A running restoration.
#[derive(Debug)]
pub(super) struct RestorationTask<V> {
    snapshot: VisibilitySnapshot,
    editor: Option<EditorStateSnapshot<V>>,
    step: RestoreStep,
    recreations_at_show: u64,
}

/// Visible/hidden state plus restoration bookkeeping.
#[derive(Debug)]
pub(super) struct VisibilityController<V> {
    visible: bool,
    snapshot: Option<VisibilitySnapshot>,
    editor: Option<EditorStateSnapshot<V>>,
    restoration: Option<RestorationTask<V>>,
    token: CancellationToken,
    reopen: VecDeque<String>,
    force_file: Option<String>,
}

impl<V> Default for VisibilityController<V> {
    fn default() -> Self {
        Self {
            visible: true,
            snapshot: None,
            editor: None,
            restoration: None,
            token: CancellationToken::new(),
            reopen: VecDeque::new(),
            force_file: None,
        }
    }
}

impl<V> VisibilityController<V> {
    pub(super) const fn is_visible(&self) -> bool {
        self.visible
    }

    pub(super) fn snapshot(&self) -> Option<&VisibilitySnapshot> {
        self.snapshot
            .as_ref()
            .or_else(|| self.restoration.as_ref().map(|task| &task.snapshot))
    }

    pub(super) fn restore_step(&self) -> Option<RestoreStep> {
        self.restoration.as_ref().map(|task| task.step)
    }

    /// Stop a running restoration and drop its timers.
    pub(super) fn cancel_restoration(&mut self) -> bool {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.restoration.take().is_some()
    }

    /// Whether reconciling `file` must recreate the model.
    pub(super) fn should_force(&self, file: &str) -> bool {
        self.visible && (self.force_file.as_deref() == Some(file) || self.reopen.iter().any(|f| f == file))
    }

    /// Remember `file` as hidden while visible.
    fn remember_reopen(&mut self, file: &str) {
        self.reopen.retain(|f| f != file);
        if self.reopen.len() == REOPEN_LIMIT {
            self.reopen.pop_front();
        }
        self.reopen.push_back(file.to_owned());
    }

    /// A recreation for `file` happened; clear its pending force.
    pub(super) fn consume_force(&mut self, file: &str) {
        self.reopen.retain(|f| f != file);
        if self.force_file.as_deref() == Some(file) {
            self.force_file = None;
        }
    }
}

impl<L: WidgetLoader> SyncEngine<L> {
    /// Take the editor off screen.
    pub(super) fn hide(&mut self) {
        if !self.visibility.visible {
            return;
        }
        let now = self.clock.now();
        self.cancel_auto_scroll();
        if self.visibility.cancel_restoration() {
            tracing::debug!("restoration cancelled by hide");
            self.signal(Signal::RestoreEnded {
                streaming: self.stream.is_active(),
            });
        }
        self.visibility.visible = false;

        let Some(session) = self.session.as_ref() else {
            return;
        };
        let editor = self
            .widget
            .as_ref()
            .filter(|_| session.model.is_some())
            .map(EditorStateSnapshot::capture);
        let snapshot = VisibilitySnapshot {
            last_visible_file: session.file_name.clone(),
            content: session.content.clone(),
            language: session.language.clone(),
            theme: session.theme.clone(),
            editable: session.editable,
            last_hidden_at: now,
            needs_full_restoration: true,
            force_next_update: false,
        };
        tracing::info!(file = %snapshot.last_visible_file, "editor hidden");
        self.visibility.remember_reopen(&snapshot.last_visible_file);
        self.visibility.snapshot = Some(snapshot);
        self.visibility.editor = editor;
    }

    /// Put the editor back on screen, showing `file`.
    pub(super) fn show(&mut self, file: &str) {
        if self.visibility.visible {
            return;
        }
        self.visibility.visible = true;
        let editor = self.visibility.editor.take();
        let Some(mut snapshot) = self.visibility.snapshot.take() else {
            return;
        };

        if snapshot.last_visible_file == file {
            snapshot.force_next_update = true;
            self.visibility.force_file = Some(file.to_owned());
        }
        let hidden_for = self.clock.now().saturating_duration_since(snapshot.last_hidden_at);
        tracing::info!(file, ?hidden_for, force = snapshot.force_next_update, "editor shown");

        let has_model = self.session.as_ref().is_some_and(|s| s.model.is_some());
        if snapshot.needs_full_restoration && has_model {
            self.visibility.restoration = Some(RestorationTask {
                snapshot,
                editor,
                step: RestoreStep::Settle {
                    frames_left: self.config.restore_settle_frames,
                },
                recreations_at_show: self.stats.recreations,
            });
            self.signal(Signal::RestoreStarted);
        }
    }

    /// Run restoration steps due this frame.
    pub(super) fn advance_restoration(&mut self) {
        let Some(mut task) = self.visibility.restoration.take() else {
            return;
        };
        loop {
            let step = task.step;
            match self.run_restore_step(&mut task) {
                Ok(Flow::Continue) if task.step == RestoreStep::Done => {
                    self.stats.restorations += 1;
                    self.signal(Signal::RestoreEnded {
                        streaming: self.stream.is_active(),
                    });
                    tracing::info!(file = %task.snapshot.last_visible_file, "restoration complete");
                    return;
                }
                Ok(Flow::Continue) => {}
                Ok(Flow::Yield) => break,
                Err(err) => {
                    self.restoration_fallback(&task, step, err);
                    return;
                }
            }
        }
        self.visibility.restoration = Some(task);
    }

    fn run_restore_step(&mut self, task: &mut RestorationTask<ViewStateOf<L>>) -> Result<Flow, WidgetError> {
        let now = self.clock.now();
        tracing::trace!(step = ?task.step, "restoration step");
        let flow = match task.step {
            RestoreStep::Settle { frames_left: 0 } => {
                task.step = RestoreStep::ApplyTheme;
                Flow::Continue
            }
            RestoreStep::Settle { frames_left } => {
                task.step = RestoreStep::Settle {
                    frames_left: frames_left - 1,
                };
                Flow::Yield
            }
            RestoreStep::ApplyTheme => {
                let theme = self
                    .session
                    .as_ref()
                    .map_or_else(|| task.snapshot.theme.clone(), |s| s.theme.clone());
                self.widget_for_restore()?.set_theme(&theme);
                task.step = RestoreStep::RecreateModel;
                Flow::Continue
            }
            RestoreStep::RecreateModel => {
                if self.stats.recreations > task.recreations_at_show {
                    tracing::trace!("model already recreated since show");
                } else {
                    self.recreate_from_snapshot(&task.snapshot)?;
                }
                task.step = RestoreStep::Pause {
                    until: now + self.config.restore_pause,
                };
                Flow::Yield
            }
            RestoreStep::Pause { until } => {
                if now < until {
                    return Ok(Flow::Yield);
                }
                task.step = RestoreStep::ReapplyEditable;
                Flow::Continue
            }
            RestoreStep::ReapplyEditable => {
                let editable = self.session.as_ref().map_or(task.snapshot.editable, |s| s.editable);
                if editable != task.snapshot.editable {
                    let options = self.options(editable);
                    self.widget_for_restore()?.apply_options(&options);
                    self.stats.option_updates += 1;
                }
                task.step = RestoreStep::Layout {
                    passes_left: self.config.restore_layout_passes,
                };
                Flow::Continue
            }
            RestoreStep::Layout { passes_left: 0 } => {
                task.step = RestoreStep::RestoreView;
                Flow::Continue
            }
            RestoreStep::Layout { passes_left } => {
                self.widget_for_restore()?.layout()?;
                task.step = RestoreStep::Layout {
                    passes_left: passes_left - 1,
                };
                Flow::Yield
            }
            RestoreStep::RestoreView => {
                let same_file = self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.file_name == task.snapshot.last_visible_file);
                if let (true, Some(editor)) = (same_file, task.editor.as_ref()) {
                    let method = editor.restore(self.widget_for_restore()?);
                    tracing::trace!(?method, "view restored");
                }
                if !self.session.as_ref().is_some_and(|s| s.editable) {
                    self.schedule_auto_scroll();
                }
                task.step = RestoreStep::MobileHeight;
                Flow::Continue
            }
            RestoreStep::MobileHeight => {
                let caps = self.caps.current();
                if caps.is_mobile() {
                    let formula = ViewportHeight::for_capabilities(caps, self.config.reserved_height);
                    let widget = self.widget_for_restore()?;
                    let height = formula.resolve(widget.parent_height());
                    widget.set_height(height);
                    widget.layout()?;
                    tracing::debug!(height, css = %formula.css(), "mobile height recalculated");
                }
                task.step = RestoreStep::ProbeHighlight;
                Flow::Continue
            }
            RestoreStep::ProbeHighlight => {
                let plain = self
                    .session
                    .as_ref()
                    .and_then(|s| s.language.as_deref())
                    .map_or(true, |language| language == PLAIN_TEXT);
                if !plain && !self.widget_for_restore()?.has_syntax_markers() {
                    tracing::debug!("syntax markers missing, corrective pass scheduled");
                    self.scheduler.schedule_with_token(
                        now + self.config.corrective_pass_delay,
                        Task::CorrectivePass,
                        self.visibility.token.clone(),
                    );
                }
                task.step = RestoreStep::Done;
                Flow::Continue
            }
            RestoreStep::Done => Flow::Continue,
        };
        Ok(flow)
    }

    fn widget_for_restore(&mut self) -> Result<&mut L::Widget, WidgetError> {
        self.widget.as_mut().ok_or(WidgetError::Disposed)
    }

    /// Rebuild the model; the session's content wins if it moved on.
    fn recreate_from_snapshot(&mut self, snapshot: &VisibilitySnapshot) -> Result<(), WidgetError> {
        let (content, language) = match self.session.as_ref() {
            Some(session) => (
                session.content.clone(),
                session.language.clone().or_else(|| snapshot.language.clone()),
            ),
            None => (snapshot.content.clone(), snapshot.language.clone()),
        };
        let language = language.unwrap_or_else(|| String::from(PLAIN_TEXT));
        let moved_on = content != snapshot.content;
        self.install_model(&content, &language)?;
        self.stats.recreations += 1;
        tracing::debug!(moved_on, "model recreated for restoration");
        Ok(())
    }

    fn restoration_fallback(
        &mut self,
        task: &RestorationTask<ViewStateOf<L>>,
        step: RestoreStep,
        err: WidgetError,
    ) {
        tracing::warn!(?step, %err, "restoration failed, falling back");
        self.stats.restoration_fallbacks += 1;
        self.record_error(SyncError::Restoration(err));

        let passes = self.config.fallback_layout_passes;
        let theme = self
            .session
            .as_ref()
            .map_or_else(|| task.snapshot.theme.clone(), |s| s.theme.clone());
        let language = self
            .session
            .as_ref()
            .filter(|s| s.model.is_some())
            .and_then(|s| s.language.clone());

        if let Some(widget) = self.widget.as_mut() {
            widget.set_theme(&theme);
            if let Some(language) = language {
                if let Err(err) = widget.set_language(&language) {
                    tracing::warn!(%err, "fallback language reapply failed");
                }
            }
            for pass in 0..passes {
                if let Err(err) = widget.layout() {
                    tracing::warn!(pass, %err, "fallback layout failed");
                    break;
                }
            }
        }
        self.signal(Signal::RestoreEnded {
            streaming: self.stream.is_active(),
        });
    }

    /// Re-apply language and layout after missing syntax markers.
    pub(super) fn corrective_pass(&mut self) {
        let Some(language) = self.session.as_ref().and_then(|s| s.language.clone()) else {
            return;
        };
        let Some(widget) = self.widget.as_mut() else {
            return;
        };
        let result = widget.set_language(&language).and_then(|()| widget.layout());
        match result {
            Ok(()) => tracing::debug!(%language, "corrective pass applied"),
            Err(err) => {
                tracing::warn!(%err, "corrective pass failed");
                self.record_error(err.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capabilities, CapabilitySubscription};
    use crate::clock::ManualClock;
    use crate::config::SyncConfig;
    use crate::engine::{HostProps, Phase};
    use crate::widget::{Container, CursorPosition, HeadlessLoader};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn engine_with(caps: Capabilities) -> (SyncEngine<HeadlessLoader>, ManualClock) {
        let clock = ManualClock::new();
        let mut engine = SyncEngine::with_clock(
            HeadlessLoader::new(),
            CapabilitySubscription::fixed(caps),
            SyncConfig::default(),
            Arc::new(clock.clone()),
        );
        engine.initialize(&Container::new(1, 800, 600));
        (engine, clock)
    }

    fn props() -> HostProps {
        HostProps::new("main.rs", "fn main() {}\n".repeat(80)).language("rust").editable(true)
    }

    /// Drive frames until restoration finishes, advancing time each frame.
    fn settle(engine: &mut SyncEngine<HeadlessLoader>, clock: &ManualClock) {
        for _ in 0..20 {
            clock.advance(Duration::from_millis(20));
            engine.on_frame();
        }
    }

    #[test]
    fn test_hide_captures_snapshot() {
        let (mut engine, _) = engine_with(Capabilities::empty());
        engine.update(&props());
        engine.update(&props().visible(false));

        assert!(!engine.is_visible());
        let snapshot = engine.visibility_snapshot().unwrap();
        assert_eq!(snapshot.last_visible_file, "main.rs");
        assert_eq!(snapshot.language.as_deref(), Some("rust"));
        assert!(snapshot.needs_full_restoration);
        assert!(!snapshot.force_next_update);
    }

    #[test]
    fn test_show_same_file_forces_recreation() {
        let (mut engine, clock) = engine_with(Capabilities::empty());
        engine.update(&props());
        engine.update(&props().visible(false));
        clock.advance(Duration::from_secs(1));

        let before = engine.stats().recreations;
        engine.update(&props());
        assert_eq!(engine.stats().recreations, before + 1);
        assert_eq!(engine.phase(), Phase::Restoring);

        settle(&mut engine, &clock);
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.stats().restorations, 1);
        // Restoration saw the fresh model and did not rebuild it again.
        assert_eq!(engine.stats().recreations, before + 1);
    }

    #[test]
    fn test_restoration_steps_one_per_frame() {
        let (mut engine, clock) = engine_with(Capabilities::empty());
        engine.update(&props());
        engine.update(&props().visible(false));
        engine.update(&props());

        assert_eq!(engine.restore_step(), Some(RestoreStep::Settle { frames_left: 3 }));
        engine.on_frame();
        engine.on_frame();
        engine.on_frame();
        assert_eq!(engine.restore_step(), Some(RestoreStep::Settle { frames_left: 0 }));

        engine.on_frame();
        assert!(matches!(engine.restore_step(), Some(RestoreStep::Pause { .. })));
        engine.on_frame();
        assert!(matches!(engine.restore_step(), Some(RestoreStep::Pause { .. })));

        clock.advance(Duration::from_millis(50));
        let passes = engine.widget().unwrap().layout_passes();
        engine.on_frame();
        assert_eq!(engine.restore_step(), Some(RestoreStep::Layout { passes_left: 2 }));
        engine.on_frame();
        engine.on_frame();
        assert_eq!(engine.restore_step(), Some(RestoreStep::Layout { passes_left: 0 }));
        assert_eq!(engine.widget().unwrap().layout_passes(), passes + 3);

        engine.on_frame();
        assert_eq!(engine.restore_step(), None);
        assert_eq!(engine.stats().restorations, 1);
    }

    #[test]
    fn test_restores_cursor_after_show() {
        let (mut engine, clock) = engine_with(Capabilities::empty());
        engine.update(&props());
        engine.widget_mut().unwrap().set_cursor(CursorPosition::new(42, 5));
        engine.update(&props().visible(false));
        engine.update(&props());
        settle(&mut engine, &clock);
        assert_eq!(engine.widget().unwrap().cursor(), CursorPosition::new(42, 5));
    }

    #[test]
    fn test_hide_cancels_restoration() {
        let (mut engine, clock) = engine_with(Capabilities::empty());
        engine.update(&props());
        engine.update(&props().visible(false));
        engine.update(&props());
        engine.on_frame();
        engine.update(&props().visible(false));

        assert_eq!(engine.restore_step(), None);
        assert_eq!(engine.phase(), Phase::Idle);
        settle(&mut engine, &clock);
        assert_eq!(engine.stats().restorations, 0);
    }

    #[test]
    #[traced_test]
    fn test_layout_failure_falls_back() {
        let (mut engine, clock) = engine_with(Capabilities::empty());
        engine.update(&props());
        engine.update(&props().visible(false));
        engine.update(&props());
        engine.widget_mut().unwrap().fail_next_layouts(1);
        let passes = engine.widget().unwrap().layout_passes();

        settle(&mut engine, &clock);
        assert_eq!(engine.stats().restoration_fallbacks, 1);
        assert_eq!(engine.stats().restorations, 0);
        assert_eq!(engine.widget().unwrap().layout_passes(), passes + 5);
        assert!(matches!(engine.last_error(), Some(SyncError::Restoration(_))));
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(logs_contain("restoration failed, falling back"));
    }

    #[test]
    fn test_missing_markers_trigger_corrective_pass() {
        let (mut engine, clock) = engine_with(Capabilities::empty());
        engine.update(&props());
        engine.update(&props().visible(false));
        engine.update(&props());
        engine.widget_mut().unwrap().break_syntax_markers();
        assert!(!engine.widget().unwrap().has_syntax_markers());

        settle(&mut engine, &clock);
        assert!(engine.widget().unwrap().has_syntax_markers());
    }

    #[test]
    fn test_mobile_recomputes_height() {
        let (mut engine, clock) = engine_with(Capabilities::MOBILE | Capabilities::TOUCH);
        engine.update(&props());
        engine.update(&props().visible(false));
        engine.widget_mut().unwrap().set_parent_height(480.0);
        engine.update(&props());
        settle(&mut engine, &clock);
        assert!((engine.widget().unwrap().height() - 480.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reopen_after_switch_forces_recreation() {
        let (mut engine, _) = engine_with(Capabilities::empty());
        let a = HostProps::new("a.rs", "fn a() {}").language("rust");
        let b = HostProps::new("b.rs", "fn b() {}").language("rust");
        engine.update(&a);
        engine.update(&a.clone().visible(false));
        engine.update(&b);
        let before = engine.stats().recreations;

        engine.update(&a);
        assert_eq!(engine.stats().recreations, before + 1);
        // Consumed: a second identical update is a no-op.
        engine.update(&a);
        assert_eq!(engine.stats().recreations, before + 1);
    }

    #[test]
    fn test_reopen_candidates_are_bounded() {
        let (mut engine, _) = engine_with(Capabilities::empty());
        for n in 0..REOPEN_LIMIT + 8 {
            let file = HostProps::new(format!("f{n}.rs"), "fn f() {}").language("rust");
            engine.update(&file);
            engine.update(&file.visible(false));
            // Show a different file so the hidden one stays a candidate.
            engine.update(&HostProps::new("scratch.rs", "").language("rust"));
        }
        let reopen = &engine.visibility.reopen;
        assert_eq!(reopen.len(), REOPEN_LIMIT);
        assert!(!reopen.iter().any(|f| f == "f0.rs"));
        assert!(reopen.iter().any(|f| f == &format!("f{}.rs", REOPEN_LIMIT + 7)));
    }

    #[test]
    fn test_container_change_forgets_reopen_candidates() {
        let (mut engine, _) = engine_with(Capabilities::empty());
        let a = HostProps::new("a.rs", "fn a() {}").language("rust");
        engine.update(&a);
        engine.update(&a.visible(false));
        engine.update(&HostProps::new("b.rs", "fn b() {}").language("rust"));
        assert_eq!(engine.visibility.reopen.len(), 1);

        engine.initialize(&Container::new(2, 800, 600));
        assert!(engine.visibility.reopen.is_empty());
    }

    #[test]
    fn test_content_change_while_hidden_recreates() {
        let (mut engine, _) = engine_with(Capabilities::empty());
        engine.update(&props());
        let before = engine.stats().recreations;
        engine.update(&props().visible(false).content("changed"));
        assert_eq!(engine.stats().recreations, before + 1);
    }
}
