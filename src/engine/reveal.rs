//! Jump to a line and highlight it briefly.

use super::{SyncEngine, Task};
use crate::widget::{CursorPosition, DecorationId, EditorWidget, WidgetLoader};

/// Result of [`SyncEngine::reveal_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// The line (after clamping) was centered and highlighted.
    Revealed(u32),
    /// The editor was not ready; one retry is scheduled.
    Deferred,
    /// The editor was not ready and no retry remains.
    NotReady,
}

impl<L: WidgetLoader> SyncEngine<L> {
    /// Center `line`, put the cursor on it and highlight it.
    ///
    /// Lines are 1-based and clamped to the buffer. If the editor is not
    /// ready yet, the reveal is retried once after a short delay.
    pub fn reveal_line(&mut self, line: u32) -> RevealOutcome {
        self.reveal_line_once(line, true)
    }

    pub(super) fn reveal_line_once(&mut self, line: u32, allow_retry: bool) -> RevealOutcome {
        let now = self.clock.now();
        let has_model = self.is_ready() && self.session.as_ref().is_some_and(|s| s.model.is_some());
        let widget = match self.widget.as_mut() {
            Some(widget) if has_model => widget,
            _ if allow_retry => {
                self.scheduler.cancel_where(|task| matches!(task, Task::RevealRetry { .. }));
                self.scheduler
                    .schedule(now + self.config.reveal_retry_delay, Task::RevealRetry { line });
                tracing::debug!(line, "editor not ready, reveal retry scheduled");
                return RevealOutcome::Deferred;
            }
            _ => {
                tracing::debug!(line, "editor still not ready, reveal dropped");
                return RevealOutcome::NotReady;
            }
        };

        let target = line.clamp(1, widget.line_count().max(1));
        widget.reveal_line_centered(target);
        widget.set_cursor(CursorPosition::new(target, 1));

        if let Some(previous) = self.highlight.take() {
            widget.remove_decoration(previous);
            self.scheduler.cancel_where(|task| *task == Task::ClearHighlight(previous));
        }
        let decoration = widget.add_line_highlight(target);
        self.highlight = Some(decoration);
        self.scheduler
            .schedule(now + self.config.highlight_duration, Task::ClearHighlight(decoration));

        tracing::debug!(requested = line, line = target, "line revealed");
        RevealOutcome::Revealed(target)
    }

    pub(super) fn clear_highlight(&mut self, decoration: DecorationId) {
        if self.highlight == Some(decoration) {
            self.highlight = None;
        }
        if let Some(widget) = self.widget.as_mut() {
            widget.remove_decoration(decoration);
        }
    }
}
