//! Scroll intent tracking and auto-follow.
//!
//! The policy is hysteretic: once the user scrolls away from the bottom,
//! auto-follow stays off until they come back within the threshold, no
//! matter how much content streams in meanwhile.

use super::{SyncEngine, Task};
use crate::widget::{EditorWidget, ScrollBehavior, ScrollMetrics, WidgetLoader};
use std::time::Instant;

/// What a scroll event changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollTransition {
    /// Intent unchanged.
    None,
    /// The user scrolled away; auto-follow disabled.
    EnteredUserScroll,
    /// The user came back to the bottom; auto-follow re-enabled.
    ResumedAutoScroll,
}

/// User scroll intent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollState {
    /// The viewport was within the threshold at the last scroll event.
    pub is_near_bottom: bool,
    /// The user has taken manual control of the viewport.
    pub is_user_scrolling: bool,
    /// Auto-follow is enabled.
    pub should_auto_scroll: bool,
    /// Time of the last user scroll event.
    pub last_user_scroll: Option<Instant>,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            is_near_bottom: true,
            is_user_scrolling: false,
            should_auto_scroll: true,
            last_user_scroll: None,
        }
    }
}

impl ScrollState {
    /// Fold a user scroll event into the state.
    pub fn on_scroll(
        &mut self,
        metrics: &ScrollMetrics,
        threshold: f64,
        typing: bool,
        now: Instant,
    ) -> ScrollTransition {
        self.last_user_scroll = Some(now);
        self.is_near_bottom = metrics.distance_from_bottom() <= threshold;

        if !self.is_near_bottom && !self.is_user_scrolling && !typing {
            self.is_user_scrolling = true;
            self.should_auto_scroll = false;
            ScrollTransition::EnteredUserScroll
        } else if self.is_near_bottom && self.is_user_scrolling {
            self.is_user_scrolling = false;
            self.should_auto_scroll = true;
            ScrollTransition::ResumedAutoScroll
        } else {
            ScrollTransition::None
        }
    }

    /// Whether an auto-scroll may run now.
    pub const fn allows_auto_scroll(&self, typing: bool) -> bool {
        self.should_auto_scroll && self.is_near_bottom && !self.is_user_scrolling && !typing
    }
}

/// Pick the scroll behavior for an auto-follow.
pub const fn auto_scroll_behavior(mobile: bool, streaming: bool) -> ScrollBehavior {
    if mobile || streaming {
        ScrollBehavior::Immediate
    } else {
        ScrollBehavior::Smooth
    }
}

impl<L: WidgetLoader> SyncEngine<L> {
    /// Handle a user scroll event.
    pub(super) fn handle_scroll(&mut self, metrics: &ScrollMetrics) {
        let now = self.clock.now();
        let typing = self.is_user_typing(now);
        let threshold = self.config.threshold(self.caps.current().is_mobile());
        match self.scroll.on_scroll(metrics, threshold, typing, now) {
            ScrollTransition::EnteredUserScroll => {
                tracing::debug!(distance = metrics.distance_from_bottom(), "user scrolled away, auto-follow off");
            }
            ScrollTransition::ResumedAutoScroll => {
                tracing::debug!("user back at bottom, auto-follow on");
            }
            ScrollTransition::None => {}
        }
    }

    /// Queue an auto-scroll for the next frame, replacing any pending one.
    pub(super) fn schedule_auto_scroll(&mut self) {
        self.scheduler.cancel_where(|task| matches!(task, Task::AutoScroll));
        let now = self.clock.now();
        self.scheduler.schedule(now, Task::AutoScroll);
    }

    /// Drop any pending auto-scroll.
    pub(super) fn cancel_auto_scroll(&mut self) -> bool {
        self.scheduler.cancel_where(|task| matches!(task, Task::AutoScroll)) > 0
    }

    /// Run a due auto-scroll if the policy allows it.
    pub(super) fn run_auto_scroll(&mut self) {
        let now = self.clock.now();
        if !self.visibility.is_visible() || !self.scroll.allows_auto_scroll(self.is_user_typing(now)) {
            tracing::trace!(state = ?self.scroll, "auto-scroll suppressed");
            return;
        }
        let behavior = auto_scroll_behavior(self.caps.current().is_mobile(), self.stream.is_active());
        let Some(widget) = self.widget.as_mut() else {
            return;
        };
        widget.scroll_to_bottom(behavior);
        self.stats.auto_scrolls += 1;
        tracing::trace!(?behavior, "auto-scrolled");
    }
}
