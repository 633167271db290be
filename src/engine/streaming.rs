//! Streaming fast path.
//!
//! While the host streams content, each chunk replaces the buffer value
//! without touching the model. Writes are skipped while the user is typing
//! so that a stale snapshot never overwrites fresh keystrokes; the cached
//! fingerprint is left alone, so the next update after the cool-down brings
//! the buffer up to date.

use super::{ContentAction, Signal, SyncEngine};
use crate::fingerprint::ContentFingerprint;
use crate::widget::{EditorWidget, WidgetLoader};
use std::time::Instant;

/// Whether the host is streaming, and how much has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Not streaming.
    #[default]
    Inactive,
    /// Streaming.
    Active {
        /// Chunks written so far.
        update_count: u64,
        /// Time of the last written chunk.
        last_update: Option<Instant>,
    },
}

impl StreamState {
    /// Whether the host is streaming.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Chunks written during the current stream.
    pub const fn update_count(self) -> u64 {
        match self {
            Self::Active { update_count, .. } => update_count,
            Self::Inactive => 0,
        }
    }

    fn record_update(&mut self, now: Instant) {
        if let Self::Active {
            update_count,
            last_update,
        } = self
        {
            *update_count += 1;
            *last_update = Some(now);
        }
    }
}

/// Result of [`SyncEngine::apply_streaming_content`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// No widget or no model to write into.
    NotReady,
    /// The user is typing; the chunk was dropped.
    SkippedTyping,
    /// Content matched the last write.
    Unchanged,
    /// The buffer value was replaced.
    Applied,
    /// The write failed.
    Failed,
}

impl From<StreamOutcome> for ContentAction {
    fn from(outcome: StreamOutcome) -> Self {
        match outcome {
            StreamOutcome::Applied => Self::Streamed,
            StreamOutcome::SkippedTyping => Self::DeferredForTyping,
            StreamOutcome::Unchanged => Self::None,
            StreamOutcome::NotReady | StreamOutcome::Failed => Self::Failed,
        }
    }
}

impl<L: WidgetLoader> SyncEngine<L> {
    /// Write a streamed chunk into the buffer.
    ///
    /// Never fires the content-change callback.
    pub fn apply_streaming_content(&mut self, content: &str) -> StreamOutcome {
        if !self.is_ready() {
            return StreamOutcome::NotReady;
        }
        self.pump_events();
        let now = self.clock.now();
        if self.is_user_typing(now) {
            self.stats.stream_skipped_typing += 1;
            tracing::debug!(len = content.len(), "stream chunk skipped, user typing");
            return StreamOutcome::SkippedTyping;
        }
        let Some(session) = self.session.as_ref().filter(|s| s.model.is_some()) else {
            return StreamOutcome::NotReady;
        };

        let fingerprint = ContentFingerprint::compute(&session.file_name, content, self.config.fingerprint_window);
        if session.fingerprint.as_ref() == Some(&fingerprint) {
            return StreamOutcome::Unchanged;
        }

        let snapshot = self.capture_for_editing();
        match self.guarded_write(|widget| widget.set_value(content)) {
            Ok(()) => {
                if let Some(session) = self.session.as_mut() {
                    content.clone_into(&mut session.content);
                    session.fingerprint = Some(fingerprint);
                }
                self.stats.stream_updates += 1;
                self.stream.record_update(now);
                tracing::trace!(
                    len = content.len(),
                    chunk = self.stream.update_count(),
                    "stream chunk applied"
                );
                self.after_content_change(snapshot);
                StreamOutcome::Applied
            }
            Err(err) => {
                tracing::warn!(%err, "stream write failed");
                self.record_error(err.into());
                StreamOutcome::Failed
            }
        }
    }

    /// Follow the host's streaming flag.
    pub(super) fn apply_stream_signal(&mut self, streaming: bool) {
        match (self.stream, streaming) {
            (StreamState::Inactive, true) => {
                self.stream = StreamState::Active {
                    update_count: 0,
                    last_update: None,
                };
                self.signal(Signal::StreamStarted);
                tracing::debug!("stream started");
            }
            (StreamState::Active { update_count, .. }, false) => {
                self.stream = StreamState::Inactive;
                self.signal(Signal::StreamStopped);
                tracing::debug!(chunks = update_count, "stream ended");
            }
            _ => {}
        }
    }
}
