//! Content reconciliation: decide how host inputs reach the buffer model.

use super::{EditorStateSnapshot, ScrollState, SyncEngine, Task, ViewStateOf};
use crate::error::{SyncError, WidgetError};
use crate::fingerprint::ContentFingerprint;
use crate::widget::{EditorWidget, ModelId, WidgetLoader};

/// What happened to the buffer content during a reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentAction {
    /// Content already matched.
    None,
    /// The model was recreated.
    Recreated,
    /// Model creation failed and a retry is scheduled.
    RecreationPending,
    /// The buffer value was replaced in place.
    UpdatedInPlace,
    /// The buffer value was replaced through the streaming fast path.
    Streamed,
    /// A streamed write was skipped because the user is typing.
    DeferredForTyping,
    /// The write failed; see [`SyncEngine::last_error`].
    Failed,
}

/// Result of [`SyncEngine::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No widget yet.
    NotReady,
    /// Streaming, and nothing differed: returned without side effects.
    Unchanged,
    /// Reconciled.
    Applied {
        /// Effect on the buffer content.
        content: ContentAction,
        /// Whether the editable option was toggled.
        editable_changed: bool,
    },
}

impl ReconcileOutcome {
    /// Effect on the buffer content, if reconciliation ran.
    pub const fn content(self) -> Option<ContentAction> {
        match self {
            Self::Applied { content, .. } => Some(content),
            Self::NotReady | Self::Unchanged => None,
        }
    }
}

/// A model recreation, kept across retry attempts.
#[derive(Debug)]
pub(super) struct RecreateRequest<V> {
    file_name: String,
    content: String,
    language: String,
    fingerprint: ContentFingerprint,
    state: Option<EditorStateSnapshot<V>>,
}

impl<L: WidgetLoader> SyncEngine<L> {
    /// Bring the buffer model in line with the given inputs.
    ///
    /// Language changes, forced refreshes and content changes while hidden
    /// recreate the model. Other content changes are written in place.
    /// Editable toggles only touch widget options.
    pub fn reconcile(
        &mut self,
        file_name: &str,
        content: &str,
        language: &str,
        editable: bool,
    ) -> ReconcileOutcome {
        if !self.is_ready() {
            return ReconcileOutcome::NotReady;
        }
        self.pump_events();
        let fingerprint = ContentFingerprint::compute(file_name, content, self.config.fingerprint_window);
        let Some(session) = self.session.as_mut() else {
            return ReconcileOutcome::NotReady;
        };

        let switched = session.file_name != file_name;
        if switched {
            tracing::debug!(from = %session.file_name, to = file_name, "file switched");
            session.fingerprint = None;
            file_name.clone_into(&mut session.file_name);
            self.scroll = ScrollState::default();
        }

        let needs_content = session.fingerprint.as_ref() != Some(&fingerprint);
        let needs_language = session.language.as_deref() != Some(language);
        let needs_editable = session.editable != editable;
        let has_model = session.model.is_some();
        let forced = self.visibility.should_force(file_name) || self.pending_recreation.is_some() || !has_model;

        if self.stream.is_active() && !(needs_content || needs_language || needs_editable || forced) {
            return ReconcileOutcome::Unchanged;
        }

        // Options first, so post-write handling sees the final editable flag.
        if needs_editable {
            self.apply_editable(editable);
        }

        // Same inputs as the pending retry: let its backoff run.
        let retry_pending = self
            .pending_recreation
            .as_ref()
            .is_some_and(|pending| pending.fingerprint == fingerprint && pending.language == language);
        if retry_pending {
            tracing::trace!(file = file_name, "model retry already pending");
            return ReconcileOutcome::Applied {
                content: ContentAction::RecreationPending,
                editable_changed: needs_editable,
            };
        }

        let hidden = !self.visibility.is_visible();
        let content_action = if needs_language || forced || (needs_content && hidden) {
            tracing::debug!(
                file = file_name,
                needs_language,
                forced,
                hidden,
                "recreating model"
            );
            self.recreate_model(RecreateRequest {
                file_name: file_name.to_owned(),
                content: content.to_owned(),
                language: language.to_owned(),
                fingerprint,
                state: None,
            }, switched)
        } else if needs_content {
            if self.stream.is_active() {
                self.apply_streaming_content(content).into()
            } else {
                self.update_in_place(content, fingerprint)
            }
        } else {
            ContentAction::None
        };

        ReconcileOutcome::Applied {
            content: content_action,
            editable_changed: needs_editable,
        }
    }

    fn recreate_model(&mut self, mut request: RecreateRequest<ViewStateOf<L>>, switched: bool) -> ContentAction {
        let cancelled = self.scheduler.cancel_where(|task| matches!(task, Task::RetryModel { .. }));
        let inherited = self.pending_recreation.take().and_then(|pending| pending.state);
        if cancelled > 0 {
            tracing::debug!(file = %request.file_name, "pending retry superseded");
        }

        // View state belongs to the file it was captured on.
        if !switched {
            let captured = self
                .widget
                .as_ref()
                .filter(|_| self.session.as_ref().is_some_and(|s| s.model.is_some()))
                .map(EditorStateSnapshot::capture);
            request.state = captured.or(inherited);
        }
        self.attempt_recreation(request, 1)
    }

    pub(super) fn retry_recreation(&mut self, attempt: u32) {
        let Some(request) = self.pending_recreation.take() else {
            return;
        };
        self.attempt_recreation(request, attempt);
    }

    fn attempt_recreation(&mut self, request: RecreateRequest<ViewStateOf<L>>, attempt: u32) -> ContentAction {
        match self.install_model(&request.content, &request.language) {
            Ok(model) => {
                let method = match (self.widget.as_mut(), request.state.as_ref()) {
                    (Some(widget), Some(state)) => Some(state.restore(widget)),
                    _ => None,
                };
                if let Some(session) = self.session.as_mut() {
                    session.fingerprint = Some(request.fingerprint);
                }
                self.visibility.consume_force(&request.file_name);
                self.stats.recreations += 1;
                tracing::info!(file = %request.file_name, model = model.0, attempt, ?method, "model recreated");
                self.after_content_change(None);
                ContentAction::Recreated
            }
            Err(err) if attempt < self.config.model_attempts => {
                let delay = self.config.backoff_for(attempt);
                tracing::warn!(file = %request.file_name, attempt, ?delay, %err, "model creation failed, retrying");
                let at = self.clock.now() + delay;
                self.pending_recreation = Some(request);
                self.scheduler.schedule(at, Task::RetryModel { attempt: attempt + 1 });
                ContentAction::RecreationPending
            }
            Err(err) => {
                tracing::error!(file = %request.file_name, attempts = attempt, %err, "model creation failed");
                self.stats.model_failures += 1;
                self.record_error(SyncError::ModelCreation {
                    attempts: attempt,
                    source: err,
                });
                ContentAction::Failed
            }
        }
    }

    /// Dispose the current model and install a fresh one.
    ///
    /// The session records the new content and language on success; on
    /// failure it is left without a model.
    pub(super) fn install_model(&mut self, content: &str, language: &str) -> Result<ModelId, WidgetError> {
        let old = self.session.as_mut().and_then(|s| s.model.take());
        if let (Some(old), Some(widget)) = (old, self.widget.as_mut()) {
            widget.dispose_model(old);
        }

        let model = self.guarded_write(|widget| {
            let model = widget.create_model(content, language)?;
            if let Err(err) = widget.set_model(model) {
                widget.dispose_model(model);
                return Err(err);
            }
            Ok(model)
        })?;

        if let Some(session) = self.session.as_mut() {
            session.model = Some(model);
            content.clone_into(&mut session.content);
            session.language = Some(language.to_owned());
            session.fingerprint = Some(ContentFingerprint::compute(
                &session.file_name,
                content,
                self.config.fingerprint_window,
            ));
        }
        Ok(model)
    }

    fn update_in_place(&mut self, content: &str, fingerprint: ContentFingerprint) -> ContentAction {
        let snapshot = self.capture_for_editing();
        match self.guarded_write(|widget| widget.set_value(content)) {
            Ok(()) => {
                if let Some(session) = self.session.as_mut() {
                    content.clone_into(&mut session.content);
                    session.fingerprint = Some(fingerprint);
                }
                self.stats.in_place_updates += 1;
                tracing::debug!(len = content.len(), "buffer updated in place");
                self.after_content_change(snapshot);
                ContentAction::UpdatedInPlace
            }
            Err(err) => {
                tracing::warn!(%err, "in-place update failed");
                self.record_error(err.into());
                ContentAction::Failed
            }
        }
    }

    fn apply_editable(&mut self, editable: bool) {
        if let Some(session) = self.session.as_mut() {
            session.editable = editable;
        }
        let options = self.options(editable);
        if let Some(widget) = self.widget.as_mut() {
            widget.apply_options(&options);
        }
        self.stats.option_updates += 1;
        tracing::debug!(editable, "editable option toggled");
    }

    /// Snapshot the view before a write when the user may be editing.
    pub(super) fn capture_for_editing(&self) -> Option<EditorStateSnapshot<ViewStateOf<L>>> {
        let editable = self.session.as_ref().is_some_and(|s| s.editable);
        if !editable {
            return None;
        }
        self.widget.as_ref().map(EditorStateSnapshot::capture)
    }

    /// Editable sessions get their view back; read-only ones follow the
    /// scroll policy.
    pub(super) fn after_content_change(&mut self, snapshot: Option<EditorStateSnapshot<ViewStateOf<L>>>) {
        let editable = self.session.as_ref().is_some_and(|s| s.editable);
        if editable {
            if let (Some(snapshot), Some(widget)) = (snapshot, self.widget.as_mut()) {
                snapshot.restore(widget);
            }
        } else {
            self.schedule_auto_scroll();
        }
    }
}
