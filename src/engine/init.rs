//! Initialization guard: one widget per container, one construction at a time.

use super::{EditorSession, Signal, SyncEngine};
use crate::error::{SyncError, WidgetError};
use crate::widget::{Container, EditorWidget, InitTicket, WidgetLoader};
use std::task::Poll;

/// Result of an initialization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStatus {
    /// A widget was constructed and is ready.
    Ready,
    /// The same container was already initialized; nothing was done.
    AlreadyInitialized,
    /// Construction is in progress; the ticket identifies it.
    InFlight(InitTicket),
    /// Construction failed; the guard was reset and the call may be retried.
    Failed(SyncError),
}

#[derive(Debug, Default)]
enum GuardState {
    #[default]
    Idle,
    Loading {
        ticket: InitTicket,
        container: Container,
        fingerprint: u64,
    },
    Ready {
        container_id: u64,
        fingerprint: u64,
    },
}

/// Tracks which container owns the widget and whether a build is in flight.
#[derive(Debug, Default)]
pub(super) struct InitGuard {
    state: GuardState,
    next_ticket: u64,
}

impl InitGuard {
    fn next_ticket(&mut self) -> InitTicket {
        self.next_ticket += 1;
        InitTicket(self.next_ticket)
    }

    /// Abandon an in-flight load and return to idle.
    pub(super) fn abandon<L: WidgetLoader>(&mut self, loader: &mut L) {
        if let GuardState::Loading { ticket, .. } = &self.state {
            tracing::debug!(ticket = ticket.0, "abandoning in-flight initialization");
            loader.abandon(*ticket);
        }
        self.state = GuardState::Idle;
    }

    fn loading_ticket(&self) -> Option<InitTicket> {
        match &self.state {
            GuardState::Loading { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }
}

impl<L: WidgetLoader> SyncEngine<L> {
    /// Mount a widget into `container`.
    ///
    /// Repeated calls for the same container are no-ops while it is unchanged,
    /// and return the in-flight ticket while construction is pending. A
    /// different container (or a changed one) replaces the current widget.
    pub fn initialize(&mut self, container: &Container) -> InitStatus {
        let fingerprint = container.fingerprint();

        match &self.init.state {
            GuardState::Ready {
                container_id,
                fingerprint: current,
            } if *container_id == container.id && *current == fingerprint && self.is_ready() => {
                return InitStatus::AlreadyInitialized;
            }
            GuardState::Loading {
                ticket,
                container: loading,
                fingerprint: current,
            } if loading.id == container.id && *current == fingerprint => {
                return InitStatus::InFlight(*ticket);
            }
            GuardState::Idle => {}
            _ => {
                tracing::info!(container = container.id, "container changed, replacing editor");
                self.teardown();
            }
        }

        let ticket = self.init.next_ticket();
        let editable = self.pending_props.as_ref().is_some_and(|p| p.editable);
        let options = self.options(editable);
        tracing::debug!(container = container.id, ticket = ticket.0, "initialization started");

        self.signal(Signal::InitStarted);
        self.loader.begin(ticket, container, &options);
        self.init.state = GuardState::Loading {
            ticket,
            container: container.clone(),
            fingerprint,
        };
        self.poll_init()
    }

    /// Check on an in-flight construction.
    pub(super) fn poll_init(&mut self) -> InitStatus {
        let Some(ticket) = self.init.loading_ticket() else {
            return if self.is_ready() {
                InitStatus::AlreadyInitialized
            } else {
                InitStatus::Failed(SyncError::NotInitialized)
            };
        };

        match self.loader.poll(ticket) {
            Poll::Pending => InitStatus::InFlight(ticket),
            Poll::Ready(Ok(widget)) => match self.install(widget) {
                Ok(()) => InitStatus::Ready,
                Err(err) => self.fail_init(ticket, err),
            },
            Poll::Ready(Err(err)) => self.fail_init(ticket, err),
        }
    }

    fn fail_init(&mut self, ticket: InitTicket, err: WidgetError) -> InitStatus {
        tracing::warn!(ticket = ticket.0, %err, "initialization failed, guard reset");
        if let Some(mut widget) = self.widget.take() {
            widget.dispose();
        }
        self.session = None;
        self.init.state = GuardState::Idle;
        self.signal(Signal::InitFailed);
        let err = SyncError::Init(err);
        self.record_error(err.clone());
        InitStatus::Failed(err)
    }

    fn install(&mut self, mut widget: L::Widget) -> Result<(), WidgetError> {
        let GuardState::Loading {
            ticket,
            container,
            fingerprint,
        } = std::mem::take(&mut self.init.state)
        else {
            return Err(WidgetError::Construction(String::from("no construction in flight")));
        };

        let editable = self.pending_props.as_ref().is_some_and(|p| p.editable);
        let theme = self.config.default_theme.clone();
        widget.apply_options(&self.options(editable));
        widget.set_theme(&theme);
        if let Err(err) = widget.layout() {
            // Restore the guard so fail_init sees a consistent state.
            self.init.state = GuardState::Loading {
                ticket,
                container,
                fingerprint,
            };
            widget.dispose();
            return Err(err);
        }

        self.widget = Some(widget);
        self.session = Some(EditorSession::new(theme, editable));
        self.init.state = GuardState::Ready {
            container_id: container.id,
            fingerprint,
        };
        self.signal(Signal::InitSucceeded);
        tracing::info!(container = container.id, ticket = ticket.0, "editor initialized");

        if let Some(props) = self.pending_props.take() {
            self.update(&props);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capabilities, CapabilitySubscription};
    use crate::config::SyncConfig;
    use crate::engine::{HostProps, Phase};
    use crate::widget::HeadlessLoader;

    fn engine(loader: HeadlessLoader) -> SyncEngine<HeadlessLoader> {
        SyncEngine::new(
            loader,
            CapabilitySubscription::fixed(Capabilities::empty()),
            SyncConfig::default(),
        )
    }

    #[test]
    fn test_same_container_is_noop() {
        let mut engine = engine(HeadlessLoader::new());
        let container = Container::new(1, 800, 600);
        assert_eq!(engine.initialize(&container), InitStatus::Ready);
        assert_eq!(engine.initialize(&container), InitStatus::AlreadyInitialized);
        assert_eq!(engine.loader().begun(), 1);
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn test_concurrent_requests_share_ticket() {
        let mut engine = engine(HeadlessLoader::deferred(1));
        let container = Container::new(1, 800, 600);

        let InitStatus::InFlight(first) = engine.initialize(&container) else {
            panic!("expected pending construction");
        };
        assert_eq!(engine.initialize(&container), InitStatus::InFlight(first));
        assert_eq!(engine.loader().begun(), 1);
        assert_eq!(engine.phase(), Phase::Initializing);

        engine.on_frame();
        assert!(engine.is_ready());
        assert_eq!(engine.initialize(&container), InitStatus::AlreadyInitialized);
    }

    #[test]
    fn test_container_change_replaces_widget() {
        let mut engine = engine(HeadlessLoader::new());
        engine.initialize(&Container::new(1, 800, 600));
        engine.update(&HostProps::new("a.txt", "hello"));
        assert_eq!(engine.widget().unwrap().value(), "hello");

        assert_eq!(engine.initialize(&Container::new(2, 800, 600)), InitStatus::Ready);
        assert_eq!(engine.loader().begun(), 2);
        assert_eq!(engine.widget().unwrap().value(), "");
        assert!(engine.session().unwrap().model().is_none());
    }

    #[test]
    fn test_resized_container_reinitializes() {
        let mut engine = engine(HeadlessLoader::new());
        let mut container = Container::new(1, 800, 600);
        engine.initialize(&container);
        container.height = 300;
        assert_eq!(engine.initialize(&container), InitStatus::Ready);
        assert_eq!(engine.loader().begun(), 2);
    }

    #[test]
    fn test_container_change_abandons_in_flight() {
        let mut engine = engine(HeadlessLoader::deferred(5));
        engine.initialize(&Container::new(1, 800, 600));
        assert!(matches!(engine.initialize(&Container::new(2, 800, 600)), InitStatus::InFlight(_)));
        assert_eq!(engine.loader().abandoned(), 1);
    }

    #[test]
    fn test_failure_resets_guard() {
        let mut loader = HeadlessLoader::new();
        loader.fail_next(1);
        let mut engine = engine(loader);
        let container = Container::new(1, 800, 600);

        assert!(matches!(engine.initialize(&container), InitStatus::Failed(SyncError::Init(_))));
        assert_eq!(engine.phase(), Phase::Uninitialized);
        assert!(engine.widget().is_none());
        assert!(engine.last_error().is_some());

        assert_eq!(engine.initialize(&container), InitStatus::Ready);
        assert!(engine.is_ready());
    }

    #[test]
    fn test_props_before_ready_are_applied() {
        let mut engine = engine(HeadlessLoader::deferred(1));
        let container = Container::new(1, 800, 600);
        engine.initialize(&container);
        engine.update(&HostProps::new("first.txt", "old"));
        engine.update(&HostProps::new("notes.md", "# Notes").language("markdown").editable(true));

        engine.on_frame();
        let widget = engine.widget().unwrap();
        assert_eq!(widget.value(), "# Notes");
        assert_eq!(widget.language(), Some("markdown"));
        assert!(!widget.options().read_only);
        assert_eq!(engine.session().unwrap().file_name(), "notes.md");
    }

    #[test]
    fn test_dispose_then_reinitialize() {
        let mut engine = engine(HeadlessLoader::new());
        let container = Container::new(1, 800, 600);
        engine.initialize(&container);
        engine.dispose();
        assert_eq!(engine.phase(), Phase::Disposed);
        assert!(engine.widget().is_none());

        assert_eq!(engine.initialize(&container), InitStatus::Ready);
    }
}
