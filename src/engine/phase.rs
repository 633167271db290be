//! Lifecycle phase machine.
//!
//! The engine's coarse state lives in a single [`Phase`], changed only through
//! [`Phase::transition`]. Finer state (stream counters, scroll intent,
//! snapshots) hangs off the engine, but whether the engine may touch its
//! widget at all is decided here.

use crate::error::{SyncError, SyncResult};

/// Coarse lifecycle phase of a [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No widget exists and none is being built.
    #[default]
    Uninitialized,
    /// A widget is being constructed.
    Initializing,
    /// Widget ready, host not streaming.
    Idle,
    /// Widget ready, host streaming content.
    Streaming,
    /// Widget ready, restoring state after becoming visible.
    Restoring,
    /// Widget torn down.
    Disposed,
}

/// Input to the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Widget construction started.
    InitStarted,
    /// Widget construction finished.
    InitSucceeded,
    /// Widget construction failed.
    InitFailed,
    /// Host started streaming.
    StreamStarted,
    /// Host stopped streaming.
    StreamStopped,
    /// Visibility restoration started.
    RestoreStarted,
    /// Visibility restoration finished or was cancelled.
    RestoreEnded {
        /// Whether the host is still streaming.
        streaming: bool,
    },
    /// Engine disposed.
    Disposed,
}

impl Signal {
    /// Short name, for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Self::InitStarted => "init-started",
            Self::InitSucceeded => "init-succeeded",
            Self::InitFailed => "init-failed",
            Self::StreamStarted => "stream-started",
            Self::StreamStopped => "stream-stopped",
            Self::RestoreStarted => "restore-started",
            Self::RestoreEnded { .. } => "restore-ended",
            Self::Disposed => "disposed",
        }
    }
}

impl Phase {
    /// Whether a widget is installed and usable.
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Idle | Self::Streaming | Self::Restoring)
    }

    /// Apply `signal`, returning the next phase.
    pub fn transition(self, signal: Signal) -> SyncResult<Self> {
        use Phase::{Disposed, Idle, Initializing, Restoring, Streaming, Uninitialized};

        let next = match (self, signal) {
            (_, Signal::Disposed) => Disposed,

            (_, Signal::InitStarted) => Initializing,
            (Initializing, Signal::InitSucceeded) => Idle,
            (Initializing, Signal::InitFailed) => Uninitialized,

            (Idle | Streaming, Signal::StreamStarted) => Streaming,
            (Idle | Streaming, Signal::StreamStopped) => Idle,
            // Stream state is tracked separately while restoring; the phase
            // settles when restoration ends.
            (Restoring, Signal::StreamStarted | Signal::StreamStopped) => Restoring,

            (Idle | Streaming | Restoring, Signal::RestoreStarted) => Restoring,
            (Restoring, Signal::RestoreEnded { streaming }) => {
                if streaming {
                    Streaming
                } else {
                    Idle
                }
            }

            (from, signal) => {
                return Err(SyncError::InvalidTransition {
                    from,
                    signal: signal.name(),
                })
            }
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_lifecycle() {
        let phase = Phase::default().transition(Signal::InitStarted).unwrap();
        assert_eq!(phase, Phase::Initializing);
        assert_eq!(phase.transition(Signal::InitSucceeded).unwrap(), Phase::Idle);
        assert_eq!(phase.transition(Signal::InitFailed).unwrap(), Phase::Uninitialized);
    }

    #[test]
    fn test_stream_toggles() {
        let phase = Phase::Idle.transition(Signal::StreamStarted).unwrap();
        assert_eq!(phase, Phase::Streaming);
        assert_eq!(phase.transition(Signal::StreamStopped).unwrap(), Phase::Idle);
    }

    #[test]
    fn test_restore_returns_to_stream_state() {
        let phase = Phase::Streaming.transition(Signal::RestoreStarted).unwrap();
        assert_eq!(phase, Phase::Restoring);
        assert_eq!(phase.transition(Signal::StreamStopped).unwrap(), Phase::Restoring);
        assert_eq!(
            phase.transition(Signal::RestoreEnded { streaming: true }).unwrap(),
            Phase::Streaming
        );
        assert_eq!(
            phase.transition(Signal::RestoreEnded { streaming: false }).unwrap(),
            Phase::Idle
        );
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        assert!(matches!(
            Phase::Uninitialized.transition(Signal::StreamStarted),
            Err(SyncError::InvalidTransition { from: Phase::Uninitialized, signal: "stream-started" })
        ));
        assert!(Phase::Disposed.transition(Signal::RestoreStarted).is_err());
        assert!(Phase::Idle.transition(Signal::InitSucceeded).is_err());
    }

    #[test]
    fn test_dispose_always_allowed_and_reinit_possible() {
        for phase in [Phase::Uninitialized, Phase::Initializing, Phase::Idle, Phase::Streaming, Phase::Restoring] {
            assert_eq!(phase.transition(Signal::Disposed).unwrap(), Phase::Disposed);
        }
        assert_eq!(Phase::Disposed.transition(Signal::InitStarted).unwrap(), Phase::Initializing);
        assert!(Phase::Idle.is_ready());
        assert!(!Phase::Initializing.is_ready());
    }
}
