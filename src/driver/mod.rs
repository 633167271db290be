//! Threaded driver: runs one [`SyncEngine`] behind a message queue.
//!
//! ```text
//! ┌──────────────┐   HostMessage    ┌──────────────────────────┐
//! │ Host threads │ ───────────────▶ │                          │
//! └──────────────┘  (bounded queue) │   Driver thread          │
//!                                   │   SyncEngine + Provider  │
//! ┌──────────────┐      Tick        │                          │
//! │ FrameTicker  │ ───────────────▶ │                          │
//! └──────────────┘                  └──────────────────────────┘
//! ```
//!
//! The queue is the single writer to the engine. Streamed chunks, user edits
//! pumped from the widget and timers are therefore applied one at a time, in
//! arrival order, and the typing cool-down decides whether a chunk that
//! arrives right after an edit is written.

mod messages;
mod ticker;

pub use messages::HostMessage;
pub use ticker::{FrameTicker, Tick};

use crate::capability::CapabilityProvider;
use crate::engine::{SyncEngine, ViewStateOf};
use crate::error::{SyncError, SyncResult};
use crate::widget::WidgetLoader;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Driver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Time between frames.
    pub frame_interval: Duration,
    /// Capacity of the host message queue.
    pub queue_capacity: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            queue_capacity: 64,
        }
    }
}

/// Handle to an engine running on its own thread.
pub struct SyncDriver<L: WidgetLoader> {
    tx: Sender<HostMessage>,
    handle: Option<JoinHandle<SyncEngine<L>>>,
}

impl<L> SyncDriver<L>
where
    L: WidgetLoader + Send + 'static,
    L::Widget: Send + 'static,
    ViewStateOf<L>: Send + 'static,
{
    /// Move `engine` and `provider` onto a new thread.
    ///
    /// # Errors
    ///
    /// Returns an error if a thread cannot be spawned.
    pub fn spawn(engine: SyncEngine<L>, provider: CapabilityProvider, config: &DriverConfig) -> io::Result<Self> {
        let (tx, rx) = bounded(config.queue_capacity);
        let ticker = FrameTicker::spawn(config.frame_interval)?;
        let handle = thread::Builder::new()
            .name(String::from("editsync-driver"))
            .spawn(move || run(engine, provider, &rx, ticker))?;
        tracing::debug!(interval = ?config.frame_interval, capacity = config.queue_capacity, "driver started");
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// A sender for other host threads.
    pub fn sender(&self) -> Sender<HostMessage> {
        self.tx.clone()
    }

    /// Queue a message, blocking while the queue is full.
    pub fn send(&self, message: impl Into<HostMessage>) -> SyncResult<()> {
        self.tx.send(message.into()).map_err(|_| SyncError::DriverClosed)
    }

    /// Ask the driver to stop after the messages already queued.
    pub fn shutdown(&self) -> SyncResult<()> {
        self.send(HostMessage::Shutdown)
    }

    /// Stop the driver and take the engine back.
    pub fn join(mut self) -> SyncResult<SyncEngine<L>> {
        // Already stopped is fine; the thread still has to be joined.
        let _ = self.tx.send(HostMessage::Shutdown);
        let handle = self.handle.take().ok_or(SyncError::DriverClosed)?;
        handle.join().map_err(|_| SyncError::DriverPanicked)
    }
}

impl<L: WidgetLoader> Drop for SyncDriver<L> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.tx.try_send(HostMessage::Shutdown);
        }
    }
}

fn run<L: WidgetLoader>(
    mut engine: SyncEngine<L>,
    mut provider: CapabilityProvider,
    rx: &Receiver<HostMessage>,
    ticker: FrameTicker,
) -> SyncEngine<L> {
    loop {
        select! {
            recv(rx) -> message => match message {
                Ok(HostMessage::Initialize(container)) => {
                    let status = engine.initialize(&container);
                    tracing::debug!(?status, "initialize requested");
                }
                Ok(HostMessage::Props(props)) => engine.update(&props),
                Ok(HostMessage::Resize(profile)) => provider.observe_resize(profile, Instant::now()),
                Ok(HostMessage::Theme(theme)) => engine.set_theme(&theme),
                Ok(HostMessage::RevealLine(line)) => {
                    let outcome = engine.reveal_line(line);
                    tracing::trace!(?outcome, "reveal requested");
                }
                Ok(HostMessage::Shutdown) | Err(_) => break,
            },
            recv(ticker.receiver()) -> tick => {
                if tick.is_err() {
                    tracing::warn!("ticker stopped, driver exiting");
                    break;
                }
                provider.tick(Instant::now());
                engine.on_frame();
            }
        }
    }
    ticker.join();
    tracing::debug!(frames = engine.frame(), "driver stopped");
    engine
}
