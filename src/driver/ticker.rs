//! Frame ticker: a thread that emits [`Tick`]s at a fixed interval.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Frame number, starting at zero.
    pub frame: u64,
    /// Time since the ticker started.
    pub elapsed: Duration,
}

/// Emits ticks on its own thread until shut down or dropped.
#[derive(Debug)]
pub struct FrameTicker {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    rx: Receiver<Tick>,
}

impl FrameTicker {
    /// Start ticking every `interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(interval: Duration) -> io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        // Two slots: a slow consumer skips frames instead of queueing them.
        let (tx, rx) = bounded(2);

        let handle = thread::Builder::new()
            .name(String::from("editsync-ticker"))
            .spawn(move || run(&tx, &flag, interval))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
            rx,
        })
    }

    /// Tick receiver, for use in `select!`.
    pub const fn receiver(&self) -> &Receiver<Tick> {
        &self.rx
    }

    /// Ask the thread to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Stop the thread and wait for it.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("ticker thread panicked");
            }
        }
    }
}

impl Drop for FrameTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(tx: &Sender<Tick>, shutdown: &AtomicBool, interval: Duration) {
    let start = Instant::now();
    let mut frame = 0u64;
    let mut next = start + interval;

    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now < next {
            thread::sleep((next - now).min(Duration::from_millis(1)));
            continue;
        }
        let tick = Tick {
            frame,
            elapsed: now - start,
        };
        // A full channel drops the tick; a closed one ends the thread.
        if let Err(TrySendError::Disconnected(_)) = tx.try_send(tick) {
            break;
        }
        frame += 1;
        next += interval;
        if next < now {
            next = now + interval;
        }
    }
}
