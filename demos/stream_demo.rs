//! Streaming Demo: pushes a simulated model response through the threaded driver.
//!
//! Tokens arrive every few milliseconds, the way an LLM agent would stream
//! them. The headless editor follows the bottom of the document, and the
//! stats printed at the end show how many chunks took the fast path.
//!
//! Run with `RUST_LOG=editsync=debug` to watch the engine decide.

use editsync::capability::TerminalProbe;
use editsync::{
    CapabilityProvider, Container, DriverConfig, HeadlessLoader, HostMessage, HostProps, SyncConfig, SyncDriver,
    SyncEngine,
};
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Sample text to stream.
const SAMPLE_TEXT: &str = r"## Why the editor does not flicker

Every update is compared against a cheap fingerprint of what the editor
already shows. Identical updates are dropped before they reach the widget.

While a response is streaming, chunks replace the buffer value directly.
The language model behind the editor stays alive, so highlighting and
undo history are not rebuilt for every token.

If you scroll up to read something, the editor stops following the
output. Scroll back to the bottom and it picks the stream up again.
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("editsync=info")))
        .init();

    let mut provider = CapabilityProvider::new(&TerminalProbe::default());
    let caps = provider.subscribe();
    println!("Capabilities: {:?}", provider.current());

    let engine = SyncEngine::new(HeadlessLoader::new(), caps, SyncConfig::default());
    let driver = SyncDriver::spawn(engine, provider, &DriverConfig::default())?;
    driver.send(HostMessage::Initialize(Container::new(1, 800, 400)))?;

    let start = Instant::now();
    let mut content = String::new();
    let mut tokens = 0usize;
    for token in SAMPLE_TEXT.split_inclusive(' ') {
        content.push_str(token);
        tokens += 1;
        driver.send(HostProps::new("answer.md", content.as_str()).language("markdown").streaming(true))?;
        thread::sleep(Duration::from_millis(5));
    }
    driver.send(HostProps::new("answer.md", content.as_str()).language("markdown"))?;
    thread::sleep(Duration::from_millis(50));

    let engine = driver.join()?;
    let elapsed = start.elapsed();
    let stats = engine.stats();

    println!();
    println!("Streamed {tokens} tokens in {elapsed:?}");
    println!("Stream updates:  {}", stats.stream_updates);
    println!("Recreations:     {}", stats.recreations);
    println!("In-place writes: {}", stats.in_place_updates);
    println!("Final length:    {} bytes", engine.session().map_or(0, |s| s.content().len()));
    Ok(())
}
