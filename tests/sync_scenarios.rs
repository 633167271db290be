//! End-to-end scenarios against the headless editor.

use editsync::widget::{CursorPosition, ScrollBehavior};
use editsync::{
    Capabilities, CapabilitySubscription, Container, ContentAction, EditorWidget, HeadlessLoader, HostProps,
    ManualClock, Phase, SyncConfig, SyncEngine,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Harness {
    engine: SyncEngine<HeadlessLoader>,
    clock: ManualClock,
    edits: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new(caps: Capabilities) -> Self {
        let clock = ManualClock::new();
        let mut engine = SyncEngine::with_clock(
            HeadlessLoader::new(),
            CapabilitySubscription::fixed(caps),
            SyncConfig::default(),
            Arc::new(clock.clone()),
        );
        let edits = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&edits);
        engine.on_content_change(move |content| sink.lock().unwrap().push(content.to_owned()));
        // 210px at 21px per line: ten visible lines.
        engine.initialize(&Container::new(1, 800, 210));
        Self { engine, clock, edits }
    }

    fn desktop() -> Self {
        Self::new(Capabilities::empty())
    }

    /// Push props, then let one frame pass.
    fn push(&mut self, props: &HostProps) {
        self.engine.update(props);
        self.clock.advance(Duration::from_millis(16));
        self.engine.on_frame();
    }

    fn widget(&self) -> &editsync::HeadlessEditor {
        self.engine.widget().unwrap()
    }

    fn at_last_line(&self) -> bool {
        self.widget().visible_lines().1 == self.widget().line_count()
    }

    fn edit_count(&self) -> usize {
        self.edits.lock().unwrap().len()
    }
}

/// Fifty characters, five lines.
fn chunk(n: usize) -> String {
    (0..5).map(|line| format!("c{n:02}-l{line}...\n")).collect()
}

fn stream_props(content: &str) -> HostProps {
    HostProps::new("answer.md", content).language("markdown").streaming(true)
}

#[test]
fn test_identical_reconciles_mutate_once() {
    let mut h = Harness::desktop();
    let first = h.engine.reconcile("a.rs", "fn a() {}", "rust", false);
    let mutations = h.engine.stats().buffer_mutations();
    let second = h.engine.reconcile("a.rs", "fn a() {}", "rust", false);

    assert_eq!(first.content(), Some(ContentAction::Recreated));
    assert_eq!(second.content(), Some(ContentAction::None));
    assert_eq!(h.engine.stats().buffer_mutations(), mutations);
}

#[test]
fn test_stream_ten_chunks_follows_bottom() {
    let mut h = Harness::desktop();
    h.push(&stream_props(""));

    let mut content = String::new();
    for n in 0..10 {
        let piece = chunk(n);
        assert_eq!(piece.len(), 50);
        content.push_str(&piece);
        h.push(&stream_props(&content));
        assert!(h.at_last_line(), "not following after chunk {n}");
    }
    h.push(&stream_props(&content).streaming(false));

    assert_eq!(content.len(), 500);
    assert_eq!(h.widget().value(), content);
    assert!(h.at_last_line());
    assert_eq!(h.engine.stats().stream_updates, 10);
    assert_eq!(h.widget().last_scroll_behavior(), Some(ScrollBehavior::Immediate));
    assert_eq!(h.engine.phase(), Phase::Idle);
}

#[test]
fn test_streaming_never_fires_callback() {
    let mut h = Harness::desktop();
    let mut content = String::new();
    for n in 0..5 {
        content.push_str(&chunk(n));
        h.push(&stream_props(&content).editable(true));
    }
    assert_eq!(h.edit_count(), 0);

    h.engine.widget_mut().unwrap().type_text("typed");
    h.engine.on_frame();
    assert_eq!(h.edit_count(), 1);
    assert_eq!(h.edits.lock().unwrap()[0], format!("{content}typed"));
}

#[test]
fn test_scroll_to_top_mid_stream() {
    let mut h = Harness::desktop();
    let mut content = String::new();
    for n in 0..5 {
        content.push_str(&chunk(n));
        h.push(&stream_props(&content));
    }
    assert!(h.at_last_line());

    h.engine.widget_mut().unwrap().user_scroll_to(0.0);
    for n in 5..10 {
        content.push_str(&chunk(n));
        h.push(&stream_props(&content));
        assert!(h.widget().scroll_offsets().top.abs() < f64::EPSILON);
    }
    assert!(h.engine.scroll_state().is_user_scrolling);

    // Back within the threshold: the next update follows again.
    h.engine.widget_mut().unwrap().user_scroll_to_bottom();
    content.push_str(&chunk(10));
    h.push(&stream_props(&content));
    assert!(h.at_last_line());
    assert!(h.engine.scroll_state().should_auto_scroll);
}

#[test]
fn test_scroll_hysteresis_survives_updates() {
    let mut h = Harness::desktop();
    let mut content = String::new();
    for n in 0..20 {
        content.push_str(&chunk(n));
        h.push(&stream_props(&content));
    }
    h.engine.widget_mut().unwrap().user_scroll_to(100.0);
    for n in 20..25 {
        content.push_str(&chunk(n));
        h.push(&stream_props(&content));
    }

    // Still far from the bottom after moving a little: auto-follow stays off.
    h.engine.widget_mut().unwrap().user_scroll_to(400.0);
    content.push_str(&chunk(25));
    h.push(&stream_props(&content));
    assert!(h.engine.scroll_state().is_user_scrolling);
    assert!(!h.at_last_line());
}

#[test]
fn test_editable_toggle_changes_only_options() {
    let mut h = Harness::desktop();
    let props = HostProps::new("config.toml", "[package]").language("toml");
    h.push(&props);
    let recreations = h.engine.stats().recreations;
    let writes = h.widget().value_writes();

    h.push(&props.clone().editable(true));
    assert_eq!(h.engine.stats().recreations, recreations);
    assert_eq!(h.widget().value_writes(), writes);
    assert!(!h.widget().options().read_only);
    assert!(h.widget().options().context_menu);
}

#[test]
fn test_hide_show_same_file_recreates() {
    let mut h = Harness::desktop();
    let props = HostProps::new("main.rs", "fn main() {}").language("rust");
    h.push(&props);
    h.push(&props.clone().visible(false));
    h.clock.advance(Duration::from_secs(1));

    let recreations = h.engine.stats().recreations;
    h.engine.update(&props);
    assert_eq!(h.engine.stats().recreations, recreations + 1);
    assert!(h.engine.visibility_snapshot().unwrap().force_next_update);
    assert_eq!(h.engine.phase(), Phase::Restoring);
}

#[test]
fn test_reopen_after_switch_recreates() {
    let mut h = Harness::desktop();
    let a = HostProps::new("a.rs", "fn a() {}").language("rust");
    let b = HostProps::new("b.rs", "fn b() {}").language("rust");
    h.push(&a);
    h.push(&a.clone().visible(false));
    h.push(&b);
    let recreations = h.engine.stats().recreations;

    h.push(&a);
    assert_eq!(h.engine.stats().recreations, recreations + 1);
    assert_eq!(h.widget().value(), "fn a() {}");
}

#[test]
fn test_user_edit_then_stream_race() {
    let mut h = Harness::desktop();
    h.push(&stream_props("draft").editable(true));
    h.engine.widget_mut().unwrap().type_text(" edited");

    // Stale chunk arriving during the typing cool-down is dropped.
    h.push(&stream_props("draft and more").editable(true));
    assert_eq!(h.widget().value(), "draft edited");
    assert_eq!(h.engine.stats().stream_skipped_typing, 1);

    h.clock.advance(Duration::from_millis(600));
    h.push(&stream_props("draft edited and more").editable(true));
    assert_eq!(h.widget().value(), "draft edited and more");
    assert_eq!(h.edit_count(), 1);
}

#[test]
fn test_reveal_after_stream() {
    let mut h = Harness::desktop();
    let content: String = (0..10).map(chunk).collect();
    h.push(&HostProps::new("log.txt", content.as_str()).requested_line(Some(12)));
    assert_eq!(h.widget().cursor(), CursorPosition::new(12, 1));
    assert_eq!(h.widget().highlighted_lines(), vec![12]);

    h.clock.advance(Duration::from_secs(3));
    h.engine.on_frame();
    assert!(h.widget().highlighted_lines().is_empty());
}

#[test]
fn test_mobile_jumps_immediately() {
    let mut h = Harness::new(Capabilities::MOBILE | Capabilities::TOUCH | Capabilities::IOS);
    let content: String = (0..4).map(chunk).collect();
    h.push(&HostProps::new("out.txt", content.as_str()));
    assert_eq!(h.widget().last_scroll_behavior(), Some(ScrollBehavior::Immediate));
    assert!((h.widget().options().font_size - 12.0).abs() < f64::EPSILON);
}

#[test]
fn test_desktop_scrolls_smoothly_when_idle() {
    let mut h = Harness::desktop();
    let content: String = (0..4).map(chunk).collect();
    h.push(&HostProps::new("out.txt", content.as_str()));
    assert_eq!(h.widget().last_scroll_behavior(), Some(ScrollBehavior::Smooth));
}

#[test]
fn test_dispose_releases_widget() {
    let mut h = Harness::desktop();
    h.push(&HostProps::new("a.txt", "x"));
    h.engine.dispose();
    assert_eq!(h.engine.phase(), Phase::Disposed);
    assert!(h.engine.widget().is_none());
    h.engine.update(&HostProps::new("a.txt", "y"));
    assert!(h.engine.session().is_none());
}
