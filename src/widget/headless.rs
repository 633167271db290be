//! Headless editor: an in-memory [`EditorWidget`] with no rendering.
//!
//! It behaves like a browser code editor where it matters to the engine:
//! switching models resets cursor and scroll, programmatic writes emit change
//! events, and scroll geometry follows line count and line height. It also
//! exposes user-simulation and fault-injection hooks for tests.

use super::{
    Container, CursorPosition, DecorationId, EditorWidget, InitTicket, ModelId, ScrollBehavior,
    ScrollMetrics, ScrollOffsets, Selection, TextRope, WidgetEvent, WidgetLoader,
};
use crate::capability::EditorOptions;
use crate::error::WidgetError;
use std::collections::{BTreeMap, HashMap};
use std::task::Poll;

/// Width of one column in pixels.
const CHAR_WIDTH: f64 = 8.0;

/// Language that never produces syntax markers.
const PLAIN_TEXT: &str = "plaintext";

#[derive(Debug, Clone)]
struct HeadlessModel {
    rope: TextRope,
    language: String,
}

/// View-state captured by [`HeadlessEditor`].
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessViewState {
    /// Cursor at capture time.
    pub cursor: CursorPosition,
    /// Selection at capture time.
    pub selection: Option<Selection>,
    /// Scroll offsets at capture time.
    pub scroll: ScrollOffsets,
}

/// In-memory editor widget.
#[derive(Debug)]
pub struct HeadlessEditor {
    models: BTreeMap<ModelId, HeadlessModel>,
    installed: Option<ModelId>,
    next_model: u64,
    next_decoration: u64,
    options: EditorOptions,
    theme: String,
    cursor: CursorPosition,
    selection: Option<Selection>,
    scroll: ScrollOffsets,
    height: f64,
    parent_height: f64,
    keyboard_inset: f64,
    decorations: BTreeMap<DecorationId, u32>,
    events: Vec<WidgetEvent>,
    disposed: bool,
    markers_broken: bool,
    fail_model_creations: u32,
    fail_layouts: u32,
    last_scroll_behavior: Option<ScrollBehavior>,
    models_created: u32,
    value_writes: u32,
    layout_passes: u32,
    options_applied: u32,
}

impl HeadlessEditor {
    /// Create a widget mounted in `container`.
    pub fn new(container: &Container, options: EditorOptions) -> Self {
        let height = f64::from(container.height);
        Self {
            models: BTreeMap::new(),
            installed: None,
            next_model: 1,
            next_decoration: 1,
            options,
            theme: String::new(),
            cursor: CursorPosition::default(),
            selection: None,
            scroll: ScrollOffsets::default(),
            height,
            parent_height: height,
            keyboard_inset: 0.0,
            decorations: BTreeMap::new(),
            events: Vec::new(),
            disposed: false,
            markers_broken: false,
            fail_model_creations: 0,
            fail_layouts: 0,
            last_scroll_behavior: None,
            models_created: 0,
            value_writes: 0,
            layout_passes: 0,
            options_applied: 0,
        }
    }

    fn model(&self) -> Option<&HeadlessModel> {
        self.installed.and_then(|id| self.models.get(&id))
    }

    fn model_mut(&mut self) -> Result<&mut HeadlessModel, WidgetError> {
        if self.disposed {
            return Err(WidgetError::Disposed);
        }
        let id = self.installed.ok_or(WidgetError::UnknownModel(0))?;
        self.models.get_mut(&id).ok_or(WidgetError::UnknownModel(id.0))
    }

    fn line_height(&self) -> f64 {
        self.options.line_height
    }

    fn content_height(&self) -> f64 {
        f64::from(self.line_count()) * self.line_height()
    }

    fn max_scroll_top(&self) -> f64 {
        (self.content_height() - self.height).max(0.0)
    }

    fn max_scroll_left(&self) -> f64 {
        let width = self.model().map_or(0, |m| m.rope.max_width());
        #[allow(clippy::cast_precision_loss)]
        let width = width as f64 * CHAR_WIDTH;
        width.max(0.0)
    }

    fn clamp_cursor(&self, position: CursorPosition) -> CursorPosition {
        let line = position.line.clamp(1, self.line_count());
        let graphemes = self
            .model()
            .map_or(0, |m| m.rope.line_graphemes(line as usize - 1));
        let max_column = u32::try_from(graphemes).unwrap_or(u32::MAX).saturating_add(1);
        CursorPosition::new(line, position.column.clamp(1, max_column))
    }

    fn clamp_view(&mut self) {
        self.scroll.top = self.scroll.top.clamp(0.0, self.max_scroll_top());
        self.scroll.left = self.scroll.left.clamp(0.0, self.max_scroll_left());
        self.cursor = self.clamp_cursor(self.cursor);
    }

    // ── User simulation ────────────────────────────────────────────────

    /// Type text at the end of the buffer, as a user would.
    pub fn type_text(&mut self, text: &str) {
        let Ok(model) = self.model_mut() else {
            return;
        };
        model.rope.append(text);
        let content = model.rope.text();
        let last = self.line_count();
        let column = u32::try_from(self.model().map_or(0, |m| m.rope.line_graphemes(last as usize - 1)))
            .unwrap_or(u32::MAX);
        self.cursor = CursorPosition::new(last, column.saturating_add(1));
        self.events.push(WidgetEvent::ContentChanged(content));
    }

    /// Scroll to `top`, as a user would.
    pub fn user_scroll_to(&mut self, top: f64) {
        self.scroll.top = top.clamp(0.0, self.max_scroll_top());
        self.events.push(WidgetEvent::Scrolled(self.scroll_metrics()));
    }

    /// Scroll to the very bottom, as a user would.
    pub fn user_scroll_to_bottom(&mut self) {
        self.user_scroll_to(self.max_scroll_top());
    }

    /// Simulate an on-screen keyboard covering `inset` pixels.
    pub const fn set_keyboard_inset(&mut self, inset: f64) {
        self.keyboard_inset = inset;
    }

    /// Simulate the parent container changing height.
    pub const fn set_parent_height(&mut self, height: f64) {
        self.parent_height = height;
    }

    // ── Fault injection ────────────────────────────────────────────────

    /// Make the next `count` model creations fail.
    pub const fn fail_next_model_creations(&mut self, count: u32) {
        self.fail_model_creations = count;
    }

    /// Make the next `count` layout passes fail.
    pub const fn fail_next_layouts(&mut self, count: u32) {
        self.fail_layouts = count;
    }

    /// Lose syntax markers until the language is applied again.
    pub const fn break_syntax_markers(&mut self) {
        self.markers_broken = true;
    }

    // ── Inspection ─────────────────────────────────────────────────────

    /// Installed model, if any.
    pub const fn installed_model(&self) -> Option<ModelId> {
        self.installed
    }

    /// Number of live models.
    pub fn live_models(&self) -> usize {
        self.models.len()
    }

    /// Language of the installed model.
    pub fn language(&self) -> Option<&str> {
        self.model().map(|m| m.language.as_str())
    }

    /// Currently applied options.
    pub const fn options(&self) -> &EditorOptions {
        &self.options
    }

    /// Currently applied theme.
    pub fn theme(&self) -> &str {
        &self.theme
    }

    /// Widget height in pixels.
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// First and last visible line (1-based, inclusive).
    pub fn visible_lines(&self) -> (u32, u32) {
        let lh = self.line_height();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let first = (self.scroll.top / lh).floor() as u32 + 1;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let last = ((self.scroll.top + self.height) / lh).ceil() as u32;
        (first, last.min(self.line_count()).max(first))
    }

    /// Lines currently carrying a highlight decoration.
    pub fn highlighted_lines(&self) -> Vec<u32> {
        self.decorations.values().copied().collect()
    }

    /// Behavior of the last programmatic scroll to bottom.
    pub const fn last_scroll_behavior(&self) -> Option<ScrollBehavior> {
        self.last_scroll_behavior
    }

    /// Total models created.
    pub const fn models_created(&self) -> u32 {
        self.models_created
    }

    /// Total in-place value writes.
    pub const fn value_writes(&self) -> u32 {
        self.value_writes
    }

    /// Total layout passes.
    pub const fn layout_passes(&self) -> u32 {
        self.layout_passes
    }

    /// Total option applications.
    pub const fn options_applied(&self) -> u32 {
        self.options_applied
    }

    /// Whether the widget was disposed.
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl EditorWidget for HeadlessEditor {
    type ViewState = HeadlessViewState;

    fn create_model(&mut self, content: &str, language: &str) -> Result<ModelId, WidgetError> {
        if self.disposed {
            return Err(WidgetError::Disposed);
        }
        if self.fail_model_creations > 0 {
            self.fail_model_creations -= 1;
            return Err(WidgetError::ModelCreation(String::from("injected failure")));
        }
        let id = ModelId(self.next_model);
        self.next_model += 1;
        self.models_created += 1;
        self.models.insert(
            id,
            HeadlessModel {
                rope: TextRope::from_text(content),
                language: language.to_owned(),
            },
        );
        Ok(id)
    }

    fn set_model(&mut self, model: ModelId) -> Result<(), WidgetError> {
        if self.disposed {
            return Err(WidgetError::Disposed);
        }
        if !self.models.contains_key(&model) {
            return Err(WidgetError::UnknownModel(model.0));
        }
        self.installed = Some(model);
        self.cursor = CursorPosition::default();
        self.selection = None;
        self.scroll = ScrollOffsets::default();
        self.decorations.clear();
        self.markers_broken = false;
        Ok(())
    }

    fn dispose_model(&mut self, model: ModelId) {
        self.models.remove(&model);
        if self.installed == Some(model) {
            self.installed = None;
        }
    }

    fn value(&self) -> String {
        self.model().map(|m| m.rope.text()).unwrap_or_default()
    }

    fn set_value(&mut self, content: &str) -> Result<(), WidgetError> {
        self.model_mut()?.rope.replace(content);
        self.value_writes += 1;
        self.clamp_view();
        self.events.push(WidgetEvent::ContentChanged(content.to_owned()));
        Ok(())
    }

    fn set_language(&mut self, language: &str) -> Result<(), WidgetError> {
        language.clone_into(&mut self.model_mut()?.language);
        self.markers_broken = false;
        Ok(())
    }

    fn line_count(&self) -> u32 {
        self.model()
            .map_or(1, |m| u32::try_from(m.rope.line_count()).unwrap_or(u32::MAX))
    }

    fn apply_options(&mut self, options: &EditorOptions) {
        self.options = options.clone();
        self.options_applied += 1;
        self.clamp_view();
    }

    fn set_theme(&mut self, theme: &str) {
        theme.clone_into(&mut self.theme);
    }

    fn layout(&mut self) -> Result<(), WidgetError> {
        if self.disposed {
            return Err(WidgetError::Disposed);
        }
        if self.fail_layouts > 0 {
            self.fail_layouts -= 1;
            return Err(WidgetError::Layout(String::from("injected failure")));
        }
        self.layout_passes += 1;
        self.clamp_view();
        Ok(())
    }

    fn save_view_state(&self) -> Option<HeadlessViewState> {
        self.installed.map(|_| HeadlessViewState {
            cursor: self.cursor,
            selection: self.selection,
            scroll: self.scroll,
        })
    }

    fn restore_view_state(&mut self, state: &HeadlessViewState) -> bool {
        if self.disposed || self.installed.is_none() {
            return false;
        }
        self.cursor = state.cursor;
        self.selection = state.selection;
        self.scroll = state.scroll;
        self.clamp_view();
        true
    }

    fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    fn set_cursor(&mut self, position: CursorPosition) {
        self.cursor = self.clamp_cursor(position);
    }

    fn selection(&self) -> Option<Selection> {
        self.selection
    }

    fn set_selection(&mut self, selection: Option<Selection>) {
        self.selection = selection;
    }

    fn scroll_offsets(&self) -> ScrollOffsets {
        self.scroll
    }

    fn set_scroll_offsets(&mut self, offsets: ScrollOffsets) {
        self.scroll = offsets;
        self.clamp_view();
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: self.scroll.top,
            scroll_height: self.content_height().max(self.height),
            client_height: self.height,
            keyboard_inset: self.keyboard_inset,
        }
    }

    fn scroll_to_bottom(&mut self, behavior: ScrollBehavior) {
        self.scroll.top = self.max_scroll_top();
        self.last_scroll_behavior = Some(behavior);
    }

    fn reveal_line_centered(&mut self, line: u32) {
        let lh = self.line_height();
        let center = f64::from(line.saturating_sub(1)).mul_add(lh, lh / 2.0);
        self.scroll.top = (center - self.height / 2.0).clamp(0.0, self.max_scroll_top());
    }

    fn add_line_highlight(&mut self, line: u32) -> DecorationId {
        let id = DecorationId(self.next_decoration);
        self.next_decoration += 1;
        self.decorations.insert(id, line);
        id
    }

    fn remove_decoration(&mut self, id: DecorationId) {
        self.decorations.remove(&id);
    }

    fn has_syntax_markers(&self) -> bool {
        !self.markers_broken && self.model().is_some_and(|m| m.language != PLAIN_TEXT)
    }

    fn set_height(&mut self, height: f64) {
        self.height = height.max(0.0);
        self.clamp_view();
    }

    fn parent_height(&self) -> f64 {
        self.parent_height
    }

    fn poll_events(&mut self) -> Vec<WidgetEvent> {
        std::mem::take(&mut self.events)
    }

    fn dispose(&mut self) {
        self.models.clear();
        self.installed = None;
        self.decorations.clear();
        self.events.clear();
        self.disposed = true;
    }
}

#[derive(Debug)]
struct PendingLoad {
    container: Container,
    options: EditorOptions,
    polls_left: u32,
}

/// Loader producing [`HeadlessEditor`]s.
///
/// By default construction completes on the first poll. Tests can make it
/// span frames or fail.
#[derive(Debug, Default)]
pub struct HeadlessLoader {
    pending: HashMap<InitTicket, PendingLoad>,
    pending_polls: u32,
    fail_next: u32,
    begun: u32,
    abandoned: u32,
}

impl HeadlessLoader {
    /// Loader that completes immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader whose constructions stay pending for `polls` polls.
    pub fn deferred(polls: u32) -> Self {
        Self {
            pending_polls: polls,
            ..Self::default()
        }
    }

    /// Make the next `count` constructions fail.
    pub const fn fail_next(&mut self, count: u32) {
        self.fail_next = count;
    }

    /// Number of constructions started.
    pub const fn begun(&self) -> u32 {
        self.begun
    }

    /// Number of constructions abandoned.
    pub const fn abandoned(&self) -> u32 {
        self.abandoned
    }
}

impl WidgetLoader for HeadlessLoader {
    type Widget = HeadlessEditor;

    fn begin(&mut self, ticket: InitTicket, container: &Container, options: &EditorOptions) {
        self.begun += 1;
        self.pending.insert(
            ticket,
            PendingLoad {
                container: container.clone(),
                options: options.clone(),
                polls_left: self.pending_polls,
            },
        );
    }

    fn poll(&mut self, ticket: InitTicket) -> Poll<Result<HeadlessEditor, WidgetError>> {
        let Some(load) = self.pending.get_mut(&ticket) else {
            return Poll::Ready(Err(WidgetError::Construction(format!(
                "unknown ticket {}",
                ticket.0
            ))));
        };
        if load.polls_left > 0 {
            load.polls_left -= 1;
            return Poll::Pending;
        }
        let Some(load) = self.pending.remove(&ticket) else {
            return Poll::Pending;
        };
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Poll::Ready(Err(WidgetError::Construction(String::from(
                "injected failure",
            ))));
        }
        Poll::Ready(Ok(HeadlessEditor::new(&load.container, load.options)))
    }

    fn abandon(&mut self, ticket: InitTicket) {
        if self.pending.remove(&ticket).is_some() {
            self.abandoned += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capabilities;

    fn editor() -> HeadlessEditor {
        let options = EditorOptions::for_capabilities(Capabilities::empty(), true);
        HeadlessEditor::new(&Container::new(1, 800, 210), options)
    }

    fn loaded(content: &str) -> HeadlessEditor {
        let mut ed = editor();
        let id = ed.create_model(content, "rust").unwrap();
        ed.set_model(id).unwrap();
        ed
    }

    #[test]
    fn test_set_model_resets_view() {
        let mut ed = loaded(&"x\n".repeat(100));
        ed.set_cursor(CursorPosition::new(50, 1));
        ed.set_scroll_offsets(ScrollOffsets { top: 400.0, left: 0.0 });

        let next = ed.create_model("y", "rust").unwrap();
        ed.set_model(next).unwrap();
        assert_eq!(ed.cursor(), CursorPosition::default());
        assert!(ed.scroll_offsets().top.abs() < f64::EPSILON);
    }

    #[test]
    fn test_set_value_emits_change_event() {
        let mut ed = loaded("a");
        ed.set_value("b").unwrap();
        assert_eq!(ed.value(), "b");
        assert_eq!(ed.poll_events(), vec![WidgetEvent::ContentChanged("b".into())]);
        assert!(ed.poll_events().is_empty());
    }

    #[test]
    fn test_scroll_to_bottom_shows_last_line() {
        let mut ed = loaded(&"line\n".repeat(99));
        assert_eq!(ed.line_count(), 100);
        ed.scroll_to_bottom(ScrollBehavior::Immediate);
        assert_eq!(ed.visible_lines().1, 100);
        assert!(ed.scroll_metrics().distance_from_bottom() < 1.0);
    }

    #[test]
    fn test_user_scroll_emits_metrics() {
        let mut ed = loaded(&"line\n".repeat(99));
        ed.user_scroll_to(0.0);
        let events = ed.poll_events();
        assert!(matches!(events.as_slice(), [WidgetEvent::Scrolled(m)] if m.scroll_top == 0.0));
    }

    #[test]
    fn test_cursor_clamped() {
        let mut ed = loaded("ab\ncd");
        ed.set_cursor(CursorPosition::new(10, 10));
        assert_eq!(ed.cursor(), CursorPosition::new(2, 3));
    }

    #[test]
    fn test_injected_model_failure() {
        let mut ed = editor();
        ed.fail_next_model_creations(1);
        assert!(ed.create_model("a", "rust").is_err());
        assert!(ed.create_model("a", "rust").is_ok());
    }

    #[test]
    fn test_syntax_markers() {
        let mut ed = loaded("fn main() {}");
        assert!(ed.has_syntax_markers());
        ed.break_syntax_markers();
        assert!(!ed.has_syntax_markers());
        ed.set_language("rust").unwrap();
        assert!(ed.has_syntax_markers());
        ed.set_language(PLAIN_TEXT).unwrap();
        assert!(!ed.has_syntax_markers());
    }

    #[test]
    fn test_deferred_loader() {
        let mut loader = HeadlessLoader::deferred(2);
        let ticket = InitTicket(1);
        let options = EditorOptions::for_capabilities(Capabilities::empty(), false);
        loader.begin(ticket, &Container::new(1, 100, 100), &options);

        assert!(loader.poll(ticket).is_pending());
        assert!(loader.poll(ticket).is_pending());
        assert!(matches!(loader.poll(ticket), Poll::Ready(Ok(_))));
        assert!(matches!(loader.poll(ticket), Poll::Ready(Err(_))));
    }

    #[test]
    fn test_dispose_rejects_writes() {
        let mut ed = loaded("a");
        ed.dispose();
        assert!(ed.is_disposed());
        assert_eq!(ed.set_value("b"), Err(WidgetError::Disposed));
        assert!(ed.layout().is_err());
    }
}
