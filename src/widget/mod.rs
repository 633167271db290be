//! Widget seam: the stateful editor the engine keeps in sync.
//!
//! The engine never assumes a concrete editor. It talks to anything that
//! implements [`EditorWidget`], and obtains instances through a
//! [`WidgetLoader`] so that construction may span several frames.
//!
//! A complete in-memory implementation ships in [`headless`]; it is what the
//! tests, benches and demo host run against.

pub mod headless;
mod rope;

pub use headless::{HeadlessEditor, HeadlessLoader, HeadlessViewState};
pub use rope::TextRope;

use crate::capability::EditorOptions;
use crate::error::WidgetError;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::task::Poll;

/// Identifier of a buffer model owned by a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(pub u64);

/// Identifier of a line decoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecorationId(pub u64);

/// Ticket identifying one widget construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InitTicket(pub u64);

/// A 1-based cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorPosition {
    /// Line number, starting at 1.
    pub line: u32,
    /// Column number, starting at 1.
    pub column: u32,
}

impl CursorPosition {
    /// Create a new position.
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl Default for CursorPosition {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// A selection between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Where the selection started.
    pub anchor: CursorPosition,
    /// Where the cursor currently is.
    pub active: CursorPosition,
}

/// Scroll offsets in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollOffsets {
    /// Vertical offset.
    pub top: f64,
    /// Horizontal offset.
    pub left: f64,
}

/// Geometry needed to judge distance from the bottom of the content.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    /// Current vertical offset.
    pub scroll_top: f64,
    /// Total content height.
    pub scroll_height: f64,
    /// Height of the visible area.
    pub client_height: f64,
    /// Height covered by an on-screen keyboard.
    pub keyboard_inset: f64,
}

impl ScrollMetrics {
    /// Distance between the bottom of the visible area and the end of the
    /// content, accounting for an on-screen keyboard.
    pub fn distance_from_bottom(&self) -> f64 {
        let visible = (self.client_height - self.keyboard_inset).max(0.0);
        (self.scroll_height - self.scroll_top - visible).max(0.0)
    }
}

/// How a programmatic scroll is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    /// Jump directly to the target.
    Immediate,
    /// Animate towards the target.
    Smooth,
}

/// Something the widget observed since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// The buffer content changed.
    ContentChanged(String),
    /// The user scrolled.
    Scrolled(ScrollMetrics),
}

/// The host element an editor is mounted into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Stable identity of the element.
    pub id: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Class list of the element.
    pub class_name: String,
    /// Marker left on the element by a previous instantiation.
    pub instance_marker: Option<u64>,
}

impl Container {
    /// Create a container description.
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            class_name: String::new(),
            instance_marker: None,
        }
    }

    /// Fingerprint of the container's size, class and instantiation marker.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.width.hash(&mut hasher);
        self.height.hash(&mut hasher);
        self.class_name.hash(&mut hasher);
        self.instance_marker.hash(&mut hasher);
        hasher.finish()
    }
}

/// A stateful text-editing widget.
///
/// Model operations act on buffer models owned by the widget. Exactly one
/// model is installed at a time; the others exist only between creation and
/// installation, or between uninstallation and disposal.
pub trait EditorWidget {
    /// Opaque view-state (cursor, scroll, selection, folding, ...).
    type ViewState: Clone + fmt::Debug;

    /// Create a buffer model.
    fn create_model(&mut self, content: &str, language: &str) -> Result<ModelId, WidgetError>;

    /// Install `model` as the displayed buffer.
    fn set_model(&mut self, model: ModelId) -> Result<(), WidgetError>;

    /// Dispose a model. Disposing the installed model leaves no model shown.
    fn dispose_model(&mut self, model: ModelId);

    /// Content of the installed model.
    fn value(&self) -> String;

    /// Replace the installed model's content in place.
    fn set_value(&mut self, content: &str) -> Result<(), WidgetError>;

    /// Change the installed model's language.
    fn set_language(&mut self, language: &str) -> Result<(), WidgetError>;

    /// Number of lines in the installed model (at least 1).
    fn line_count(&self) -> u32;

    /// Apply widget options.
    fn apply_options(&mut self, options: &EditorOptions);

    /// Apply a color theme.
    fn set_theme(&mut self, theme: &str);

    /// Recompute layout against the current container size.
    fn layout(&mut self) -> Result<(), WidgetError>;

    /// Capture the opaque view-state, if the widget supports it.
    fn save_view_state(&self) -> Option<Self::ViewState>;

    /// Restore an opaque view-state. Returns `false` if it was rejected.
    fn restore_view_state(&mut self, state: &Self::ViewState) -> bool;

    /// Current cursor position.
    fn cursor(&self) -> CursorPosition;

    /// Move the cursor, clamped to the buffer.
    fn set_cursor(&mut self, position: CursorPosition);

    /// Current selection, if any.
    fn selection(&self) -> Option<Selection>;

    /// Replace the selection.
    fn set_selection(&mut self, selection: Option<Selection>);

    /// Current scroll offsets.
    fn scroll_offsets(&self) -> ScrollOffsets;

    /// Scroll to the given offsets, clamped to the content.
    fn set_scroll_offsets(&mut self, offsets: ScrollOffsets);

    /// Geometry for near-bottom decisions.
    fn scroll_metrics(&self) -> ScrollMetrics;

    /// Scroll so the last line is visible.
    fn scroll_to_bottom(&mut self, behavior: ScrollBehavior);

    /// Scroll so `line` sits in the middle of the viewport.
    fn reveal_line_centered(&mut self, line: u32);

    /// Highlight a whole line.
    fn add_line_highlight(&mut self, line: u32) -> DecorationId;

    /// Remove a decoration.
    fn remove_decoration(&mut self, id: DecorationId);

    /// Whether syntax-highlighting markers are present in the rendered output.
    fn has_syntax_markers(&self) -> bool;

    /// Force the widget height in pixels.
    fn set_height(&mut self, height: f64);

    /// Height of the parent container in pixels.
    fn parent_height(&self) -> f64;

    /// Drain events observed since the last call.
    fn poll_events(&mut self) -> Vec<WidgetEvent>;

    /// Tear the widget down. Later calls are no-ops or errors.
    fn dispose(&mut self);
}

/// Constructs widgets, possibly across several frames.
pub trait WidgetLoader {
    /// The widget type produced.
    type Widget: EditorWidget;

    /// Start constructing a widget for `container`.
    fn begin(&mut self, ticket: InitTicket, container: &Container, options: &EditorOptions);

    /// Check on a construction. Returns `Poll::Pending` while still loading.
    fn poll(&mut self, ticket: InitTicket) -> Poll<Result<Self::Widget, WidgetError>>;

    /// Abandon a construction that is no longer wanted.
    fn abandon(&mut self, ticket: InitTicket);
}
