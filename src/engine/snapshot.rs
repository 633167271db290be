//! Editor state snapshots taken around buffer-model swaps.

use crate::widget::{CursorPosition, EditorWidget, ScrollOffsets, Selection};

/// How a snapshot was put back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMethod {
    /// The widget accepted its opaque view-state.
    ViewState,
    /// Cursor, scroll and selection were applied one by one.
    Manual,
}

/// Cursor, scroll and selection, plus the widget's opaque view-state.
#[derive(Debug, Clone)]
pub struct EditorStateSnapshot<V> {
    view_state: Option<V>,
    cursor: CursorPosition,
    scroll: ScrollOffsets,
    selection: Option<Selection>,
}

impl<V: Clone> EditorStateSnapshot<V> {
    /// Capture the state of `widget`.
    pub fn capture<W>(widget: &W) -> Self
    where
        W: EditorWidget<ViewState = V>,
    {
        Self {
            view_state: widget.save_view_state(),
            cursor: widget.cursor(),
            scroll: widget.scroll_offsets(),
            selection: widget.selection(),
        }
    }

    /// Put the state back, preferring the opaque view-state.
    pub fn restore<W>(&self, widget: &mut W) -> RestoreMethod
    where
        W: EditorWidget<ViewState = V>,
    {
        if let Some(view_state) = &self.view_state {
            if widget.restore_view_state(view_state) {
                return RestoreMethod::ViewState;
            }
        }
        widget.set_cursor(self.cursor);
        widget.set_scroll_offsets(self.scroll);
        widget.set_selection(self.selection);
        RestoreMethod::Manual
    }

    /// Cursor at capture time.
    pub const fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    /// Scroll offsets at capture time.
    pub const fn scroll(&self) -> ScrollOffsets {
        self.scroll
    }
}
