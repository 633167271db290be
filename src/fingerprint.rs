//! Content fingerprints: a cheap signature used to skip redundant work.
//!
//! A fingerprint captures the file name, the byte length, and a window of
//! graphemes at each end of the content. Two fingerprints comparing equal is
//! treated as the content being equal.
//!
//! # Blind spot
//!
//! An edit that keeps the length and touches only the middle of a document
//! (outside both windows) produces an identical fingerprint and is not
//! detected. Hosts that need exact change detection for such edits must
//! change the file name or force a refresh.

use unicode_segmentation::UnicodeSegmentation;

/// Approximate signature of a file's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint {
    file_name: String,
    len: usize,
    head: String,
    tail: String,
}

impl ContentFingerprint {
    /// Compute the fingerprint of `content` with `window` graphemes per end.
    pub fn compute(file_name: &str, content: &str, window: usize) -> Self {
        let head_end = content
            .grapheme_indices(true)
            .nth(window)
            .map_or(content.len(), |(idx, _)| idx);

        // Skip the tail window when it would overlap the head: the head already
        // covers the whole string.
        let tail_start = if head_end == content.len() {
            content.len()
        } else {
            content
                .grapheme_indices(true)
                .rev()
                .take(window)
                .last()
                .map_or(content.len(), |(idx, _)| idx)
                .max(head_end)
        };

        Self {
            file_name: file_name.to_owned(),
            len: content.len(),
            head: content[..head_end].to_owned(),
            tail: content[tail_start..].to_owned(),
        }
    }

    /// File name the fingerprint was computed for.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Byte length of the fingerprinted content.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the fingerprinted content was empty.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}
