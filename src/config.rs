//! Engine configuration.

use std::time::Duration;

/// Configuration for the synchronization engine.
///
/// Every timing constant the engine uses lives here so hosts (and tests) can
/// tune them without touching engine code.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of graphemes kept at each end of the content fingerprint.
    pub fingerprint_window: usize,
    /// How long after the last user edit the user counts as typing.
    pub typing_cooldown: Duration,
    /// Near-bottom threshold in pixels on desktop.
    pub scroll_threshold: f64,
    /// Near-bottom threshold in pixels on mobile.
    pub mobile_scroll_threshold: f64,
    /// Maximum model creation attempts before giving up.
    pub model_attempts: u32,
    /// Backoff unit between model creation attempts (multiplied by attempt).
    pub model_backoff: Duration,
    /// Frames to wait before restoration starts touching the widget.
    pub restore_settle_frames: u32,
    /// Pause between model recreation and the editable re-apply.
    pub restore_pause: Duration,
    /// Layout passes run during restoration.
    pub restore_layout_passes: u32,
    /// Layout passes run by the reduced-fidelity fallback.
    pub fallback_layout_passes: u32,
    /// Delay before the corrective syntax-highlighting pass.
    pub corrective_pass_delay: Duration,
    /// How long a revealed line stays highlighted.
    pub highlight_duration: Duration,
    /// Delay before retrying a reveal requested before initialization.
    pub reveal_retry_delay: Duration,
    /// Pixels of host chrome subtracted from the viewport when sizing the
    /// editor on mobile.
    pub reserved_height: f64,
    /// Theme applied when the host never sets one.
    pub default_theme: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fingerprint_window: 100,
            typing_cooldown: Duration::from_millis(500),
            scroll_threshold: 100.0,
            mobile_scroll_threshold: 150.0,
            model_attempts: 3,
            model_backoff: Duration::from_millis(50),
            restore_settle_frames: 3,
            restore_pause: Duration::from_millis(50),
            restore_layout_passes: 3,
            fallback_layout_passes: 5,
            corrective_pass_delay: Duration::from_millis(100),
            highlight_duration: Duration::from_secs(3),
            reveal_retry_delay: Duration::from_millis(100),
            reserved_height: 0.0,
            default_theme: String::from("vs-dark"),
        }
    }
}

impl SyncConfig {
    /// Backoff before the given retry attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.model_backoff * attempt
    }

    /// Near-bottom threshold for the device class.
    pub const fn threshold(&self, mobile: bool) -> f64 {
        if mobile {
            self.mobile_scroll_threshold
        } else {
            self.scroll_threshold
        }
    }
}
