//! Capability oracle: device and viewport detection feeding editor options.
//!
//! Capabilities are computed once by a [`CapabilityProvider`] and handed to
//! interested parties through explicit subscriptions. Resizes are debounced
//! and only republished when the mobile/desktop classification flips, so a
//! window drag does not thrash editor configuration.

use bitflags::bitflags;
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::time::{Duration, Instant};

/// Widest viewport (in CSS pixels) a touch device may have and still count
/// as mobile.
const MOBILE_MAX_WIDTH: u32 = 768;

/// Default resize debounce.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

bitflags! {
    /// Detected device capabilities.
    ///
    /// # Example
    /// ```
    /// use editsync::Capabilities;
    /// let caps = Capabilities::MOBILE | Capabilities::TOUCH;
    /// assert!(caps.is_mobile());
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        /// Small touch device; drives the mobile editor profile.
        const MOBILE = 0b0000_0001;
        /// Touch input is available.
        const TOUCH = 0b0000_0010;
        /// Apple mobile platform.
        const IOS = 0b0000_0100;
        /// Android platform.
        const ANDROID = 0b0000_1000;
        /// Dynamic viewport units (`dvh`) are supported.
        const DYNAMIC_VIEWPORT = 0b0001_0000;
    }
}

impl Capabilities {
    /// Classify a device profile.
    pub fn detect(profile: &DeviceProfile) -> Self {
        let agent = profile.user_agent.to_ascii_lowercase();
        let mut caps = Self::empty();

        if ["iphone", "ipad", "ipod"].iter().any(|m| agent.contains(m)) {
            caps |= Self::IOS;
        }
        if agent.contains("android") {
            caps |= Self::ANDROID;
        }
        if profile.max_touch_points > 0 {
            caps |= Self::TOUCH;
        }
        if profile.supports_dynamic_viewport {
            caps |= Self::DYNAMIC_VIEWPORT;
        }

        let small_touch = caps.contains(Self::TOUCH) && profile.viewport_width <= MOBILE_MAX_WIDTH;
        if caps.intersects(Self::IOS | Self::ANDROID) || small_touch {
            caps |= Self::MOBILE;
        }
        caps
    }

    /// Whether the mobile profile applies.
    pub const fn is_mobile(self) -> bool {
        self.contains(Self::MOBILE)
    }
}

/// Raw description of the device hosting the editor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceProfile {
    /// User agent or platform identification string.
    pub user_agent: String,
    /// Viewport width in CSS pixels.
    pub viewport_width: u32,
    /// Viewport height in CSS pixels.
    pub viewport_height: u32,
    /// Maximum simultaneous touch points (0 = no touch).
    pub max_touch_points: u32,
    /// Whether dynamic viewport units are available.
    pub supports_dynamic_viewport: bool,
}

impl DeviceProfile {
    /// A typical desktop browser profile.
    pub fn desktop(width: u32, height: u32) -> Self {
        Self {
            user_agent: String::from("Mozilla/5.0 (X11; Linux x86_64)"),
            viewport_width: width,
            viewport_height: height,
            max_touch_points: 0,
            supports_dynamic_viewport: true,
        }
    }

    /// A typical phone profile.
    pub fn phone(width: u32, height: u32) -> Self {
        Self {
            user_agent: String::from("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"),
            viewport_width: width,
            viewport_height: height,
            max_touch_points: 5,
            supports_dynamic_viewport: true,
        }
    }
}

/// Source of device profiles.
pub trait DeviceProbe {
    /// Describe the current device.
    fn profile(&self) -> DeviceProfile;
}

impl DeviceProbe for DeviceProfile {
    fn profile(&self) -> DeviceProfile {
        self.clone()
    }
}

/// Probe that describes the controlling terminal.
///
/// Terminal cells are mapped to pixels with a fixed cell size so the
/// thresholds used for browsers stay meaningful.
#[derive(Debug, Clone, Copy)]
pub struct TerminalProbe {
    /// Pixel width of one terminal column.
    pub cell_width: u32,
    /// Pixel height of one terminal row.
    pub cell_height: u32,
}

impl Default for TerminalProbe {
    fn default() -> Self {
        Self {
            cell_width: 8,
            cell_height: 16,
        }
    }
}

impl DeviceProbe for TerminalProbe {
    fn profile(&self) -> DeviceProfile {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        let android = std::env::var_os("TERMUX_VERSION").is_some();
        let ios = std::env::var_os("ISH_VERSION").is_some();
        let user_agent = if android {
            "terminal (Android; Termux)"
        } else if ios {
            "terminal (iPhone; iSH)"
        } else {
            "terminal"
        };

        DeviceProfile {
            user_agent: user_agent.to_owned(),
            viewport_width: u32::from(cols) * self.cell_width,
            viewport_height: u32::from(rows) * self.cell_height,
            max_touch_points: u32::from(android || ios),
            supports_dynamic_viewport: false,
        }
    }
}

/// Owner of the capability cache.
///
/// Hosts feed it resize observations and drive it with [`tick`](Self::tick);
/// consumers hold a [`CapabilitySubscription`].
#[derive(Debug)]
pub struct CapabilityProvider {
    current: Capabilities,
    debounce: Duration,
    pending: Option<(DeviceProfile, Instant)>,
    subscribers: Vec<Sender<Capabilities>>,
}

impl CapabilityProvider {
    /// Detect capabilities once from `probe`.
    pub fn new(probe: &dyn DeviceProbe) -> Self {
        Self::with_debounce(probe, DEFAULT_DEBOUNCE)
    }

    /// Detect capabilities with a custom resize debounce.
    pub fn with_debounce(probe: &dyn DeviceProbe, debounce: Duration) -> Self {
        let current = Capabilities::detect(&probe.profile());
        tracing::debug!(?current, "capabilities detected");
        Self {
            current,
            debounce,
            pending: None,
            subscribers: Vec::new(),
        }
    }

    /// Current capabilities.
    pub const fn current(&self) -> Capabilities {
        self.current
    }

    /// Subscribe to classification changes.
    pub fn subscribe(&mut self) -> CapabilitySubscription {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        CapabilitySubscription {
            current: self.current,
            updates: Some(rx),
        }
    }

    /// Record a resize. The newest observation wins; the debounce restarts.
    pub fn observe_resize(&mut self, profile: DeviceProfile, now: Instant) {
        self.pending = Some((profile, now + self.debounce));
    }

    /// Settle a pending resize whose debounce has elapsed.
    ///
    /// Returns the new capabilities if the mobile classification flipped.
    pub fn tick(&mut self, now: Instant) -> Option<Capabilities> {
        let due = self.pending.as_ref().is_some_and(|(_, at)| *at <= now);
        if !due {
            return None;
        }
        let (profile, _) = self.pending.take()?;
        let detected = Capabilities::detect(&profile);
        if detected.is_mobile() == self.current.is_mobile() {
            return None;
        }

        tracing::info!(from = ?self.current, to = ?detected, "device classification changed");
        self.current = detected;
        self.subscribers.retain(|tx| tx.send(detected).is_ok());
        Some(detected)
    }
}

/// A consumer's view of the capability cache.
#[derive(Debug, Clone)]
pub struct CapabilitySubscription {
    current: Capabilities,
    updates: Option<Receiver<Capabilities>>,
}

impl CapabilitySubscription {
    /// A subscription that never changes.
    pub const fn fixed(caps: Capabilities) -> Self {
        Self {
            current: caps,
            updates: None,
        }
    }

    /// Last known capabilities.
    pub const fn current(&self) -> Capabilities {
        self.current
    }

    /// Drain pending updates. Returns the latest one, if any arrived.
    pub fn poll(&mut self) -> Option<Capabilities> {
        let rx = self.updates.as_ref()?;
        let mut latest = None;
        loop {
            match rx.try_recv() {
                Ok(caps) => latest = Some(caps),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.updates = None;
                    break;
                }
            }
        }
        if let Some(caps) = latest {
            self.current = caps;
        }
        latest
    }
}

/// Editor widget options derived from capabilities and the editable flag.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorOptions {
    /// Buffer is read-only.
    pub read_only: bool,
    /// Context menu is enabled.
    pub context_menu: bool,
    /// Minimap is shown.
    pub minimap: bool,
    /// Font size in pixels.
    pub font_size: f64,
    /// Line height in pixels.
    pub line_height: f64,
    /// Scrollbar thickness in pixels.
    pub scrollbar_size: f64,
    /// Touch-friendly scrolling affordances.
    pub touch_scroll: bool,
}

impl EditorOptions {
    /// Options for the given capabilities.
    pub fn for_capabilities(caps: Capabilities, editable: bool) -> Self {
        let mobile = caps.is_mobile();
        let font_size = if mobile { 12.0 } else { 14.0 };
        Self {
            read_only: !editable,
            context_menu: editable,
            minimap: !mobile,
            font_size,
            line_height: (font_size * 1.5).round(),
            scrollbar_size: if mobile { 6.0 } else { 10.0 },
            touch_scroll: caps.contains(Capabilities::TOUCH),
        }
    }
}

/// How the editor container's height is computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportHeight {
    /// Use dynamic viewport units instead of static ones.
    pub dynamic: bool,
    /// Pixels reserved for surrounding chrome.
    pub reserved: f64,
}

impl ViewportHeight {
    /// Formula for the given capabilities.
    pub const fn for_capabilities(caps: Capabilities, reserved: f64) -> Self {
        Self {
            dynamic: caps.contains(Capabilities::DYNAMIC_VIEWPORT),
            reserved,
        }
    }

    /// CSS expression for the container height.
    pub fn css(&self) -> String {
        let unit = if self.dynamic { "dvh" } else { "vh" };
        format!("calc(100{unit} - {}px)", self.reserved)
    }

    /// Resolve the formula against a concrete viewport height.
    pub fn resolve(&self, viewport_height: f64) -> f64 {
        (viewport_height - self.reserved).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_desktop() {
        let caps = Capabilities::detect(&DeviceProfile::desktop(1440, 900));
        assert!(!caps.is_mobile());
        assert!(!caps.contains(Capabilities::TOUCH));
        assert!(caps.contains(Capabilities::DYNAMIC_VIEWPORT));
    }

    #[test]
    fn test_detect_phone() {
        let caps = Capabilities::detect(&DeviceProfile::phone(390, 844));
        assert!(caps.is_mobile());
        assert!(caps.contains(Capabilities::IOS | Capabilities::TOUCH));
    }

    #[test]
    fn test_touch_laptop_is_not_mobile() {
        let mut profile = DeviceProfile::desktop(1920, 1080);
        profile.max_touch_points = 10;
        let caps = Capabilities::detect(&profile);
        assert!(caps.contains(Capabilities::TOUCH));
        assert!(!caps.is_mobile());

        profile.viewport_width = 700;
        assert!(Capabilities::detect(&profile).is_mobile());
    }

    #[test]
    fn test_resize_debounced_and_only_on_flip() {
        let mut profile = DeviceProfile::desktop(1200, 800);
        profile.max_touch_points = 5;
        let mut provider = CapabilityProvider::with_debounce(&profile, Duration::from_millis(100));
        let mut sub = provider.subscribe();
        let start = Instant::now();

        // Width change without a classification flip is not published.
        profile.viewport_width = 1000;
        provider.observe_resize(profile.clone(), start);
        assert_eq!(provider.tick(start + Duration::from_millis(200)), None);

        // Shrinking below the mobile width flips, but only after the debounce.
        profile.viewport_width = 600;
        provider.observe_resize(profile, start);
        assert_eq!(provider.tick(start + Duration::from_millis(50)), None);
        let flipped = provider.tick(start + Duration::from_millis(100)).unwrap();
        assert!(flipped.is_mobile());

        assert_eq!(sub.poll(), Some(flipped));
        assert!(sub.current().is_mobile());
        assert_eq!(sub.poll(), None);
    }

    #[test]
    fn test_dropped_subscriber_pruned() {
        let mut profile = DeviceProfile::desktop(1200, 800);
        let mut provider = CapabilityProvider::with_debounce(&profile, Duration::ZERO);
        drop(provider.subscribe());

        profile = DeviceProfile::phone(400, 800);
        let now = Instant::now();
        provider.observe_resize(profile, now);
        assert!(provider.tick(now).is_some());
        assert!(provider.subscribers.is_empty());
    }

    #[test]
    fn test_options_follow_profile() {
        let desktop = EditorOptions::for_capabilities(Capabilities::empty(), false);
        assert!(desktop.minimap);
        assert!(desktop.read_only);
        assert!(!desktop.context_menu);

        let mobile = EditorOptions::for_capabilities(Capabilities::MOBILE | Capabilities::TOUCH, true);
        assert!(!mobile.minimap);
        assert!(mobile.touch_scroll);
        assert!(mobile.font_size < desktop.font_size);
        assert!(mobile.context_menu);
    }

    #[test]
    fn test_viewport_height_formula() {
        let dynamic = ViewportHeight::for_capabilities(Capabilities::DYNAMIC_VIEWPORT, 120.0);
        assert_eq!(dynamic.css(), "calc(100dvh - 120px)");
        assert!((dynamic.resolve(800.0) - 680.0).abs() < f64::EPSILON);

        let fixed = ViewportHeight::for_capabilities(Capabilities::empty(), 64.0);
        assert_eq!(fixed.css(), "calc(100vh - 64px)");
        assert!(fixed.resolve(10.0).abs() < f64::EPSILON);
    }
}
