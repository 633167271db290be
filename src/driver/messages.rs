//! Messages accepted by the [`SyncDriver`](super::SyncDriver).

use crate::capability::DeviceProfile;
use crate::engine::HostProps;
use crate::widget::Container;

/// Input from the host, applied in the order sent.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// Mount the widget into a container.
    Initialize(Container),
    /// New host inputs.
    Props(Box<HostProps>),
    /// The viewport changed; capabilities are re-detected after the debounce.
    Resize(DeviceProfile),
    /// Switch color theme.
    Theme(String),
    /// Jump to a line.
    RevealLine(u32),
    /// Stop the driver thread.
    Shutdown,
}

impl From<HostProps> for HostMessage {
    fn from(props: HostProps) -> Self {
        Self::Props(Box::new(props))
    }
}
