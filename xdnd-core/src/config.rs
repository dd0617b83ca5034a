//! Tunables of a drag session.

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The highest XDND protocol version spoken by this implementation.
pub const XDND_VERSION: u32 = 5;

/// Configuration of a [`DragManager`](crate::DragManager).
///
/// ```
/// # use std::time::Duration;
/// # use xdnd_core::DragConfig;
/// let config = DragConfig::default()
///     .with_drag_threshold(4)
///     .with_finish_timeout(Duration::from_secs(5));
/// assert_eq!(config.protocol_version, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DragConfig {
    /// Highest protocol version offered to targets. Clamped to [`XDND_VERSION`].
    pub protocol_version: u32,
    /// How long to wait for an `XdndStatus` before giving up on a target.
    pub status_timeout: Duration,
    /// How long to wait for `XdndFinished` after the drop was sent.
    pub finish_timeout: Duration,
    /// Distance in pixels the pointer must travel with the button held before a drag starts.
    pub drag_threshold: u32,
    /// The pointer button that drives the drag.
    pub drag_button: u8,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            protocol_version: XDND_VERSION,
            status_timeout: Duration::from_millis(2000),
            finish_timeout: Duration::from_millis(2000),
            drag_threshold: 8,
            drag_button: 1,
        }
    }
}

impl DragConfig {
    /// Offer at most `version` to drop targets.
    pub fn with_protocol_version(mut self, version: u32) -> Self {
        self.protocol_version = version.min(XDND_VERSION);
        self
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn with_finish_timeout(mut self, timeout: Duration) -> Self {
        self.finish_timeout = timeout;
        self
    }

    pub fn with_drag_threshold(mut self, threshold: u32) -> Self {
        self.drag_threshold = threshold;
        self
    }

    /// Drive the drag with another pointer button; defaults to the primary button.
    pub fn with_drag_button(mut self, button: u8) -> Self {
        self.drag_button = button;
        self
    }

    /// The local version actually used for negotiation.
    pub(crate) fn local_version(&self) -> u32 {
        self.protocol_version.min(XDND_VERSION)
    }
}
