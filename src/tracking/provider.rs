//! Frame sources and hand-presence transitions.

use serde::{Deserialize, Serialize};

use super::hand::HandFrame;

/// Something that can be polled for tracking frames once per sensor tick.
///
/// `poll_frame` must never block: returning `None` means "no new frame",
/// and a frame with no hands means tracking is live but sees nothing.
pub trait TrackingProvider: Send {
    fn poll_frame(&mut self) -> Option<HandFrame>;

    /// Whether the underlying tracking connection is usable.
    fn connected(&self) -> bool {
        true
    }
}

/// Hand presence as broadcast to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandPresence {
    HandFound,
    HandsLost,
}

/// Provider that produces empty frames on a synthetic clock. Used when
/// no tracking hardware is configured; keeps the service and protocol
/// fully operational with no hands in view.
#[derive(Debug, Default)]
pub struct IdleProvider {
    clock_us: i64,
    tick_us: i64,
}

impl IdleProvider {
    pub fn new(tick_us: i64) -> Self {
        Self { clock_us: 0, tick_us }
    }
}

impl TrackingProvider for IdleProvider {
    fn poll_frame(&mut self) -> Option<HandFrame> {
        self.clock_us += self.tick_us;
        Some(HandFrame {
            timestamp_us: self.clock_us,
            left: None,
            right: None,
        })
    }

    fn connected(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_provider_advances_clock() {
        let mut provider = IdleProvider::new(1000);
        let a = provider.poll_frame().unwrap();
        let b = provider.poll_frame().unwrap();
        assert!(b.timestamp_us > a.timestamp_us);
        assert!(!a.has_hands());
    }
}
