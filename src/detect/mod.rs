//! Grab detection: interchangeable algorithms that reduce one hand's
//! geometry to a boolean "grabbing" plus a continuous strength.
//!
//! Every algorithm keeps its own hysteresis state and nothing else;
//! swapping the active one is a configuration change, not a code change.

pub mod classic;
pub mod duck_pinch;
pub mod physics;
pub mod safety_pinch;
pub mod thumbless;

use crate::config::{GrabDetectorKind, GrabSettings};
use crate::tracking::HandSample;

pub use classic::ClassicGrab;
pub use duck_pinch::DuckPinch;
pub use physics::PhysicsGrab;
pub use safety_pinch::SafetyPinch;
pub use thumbless::ThumblessGrab;

/// One grab-detection algorithm.
///
/// `update` runs once per tick with the current hand sample. The first
/// frame after construction or [`reset`](GrabDetector::reset) must never
/// report a grab. `cursor_velocity` is the tracked point's speed in m/s;
/// only the physics grab uses it.
pub trait GrabDetector: Send {
    fn update(&mut self, hand: &HandSample, timestamp_us: i64, cursor_velocity: f32);

    fn is_grabbing(&self) -> bool;

    /// Progress towards (or confidence of) the grab, in [0, 1].
    fn strength(&self) -> f32;

    /// Drop all hysteresis state, e.g. when the hand is lost.
    fn reset(&mut self);
}

/// Build the configured detector.
pub fn create_detector(settings: &GrabSettings) -> Box<dyn GrabDetector> {
    match settings.detector.0 {
        GrabDetectorKind::Classic => Box::new(ClassicGrab::new(settings.classic.clone())),
        GrabDetectorKind::SafetyPinch => Box::new(SafetyPinch::new(settings.safety_pinch.clone())),
        GrabDetectorKind::DuckPinch => Box::new(DuckPinch::new(settings.duck_pinch.clone())),
        GrabDetectorKind::ThumblessGrab => Box::new(ThumblessGrab::new(settings.thumbless.clone())),
        GrabDetectorKind::PhysicsGrab => Box::new(PhysicsGrab::new(settings.physics.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrabSettings;
    use crate::geom::Vec3;
    use crate::tracking::synthetic::flat_hand;
    use crate::tracking::Chirality;

    #[test]
    fn test_factory_builds_each_kind() {
        for kind in [
            GrabDetectorKind::Classic,
            GrabDetectorKind::SafetyPinch,
            GrabDetectorKind::DuckPinch,
            GrabDetectorKind::ThumblessGrab,
            GrabDetectorKind::PhysicsGrab,
        ] {
            let mut settings = GrabSettings::default();
            settings.detector.0 = kind;
            let mut detector = create_detector(&settings);
            // First frame never grabs, whatever the algorithm.
            let hand = flat_hand(Chirality::Right, Vec3::new(0.0, 0.1, 0.2));
            detector.update(&hand, 1_000, 0.0);
            assert!(!detector.is_grabbing(), "{kind:?} grabbed on first frame");
        }
    }
}
