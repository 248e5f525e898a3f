//! Classic pinch-or-grab: the tracker's own scalar strengths against a
//! pair of enter/exit thresholds.

use crate::config::ClassicGrabSettings;
use crate::geom::map_range;
use crate::tracking::HandSample;

use super::GrabDetector;

/// Grabs when either the pinch or curl strength crosses its activation
/// threshold; releases only when both drop below the (more lenient)
/// release thresholds, so the boundary cannot flicker.
#[derive(Debug)]
pub struct ClassicGrab {
    settings: ClassicGrabSettings,
    grabbing: bool,
    strength: f32,
    seen_hand: bool,
}

impl ClassicGrab {
    pub fn new(settings: ClassicGrabSettings) -> Self {
        Self {
            settings,
            grabbing: false,
            strength: 0.0,
            seen_hand: false,
        }
    }
}

impl GrabDetector for ClassicGrab {
    fn update(&mut self, hand: &HandSample, _timestamp_us: i64, _cursor_velocity: f32) {
        let pinch = hand.pinch_strength;
        let grab = hand.grab_strength;

        if !self.seen_hand {
            // A hand that appears already closed must open first.
            self.seen_hand = true;
            self.grabbing = false;
            self.strength = 0.0;
            return;
        }

        self.grabbing = if self.grabbing {
            pinch >= self.settings.unpinch_threshold || grab >= self.settings.ungrab_threshold
        } else {
            pinch >= self.settings.pinch_threshold || grab >= self.settings.grab_threshold
        };

        self.strength = if self.grabbing {
            1.0
        } else {
            let pinch_norm = map_range(
                pinch.clamp(0.0, self.settings.pinch_threshold),
                0.0,
                self.settings.pinch_threshold,
                0.0,
                1.0,
            );
            let grab_norm = map_range(
                grab.clamp(0.0, self.settings.grab_threshold),
                0.0,
                self.settings.grab_threshold,
                0.0,
                1.0,
            );
            pinch_norm.max(grab_norm)
        };
    }

    fn is_grabbing(&self) -> bool {
        self.grabbing
    }

    fn strength(&self) -> f32 {
        self.strength
    }

    fn reset(&mut self) {
        self.grabbing = false;
        self.strength = 0.0;
        self.seen_hand = false;
    }
}
