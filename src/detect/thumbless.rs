//! Thumbless grab: mean curl angle of the four fingers, thumb ignored.

use crate::config::ThumblessGrabSettings;
use crate::geom::map_range;
use crate::tracking::{Chirality, FingerKind, HandSample};

use super::GrabDetector;

#[derive(Debug)]
pub struct ThumblessGrab {
    settings: ThumblessGrabSettings,
    grabbing: bool,
    strength: f32,
    seen_hand: bool,
}

impl ThumblessGrab {
    pub fn new(settings: ThumblessGrabSettings) -> Self {
        Self {
            settings,
            grabbing: false,
            strength: 0.0,
            seen_hand: false,
        }
    }

    /// Mean signed angle of the finger directions from the proximal
    /// axis, about the radial axis. Extended fingers sit near 180°, a
    /// closed fist near 0°.
    fn hand_angle(hand: &HandSample) -> f32 {
        let proximal_axis = -hand.distal_axis;
        let mut radial_axis = hand.radial_axis;
        if hand.chirality == Chirality::Left {
            radial_axis = -radial_axis;
        }

        let fingers = [
            FingerKind::Index,
            FingerKind::Middle,
            FingerKind::Ring,
            FingerKind::Little,
        ];

        let mut sum = 0.0;
        for kind in fingers {
            let direction = hand.finger(kind).direction();
            let mut angle = proximal_axis.signed_angle_to(direction, radial_axis);
            if angle < -90.0 {
                angle += 360.0;
            }
            sum += angle;
        }
        sum * 0.25
    }
}

impl GrabDetector for ThumblessGrab {
    fn update(&mut self, hand: &HandSample, _timestamp_us: i64, _cursor_velocity: f32) {
        let angle = Self::hand_angle(hand);

        if !self.seen_hand {
            self.seen_hand = true;
            let clamped = angle.clamp(self.settings.click_angle, 180.0);
            self.strength =
                map_range(clamped, self.settings.click_angle, 180.0, 1.0, 0.0);
            return;
        }

        if self.grabbing {
            self.grabbing = angle <= self.settings.unclick_angle;
            self.strength = if self.grabbing { 1.0 } else { 0.0 };
        } else {
            let clamped = angle.clamp(self.settings.click_angle, 180.0);
            self.strength =
                map_range(clamped, self.settings.click_angle, 180.0, 1.0, 0.0);
            self.grabbing = angle < self.settings.click_angle;
            if self.grabbing {
                self.strength = 1.0;
            }
        }
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

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec3;
    use crate::tracking::synthetic::{curl_hand, fist_hand, flat_hand};

    fn at() -> Vec3 {
        Vec3::new(0.0, 0.1, 0.2)
    }

    #[test]
    fn test_flat_hand_does_not_grab() {
        let mut d = ThumblessGrab::new(ThumblessGrabSettings::default());
        for _ in 0..3 {
            d.update(&flat_hand(Chirality::Right, at()), 0, 0.0);
        }
        assert!(!d.is_grabbing());
        assert!(d.strength() < 0.1, "open hand strength should be near zero");
    }

    #[test]
    fn test_fist_grabs_after_first_frame() {
        let mut d = ThumblessGrab::new(ThumblessGrabSettings::default());
        let fist = fist_hand(Chirality::Right, at());
        d.update(&fist, 0, 0.0);
        assert!(!d.is_grabbing(), "first frame must not grab");
        d.update(&fist, 0, 0.0);
        assert!(d.is_grabbing());
        assert_eq!(d.strength(), 1.0);
    }

    #[test]
    fn test_hysteresis_band_between_angles() {
        // click at 70°, unclick at 40°: a half-curl (~mid-band) holds an
        // existing grab but cannot start one.
        let mut d = ThumblessGrab::new(ThumblessGrabSettings::default());
        let mid = curl_hand(Chirality::Right, at(), 0.85);
        let mid_angle = ThumblessGrab::hand_angle(&mid);
        assert!(
            mid_angle > ThumblessGrabSettings::default().unclick_angle
                && mid_angle < ThumblessGrabSettings::default().click_angle,
            "test pose must land in the hysteresis band, got {mid_angle}"
        );

        d.update(&mid, 0, 0.0);
        d.update(&mid, 0, 0.0);
        assert!(!d.is_grabbing(), "mid-band pose must not start a grab");

        let fist = fist_hand(Chirality::Right, at());
        d.update(&fist, 0, 0.0);
        assert!(d.is_grabbing());
        d.update(&mid, 0, 0.0);
        assert!(d.is_grabbing(), "mid-band pose must hold an existing grab");

        d.update(&flat_hand(Chirality::Right, at()), 0, 0.0);
        assert!(!d.is_grabbing());
    }

    #[test]
    fn test_left_hand_mirrors() {
        let mut d = ThumblessGrab::new(ThumblessGrabSettings::default());
        let fist = fist_hand(Chirality::Left, at());
        d.update(&fist, 0, 0.0);
        d.update(&fist, 0, 0.0);
        assert!(d.is_grabbing(), "left fist must grab like the right");
    }

    #[test]
    fn test_strength_rises_with_curl() {
        let mut d = ThumblessGrab::new(ThumblessGrabSettings::default());
        d.update(&curl_hand(Chirality::Right, at(), 0.3), 0, 0.0);
        d.update(&curl_hand(Chirality::Right, at(), 0.3), 0, 0.0);
        let light = d.strength();
        d.update(&curl_hand(Chirality::Right, at(), 0.7), 0, 0.0);
        let heavy = d.strength();
        assert!(
            heavy > light,
            "more curl must mean more strength: {light} -> {heavy}"
        );
    }
}
