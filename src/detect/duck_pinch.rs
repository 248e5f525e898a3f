//! Duck pinch: the thumb pressed against the flattened index/middle/ring
//! group, as if working a hand puppet.

use crate::config::DuckPinchSettings;
use crate::geom::{map_range, segment_to_segment_distance, Vec3};
use crate::tracking::{Chirality, FingerKind, HandSample};

use super::GrabDetector;

/// Flexion allowance subtracted from the averaged distance, meters.
const METRIC_ALLOWANCE: f32 = 0.01;

#[derive(Debug)]
pub struct DuckPinch {
    settings: DuckPinchSettings,
    grabbing: bool,
    metric: f32,
    seen_hand: bool,
}

impl DuckPinch {
    pub fn new(settings: DuckPinchSettings) -> Self {
        Self {
            settings,
            grabbing: false,
            metric: f32::INFINITY,
            seen_hand: false,
        }
    }

    fn update_metric(&mut self, hand: &HandSample) -> f32 {
        self.metric = (duck_distance(hand) - METRIC_ALLOWANCE).max(0.0);
        self.metric
    }
}

/// Average closest approach between the thumb's distal segment and the
/// index/middle/ring segments, after flattening the fingers onto the
/// plane orthogonal to the hand's curl axis. Also the basis of the
/// physics grab's "swan" metric.
pub(crate) fn duck_distance(hand: &HandSample) -> f32 {
    let thumb = hand.finger(FingerKind::Thumb);
    let mut thumb_distal = thumb.bones[3].prev_joint;
    let mut thumb_tip = thumb.tip();

    let index = hand.finger(FingerKind::Index);
    let middle = hand.finger(FingerKind::Middle);
    let ring = hand.finger(FingerKind::Ring);

    let mut plane_normal = index.bones[2]
        .direction()
        .cross(hand.palmar_axis())
        .normalized();
    if hand.chirality == Chirality::Right {
        plane_normal = -plane_normal;
    }
    if plane_normal == Vec3::ZERO {
        // Degenerate pose; fall back to unprojected geometry.
        plane_normal = hand.radial_axis;
    }

    let plane_origin = index.bones[1].prev_joint;
    let project = |p: Vec3| (p - plane_origin).project_on_plane(plane_normal) + plane_origin;

    let index_root = project(index.bones[0].prev_joint);
    let index_tip = project(index.tip());
    let middle_root = project(middle.bones[0].prev_joint);
    let middle_tip = project(middle.bones[3].prev_joint);
    let ring_root = project(ring.bones[0].prev_joint);
    let ring_tip = project(ring.bones[3].prev_joint);

    // The thumb stays off-plane but may not cross to the far side.
    let distal_overlap = (thumb_distal - plane_origin).dot(plane_normal);
    if distal_overlap < 0.0 {
        thumb_distal = thumb_distal - plane_normal * distal_overlap;
    }
    let tip_overlap = (thumb_tip - plane_origin).dot(plane_normal);
    if tip_overlap < 0.0 {
        thumb_tip = thumb_tip - plane_normal * tip_overlap;
    }

    let index_metric = segment_to_segment_distance(index_root, index_tip, thumb_distal, thumb_tip);
    let middle_metric =
        segment_to_segment_distance(middle_root, middle_tip, thumb_distal, thumb_tip);
    let ring_metric = segment_to_segment_distance(ring_root, ring_tip, thumb_distal, thumb_tip);

    (index_metric + middle_metric + ring_metric) / 3.0
}

impl GrabDetector for DuckPinch {
    fn update(&mut self, hand: &HandSample, _timestamp_us: i64, _cursor_velocity: f32) {
        let metric = self.update_metric(hand);

        if !self.seen_hand {
            // Never grab off the first observation, whatever the pose.
            self.seen_hand = true;
            return;
        }

        if self.grabbing {
            self.grabbing = metric <= self.settings.pinch_deactivate_distance;
        } else {
            self.grabbing = metric < self.settings.pinch_activate_distance;
        }
    }

    fn is_grabbing(&self) -> bool {
        self.grabbing
    }

    fn strength(&self) -> f32 {
        if self.grabbing {
            return 1.0;
        }
        if !self.metric.is_finite() {
            return 0.0;
        }
        map_range(
            self.metric,
            self.settings.pinch_activate_distance,
            self.settings.strength_zero_distance,
            1.0,
            0.0,
        )
        .clamp(0.0, 1.0)
    }

    fn reset(&mut self) {
        self.grabbing = false;
        self.metric = f32::INFINITY;
        self.seen_hand = false;
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::synthetic::{flat_hand, pinching_hand};

    fn at() -> Vec3 {
        Vec3::new(0.0, 0.1, 0.2)
    }

    #[test]
    fn test_closed_pose_grabs() {
        let mut d = DuckPinch::new(DuckPinchSettings::default());
        let hand = pinching_hand(Chirality::Right, at(), 0.003);
        d.update(&hand, 0, 0.0);
        assert!(!d.is_grabbing(), "first frame must not grab");
        d.update(&hand, 0, 0.0);
        assert!(d.is_grabbing());
        assert_eq!(d.strength(), 1.0);
    }

    #[test]
    fn test_open_hand_does_not_grab() {
        let mut d = DuckPinch::new(DuckPinchSettings::default());
        let hand = flat_hand(Chirality::Right, at());
        for _ in 0..5 {
            d.update(&hand, 0, 0.0);
        }
        assert!(!d.is_grabbing());
    }

    #[test]
    fn test_hysteresis_band_holds() {
        let mut d = DuckPinch::new(DuckPinchSettings::default());
        let closed = pinching_hand(Chirality::Right, at(), 0.003);
        d.update(&closed, 0, 0.0);
        d.update(&closed, 0, 0.0);
        assert!(d.is_grabbing());

        // Open to a metric between activate (10mm) and deactivate (25mm):
        // the grab holds.
        let mid = pinching_hand(Chirality::Right, at(), 0.028);
        d.update(&mid, 0, 0.0);
        assert!(
            d.is_grabbing(),
            "metric {} inside hysteresis band released",
            d.metric
        );

        let open = flat_hand(Chirality::Right, at());
        d.update(&open, 0, 0.0);
        assert!(!d.is_grabbing());
    }

    #[test]
    fn test_strength_rises_towards_activation() {
        let mut d = DuckPinch::new(DuckPinchSettings::default());
        let far = pinching_hand(Chirality::Right, at(), 0.06);
        d.update(&far, 0, 0.0);
        d.update(&far, 0, 0.0);
        let far_strength = d.strength();

        let near = pinching_hand(Chirality::Right, at(), 0.03);
        d.update(&near, 0, 0.0);
        assert!(
            d.strength() > far_strength,
            "closing the gap must raise strength: {} -> {}",
            far_strength,
            d.strength()
        );
        assert!(!d.is_grabbing());
    }

    #[test]
    fn test_degenerate_geometry_no_nan() {
        let mut d = DuckPinch::new(DuckPinchSettings::default());
        let mut hand = flat_hand(Chirality::Right, at());
        // Collapse the whole hand onto a single point.
        for finger in &mut hand.fingers {
            for bone in &mut finger.bones {
                *bone = crate::tracking::Bone::new(Vec3::ZERO, Vec3::ZERO);
            }
        }
        hand.palm_normal = Vec3::ZERO;
        hand.radial_axis = Vec3::ZERO;
        d.update(&hand, 0, 0.0);
        d.update(&hand, 0, 0.0);
        assert!(d.metric.is_finite(), "degenerate pose must clamp, not NaN");
        assert!(d.strength().is_finite());
    }
}
