//! Safety pinch: thumb–index closest approach, gated on the middle and
//! ring fingers staying open so a closing fist cannot read as a pinch.

use crate::config::SafetyPinchSettings;
use crate::geom::{map_range, segment_to_segment_distance};
use crate::tracking::{Chirality, FingerKind, HandSample};

use super::GrabDetector;

/// Flexion allowance subtracted from the raw segment distance, meters.
const PINCH_DISTANCE_ALLOWANCE: f32 = 0.01;

#[derive(Debug)]
pub struct SafetyPinch {
    settings: SafetyPinchSettings,
    grabbing: bool,
    strength: f32,
    /// Set when the fingers closed without a valid approach; a new pinch
    /// is refused until they re-open past the reset distance.
    requires_repinch: bool,
    is_gesture_eligible: bool,
    reactivate_timer: u32,
    deactivate_timer: u32,
}

impl SafetyPinch {
    pub fn new(settings: SafetyPinchSettings) -> Self {
        Self {
            settings,
            grabbing: false,
            strength: 0.0,
            requires_repinch: false,
            is_gesture_eligible: false,
            reactivate_timer: 0,
            deactivate_timer: 0,
        }
    }

    /// Thumb–index distal-segment distance with the allowance removed.
    /// Clamped at zero so flexed poses cannot go negative.
    fn pinch_distance(hand: &HandSample) -> f32 {
        let index = hand.finger(FingerKind::Index);
        let thumb = hand.finger(FingerKind::Thumb);
        let raw = segment_to_segment_distance(
            index.bones[3].prev_joint,
            index.tip(),
            thumb.bones[3].prev_joint,
            thumb.tip(),
        );
        (raw - PINCH_DISTANCE_ALLOWANCE).max(0.0)
    }

    fn should_activate(&mut self, hand: &HandSample) -> bool {
        self.strength = 0.0;

        let was_eligible = self.is_gesture_eligible;
        self.is_gesture_eligible = false;

        // A pinch cannot restart immediately after a release.
        if self.reactivate_timer <= self.settings.min_reactivate_frames {
            self.reactivate_timer += 1;
            return false;
        }

        let activated = self.check_activation(hand, was_eligible);
        if activated {
            self.deactivate_timer = 0;
        }
        activated
    }

    fn check_activation(&mut self, hand: &HandSample, was_eligible: bool) -> bool {
        let s = &self.settings;
        let pinch_distance = Self::pinch_distance(hand);

        let palm_dir = hand.palmar_axis();
        let mirror = if hand.chirality == Chirality::Left { -1.0 } else { 1.0 };

        let middle_dir = hand.finger(FingerKind::Middle).bones[1].direction();
        let middle_angle = palm_dir.signed_angle_to(middle_dir, hand.radial_axis) * mirror;

        let ring_dir = hand.finger(FingerKind::Ring).bones[1].direction();
        let ring_angle = palm_dir.signed_angle_to(ring_dir, hand.radial_axis) * mirror;

        let index_dir = hand.finger(FingerKind::Index).bones[1].direction();
        let index_angle = index_dir.angle_to(palm_dir);

        let thumb_dir = hand.finger(FingerKind::Thumb).bones[2].direction();
        let thumb_angle = thumb_dir.angle_to(palm_dir);

        // Eligibility: necessary but not sufficient. Re-entry uses the
        // stricter bounds; staying eligible uses the relaxed ones.
        let hysteresis = s.safety_hysteresis_mult;
        let middle_open = if was_eligible {
            middle_angle >= s.min_palm_middle_angle * hysteresis
        } else {
            middle_angle >= s.min_palm_middle_angle
        };
        let ring_open = if was_eligible {
            ring_angle >= s.min_palm_ring_angle * hysteresis
        } else {
            ring_angle >= s.min_palm_ring_angle
        };
        let index_ok = if was_eligible {
            index_angle < s.max_index_angle_deactivation
        } else {
            index_angle < s.max_index_angle_activation
        };
        let thumb_ok = if was_eligible {
            thumb_angle < s.max_thumb_angle_deactivation
        } else {
            thumb_angle < s.max_thumb_angle_activation
        };

        if middle_open && ring_open && index_ok && thumb_ok && !self.requires_repinch {
            self.is_gesture_eligible = true;
        }

        self.strength = if self.is_gesture_eligible {
            map_range(pinch_distance, 0.0, s.pinch_activate_distance, 1.0, 0.0).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let should_activate =
            self.is_gesture_eligible && pinch_distance < s.pinch_activate_distance;

        // A closed thumb+index that never passed eligibility latches
        // until the fingers visibly re-open.
        if pinch_distance < s.pinch_activate_distance && !should_activate {
            self.requires_repinch = true;
        }
        if self.requires_repinch && pinch_distance > s.failed_pinch_reset_distance {
            self.requires_repinch = false;
        }

        should_activate
    }

    fn should_deactivate(&mut self, hand: &HandSample) -> bool {
        self.strength = 1.0;

        if self.deactivate_timer <= self.settings.min_deactivate_frames {
            self.deactivate_timer += 1;
            return false;
        }

        let deactivated = Self::pinch_distance(hand) > self.settings.pinch_deactivate_distance;
        if deactivated {
            self.reactivate_timer = 0;
        }
        deactivated
    }
}

impl GrabDetector for SafetyPinch {
    fn update(&mut self, hand: &HandSample, _timestamp_us: i64, _cursor_velocity: f32) {
        if self.grabbing {
            self.grabbing = !self.should_deactivate(hand);
        } else {
            self.grabbing = self.should_activate(hand);
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
        self.requires_repinch = false;
        self.is_gesture_eligible = false;
        self.reactivate_timer = 0;
        self.deactivate_timer = 0;
    }
}

// ── Tests ──────────────────────────────────────────────────
