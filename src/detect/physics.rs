//! Spring grab: a hand-shape metric drives a spring-like strength
//! integral. Closing the hand pushes strength towards 1, opening pulls
//! it back; a velocity gate keeps slow drift from ever firing it.

use crate::config::{PhysicsGrabSettings, PhysicsMetricKind};
use crate::geom::Vec3;
use crate::tracking::{FingerKind, HandSample};

use super::duck_pinch::duck_distance;
use super::GrabDetector;

/// Strength below which an active grab releases.
const RELEASE_THRESHOLD: f32 = 0.9;

#[derive(Debug)]
pub struct PhysicsGrab {
    settings: PhysicsGrabSettings,
    grabbing: bool,
    strength: f32,

    previous_metric: Option<f32>,
    previous_timestamp_us: i64,

    gesture_triggered: bool,
    gesture_is_forward: bool,
    gesture_triggered_stiffness: f32,
}

impl PhysicsGrab {
    pub fn new(settings: PhysicsGrabSettings) -> Self {
        Self {
            settings,
            grabbing: false,
            strength: 0.0,
            previous_metric: None,
            previous_timestamp_us: 0,
            gesture_triggered: false,
            gesture_is_forward: false,
            gesture_triggered_stiffness: 0.0,
        }
    }

    fn metric(&self, hand: &HandSample) -> f32 {
        match self.settings.metric {
            PhysicsMetricKind::InverseVolume => {
                let raw = inverse_hand_volume(hand);
                let (low, high) = self.settings.inverse_volume_bounds;
                if (high - low).abs() <= f32::EPSILON {
                    raw
                } else {
                    (raw - low) / (high - low)
                }
            }
            PhysicsMetricKind::CurlSum => curl_sum_metric(hand),
            PhysicsMetricKind::Swan => swan_metric(hand),
        }
    }

    fn trigger_stiffness(&self, hand: &HandSample) -> f32 {
        match self.settings.metric {
            PhysicsMetricKind::CurlSum => {
                curl_sum_trigger_stiffness(hand, self.settings.max_stiffness)
            }
            PhysicsMetricKind::Swan => {
                let distance_to_zero =
                    self.settings.swan_typical_trigger_value - swan_metric(hand);
                if distance_to_zero < 0.0 {
                    self.settings.max_stiffness
                } else {
                    (self.settings.swan_stiffness_scale / distance_to_zero)
                        .min(self.settings.max_stiffness)
                }
            }
            PhysicsMetricKind::InverseVolume => 0.0,
        }
    }
}

impl GrabDetector for PhysicsGrab {
    fn update(&mut self, hand: &HandSample, timestamp_us: i64, cursor_velocity: f32) {
        let new_metric = self.metric(hand);

        let Some(previous_metric) = self.previous_metric else {
            self.previous_metric = Some(new_metric);
            self.previous_timestamp_us = timestamp_us;
            return;
        };

        // Metric-space deadzone: only motion beyond it counts, and the
        // counted part is reduced by the deadzone size.
        let deadzone = self.settings.metric_deadzone;
        let stabilised = if (new_metric - previous_metric).abs() > deadzone {
            let sign = if new_metric > previous_metric { -1.0 } else { 1.0 };
            new_metric + sign * deadzone
        } else {
            previous_metric
        };

        let dt = (timestamp_us - self.previous_timestamp_us) as f32 / 1_000_000.0;
        if dt <= 0.0 {
            return;
        }

        let mut v = (stabilised - previous_metric) / dt;

        // The gesture only counts while its velocity stays committed in
        // one direction: crossing the trigger threshold latches it (and
        // samples the stiffness from the pose at that instant); falling
        // below the untrigger threshold unlatches.
        if !self.gesture_triggered && v.abs() > self.settings.trigger_velocity_threshold {
            self.gesture_triggered = true;
            self.gesture_is_forward = v > 0.0;
            self.gesture_triggered_stiffness = if self.grabbing {
                self.settings.max_stiffness
            } else {
                self.trigger_stiffness(hand)
            };
        } else if self.gesture_triggered {
            let sign = if self.gesture_is_forward { 1.0 } else { -1.0 };
            if sign * v < self.settings.untrigger_velocity_threshold {
                self.gesture_triggered = false;
            }
        }

        if !self.gesture_triggered {
            v = 0.0;
        }

        // A fast-travelling cursor is not trying to grab.
        if cursor_velocity > self.settings.cursor_velocity_limit && !self.grabbing {
            v = -cursor_velocity;
        }

        let k = if self.gesture_triggered {
            self.gesture_triggered_stiffness
        } else {
            self.settings.max_stiffness
        };

        self.strength = (self.strength + k * v * dt).clamp(0.0, 1.0);

        if !self.grabbing && self.strength >= 1.0 {
            self.grabbing = true;
        } else if self.grabbing && self.strength < RELEASE_THRESHOLD {
            self.grabbing = false;
        }

        self.previous_metric = Some(stabilised);
        self.previous_timestamp_us = timestamp_us;
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
        self.previous_metric = None;
        self.previous_timestamp_us = 0;
        self.gesture_triggered = false;
        self.gesture_is_forward = false;
        self.gesture_triggered_stiffness = 0.0;
    }
}

// ── Metrics ────────────────────────────────────────────────

fn distal_wrist_distance(hand: &HandSample, kind: FingerKind) -> f32 {
    let finger = hand.finger(kind);
    finger.bones[0]
        .prev_joint
        .distance(finger.bones[2].next_joint)
}

/// Reciprocal of an approximating hand sphere's volume: rises as the
/// hand closes.
fn inverse_hand_volume(hand: &HandSample) -> f32 {
    let avg_distal_wrist = 0.25
        * (distal_wrist_distance(hand, FingerKind::Index)
            + distal_wrist_distance(hand, FingerKind::Middle)
            + distal_wrist_distance(hand, FingerKind::Ring)
            + distal_wrist_distance(hand, FingerKind::Little));

    let thumb_little = hand.finger(FingerKind::Thumb).bones[2]
        .next_joint
        .distance(hand.finger(FingerKind::Little).bones[2].next_joint);

    let sphere_diameter = 0.5 * (avg_distal_wrist + thumb_little);
    let volume =
        (4.0 / 3.0) * std::f32::consts::PI * (0.5 * sphere_diameter).powi(3);

    const VOLUME_FACTOR: f32 = 1000.0;
    let scaled = VOLUME_FACTOR * volume;
    if scaled <= f32::EPSILON {
        0.0
    } else {
        1.0 / scaled
    }
}

/// Weighted sum of per-bone curl angles across all five fingers, in
/// radians. Zero for a flat hand, climbing past 1 for a fist. The
/// weights are empirically tuned and have no derivation.
fn curl_sum_metric(hand: &HandSample) -> f32 {
    const FINGER_ANGLE_WEIGHTS: [f32; 3] = [3.0, 1.0, 1.0];
    const THUMB_ANGLE_WEIGHTS: [f32; 3] = [1.0, 1.0, 1.0];
    const FINGER_WEIGHTS: [f32; 4] = [0.5, 1.0, 1.0, 1.0];
    const THUMB_WEIGHT: f32 = 1.0;

    let finger_kinds = [
        FingerKind::Index,
        FingerKind::Middle,
        FingerKind::Ring,
        FingerKind::Little,
    ];

    let mut angle_sum = 0.0;
    for (kind, weight) in finger_kinds.into_iter().zip(FINGER_WEIGHTS) {
        angle_sum += weight * weighted_finger_angles(hand, kind, &FINGER_ANGLE_WEIGHTS, 1.0);
    }
    angle_sum +=
        THUMB_WEIGHT * weighted_finger_angles(hand, FingerKind::Thumb, &THUMB_ANGLE_WEIGHTS, -1.0);

    let sum_of_weights = FINGER_ANGLE_WEIGHTS.iter().sum::<f32>()
        * FINGER_WEIGHTS.iter().sum::<f32>()
        + THUMB_WEIGHT * THUMB_ANGLE_WEIGHTS.iter().sum::<f32>();

    angle_sum / sum_of_weights
}

fn weighted_finger_angles(
    hand: &HandSample,
    kind: FingerKind,
    angle_weights: &[f32; 3],
    chirality_sign: f32,
) -> f32 {
    let finger = hand.finger(kind);
    let joints = [
        finger.bones[0].prev_joint,
        finger.bones[0].next_joint,
        finger.bones[1].next_joint,
        finger.bones[2].next_joint,
        finger.bones[3].next_joint,
    ];

    let normal = (finger.bones[0]
        .direction()
        .cross(finger.bones[1].direction())
        * chirality_sign)
        .normalized();

    let projected: Vec<Vec3> = joints
        .iter()
        .map(|j| j.project_on_plane(normal))
        .collect();

    let mut weighted = 0.0;
    for i in 0..3 {
        let first = projected[i + 1] - projected[i];
        let second = projected[i + 2] - projected[i + 1];
        let angle_rad = first.signed_angle_to(second, normal).to_radians();
        weighted += angle_rad * angle_weights[i];
    }
    weighted
}

/// Negated duck-pinch distance: rises towards zero as the hand closes.
fn swan_metric(hand: &HandSample) -> f32 {
    -duck_distance(hand)
}

fn curl_sum_trigger_stiffness(hand: &HandSample, max_stiffness: f32) -> f32 {
    let normal = hand.radial_axis;
    let origin = hand.wrist_position;
    let project = |p: Vec3| (p - origin).project_on_plane(normal);

    let thumb = project(hand.finger(FingerKind::Thumb).tip());
    let fingers = [
        FingerKind::Index,
        FingerKind::Middle,
        FingerKind::Ring,
        FingerKind::Little,
    ];

    let mut angle_sum = 0.0;
    for kind in fingers {
        let tip = project(hand.finger(kind).tip());
        angle_sum += thumb.signed_angle_to(tip, normal);
    }
    let avg_angle_rad = (0.25 * angle_sum).to_radians();

    let suggested = if avg_angle_rad > 0.0 {
        1.0 / avg_angle_rad
    } else {
        max_stiffness
    };
    suggested.clamp(0.0, max_stiffness)
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::synthetic::{curl_hand, flat_hand};
    use crate::tracking::Chirality;

    const FRAME_US: i64 = 10_000;

    fn at() -> Vec3 {
        Vec3::new(0.0, 0.1, 0.2)
    }

    fn settings() -> PhysicsGrabSettings {
        PhysicsGrabSettings::default()
    }

    #[test]
    fn test_curl_metric_monotone() {
        let open = curl_sum_metric(&flat_hand(Chirality::Right, at()));
        let half = curl_sum_metric(&curl_hand(Chirality::Right, at(), 0.5));
        let full = curl_sum_metric(&curl_hand(Chirality::Right, at(), 1.0));
        assert!(open < half && half < full, "expected {open} < {half} < {full}");
        assert!(open.abs() < 0.05, "flat hand curl should be near zero, got {open}");
    }

    #[test]
    fn test_first_frame_never_grabs() {
        let mut d = PhysicsGrab::new(settings());
        d.update(&curl_hand(Chirality::Right, at(), 1.0), FRAME_US, 0.0);
        assert!(!d.is_grabbing());
        assert_eq!(d.strength(), 0.0);
    }

    fn drive_close_then_open(d: &mut PhysicsGrab) -> (bool, bool) {
        let mut ts = 0;
        // Snap the hand closed over 10 frames (100 ms): fast enough to
        // beat the metric deadzone and the velocity gate.
        for i in 0..=10 {
            ts += FRAME_US;
            let curl = i as f32 / 10.0;
            d.update(&curl_hand(Chirality::Right, at(), curl), ts, 0.0);
        }
        let grabbed = d.is_grabbing();
        // Hold briefly, then open again just as fast.
        for _ in 0..3 {
            ts += FRAME_US;
            d.update(&curl_hand(Chirality::Right, at(), 1.0), ts, 0.0);
        }
        for i in (0..=10).rev() {
            ts += FRAME_US;
            let curl = i as f32 / 10.0;
            d.update(&curl_hand(Chirality::Right, at(), curl), ts, 0.0);
        }
        (grabbed, d.is_grabbing())
    }

    #[test]
    fn test_close_grabs_open_releases() {
        let mut d = PhysicsGrab::new(settings());
        let (grabbed, still_grabbing) = drive_close_then_open(&mut d);
        assert!(grabbed, "closing fist fast enough must integrate to a grab");
        assert!(!still_grabbing, "opening the hand must release");
    }

    #[test]
    fn test_slow_drift_never_triggers() {
        // Tiny metric wobble stays inside the deadzone: no strength.
        let mut d = PhysicsGrab::new(settings());
        let mut ts = 0;
        for i in 0..50 {
            ts += FRAME_US;
            let curl = 0.2 + 0.01 * ((i % 2) as f32);
            d.update(&curl_hand(Chirality::Right, at(), curl), ts, 0.0);
        }
        assert!(!d.is_grabbing());
        assert_eq!(d.strength(), 0.0);
    }

    #[test]
    fn test_fast_cursor_bleeds_strength() {
        let mut d = PhysicsGrab::new(settings());
        let mut ts = 0;
        // Partially close to accumulate some strength.
        for i in 0..=10 {
            ts += FRAME_US;
            d.update(&curl_hand(Chirality::Right, at(), i as f32 / 20.0), ts, 0.0);
        }
        let before = d.strength();
        // Now sweep the cursor fast while holding the pose.
        for _ in 0..5 {
            ts += FRAME_US;
            d.update(&curl_hand(Chirality::Right, at(), 0.5), ts, 1.0);
        }
        assert!(
            d.strength() <= before,
            "fast cursor motion must not build strength: {before} -> {}",
            d.strength()
        );
    }

    #[test]
    fn test_nonpositive_dt_is_ignored() {
        let mut d = PhysicsGrab::new(settings());
        d.update(&flat_hand(Chirality::Right, at()), 1000, 0.0);
        d.update(&curl_hand(Chirality::Right, at(), 1.0), 1000, 0.0);
        assert_eq!(d.strength(), 0.0);
    }

    #[test]
    fn test_release_hysteresis() {
        // Once grabbing, strength must fall below 0.9 to release; the
        // clamp at 1.0 means a slight opening flutters it just below 1
        // without releasing.
        let mut d = PhysicsGrab::new(settings());
        let mut ts = 0;
        for i in 0..=10 {
            ts += FRAME_US;
            d.update(&curl_hand(Chirality::Right, at(), i as f32 / 10.0), ts, 0.0);
        }
        assert!(d.is_grabbing());
        assert_eq!(d.strength(), 1.0);

        // Open very slightly: within the metric deadzone, no change.
        ts += FRAME_US;
        d.update(&curl_hand(Chirality::Right, at(), 0.98), ts, 0.0);
        assert!(d.is_grabbing(), "deadzone-sized opening must not release");
    }
}
