//! Scripted hand poses and a replayable frame source.
//!
//! Used by the `--tracking synthetic` demo mode and throughout the test
//! suite: poses are generated from a small parametric skeleton so the
//! detectors see geometrically plausible hands.

use std::collections::VecDeque;

use crate::geom::Vec3;
use crate::tracking::hand::{
    Bone, Chirality, Finger, HandFrame, HandSample, BONE_COUNT, FINGER_COUNT,
};
use crate::tracking::provider::TrackingProvider;

/// Sideways offset of each finger root across the palm, thumb first.
const FINGER_SPREAD_M: [f32; FINGER_COUNT] = [-0.045, -0.025, 0.0, 0.02, 0.04];

/// Bone lengths root-to-tip for a non-thumb finger.
const BONE_LENGTHS_M: [f32; BONE_COUNT] = [0.06, 0.035, 0.025, 0.02];

fn straight_finger(root: Vec3, along: Vec3) -> Finger {
    let mut bones = [Bone::default(); BONE_COUNT];
    let mut at = root;
    for (bone, len) in bones.iter_mut().zip(BONE_LENGTHS_M) {
        let next = at + along * len;
        *bone = Bone::new(at, next);
        at = next;
    }
    Finger { bones }
}

/// Finger curled by `curl` ∈ [0, 1]. Straight fingers run along +y;
/// each bone past the metacarpal rotates a further `curl`·75° in the
/// y/z plane, so a full curl sweeps the tip towards the palm.
fn curled_finger(root: Vec3, curl: f32) -> Finger {
    let mut bones = [Bone::default(); BONE_COUNT];
    let mut at = root;
    for (i, (bone, len)) in bones.iter_mut().zip(BONE_LENGTHS_M).enumerate() {
        let theta = curl * 75f32.to_radians() * i as f32;
        let dir = Vec3::new(0.0, theta.cos(), -theta.sin());
        let next = at + dir * len;
        *bone = Bone::new(at, next);
        at = next;
    }
    Finger { bones }
}

fn side_of(chirality: Chirality) -> f32 {
    if chirality == Chirality::Right {
        1.0
    } else {
        -1.0
    }
}

fn base_sample(chirality: Chirality, palm: Vec3) -> HandSample {
    let side = side_of(chirality);
    HandSample {
        chirality,
        fingers: [Finger::default(); FINGER_COUNT],
        palm_position: palm,
        palm_normal: Vec3::new(0.0, 0.0, -1.0),
        radial_axis: Vec3::new(side, 0.0, 0.0),
        distal_axis: Vec3::new(0.0, 1.0, 0.0),
        wrist_position: palm - Vec3::new(0.0, 0.08, 0.0),
        palm_velocity: Vec3::ZERO,
        pinch_strength: 0.0,
        grab_strength: 0.0,
    }
}

/// Open hand, fingers extended along +y, palm facing the screen (−z).
pub fn flat_hand(chirality: Chirality, palm: Vec3) -> HandSample {
    let mut hand = base_sample(chirality, palm);
    let side = side_of(chirality);

    for (i, spread) in FINGER_SPREAD_M.iter().enumerate() {
        // Spread is authored for a right hand; mirror for the left.
        let x = spread * side;
        if i == 0 {
            // Thumb points outward across the palm.
            let thumb_root = hand.wrist_position + Vec3::new(x * 0.5, 0.01, 0.0);
            let out = Vec3::new(x, 0.02, 0.0).normalized();
            hand.fingers[i] = straight_finger(thumb_root, out);
        } else {
            let finger_root = hand.wrist_position + Vec3::new(x, 0.01, 0.0);
            hand.fingers[i] = straight_finger(finger_root, Vec3::new(0.0, 1.0, 0.0));
        }
    }
    hand
}

/// Fist: all four fingers fully curled towards the palm, thumb tucked.
pub fn fist_hand(chirality: Chirality, palm: Vec3) -> HandSample {
    let mut hand = curl_hand(chirality, palm, 1.0);
    hand.grab_strength = 1.0;
    hand
}

/// Hand with all non-thumb fingers curled by `curl` ∈ [0, 1].
pub fn curl_hand(chirality: Chirality, palm: Vec3, curl: f32) -> HandSample {
    let mut hand = flat_hand(chirality, palm);
    let side = side_of(chirality);

    for i in 1..FINGER_COUNT {
        let x = FINGER_SPREAD_M[i] * side;
        let root = hand.wrist_position + Vec3::new(x, 0.01, 0.0);
        hand.fingers[i] = curled_finger(root, curl);
    }
    hand.grab_strength = curl.clamp(0.0, 1.0);
    hand
}

/// Thumb and index distal segments brought to `gap_m` apart, other
/// fingers extended. `pinch_strength` tracks the gap.
pub fn pinching_hand(chirality: Chirality, palm: Vec3, gap_m: f32) -> HandSample {
    let mut hand = flat_hand(chirality, palm);

    let index_tip = hand.fingers[1].tip();
    let index_distal_root = hand.fingers[1].bones[3].prev_joint;
    let offset = Vec3::new(0.0, 0.0, -gap_m);
    hand.fingers[0].bones[3] = Bone::new(index_distal_root + offset, index_tip + offset);
    // Thumb intermediate bone tilts towards the screen so the pose reads
    // as a deliberate forward pinch, not a curled fist.
    let approach = Vec3::new(0.0, 0.7, -0.714).normalized();
    hand.fingers[0].bones[2] = Bone::new(
        index_distal_root + offset - approach * 0.025,
        index_distal_root + offset,
    );

    hand.pinch_strength = (1.0 - gap_m / 0.1).clamp(0.0, 1.0);
    hand
}

// ── Provider ───────────────────────────────────────────────

/// Replays a prepared frame sequence, then keeps reporting empty frames
/// on the same clock cadence.
pub struct SyntheticProvider {
    frames: VecDeque<HandFrame>,
    clock_us: i64,
    tick_us: i64,
}

impl SyntheticProvider {
    pub fn from_frames(frames: Vec<HandFrame>, tick_us: i64) -> Self {
        let clock_us = frames.last().map(|f| f.timestamp_us).unwrap_or(0);
        Self {
            frames: frames.into(),
            clock_us,
            tick_us,
        }
    }

    /// A canned demo: the hand sweeps across the view, pinches, releases.
    pub fn demo(tick_us: i64) -> Self {
        let mut frames = Vec::new();
        let mut ts = 0i64;
        for i in 0..240 {
            let t = i as f32 / 240.0;
            let palm = Vec3::new(-0.15 + 0.3 * t, 0.05, 0.25);
            let hand = if (0.4..0.6).contains(&t) {
                pinching_hand(Chirality::Right, palm, 0.004)
            } else {
                flat_hand(Chirality::Right, palm)
            };
            ts += tick_us;
            frames.push(HandFrame {
                timestamp_us: ts,
                left: None,
                right: Some(hand),
            });
        }
        Self::from_frames(frames, tick_us)
    }
}

impl TrackingProvider for SyntheticProvider {
    fn poll_frame(&mut self) -> Option<HandFrame> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(frame);
        }
        self.clock_us += self.tick_us;
        Some(HandFrame {
            timestamp_us: self.clock_us,
            left: None,
            right: None,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::segment_to_segment_distance;

    #[test]
    fn test_flat_hand_is_open() {
        let hand = flat_hand(Chirality::Right, Vec3::ZERO);
        let thumb_tip = hand.fingers[0].tip();
        let index_tip = hand.fingers[1].tip();
        assert!(
            thumb_tip.distance(index_tip) > 0.05,
            "open hand should not look pinched, gap {}",
            thumb_tip.distance(index_tip)
        );
        assert_eq!(hand.pinch_strength, 0.0);
    }

    #[test]
    fn test_pinching_hand_gap() {
        let hand = pinching_hand(Chirality::Right, Vec3::ZERO, 0.004);
        let index = &hand.fingers[1].bones[3];
        let thumb = &hand.fingers[0].bones[3];
        let d = segment_to_segment_distance(
            index.prev_joint,
            index.next_joint,
            thumb.prev_joint,
            thumb.next_joint,
        );
        assert!((d - 0.004).abs() < 1e-4, "expected 4mm gap, got {d}");
        assert!(hand.pinch_strength > 0.9);
    }

    #[test]
    fn test_fist_tips_near_palm() {
        let open = flat_hand(Chirality::Right, Vec3::ZERO);
        let fist = fist_hand(Chirality::Right, Vec3::ZERO);
        let open_dist = open.fingers[2].tip().distance(open.palm_position);
        let fist_dist = fist.fingers[2].tip().distance(fist.palm_position);
        assert!(
            fist_dist < open_dist,
            "fist tips should pull in: open {open_dist}, fist {fist_dist}"
        );
    }

    #[test]
    fn test_provider_replays_then_empties() {
        let frames = vec![HandFrame {
            timestamp_us: 100,
            left: None,
            right: Some(flat_hand(Chirality::Right, Vec3::ZERO)),
        }];
        let mut provider = SyntheticProvider::from_frames(frames, 50);
        assert!(provider.poll_frame().unwrap().has_hands());
        let after = provider.poll_frame().unwrap();
        assert!(!after.has_hands());
        assert_eq!(after.timestamp_us, 150);
    }
}
