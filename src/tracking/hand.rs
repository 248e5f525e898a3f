//! Hand skeleton model.
//!
//! Five fingers of four bones each (metacarpal → distal), palm axes, and
//! the per-frame scalar strengths the tracking SDK derives. A sample is
//! immutable once captured; detectors and interactions only read it.

use serde::{Deserialize, Serialize};

use crate::geom::Vec3;

// ── Chirality ──────────────────────────────────────────────

/// Which hand a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chirality {
    Left,
    Right,
}

impl Chirality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

// ── Fingers and bones ──────────────────────────────────────

/// Finger identity, thumb through little finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerKind {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

/// Number of fingers per hand.
pub const FINGER_COUNT: usize = 5;

/// Bones per finger: metacarpal, proximal, intermediate, distal.
pub const BONE_COUNT: usize = 4;

impl FingerKind {
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A single finger bone, joint to joint.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bone {
    /// Joint nearer the wrist, meters.
    pub prev_joint: Vec3,
    /// Joint nearer the fingertip, meters.
    pub next_joint: Vec3,
}

impl Bone {
    pub fn new(prev_joint: Vec3, next_joint: Vec3) -> Self {
        Self { prev_joint, next_joint }
    }

    /// Unit direction from the wrist end towards the tip end.
    pub fn direction(&self) -> Vec3 {
        (self.next_joint - self.prev_joint).normalized()
    }
}

/// One finger: four bones root-to-tip.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Finger {
    pub bones: [Bone; BONE_COUNT],
}

impl Finger {
    /// Fingertip position (distal bone's outer joint).
    pub fn tip(&self) -> Vec3 {
        self.bones[3].next_joint
    }

    /// Overall pointing direction of the finger.
    pub fn direction(&self) -> Vec3 {
        (self.tip() - self.bones[1].prev_joint).normalized()
    }
}

// ── Hand sample ────────────────────────────────────────────

/// A complete single-hand observation for one tracking frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HandSample {
    pub chirality: Chirality,
    /// Fingers indexed by [`FingerKind`].
    pub fingers: [Finger; FINGER_COUNT],
    /// Palm center, meters.
    pub palm_position: Vec3,
    /// Unit normal out of the palm surface.
    pub palm_normal: Vec3,
    /// Unit axis across the palm, oriented so an extended finger has a
    /// positive signed angle from the palm normal on a right hand (the
    /// left hand is mirrored by the consumers that care).
    pub radial_axis: Vec3,
    /// Unit axis from wrist towards the finger roots.
    pub distal_axis: Vec3,
    pub wrist_position: Vec3,
    /// Palm velocity in m/s as reported by the tracker.
    pub palm_velocity: Vec3,
    /// SDK-derived thumb-to-fingertip pinch strength in [0, 1].
    pub pinch_strength: f32,
    /// SDK-derived whole-hand curl strength in [0, 1].
    pub grab_strength: f32,
}

impl HandSample {
    pub fn finger(&self, kind: FingerKind) -> &Finger {
        &self.fingers[kind.index()]
    }

    /// Axis out of the palm surface, as the angle-based detectors use it.
    pub fn palmar_axis(&self) -> Vec3 {
        self.palm_normal
    }
}

// ── Frame ──────────────────────────────────────────────────

/// One tracking frame: up to two hands plus the capture timestamp.
#[derive(Debug, Clone, Default)]
pub struct HandFrame {
    /// Capture time in microseconds, monotonic per source.
    pub timestamp_us: i64,
    pub left: Option<HandSample>,
    pub right: Option<HandSample>,
}

impl HandFrame {
    /// The hand interaction modules should drive: first available,
    /// preferring right when both are tracked.
    pub fn primary_hand(&self) -> Option<&HandSample> {
        self.right.as_ref().or(self.left.as_ref())
    }

    pub fn has_hands(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }
}

// ── Tests ──────────────────────────────────────────────────
