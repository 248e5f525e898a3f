//! Small vector math used by the tracking and detection layers.
//!
//! Everything here is plain `f32` geometry: 2D screen-space points,
//! 3D world-space points, and the closest-approach helpers the pinch
//! detectors are built on.

use serde::{Deserialize, Serialize};

// ── 2D ─────────────────────────────────────────────────────

/// 2D point/vector. Screen-space positions are in pixels or millimeters
/// depending on context; the wire format serializes as `{x, y}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector, or zero if the input has no length.
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    pub fn abs(self) -> Vec2 {
        Vec2::new(self.x.abs(), self.y.abs())
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

// ── 3D ─────────────────────────────────────────────────────

/// 3D point/vector in meters, right-handed, +z away from the screen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (self - other).length()
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unit vector, or zero if the input has no length.
    pub fn normalized(self) -> Vec3 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vec3::ZERO
        } else {
            Vec3::new(self.x / len, self.y / len, self.z / len)
        }
    }

    /// Component of `self` lying in the plane with the given unit normal.
    pub fn project_on_plane(self, normal: Vec3) -> Vec3 {
        self - normal * self.dot(normal)
    }

    /// Unsigned angle to `other` in degrees.
    pub fn angle_to(self, other: Vec3) -> f32 {
        let denom = self.length() * other.length();
        if denom <= f32::EPSILON {
            return 0.0;
        }
        let cos = (self.dot(other) / denom).clamp(-1.0, 1.0);
        cos.acos().to_degrees()
    }

    /// Angle to `other` in degrees, signed about `axis`.
    pub fn signed_angle_to(self, other: Vec3, axis: Vec3) -> f32 {
        let unsigned = self.angle_to(other);
        let sign = if self.cross(other).dot(axis) < 0.0 { -1.0 } else { 1.0 };
        unsigned * sign
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Vec3;
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

// ── Scalar helpers ─────────────────────────────────────────

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Where `v` sits between `a` and `b`, unclamped. Returns 0 for a
/// degenerate range.
pub fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    if (b - a).abs() <= f32::EPSILON {
        0.0
    } else {
        (v - a) / (b - a)
    }
}

/// Map `v` from `[in_min, in_max]` onto `[out_min, out_max]`, unclamped.
pub fn map_range(v: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    lerp(out_min, out_max, inverse_lerp(in_min, in_max, v))
}

/// Shortest distance between segments `a1→a2` and `b1→b2`.
///
/// Near-parallel segments fall back to endpoint projection; degenerate
/// (zero-length) segments degrade to point distance rather than NaN.
pub fn segment_to_segment_distance(a1: Vec3, a2: Vec3, b1: Vec3, b2: Vec3) -> f32 {
    let u = a2 - a1;
    let v = b2 - b1;
    let w = a1 - b1;
    let a = u.dot(u);
    let b = u.dot(v);
    let c = v.dot(v);
    let d = u.dot(w);
    let e = v.dot(w);
    let big_d = a * c - b * b;

    let mut sd = big_d;
    let mut td = big_d;
    let mut sn;
    let mut tn;

    if big_d < f32::EPSILON {
        // Lines are almost parallel: pin s to 0 on the first segment.
        sn = 0.0;
        sd = 1.0;
        tn = e;
        td = c;
    } else {
        sn = b * e - c * d;
        tn = a * e - b * d;
        if sn < 0.0 {
            sn = 0.0;
            tn = e;
            td = c;
        } else if sn > sd {
            sn = sd;
            tn = e + b;
            td = c;
        }
    }

    if tn < 0.0 {
        tn = 0.0;
        if -d < 0.0 {
            sn = 0.0;
        } else if -d > a {
            sn = sd;
        } else {
            sn = -d;
            sd = a;
        }
    } else if tn > td {
        tn = td;
        if (-d + b) < 0.0 {
            sn = 0.0;
        } else if (-d + b) > a {
            sn = sd;
        } else {
            sn = -d + b;
            sd = a;
        }
    }

    let sc = if sn.abs() < f32::EPSILON || sd.abs() < f32::EPSILON { 0.0 } else { sn / sd };
    let tc = if tn.abs() < f32::EPSILON || td.abs() < f32::EPSILON { 0.0 } else { tn / td };

    (w + u * sc - v * tc).length()
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_vec2_normalized_zero() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
    }

    #[test]
    fn test_vec3_cross() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        let z = x.cross(y);
        assert!((z.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_project_on_plane() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        let n = Vec3::new(0.0, 0.0, 1.0);
        let p = v.project_on_plane(n);
        assert!((p.z).abs() < 1e-6);
        assert!((p.x - 1.0).abs() < 1e-6);
        assert!((p.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_signed_angle() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::new(0.0, 1.0, 0.0);
        let z = Vec3::new(0.0, 0.0, 1.0);
        assert!((x.signed_angle_to(y, z) - 90.0).abs() < 1e-3);
        assert!((y.signed_angle_to(x, z) + 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_angle_degenerate_is_zero() {
        assert_eq!(Vec3::ZERO.angle_to(Vec3::new(1.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn test_inverse_lerp_degenerate() {
        assert_eq!(inverse_lerp(2.0, 2.0, 5.0), 0.0);
    }

    #[test]
    fn test_map_range() {
        assert!((map_range(5.0, 0.0, 10.0, 0.0, 1.0) - 0.5).abs() < 1e-6);
        assert!((map_range(0.02, 0.01, 0.08, 1.0, 0.0) - 0.857).abs() < 0.01);
    }

    #[test]
    fn test_segment_distance_parallel() {
        // Two parallel unit segments one apart.
        let d = segment_to_segment_distance(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        );
        assert!((d - 1.0).abs() < 1e-5, "expected 1.0, got {d}");
    }

    #[test]
    fn test_segment_distance_crossing() {
        // Perpendicular segments crossing at distance 0.5 in z.
        let d = segment_to_segment_distance(
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.5),
            Vec3::new(0.0, 1.0, 0.5),
        );
        assert!((d - 0.5).abs() < 1e-5, "expected 0.5, got {d}");
    }

    #[test]
    fn test_segment_distance_degenerate_points() {
        // Both segments collapsed to points: plain point distance, no NaN.
        let d = segment_to_segment_distance(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 3.0, 4.0),
            Vec3::new(0.0, 3.0, 4.0),
        );
        assert!(d.is_finite());
        assert!((d - 5.0).abs() < 1e-5, "expected 5.0, got {d}");
    }
}
