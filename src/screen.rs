//! World-to-screen mapping.
//!
//! The tracked point arrives in meters relative to the screen's bottom
//! center; interactions work in screen pixels plus a distance-from-screen
//! in meters, and the stabiliser works in millimeters.

use crate::config::PhysicalConfig;
use crate::geom::{Vec2, Vec3};

/// Cursor position (pixels) plus distance from the screen plane (meters).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Positions {
    pub cursor_px: Vec2,
    pub distance_from_screen_m: f32,
}

/// Fixed mapping between tracking space and the client's screen.
#[derive(Debug, Clone, Copy)]
pub struct VirtualScreen {
    width_px: f32,
    height_px: f32,
    px_per_meter: f32,
}

impl VirtualScreen {
    pub fn new(physical: &PhysicalConfig) -> Self {
        let height_m = physical.screen_height_m.max(1e-3);
        Self {
            width_px: physical.screen_width_px as f32,
            height_px: physical.screen_height_px as f32,
            px_per_meter: physical.screen_height_px as f32 / height_m,
        }
    }

    /// Map a world-space point (meters, origin at the screen's bottom
    /// center, +z away from the screen) to screen pixels + distance.
    pub fn world_to_screen(&self, world_m: Vec3) -> Positions {
        Positions {
            cursor_px: Vec2::new(
                self.width_px * 0.5 + world_m.x * self.px_per_meter,
                world_m.y * self.px_per_meter,
            ),
            distance_from_screen_m: world_m.z,
        }
    }

    /// Inverse of [`world_to_screen`] for velocity calculations.
    pub fn screen_to_world(&self, cursor_px: Vec2, distance_m: f32) -> Vec3 {
        Vec3::new(
            (cursor_px.x - self.width_px * 0.5) / self.px_per_meter,
            cursor_px.y / self.px_per_meter,
            distance_m,
        )
    }

    pub fn px_to_mm(&self, px: Vec2) -> Vec2 {
        px * (1000.0 / self.px_per_meter)
    }

    pub fn mm_to_px(&self, mm: Vec2) -> Vec2 {
        mm * (self.px_per_meter / 1000.0)
    }
}
