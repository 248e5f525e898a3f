//! Position stabilisation: deadzone constraint and adaptive smoothing.
//!
//! The deadzone suppresses micro-jitter by pinning the cursor until real
//! motion exceeds a radius; the radius itself grows and shrinks as the
//! interactions demand. The smoothing filter is a one-euro style
//! low-pass: heavy damping at rest, near-transparent during fast motion.
//! All deadzone math is in millimeters of screen space.

use std::f32::consts::PI;

use crate::geom::{lerp, Vec2};

// ── Deadzone ───────────────────────────────────────────────

#[derive(Debug)]
pub struct PositionStabiliser {
    pub default_deadzone_radius: f32,
    /// The radius actually applied this frame.
    pub current_deadzone_radius: f32,

    is_shrinking: bool,
    shrinking_speed: f32,

    have_previous_position: bool,
    previous_position_default_size: Vec2,
    previous_position_current_size: Vec2,

    deadzone_offset: Vec2,
    last_raw_position: Vec2,
}

impl PositionStabiliser {
    pub fn new(default_radius_mm: f32) -> Self {
        Self {
            default_deadzone_radius: default_radius_mm,
            current_deadzone_radius: default_radius_mm,
            is_shrinking: false,
            shrinking_speed: 0.0,
            have_previous_position: false,
            previous_position_default_size: Vec2::ZERO,
            previous_position_current_size: Vec2::ZERO,
            deadzone_offset: Vec2::ZERO,
            last_raw_position: Vec2::ZERO,
        }
    }

    /// Constrain `position` (mm) against the deadzone. The first sample
    /// after a reset seeds the filter and passes through unchanged.
    pub fn apply_deadzone(&mut self, position: Vec2) -> Vec2 {
        self.last_raw_position = position;
        let position = position + self.deadzone_offset;

        if self.default_deadzone_radius == 0.0 {
            return position;
        }

        let (constrained_default, constrained_current) = if !self.have_previous_position {
            self.have_previous_position = true;
            (position, position)
        } else {
            let constrained_default = apply_deadzone_sized(
                self.previous_position_default_size,
                position,
                self.default_deadzone_radius,
            );

            if self.is_shrinking {
                self.shrink_deadzone(constrained_default);
            }

            let constrained_current = apply_deadzone_sized(
                self.previous_position_current_size,
                position,
                self.current_deadzone_radius,
            );
            (constrained_default, constrained_current)
        };

        self.previous_position_default_size = constrained_default;
        self.previous_position_current_size = constrained_current;
        constrained_current
    }

    /// Capture the gap between the constrained and raw positions so a
    /// drag starts from where the cursor appears, not where the hand is.
    pub fn set_deadzone_offset(&mut self) {
        if self.default_deadzone_radius > 0.0 {
            self.deadzone_offset = self.previous_position_current_size - self.last_raw_position;
        }
    }

    /// Decay the drag offset a little each move.
    pub fn reduce_deadzone_offset(&mut self) {
        self.deadzone_offset = self.deadzone_offset * 0.9;
    }

    pub fn start_shrinking_deadzone(&mut self, speed: f32) {
        if self.current_deadzone_radius == self.default_deadzone_radius {
            // Already at the floor, nothing to shrink.
            return;
        }
        self.shrinking_speed = speed;
        self.is_shrinking = true;
    }

    pub fn stop_shrinking_deadzone(&mut self) {
        self.shrinking_speed = 0.0;
        self.is_shrinking = false;
    }

    fn shrink_deadzone(&mut self, constrained_default: Vec2) {
        let default_position_change = constrained_default - self.previous_position_default_size;
        let constraint_vector =
            self.previous_position_default_size - self.previous_position_current_size;

        if constraint_vector != Vec2::ZERO {
            // Only motion along the constraint direction counts.
            let distance_along = default_position_change.dot(constraint_vector)
                / constraint_vector.length();
            let distance_along = distance_along.max(0.0);

            self.current_deadzone_radius -= distance_along * self.shrinking_speed;

            if self.current_deadzone_radius < self.default_deadzone_radius {
                self.current_deadzone_radius = self.default_deadzone_radius;
                self.stop_shrinking_deadzone();
            }
        }
    }

    /// Grow the radius with click progress so near-click jitter cannot
    /// wander the cursor: quadratic ramp from default to default + max.
    pub fn scale_deadzone_by_progress(&mut self, progress_to_click: f32, max_increase_mm: f32) {
        let scaled = progress_to_click * progress_to_click;
        self.current_deadzone_radius = lerp(
            self.default_deadzone_radius,
            self.default_deadzone_radius + max_increase_mm,
            scaled,
        );
    }

    pub fn reset(&mut self) {
        self.have_previous_position = false;
        self.shrinking_speed = 0.0;
        self.is_shrinking = false;
        self.current_deadzone_radius = self.default_deadzone_radius;
        self.deadzone_offset = Vec2::ZERO;
    }

    pub fn set_default_radius(&mut self, radius_mm: f32) {
        self.default_deadzone_radius = radius_mm;
        self.reset();
    }
}

/// Stateless single-deadzone step: pull `current` back onto the radius
/// boundary around `previous`, or hold `previous` if inside it.
pub fn apply_deadzone_sized(previous: Vec2, current: Vec2, radius: f32) -> Vec2 {
    let distance = previous.distance(current);
    if distance > radius {
        let unit = (previous - current).normalized();
        current + unit * radius
    } else {
        previous
    }
}

// ── Smoothing filter ───────────────────────────────────────

#[derive(Debug, Default)]
struct LowPass {
    last_filtered: f32,
    initialised: bool,
}

impl LowPass {
    fn filter(&mut self, value: f32, alpha: f32) -> f32 {
        if self.initialised {
            self.last_filtered = alpha * value + (1.0 - alpha) * self.last_filtered;
        } else {
            self.last_filtered = value;
            self.initialised = true;
        }
        self.last_filtered
    }
}

/// One-euro filter over a scalar signal: the cutoff frequency rises with
/// the (filtered) velocity, so slow drift is damped and fast intentional
/// motion passes almost untouched.
#[derive(Debug)]
pub struct OneEuroFilter {
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
    x_filter: LowPass,
    dx_filter: LowPass,
    last_value: f32,
    last_time_s: f64,
    initialised: bool,
}

impl OneEuroFilter {
    pub fn new(min_cutoff: f32, beta: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff: 1.0,
            x_filter: LowPass::default(),
            dx_filter: LowPass::default(),
            last_value: 0.0,
            last_time_s: 0.0,
            initialised: false,
        }
    }

    fn alpha(dt: f32, cutoff: f32) -> f32 {
        let r = 2.0 * PI * cutoff * dt;
        r / (r + 1.0)
    }

    pub fn filter(&mut self, time_s: f64, value: f32) -> f32 {
        if !self.initialised {
            self.initialised = true;
            self.last_value = value;
            self.last_time_s = time_s;
            self.x_filter.filter(value, 1.0);
            return value;
        }

        let dt = (time_s - self.last_time_s) as f32;
        if dt <= 0.0 {
            return self.x_filter.last_filtered;
        }

        let velocity = (value - self.last_value) / dt;
        let filtered_velocity = self
            .dx_filter
            .filter(velocity, Self::alpha(dt, self.d_cutoff));

        let cutoff = self.min_cutoff + self.beta * filtered_velocity.abs();
        let filtered = self.x_filter.filter(value, Self::alpha(dt, cutoff));

        self.last_value = value;
        self.last_time_s = time_s;
        filtered
    }

    pub fn reset(&mut self) {
        self.initialised = false;
        self.x_filter = LowPass::default();
        self.dx_filter = LowPass::default();
    }
}

/// Paired filters for a 2D position.
#[derive(Debug)]
pub struct OneEuroFilter2D {
    x: OneEuroFilter,
    y: OneEuroFilter,
}

impl OneEuroFilter2D {
    pub fn new(min_cutoff: f32, beta: f32) -> Self {
        Self {
            x: OneEuroFilter::new(min_cutoff, beta),
            y: OneEuroFilter::new(min_cutoff, beta),
        }
    }

    pub fn filter(&mut self, time_s: f64, position: Vec2) -> Vec2 {
        Vec2::new(
            self.x.filter(time_s, position.x),
            self.y.filter(time_s, position.y),
        )
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}

impl Default for OneEuroFilter2D {
    fn default() -> Self {
        // Reference tuning: heavy enough to kill tremor at rest.
        Self::new(0.5, 0.1)
    }
}

// ── Tests ──────────────────────────────────────────────────
