//! Interaction modules: the state machines that turn stabilized hand
//! data into discrete input actions.
//!
//! One mode is active at a time, selected by configuration. Switching
//! modes replaces the module outright, so every timer and latch starts
//! cold. Each module emits at most one [`InputAction`] per tick.

pub mod air_push;
pub mod grab;
pub mod hover_hold;
pub mod touch_plane;
pub mod velocity_swipe;

use serde::{Deserialize, Serialize};

use crate::config::{InteractionConfig, PhysicalConfig};
use crate::geom::Vec2;
use crate::screen::{Positions, VirtualScreen};
use crate::stabilize::{OneEuroFilter2D, PositionStabiliser};
use crate::tracking::{Chirality, FingerKind, HandSample};

// ── Action types ───────────────────────────────────────────

/// What kind of input event an action carries.
///
/// `None` lets clients react to position data without treating it as
/// input; `Cancel` aborts an in-flight press when tracking drops out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    None,
    Cancel,
    Down,
    Move,
    Up,
}

/// The gesture family that produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    Grab,
    Hover,
    Push,
    Touchplane,
    Velocityswipe,
}

/// First or second hand found by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandType {
    Primary,
    Secondary,
}

/// A single user-intent event, immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputAction {
    /// Capture timestamp of the frame that produced this, microseconds.
    pub timestamp_us: i64,
    pub interaction: InteractionType,
    pub hand_type: HandType,
    pub chirality: Chirality,
    pub input_type: InputType,
    /// Cursor position in screen pixels.
    pub cursor_position: Vec2,
    pub distance_from_screen_m: f32,
    /// Normalized intent signal: 1.0 exactly when the click fires.
    pub progress_to_click: f32,
}

// ── Module trait ───────────────────────────────────────────

/// One interaction mode. `update` runs once per sensor tick with the
/// in-zone hand (or `None` when tracking dropped or the hand left the
/// interaction zone).
pub trait InteractionModule: Send {
    fn interaction_type(&self) -> InteractionType;

    fn update(&mut self, hand: Option<&HandSample>, timestamp_us: i64) -> Option<InputAction>;
}

/// Build the configured interaction module, cold.
pub fn create_interaction(
    config: &InteractionConfig,
    physical: &PhysicalConfig,
) -> Box<dyn InteractionModule> {
    let screen = VirtualScreen::new(physical);
    match config.interaction_type {
        InteractionType::Push => Box::new(air_push::AirPushInteraction::new(config, screen)),
        InteractionType::Hover => Box::new(hover_hold::HoverAndHoldInteraction::new(config, screen)),
        InteractionType::Grab => Box::new(grab::GrabInteraction::new(config, screen)),
        InteractionType::Touchplane => {
            Box::new(touch_plane::TouchPlaneInteraction::new(config, screen))
        }
        InteractionType::Velocityswipe => {
            Box::new(velocity_swipe::VelocitySwipeInteraction::new(config, screen))
        }
    }
}

// ── Shared positional plumbing ─────────────────────────────

/// Which point on the hand drives the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedPosition {
    IndexTip,
    /// Blend of the index knuckle and palm; steadier than the tip.
    IndexStable,
    /// Whichever point is closest to the screen plane.
    Nearest,
}

fn tracked_point(hand: &HandSample, tracked: TrackedPosition) -> crate::geom::Vec3 {
    match tracked {
        TrackedPosition::IndexTip => hand.finger(FingerKind::Index).tip(),
        TrackedPosition::IndexStable => {
            let knuckle = hand.finger(FingerKind::Index).bones[0].next_joint;
            (knuckle + hand.palm_position) * 0.5
        }
        TrackedPosition::Nearest => {
            let mut nearest = hand.palm_position;
            for kind in [
                FingerKind::Thumb,
                FingerKind::Index,
                FingerKind::Middle,
                FingerKind::Ring,
                FingerKind::Little,
            ] {
                let tip = hand.finger(kind).tip();
                if tip.z < nearest.z {
                    nearest = tip;
                }
            }
            nearest
        }
    }
}

/// Tracked-point extraction, optional smoothing, and deadzone
/// constraint, shared by every interaction module.
pub struct Positioner {
    screen: VirtualScreen,
    tracked: TrackedPosition,
    pub stabiliser: PositionStabiliser,
    filter: Option<OneEuroFilter2D>,
    last_positions: Positions,
}

impl Positioner {
    pub fn new(
        screen: VirtualScreen,
        tracked: TrackedPosition,
        deadzone_radius_mm: f32,
        use_filter: bool,
    ) -> Self {
        Self {
            screen,
            tracked,
            stabiliser: PositionStabiliser::new(deadzone_radius_mm),
            filter: use_filter.then(OneEuroFilter2D::default),
            last_positions: Positions::default(),
        }
    }

    pub fn screen(&self) -> &VirtualScreen {
        &self.screen
    }

    /// Last positions computed; what `Cancel` events are stamped with.
    pub fn last_positions(&self) -> Positions {
        self.last_positions
    }

    pub fn update(&mut self, hand: &HandSample, timestamp_us: i64) -> Positions {
        let world = tracked_point(hand, self.tracked);
        let mut positions = self.screen.world_to_screen(world);

        if let Some(filter) = &mut self.filter {
            let time_s = timestamp_us as f64 / 1_000_000.0;
            positions.cursor_px = filter.filter(time_s, positions.cursor_px);
        }

        let mm = self.screen.px_to_mm(positions.cursor_px);
        let constrained = self.stabiliser.apply_deadzone(mm);
        positions.cursor_px = self.screen.mm_to_px(constrained);

        self.last_positions = positions;
        positions
    }

    /// Forget all smoothing and deadzone state (hand lost).
    pub fn reset(&mut self) {
        self.stabiliser.reset();
        if let Some(filter) = &mut self.filter {
            filter.reset();
        }
    }
}

// ── Tick-driven progress timer ─────────────────────────────

/// Accumulates frame dt against a limit; replaces wall-clock timers so
/// the pipeline stays deterministic under synthetic frames.
#[derive(Debug)]
pub struct ProgressTimer {
    pub time_limit_ms: f32,
    elapsed_ms: f32,
    running: bool,
}

impl ProgressTimer {
    pub fn new(time_limit_ms: f32) -> Self {
        Self {
            time_limit_ms,
            elapsed_ms: 0.0,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
        self.elapsed_ms = 0.0;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn reset(&mut self) {
        self.running = false;
        self.elapsed_ms = 0.0;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance by one frame's dt. No-op unless running.
    pub fn tick(&mut self, dt_ms: f32) {
        if self.running {
            self.elapsed_ms += dt_ms;
        }
    }

    pub fn elapsed_ms(&self) -> f32 {
        self.elapsed_ms
    }

    pub fn progress(&self) -> f32 {
        if self.time_limit_ms <= 0.0 {
            return 1.0;
        }
        (self.elapsed_ms / self.time_limit_ms).clamp(0.0, 1.0)
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec3;
    use crate::tracking::synthetic::flat_hand;

    #[test]
    fn test_progress_timer_saturates() {
        let mut timer = ProgressTimer::new(100.0);
        assert_eq!(timer.progress(), 0.0);
        timer.start();
        timer.tick(50.0);
        assert!((timer.progress() - 0.5).abs() < 1e-6);
        timer.tick(100.0);
        assert_eq!(timer.progress(), 1.0);
    }

    #[test]
    fn test_progress_timer_ignores_ticks_when_stopped() {
        let mut timer = ProgressTimer::new(100.0);
        timer.tick(50.0);
        assert_eq!(timer.progress(), 0.0);
    }

    #[test]
    fn test_positioner_tracks_hand_motion() {
        let screen = VirtualScreen::new(&PhysicalConfig::default());
        let mut positioner = Positioner::new(screen, TrackedPosition::IndexTip, 0.0, false);

        let a = positioner.update(&flat_hand(Chirality::Right, Vec3::new(0.0, 0.1, 0.2)), 0);
        let b = positioner.update(
            &flat_hand(Chirality::Right, Vec3::new(0.05, 0.1, 0.2)),
            10_000,
        );
        assert!(b.cursor_px.x > a.cursor_px.x, "cursor must follow the hand");
    }

    #[test]
    fn test_positioner_deadzone_pins_jitter() {
        let screen = VirtualScreen::new(&PhysicalConfig::default());
        let mut positioner = Positioner::new(screen, TrackedPosition::IndexTip, 5.0, false);

        let a = positioner.update(&flat_hand(Chirality::Right, Vec3::new(0.0, 0.1, 0.2)), 0);
        // 1mm of hand motion stays inside the 5mm deadzone.
        let b = positioner.update(
            &flat_hand(Chirality::Right, Vec3::new(0.001, 0.1, 0.2)),
            10_000,
        );
        assert_eq!(a.cursor_px, b.cursor_px);
    }

    #[test]
    fn test_factory_builds_configured_mode() {
        let mut config = InteractionConfig::default();
        for mode in [
            InteractionType::Push,
            InteractionType::Hover,
            InteractionType::Grab,
            InteractionType::Touchplane,
            InteractionType::Velocityswipe,
        ] {
            config.interaction_type = mode;
            let module = create_interaction(&config, &PhysicalConfig::default());
            assert_eq!(module.interaction_type(), mode);
        }
    }
}
