//! Grab interaction: the configured grab detector decides the press,
//! this module shapes it into down/move/up with drag locking.

use crate::config::InteractionConfig;
use crate::detect::{create_detector, GrabDetector};
use crate::geom::Vec2;
use crate::screen::{Positions, VirtualScreen};
use crate::tracking::{Chirality, HandSample};

use super::{
    HandType, InputAction, InputType, InteractionModule, InteractionType, Positioner,
    TrackedPosition,
};

/// Frames a no-drag click must be held before the synthetic up fires.
const REQUIRED_HOLD_FRAMES: u32 = 1;

pub struct GrabInteraction {
    detector: Box<dyn GrabDetector>,
    positioner: Positioner,
    chirality: Chirality,
    had_hand: bool,

    ignore_dragging: bool,
    deadzone_enlargement_mm: f32,
    deadzone_shrink_speed: f32,
    max_hand_velocity_mmps: f32,
    drag_start_distance_threshold_mm: f32,

    pressing: bool,
    is_dragging: bool,
    cursor_down_px: Vec2,

    require_hold: bool,
    held_frames: u32,
    require_click: bool,

    previous_time_us: i64,
    previous_positions: Positions,
}

impl GrabInteraction {
    pub fn new(config: &InteractionConfig, screen: VirtualScreen) -> Self {
        Self {
            detector: create_detector(&config.grab),
            positioner: Positioner::new(
                screen,
                TrackedPosition::IndexStable,
                config.deadzone_radius_mm,
                true,
            ),
            chirality: Chirality::Right,
            had_hand: false,
            ignore_dragging: !config.use_scrolling_or_dragging,
            deadzone_enlargement_mm: config.grab.deadzone_enlargement_mm,
            deadzone_shrink_speed: config.grab.deadzone_shrink_speed,
            max_hand_velocity_mmps: config.grab.max_hand_velocity_mmps,
            drag_start_distance_threshold_mm: config.grab.drag_start_distance_threshold_mm,
            pressing: false,
            is_dragging: false,
            cursor_down_px: Vec2::ZERO,
            require_hold: false,
            held_frames: 0,
            require_click: false,
            previous_time_us: 0,
            previous_positions: Positions::default(),
        }
    }

    fn action(&self, timestamp_us: i64, input: InputType, positions: Positions, progress: f32) -> InputAction {
        InputAction {
            timestamp_us,
            interaction: InteractionType::Grab,
            hand_type: HandType::Primary,
            chirality: self.chirality,
            input_type: input,
            cursor_position: positions.cursor_px,
            distance_from_screen_m: positions.distance_from_screen_m,
            progress_to_click: progress,
        }
    }

    /// Tracked-point speed in mm/s, derived from successive positions.
    fn hand_velocity(&self, timestamp_us: i64, positions: Positions, hand: &HandSample) -> f32 {
        if self.previous_time_us == 0 {
            return hand.palm_velocity.length() * 1000.0;
        }
        let screen = self.positioner.screen();
        let previous_world = screen.screen_to_world(
            self.previous_positions.cursor_px,
            self.previous_positions.distance_from_screen_m,
        );
        let current_world =
            screen.screen_to_world(positions.cursor_px, positions.distance_from_screen_m);
        let change_mm = (current_world - previous_world).length() * 1000.0;
        let dt = (timestamp_us - self.previous_time_us) as f32 / 1_000_000.0;
        if dt <= 0.0 {
            0.0
        } else {
            change_mm / dt
        }
    }

    fn check_for_start_drag(&self, start_px: Vec2, current_px: Vec2) -> bool {
        let screen = self.positioner.screen();
        let start_mm = screen.px_to_mm(start_px);
        let current_mm = screen.px_to_mm(current_px);
        (start_mm - current_mm).length() > self.drag_start_distance_threshold_mm
    }

    fn handle_press(&mut self, timestamp_us: i64, positions: Positions) -> InputAction {
        self.pressing = true;
        if self.ignore_dragging {
            self.require_hold = true;
            self.held_frames = 0;
            self.require_click = false;
        }

        self.positioner.stabiliser.stop_shrinking_deadzone();
        self.positioner.stabiliser.current_deadzone_radius =
            self.deadzone_enlargement_mm + self.positioner.stabiliser.default_deadzone_radius;
        self.cursor_down_px = positions.cursor_px;

        self.action(timestamp_us, InputType::Down, positions, self.detector.strength())
    }

    fn handle_press_hold(&mut self, timestamp_us: i64, positions: Positions) -> InputAction {
        if self.is_dragging {
            return self.action(timestamp_us, InputType::Move, positions, self.detector.strength());
        }

        // Lock reported positions to the down point until a drag starts.
        let down_positions = Positions {
            cursor_px: self.cursor_down_px,
            distance_from_screen_m: positions.distance_from_screen_m,
        };

        if self.ignore_dragging {
            if self.require_hold {
                if self.held_frames >= REQUIRED_HOLD_FRAMES {
                    self.require_hold = false;
                    self.require_click = true;
                    self.held_frames = 0;
                } else {
                    self.held_frames += 1;
                }
                self.action(timestamp_us, InputType::Move, down_positions, self.detector.strength())
            } else if self.require_click {
                self.positioner
                    .stabiliser
                    .start_shrinking_deadzone(self.deadzone_shrink_speed);
                self.require_click = false;
                self.action(timestamp_us, InputType::Up, down_positions, self.detector.strength())
            } else {
                self.action(timestamp_us, InputType::Move, positions, self.detector.strength())
            }
        } else {
            if self.check_for_start_drag(self.cursor_down_px, positions.cursor_px) {
                self.is_dragging = true;
                self.positioner
                    .stabiliser
                    .start_shrinking_deadzone(self.deadzone_shrink_speed);
            }
            self.action(timestamp_us, InputType::Move, down_positions, self.detector.strength())
        }
    }

    fn handle_unclick(&mut self, timestamp_us: i64, positions: Positions) -> Option<InputAction> {
        let mut result = None;
        if !self.ignore_dragging {
            if !self.require_hold && !self.require_click {
                result = Some(self.action(
                    timestamp_us,
                    InputType::Up,
                    positions,
                    self.detector.strength(),
                ));
            }
            self.positioner
                .stabiliser
                .start_shrinking_deadzone(self.deadzone_shrink_speed);
        }
        self.pressing = false;
        self.is_dragging = false;
        result
    }
}

impl InteractionModule for GrabInteraction {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::Grab
    }

    fn update(&mut self, hand: Option<&HandSample>, timestamp_us: i64) -> Option<InputAction> {
        let Some(hand) = hand else {
            let was_tracking = self.had_hand;
            self.had_hand = false;
            self.pressing = false;
            self.is_dragging = false;
            self.previous_time_us = 0;
            let positions = self.positioner.last_positions();
            self.positioner.reset();
            self.detector.reset();
            return was_tracking
                .then(|| self.action(timestamp_us, InputType::Cancel, positions, 0.0));
        };

        self.chirality = hand.chirality;
        self.had_hand = true;

        let positions = self.positioner.update(hand, timestamp_us);
        let velocity_mmps = self.hand_velocity(timestamp_us, positions, hand);
        self.detector
            .update(hand, timestamp_us, velocity_mmps / 1000.0);

        let result = if self.detector.is_grabbing()
            && (self.pressing || velocity_mmps < self.max_hand_velocity_mmps)
        {
            if !self.pressing {
                Some(self.handle_press(timestamp_us, positions))
            } else {
                Some(self.handle_press_hold(timestamp_us, positions))
            }
        } else if self.pressing {
            self.handle_unclick(timestamp_us, positions)
        } else {
            Some(self.action(
                timestamp_us,
                InputType::Move,
                positions,
                self.detector.strength(),
            ))
        };

        self.previous_time_us = timestamp_us;
        self.previous_positions = positions;
        result
    }
}

// ── Tests ──────────────────────────────────────────────────
