//! Touch plane: a virtual surface in front of the screen. Crossing it
//! presses, pulling back releases at the press position.

use crate::config::InteractionConfig;
use crate::geom::{inverse_lerp, Vec2};
use crate::screen::{Positions, VirtualScreen};
use crate::tracking::{Chirality, HandSample};

use super::{
    HandType, InputAction, InputType, InteractionModule, InteractionType, Positioner,
    TrackedPosition,
};

/// Distance beyond the plane at which progress reads zero, mm.
const ZERO_PROGRESS_MM: f32 = 100.0;

pub struct TouchPlaneInteraction {
    plane_distance_mm: f32,
    drag_start_distance_threshold_mm: f32,
    ignore_dragging: bool,
    positioner: Positioner,
    chirality: Chirality,
    had_hand: bool,

    pressing: bool,
    press_complete: bool,
    is_dragging: bool,
    /// A hand first seen past the plane stays inert until it retreats.
    hand_ready: bool,
    down_px: Vec2,
}

impl TouchPlaneInteraction {
    pub fn new(config: &InteractionConfig, screen: VirtualScreen) -> Self {
        Self {
            plane_distance_mm: config.touch_plane.activation_distance_mm,
            drag_start_distance_threshold_mm: 10.0,
            ignore_dragging: !config.use_scrolling_or_dragging,
            positioner: Positioner::new(
                screen,
                TrackedPosition::Nearest,
                config.deadzone_radius_mm,
                false,
            ),
            chirality: Chirality::Right,
            had_hand: false,
            pressing: false,
            press_complete: false,
            is_dragging: false,
            hand_ready: false,
            down_px: Vec2::ZERO,
        }
    }

    fn action(&self, timestamp_us: i64, input: InputType, positions: Positions, progress: f32) -> InputAction {
        InputAction {
            timestamp_us,
            interaction: InteractionType::Touchplane,
            hand_type: HandType::Primary,
            chirality: self.chirality,
            input_type: input,
            cursor_position: positions.cursor_px,
            distance_from_screen_m: positions.distance_from_screen_m,
            progress_to_click: progress,
        }
    }

    fn check_for_start_drag(&self, start_px: Vec2, current_px: Vec2) -> bool {
        let screen = self.positioner.screen();
        let start_mm = screen.px_to_mm(start_px);
        let current_mm = screen.px_to_mm(current_px);
        (start_mm - current_mm).length() > self.drag_start_distance_threshold_mm
    }

    fn handle_interactions(&mut self, timestamp_us: i64, positions: Positions) -> InputAction {
        let distance_mm = positions.distance_from_screen_m * 1000.0;
        let progress = (1.0
            - inverse_lerp(
                self.plane_distance_mm,
                self.plane_distance_mm + ZERO_PROGRESS_MM,
                distance_mm,
            ))
        .clamp(0.0, 1.0);

        if distance_mm < self.plane_distance_mm {
            if !self.hand_ready {
                return self.action(timestamp_us, InputType::None, positions, progress);
            }
            if !self.pressing {
                self.pressing = true;
                self.down_px = positions.cursor_px;
                return self.action(timestamp_us, InputType::Down, positions, progress);
            }
            if !self.ignore_dragging {
                if !self.is_dragging && self.check_for_start_drag(self.down_px, positions.cursor_px)
                {
                    self.is_dragging = true;
                }
                if self.is_dragging {
                    self.action(timestamp_us, InputType::Move, positions, progress)
                } else {
                    self.action(timestamp_us, InputType::None, positions, progress)
                }
            } else if !self.press_complete {
                self.press_complete = true;
                let down_positions = Positions {
                    cursor_px: self.down_px,
                    distance_from_screen_m: positions.distance_from_screen_m,
                };
                self.action(timestamp_us, InputType::Up, down_positions, progress)
            } else {
                self.action(timestamp_us, InputType::None, positions, progress)
            }
        } else {
            let result = if self.pressing && !self.press_complete {
                let down_positions = Positions {
                    cursor_px: self.down_px,
                    distance_from_screen_m: positions.distance_from_screen_m,
                };
                self.action(timestamp_us, InputType::Up, down_positions, progress)
            } else {
                self.action(timestamp_us, InputType::Move, positions, progress)
            };

            self.press_complete = false;
            self.pressing = false;
            self.is_dragging = false;
            self.hand_ready = true;
            result
        }
    }
}

impl InteractionModule for TouchPlaneInteraction {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::Touchplane
    }

    fn update(&mut self, hand: Option<&HandSample>, timestamp_us: i64) -> Option<InputAction> {
        let Some(hand) = hand else {
            let was_tracking = self.had_hand;
            self.had_hand = false;
            self.pressing = false;
            self.press_complete = false;
            self.is_dragging = false;
            self.hand_ready = false;
            let positions = self.positioner.last_positions();
            self.positioner.reset();
            return was_tracking
                .then(|| self.action(timestamp_us, InputType::Cancel, positions, 0.0));
        };

        self.chirality = hand.chirality;
        self.had_hand = true;

        let positions = self.positioner.update(hand, timestamp_us);
        Some(self.handle_interactions(timestamp_us, positions))
    }
}

// ── Tests ──────────────────────────────────────────────────
