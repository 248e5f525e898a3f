//! Velocity swipe: a committed fast flick scrolls; releasing needs the
//! hand to slow down or drift off the swipe axis.

use crate::config::{InteractionConfig, VelocitySwipeSettings};
use crate::geom::Vec2;
use crate::screen::{Positions, VirtualScreen};
use crate::tracking::{Chirality, HandSample};

use super::{
    HandType, InputAction, InputType, InteractionModule, InteractionType, Positioner,
    TrackedPosition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    None,
    X,
    Y,
}

pub struct VelocitySwipeInteraction {
    settings: VelocitySwipeSettings,
    lock_axis_to_only: Axis,
    allow_bidirectional: bool,
    positioner: Positioner,
    chirality: Chirality,
    had_hand: bool,

    pressing: bool,
    current_direction: Direction,
    scroll_disallowed: bool,
    scroll_delay_started_us: Option<i64>,

    previous_time_us: i64,
    previous_cursor_px: Vec2,
    scroll_origin_px: Vec2,
    potential_scroll_origin_px: Option<Vec2>,
}

impl VelocitySwipeInteraction {
    pub fn new(config: &InteractionConfig, screen: VirtualScreen) -> Self {
        let s = &config.velocity_swipe;
        let mut lock_axis_to_only = Axis::None;
        let mut allow_bidirectional = false;
        if s.allow_horizontal_scroll && s.allow_vertical_scroll {
            allow_bidirectional = s.allow_bidirectional_scroll;
        } else if s.allow_horizontal_scroll {
            lock_axis_to_only = Axis::X;
        } else if s.allow_vertical_scroll {
            lock_axis_to_only = Axis::Y;
        }

        Self {
            settings: s.clone(),
            lock_axis_to_only,
            allow_bidirectional,
            positioner: Positioner::new(
                screen,
                TrackedPosition::IndexTip,
                config.deadzone_radius_mm,
                true,
            ),
            chirality: Chirality::Right,
            had_hand: false,
            pressing: false,
            current_direction: Direction::Right,
            scroll_disallowed: false,
            scroll_delay_started_us: None,
            previous_time_us: 0,
            previous_cursor_px: Vec2::ZERO,
            scroll_origin_px: Vec2::ZERO,
            potential_scroll_origin_px: None,
        }
    }

    fn action(&self, timestamp_us: i64, input: InputType, positions: Positions, progress: f32) -> InputAction {
        InputAction {
            timestamp_us,
            interaction: InteractionType::Velocityswipe,
            hand_type: HandType::Primary,
            chirality: self.chirality,
            input_type: input,
            cursor_position: positions.cursor_px,
            distance_from_screen_m: positions.distance_from_screen_m,
            progress_to_click: progress,
        }
    }

    fn set_direction(&mut self, d_perp: Vec2, abs_perp: Vec2) {
        self.current_direction = if abs_perp.x >= abs_perp.y {
            if d_perp.x > 0.0 {
                Direction::Right
            } else {
                Direction::Left
            }
        } else if d_perp.y > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        };
    }

    fn vertical_velocity_over_min(&self, d_perp: Vec2) -> bool {
        let s = &self.settings;
        d_perp.y > (s.min_scroll_velocity_mmps - s.upwards_min_velocity_decrease_mmps)
            || -d_perp.y > (s.downwards_min_velocity_increase_mmps + s.min_scroll_velocity_mmps)
    }

    fn check_if_scroll_allowed(&mut self, timestamp_us: i64, d_perp: Vec2) -> bool {
        if self.scroll_disallowed {
            let delay_elapsed = self
                .scroll_delay_started_us
                .is_some_and(|start| (timestamp_us - start) as f64 / 1000.0 > self.settings.scroll_delay_ms);
            if delay_elapsed {
                // Re-allow only once the hand moves against the last
                // swipe direction.
                let v = self.settings.max_opposing_velocity_mmps;
                self.scroll_disallowed = match self.current_direction {
                    Direction::Left => d_perp.x >= v,
                    Direction::Right => d_perp.x <= -v,
                    Direction::Up => d_perp.y <= -v,
                    Direction::Down => d_perp.y >= v,
                };
            }
            return false;
        }
        true
    }

    fn check_if_scroll_start(&mut self, timestamp_us: i64, d_perp: Vec2, abs_perp: Vec2) -> bool {
        if !self.check_if_scroll_allowed(timestamp_us, d_perp) {
            return false;
        }

        let s = &self.settings;
        if self.allow_bidirectional {
            abs_perp.x > s.min_scroll_velocity_mmps || self.vertical_velocity_over_min(d_perp)
        } else {
            (abs_perp.x > s.min_scroll_velocity_mmps
                && abs_perp.y < s.max_lateral_velocity_mmps
                && self.lock_axis_to_only != Axis::Y)
                || (self.vertical_velocity_over_min(d_perp)
                    && abs_perp.x < s.max_lateral_velocity_mmps
                    && self.lock_axis_to_only != Axis::X)
        }
    }

    fn check_if_scroll_end(&self, d_perp: Vec2, cursor_px: Vec2) -> bool {
        let s = &self.settings;
        let screen = self.positioner.screen();
        let from_origin_px = cursor_px - self.scroll_origin_px;
        let from_origin_mm = screen.px_to_mm(from_origin_px).abs();

        match self.current_direction {
            Direction::Left => {
                d_perp.x > -s.max_release_velocity_mmps
                    || from_origin_mm.y
                        > (s.max_swipe_width_mm + s.swipe_width_scaling * from_origin_mm.x)
            }
            Direction::Right => {
                d_perp.x < s.max_release_velocity_mmps
                    || from_origin_mm.y
                        > (s.max_swipe_width_mm + s.swipe_width_scaling * from_origin_mm.x)
            }
            Direction::Up => {
                d_perp.y < s.max_release_velocity_mmps
                    || from_origin_mm.x
                        > (s.max_swipe_width_mm + s.swipe_width_scaling * from_origin_mm.y)
            }
            Direction::Down => {
                d_perp.y > -s.max_release_velocity_mmps
                    || from_origin_mm.x
                        > (s.max_swipe_width_mm + s.swipe_width_scaling * from_origin_mm.y)
            }
        }
    }

    fn handle_interactions(&mut self, timestamp_us: i64, positions: Positions) -> InputAction {
        let screen = *self.positioner.screen();
        let d_perp_px = positions.cursor_px - self.previous_cursor_px;
        let dt = (timestamp_us - self.previous_time_us) as f32 / 1_000_000.0;

        // Velocity in mm/s.
        let d_perp = if dt > 0.0 {
            screen.px_to_mm(d_perp_px) * (1.0 / dt)
        } else {
            Vec2::ZERO
        };
        let abs_perp = d_perp.abs();

        let result;
        if !self.pressing && self.check_if_scroll_start(timestamp_us, d_perp, abs_perp) {
            if let Some(origin) = self.potential_scroll_origin_px {
                // Second fast frame: confirm the swipe covered ground.
                let travelled = (positions.cursor_px - origin).abs();
                let travelled_mm = screen.px_to_mm(travelled);
                if travelled_mm.x > self.settings.min_swipe_length_mm
                    || travelled_mm.y > self.settings.min_swipe_length_mm
                {
                    self.pressing = true;
                    self.scroll_origin_px = self.previous_cursor_px;
                    self.potential_scroll_origin_px = None;
                    self.set_direction(d_perp, abs_perp);
                    result = self.action(timestamp_us, InputType::Down, positions, 1.0);
                } else {
                    result = self.action(timestamp_us, InputType::Move, positions, 0.0);
                }
            } else {
                self.potential_scroll_origin_px = Some(self.previous_cursor_px);
                result = self.action(timestamp_us, InputType::Move, positions, 0.0);
            }
        } else if self.pressing && self.check_if_scroll_end(d_perp, positions.cursor_px) {
            self.scroll_delay_started_us = Some(timestamp_us);
            self.scroll_disallowed = true;
            self.pressing = false;
            result = self.action(timestamp_us, InputType::Up, positions, 0.0);
        } else {
            self.potential_scroll_origin_px = None;
            let progress = if self.pressing { 1.0 } else { 0.0 };
            result = self.action(timestamp_us, InputType::Move, positions, progress);
        }

        self.previous_cursor_px = positions.cursor_px;
        self.previous_time_us = timestamp_us;
        result
    }
}

impl InteractionModule for VelocitySwipeInteraction {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::Velocityswipe
    }

    fn update(&mut self, hand: Option<&HandSample>, timestamp_us: i64) -> Option<InputAction> {
        let Some(hand) = hand else {
            let was_tracking = self.had_hand;
            self.had_hand = false;
            self.pressing = false;
            self.previous_time_us = 0;
            self.potential_scroll_origin_px = None;
            let positions = self.positioner.last_positions();
            self.positioner.reset();
            return was_tracking
                .then(|| self.action(timestamp_us, InputType::Cancel, positions, 0.0));
        };

        self.chirality = hand.chirality;
        self.had_hand = true;

        let positions = self.positioner.update(hand, timestamp_us);
        if self.previous_time_us == 0 {
            self.previous_time_us = timestamp_us;
            self.previous_cursor_px = positions.cursor_px;
            return Some(self.action(timestamp_us, InputType::Move, positions, 0.0));
        }
        Some(self.handle_interactions(timestamp_us, positions))
    }
}

// ── Tests ──────────────────────────────────────────────────
