//! Air push: a spring "force" accumulates as the hand drives towards
//! the screen; crossing 1.0 clicks, pulling back releases.

use crate::config::{AirPushSettings, InteractionConfig};
use crate::geom::Vec2;
use crate::screen::{Positions, VirtualScreen};
use crate::tracking::{Chirality, HandSample};

use super::{
    HandType, InputAction, InputType, InteractionModule, InteractionType, Positioner,
    TrackedPosition,
};

/// Ignore pushes for this long after a hand first appears.
const ENTRY_COOLDOWN_MS: f64 = 300.0;

/// A held click is forced to release after this long.
const CLICK_HOLD_TIMER_MS: f64 = 1500.0;

pub struct AirPushInteraction {
    settings: AirPushSettings,
    ignore_dragging: bool,
    positioner: Positioner,
    chirality: Chirality,

    had_hand: bool,
    hand_appeared_at_us: Option<i64>,
    cooldown_active: bool,

    previous_time_us: i64,
    previous_distance_mm: f32,
    previous_cursor_px: Vec2,

    applied_force: f32,
    pressing: bool,
    is_dragging: bool,
    decaying_force: bool,

    cursor_press_position: Vec2,
    click_hold_started_us: Option<i64>,
}

impl AirPushInteraction {
    pub fn new(config: &InteractionConfig, screen: VirtualScreen) -> Self {
        let mut settings = config.air_push.clone();
        if !config.use_scrolling_or_dragging && !config.use_swipe_interaction {
            // Narrow "towards" cone when every gesture must be a click.
            settings.theta_one = 15.0;
        }
        Self {
            settings,
            ignore_dragging: !config.use_scrolling_or_dragging,
            positioner: Positioner::new(
                screen,
                TrackedPosition::IndexStable,
                config.deadzone_radius_mm,
                true,
            ),
            chirality: Chirality::Right,
            had_hand: false,
            hand_appeared_at_us: None,
            cooldown_active: true,
            previous_time_us: 0,
            previous_distance_mm: f32::INFINITY,
            previous_cursor_px: Vec2::ZERO,
            applied_force: 0.0,
            pressing: false,
            is_dragging: false,
            decaying_force: false,
            cursor_press_position: Vec2::ZERO,
            click_hold_started_us: None,
        }
    }

    fn action(&self, timestamp_us: i64, input: InputType, positions: Positions, progress: f32) -> InputAction {
        InputAction {
            timestamp_us,
            interaction: InteractionType::Push,
            hand_type: HandType::Primary,
            chirality: self.chirality,
            input_type: input,
            cursor_position: positions.cursor_px,
            distance_from_screen_m: positions.distance_from_screen_m,
            progress_to_click: progress,
        }
    }

    fn adjust_deadzone(&mut self, force_change: f32) {
        if force_change < -f32::EPSILON {
            self.positioner
                .stabiliser
                .start_shrinking_deadzone(self.settings.deadzone_shrink_rate);
        } else {
            self.positioner.stabiliser.stop_shrinking_deadzone();

            let increase = self.settings.deadzone_max_size_increase_mm * force_change;
            let min_size = self.positioner.stabiliser.default_deadzone_radius;
            let max_size = min_size + self.settings.deadzone_max_size_increase_mm;
            let new_size =
                (self.positioner.stabiliser.current_deadzone_radius + increase).clamp(min_size, max_size);
            self.positioner.stabiliser.current_deadzone_radius = new_size;
        }
    }

    /// The spring increment for this frame, signed.
    fn applied_force_change(
        &self,
        current_velocity: f32,
        dt: f32,
        d_perp_mm: Vec2,
        distance_from_plane_mm: f32,
    ) -> f32 {
        let s = &self.settings;
        let mut force_change = 0.0;

        if dt < f32::EPSILON {
            // Frames too close together (or a new hand with negative dt).
        } else if s.use_touch_plane_force && distance_from_plane_mm < 0.0 {
            // Past the virtual touch plane a fixed stiffness applies and
            // the force never decays, so the user cannot creep closer
            // and closer without clicking.
            let stiffness = 1.0 / s.dist_past_touch_plane_mm;
            let forward_velocity = current_velocity.max(0.0);
            force_change = stiffness * forward_velocity * dt;
        } else {
            let angle_from_screen = d_perp_mm
                .length()
                .atan2(current_velocity * dt)
                .to_degrees();

            if angle_from_screen < s.theta_one || angle_from_screen > s.theta_two {
                // Moving towards or away from the screen: spring force
                // with a velocity-dependent stiffness.
                let v_clamped = current_velocity.abs().clamp(s.speed_min, s.speed_max);
                let stiffness_ratio = (v_clamped - s.speed_min) / (s.speed_max - s.speed_min);

                let stiffness_min = 1.0 / s.dist_at_speed_min_mm;
                let stiffness_max = 1.0 / s.dist_at_speed_max_mm;
                let k = stiffness_min
                    + stiffness_ratio * stiffness_ratio * (stiffness_max - stiffness_min);

                force_change = k * current_velocity * dt;
            } else if !self.pressing {
                // Roughly lateral motion decays the force.
                let v_perp = d_perp_mm.length() / dt;
                let stiffness = 1.0 / s.horizontal_decay_dist_mm;
                force_change = -stiffness * v_perp * dt;
            }

            if self.decaying_force {
                if force_change <= 0.0 {
                    force_change -=
                        (1.0 - (s.unclick_threshold - 0.1)) * (dt / s.force_decay_time_s);
                } else {
                    // Never grow the force while it is meant to decay.
                    force_change = 0.0;
                }
            }
        }
        force_change
    }

    fn handle_push(&mut self, timestamp_us: i64, positions: Positions) -> Option<InputAction> {
        let s = self.settings.clone();

        if let Some(appeared) = self.hand_appeared_at_us {
            if self.cooldown_active
                && (timestamp_us - appeared) as f64 / 1000.0 >= ENTRY_COOLDOWN_MS
            {
                self.cooldown_active = false;
            }
        }

        let result;
        if self.previous_time_us != 0 && !self.cooldown_active {
            let dt = (timestamp_us - self.previous_time_us) as f32 / 1_000_000.0;
            let distance_mm = positions.distance_from_screen_m * 1000.0;
            // Positive velocity is towards the screen.
            let dz = -(distance_mm - self.previous_distance_mm);
            let current_velocity = if dt > 0.0 { dz / dt } else { 0.0 };

            let d_perp_px = positions.cursor_px - self.previous_cursor_px;
            let d_perp_mm = self.positioner.screen().px_to_mm(d_perp_px);

            let force_change =
                self.applied_force_change(current_velocity, dt, d_perp_mm, distance_mm);
            self.applied_force = (self.applied_force + force_change).clamp(0.0, 1.0);

            if !self.pressing {
                self.adjust_deadzone(force_change);
            }

            let click_held_ms = self
                .click_hold_started_us
                .map(|start| (timestamp_us - start) as f64 / 1000.0);

            if self.pressing {
                let unclick = if self.is_dragging {
                    s.unclick_threshold_drag
                } else {
                    s.unclick_threshold
                };
                let hold_expired = click_held_ms.is_some_and(|ms| ms >= CLICK_HOLD_TIMER_MS);

                if self.applied_force < unclick || self.ignore_dragging || hold_expired {
                    self.pressing = false;
                    self.is_dragging = false;
                    self.cursor_press_position = Vec2::ZERO;
                    self.click_hold_started_us = None;
                    self.decaying_force = true;
                    result = self.action(timestamp_us, InputType::Up, positions, self.applied_force);
                } else if self.is_dragging {
                    self.positioner.stabiliser.reduce_deadzone_offset();
                    result = self.action(timestamp_us, InputType::Move, positions, self.applied_force);
                } else if positions.cursor_px != self.cursor_press_position {
                    // The enlarged deadzone means any reported motion is
                    // a deliberate drag.
                    self.is_dragging = true;
                    self.click_hold_started_us = None;
                    self.positioner
                        .stabiliser
                        .start_shrinking_deadzone(s.drag_deadzone_shrink_rate);
                    result = self.action(timestamp_us, InputType::Move, positions, self.applied_force);
                } else {
                    result = self.action(timestamp_us, InputType::None, positions, self.applied_force);
                }
            } else if !self.decaying_force && self.applied_force >= 1.0 {
                // The decaying_force check eliminates double clicks.
                self.pressing = true;
                self.cursor_press_position = positions.cursor_px;
                if !self.ignore_dragging {
                    self.click_hold_started_us = Some(timestamp_us);
                }
                self.positioner.stabiliser.set_deadzone_offset();
                self.positioner.stabiliser.current_deadzone_radius =
                    s.drag_start_distance_threshold_mm;
                result = self.action(timestamp_us, InputType::Down, positions, self.applied_force);
            } else {
                self.positioner.stabiliser.reduce_deadzone_offset();
                result = self.action(timestamp_us, InputType::Move, positions, self.applied_force);
            }

            if self.decaying_force && self.applied_force <= s.unclick_threshold - 0.1 {
                self.decaying_force = false;
            }
        } else {
            // Hand only just discovered: show it is seen, nothing more.
            result = self.action(timestamp_us, InputType::Move, positions, self.applied_force);
        }

        self.previous_time_us = timestamp_us;
        self.previous_distance_mm = positions.distance_from_screen_m * 1000.0;
        self.previous_cursor_px = positions.cursor_px;

        Some(result)
    }
}

impl InteractionModule for AirPushInteraction {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::Push
    }

    fn update(&mut self, hand: Option<&HandSample>, timestamp_us: i64) -> Option<InputAction> {
        let Some(hand) = hand else {
            self.applied_force = 0.0;
            self.pressing = false;
            self.is_dragging = false;
            self.previous_time_us = 0;
            self.hand_appeared_at_us = Some(timestamp_us);
            self.cooldown_active = true;

            if self.had_hand {
                self.had_hand = false;
                let positions = self.positioner.last_positions();
                self.positioner.reset();
                return Some(self.action(timestamp_us, InputType::Cancel, positions, 0.0));
            }
            self.positioner.reset();
            return None;
        };

        self.chirality = hand.chirality;
        if !self.had_hand {
            self.had_hand = true;
            self.hand_appeared_at_us = Some(timestamp_us);
            self.cooldown_active = true;
        }

        let positions = self.positioner.update(hand, timestamp_us);
        self.handle_push(timestamp_us, positions)
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicalConfig;
    use crate::geom::Vec3;
    use crate::tracking::synthetic::flat_hand;

    const FRAME_US: i64 = 10_000;

    fn module() -> AirPushInteraction {
        AirPushInteraction::new(
            &InteractionConfig::default(),
            VirtualScreen::new(&PhysicalConfig::default()),
        )
    }

    /// Drive a straight push towards the screen fast enough to click.
    fn push_to_click(module: &mut AirPushInteraction, start_ts: i64) -> (Vec<InputAction>, i64) {
        let mut actions = Vec::new();
        let mut ts = start_ts;
        let mut z = 0.25;
        for _ in 0..60 {
            ts += FRAME_US;
            z -= 0.004; // 400 mm/s towards the screen
            let hand = flat_hand(Chirality::Right, Vec3::new(0.0, 0.15, z));
            if let Some(action) = module.update(Some(&hand), ts) {
                let is_down = action.input_type == InputType::Down;
                actions.push(action);
                if is_down {
                    break;
                }
            }
        }
        (actions, ts)
    }

    #[test]
    fn test_entry_cooldown_suppresses_force() {
        let mut m = module();
        let mut ts = 0;
        // Hold still during the cooldown: only moves, zero force.
        for _ in 0..10 {
            ts += FRAME_US;
            let hand = flat_hand(Chirality::Right, Vec3::new(0.0, 0.15, 0.25));
            let action = m.update(Some(&hand), ts).expect("visible hand reports");
            assert_eq!(action.input_type, InputType::Move);
            assert_eq!(action.progress_to_click, 0.0);
        }
    }

    #[test]
    fn test_push_produces_down_with_full_progress() {
        let mut m = module();
        // Let the cooldown lapse with a still hand.
        let mut ts = 0;
        for _ in 0..35 {
            ts += FRAME_US;
            let hand = flat_hand(Chirality::Right, Vec3::new(0.0, 0.15, 0.25));
            m.update(Some(&hand), ts);
        }

        let (actions, _) = push_to_click(&mut m, ts);
        let down = actions.iter().find(|a| a.input_type == InputType::Down);
        let down = down.expect("a steady push must produce a Down");
        assert!(
            (down.progress_to_click - 1.0).abs() < 1e-6,
            "progress must be 1.0 exactly at the click, got {}",
            down.progress_to_click
        );
        // Everything before the down was a move with rising progress.
        let moves = &actions[..actions.len() - 1];
        assert!(moves.iter().all(|a| a.input_type == InputType::Move));
    }

    #[test]
    fn test_retreat_after_click_releases() {
        let mut m = module();
        let mut ts = 0;
        for _ in 0..35 {
            ts += FRAME_US;
            let hand = flat_hand(Chirality::Right, Vec3::new(0.0, 0.15, 0.25));
            m.update(Some(&hand), ts);
        }
        let (_, mut ts) = push_to_click(&mut m, ts);

        // Pull sharply back out.
        let mut z = 0.02;
        let mut saw_up = false;
        for _ in 0..40 {
            ts += FRAME_US;
            z += 0.006;
            let hand = flat_hand(Chirality::Right, Vec3::new(0.0, 0.15, z));
            if let Some(action) = m.update(Some(&hand), ts) {
                if action.input_type == InputType::Up {
                    saw_up = true;
                    break;
                }
            }
        }
        assert!(saw_up, "retreating must release the press");
    }

    #[test]
    fn test_hand_loss_mid_press_cancels() {
        let mut m = module();
        let mut ts = 0;
        for _ in 0..35 {
            ts += FRAME_US;
            let hand = flat_hand(Chirality::Right, Vec3::new(0.0, 0.15, 0.25));
            m.update(Some(&hand), ts);
        }
        let (_, mut ts) = push_to_click(&mut m, ts);

        ts += FRAME_US;
        let action = m.update(None, ts).expect("losing the hand must report");
        assert_eq!(action.input_type, InputType::Cancel);

        // And nothing more while the hand stays gone.
        ts += FRAME_US;
        assert!(m.update(None, ts).is_none());
    }
}
