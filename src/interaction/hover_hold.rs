//! Hover-and-hold: keep the cursor still to arm a timer, keep holding
//! to click. The only mode that needs no gesture at all.

use crate::config::InteractionConfig;
use crate::geom::{lerp, Vec2};
use crate::screen::{Positions, VirtualScreen};
use crate::stabilize::apply_deadzone_sized;
use crate::tracking::{Chirality, HandSample};

use super::{
    HandType, InputAction, InputType, InteractionModule, InteractionType, Positioner,
    ProgressTimer, TrackedPosition,
};

/// Extra hover radius on top of the configured deadzone, mm.
const HOVER_DEADZONE_ENLARGEMENT_MM: f32 = 5.0;
const TIMER_DEADZONE_ENLARGEMENT_MM: f32 = 5.0;
const DEADZONE_SHRINK_SPEED: f32 = 0.3;

/// Down-to-up delay once the hold completes, ms.
const CLICK_HOLD_TIME_MS: f32 = 200.0;

pub struct HoverAndHoldInteraction {
    hover_trigger_time_ms: f32,
    positioner: Positioner,
    chirality: Chirality,
    had_hand: bool,

    progress_timer: ProgressTimer,
    hover_timer: ProgressTimer,
    click_timer: ProgressTimer,

    previous_hover_pos_mm: Vec2,
    previous_cursor_px: Vec2,
    previous_time_us: i64,

    hover_triggered: bool,
    hover_triggered_deadzone_radius: f32,
    click_held: bool,
    click_already_sent: bool,
}

impl HoverAndHoldInteraction {
    pub fn new(config: &InteractionConfig, screen: VirtualScreen) -> Self {
        Self {
            hover_trigger_time_ms: config.hover_and_hold.hover_start_time_s * 1000.0,
            positioner: Positioner::new(
                screen,
                TrackedPosition::IndexStable,
                config.deadzone_radius_mm,
                true,
            ),
            chirality: Chirality::Right,
            had_hand: false,
            progress_timer: ProgressTimer::new(config.hover_and_hold.hover_complete_time_s * 1000.0),
            hover_timer: ProgressTimer::new(f32::INFINITY),
            click_timer: ProgressTimer::new(f32::INFINITY),
            previous_hover_pos_mm: Vec2::ZERO,
            previous_cursor_px: Vec2::ZERO,
            previous_time_us: 0,
            hover_triggered: false,
            hover_triggered_deadzone_radius: 0.0,
            click_held: false,
            click_already_sent: false,
        }
    }

    fn action(&self, timestamp_us: i64, input: InputType, positions: Positions, progress: f32) -> InputAction {
        InputAction {
            timestamp_us,
            interaction: InteractionType::Hover,
            hand_type: HandType::Primary,
            chirality: self.chirality,
            input_type: input,
            cursor_position: positions.cursor_px,
            distance_from_screen_m: positions.distance_from_screen_m,
            progress_to_click: progress,
        }
    }

    /// Wider secondary deadzone around the cursor so the hover target
    /// holds still even while the inner deadzone lets the cursor creep.
    fn apply_hover_zone(&mut self, cursor_mm: Vec2) -> Vec2 {
        let radius =
            self.positioner.stabiliser.default_deadzone_radius + HOVER_DEADZONE_ENLARGEMENT_MM;
        self.previous_hover_pos_mm =
            apply_deadzone_sized(self.previous_hover_pos_mm, cursor_mm, radius);
        self.previous_hover_pos_mm
    }

    fn abort_hover(&mut self) {
        self.progress_timer.reset();
        self.hover_triggered = false;
        self.hover_timer.stop();
        self.click_held = false;
        self.click_already_sent = false;
        self.click_timer.stop();
        self.positioner
            .stabiliser
            .start_shrinking_deadzone(DEADZONE_SHRINK_SPEED);
    }

    fn handle_interactions(&mut self, timestamp_us: i64, positions: Positions) -> InputAction {
        let mut result =
            self.action(timestamp_us, InputType::Move, positions, self.progress_timer.progress());

        let still = positions.cursor_px == self.previous_cursor_px;

        if !self.click_held && !self.hover_triggered && still {
            if !self.hover_timer.is_running() {
                self.hover_timer.start();
            } else if self.hover_timer.elapsed_ms() > self.hover_trigger_time_ms {
                self.hover_triggered = true;
                self.hover_timer.stop();
                self.hover_triggered_deadzone_radius =
                    self.positioner.stabiliser.current_deadzone_radius;
            }
        }

        if self.hover_triggered {
            if still {
                if !self.click_held {
                    if !self.progress_timer.is_running() && self.progress_timer.progress() == 0.0 {
                        self.progress_timer.start();
                    } else if self.progress_timer.is_running()
                        && self.progress_timer.progress() >= 1.0
                    {
                        self.positioner.stabiliser.current_deadzone_radius =
                            TIMER_DEADZONE_ENLARGEMENT_MM
                                + self.positioner.stabiliser.default_deadzone_radius;
                        self.progress_timer.stop();
                        self.click_held = true;
                        self.click_timer.start();
                        result = self.action(timestamp_us, InputType::Down, positions, 1.0);
                    } else {
                        // Swell the deadzone with progress so the last
                        // moments of the hold cannot jitter the cursor.
                        let max_radius = TIMER_DEADZONE_ENLARGEMENT_MM
                            + self.positioner.stabiliser.default_deadzone_radius;
                        self.positioner.stabiliser.current_deadzone_radius = lerp(
                            self.hover_triggered_deadzone_radius,
                            max_radius,
                            self.progress_timer.progress(),
                        );
                    }
                } else if !self.click_already_sent
                    && self.click_timer.elapsed_ms() > CLICK_HOLD_TIME_MS
                {
                    result = self.action(
                        timestamp_us,
                        InputType::Up,
                        positions,
                        self.progress_timer.progress(),
                    );
                    self.click_already_sent = true;
                }
            } else {
                // Moved away mid-hover.
                result = if self.click_held && !self.click_already_sent {
                    // The press went down but never released: finish it.
                    self.action(
                        timestamp_us,
                        InputType::Up,
                        positions,
                        self.progress_timer.progress(),
                    )
                } else if !self.click_held {
                    // Timer armed but no press yet: tell clients to stand down.
                    self.action(timestamp_us, InputType::Cancel, positions, 0.0)
                } else {
                    result
                };
                self.abort_hover();
            }
        }

        self.previous_cursor_px = positions.cursor_px;
        result
    }
}

impl InteractionModule for HoverAndHoldInteraction {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::Hover
    }

    fn update(&mut self, hand: Option<&HandSample>, timestamp_us: i64) -> Option<InputAction> {
        let Some(hand) = hand else {
            let was_tracking = self.had_hand;
            self.had_hand = false;
            let positions = self.positioner.last_positions();
            self.abort_hover();
            self.positioner.reset();
            self.previous_time_us = 0;
            return was_tracking
                .then(|| self.action(timestamp_us, InputType::Cancel, positions, 0.0));
        };

        self.chirality = hand.chirality;
        self.had_hand = true;

        let dt_ms = if self.previous_time_us == 0 {
            0.0
        } else {
            (timestamp_us - self.previous_time_us) as f32 / 1000.0
        };
        self.previous_time_us = timestamp_us;
        self.hover_timer.tick(dt_ms);
        self.progress_timer.tick(dt_ms);
        self.click_timer.tick(dt_ms);

        let mut positions = self.positioner.update(hand, timestamp_us);
        let cursor_mm = self.positioner.screen().px_to_mm(positions.cursor_px);
        let hover_mm = self.apply_hover_zone(cursor_mm);
        positions.cursor_px = self.positioner.screen().mm_to_px(hover_mm);

        Some(self.handle_interactions(timestamp_us, positions))
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

    fn module() -> HoverAndHoldInteraction {
        HoverAndHoldInteraction::new(
            &InteractionConfig::default(),
            VirtualScreen::new(&PhysicalConfig::default()),
        )
    }

    fn still_hand() -> HandSample {
        flat_hand(Chirality::Right, Vec3::new(0.0, 0.15, 0.25))
    }

    /// Hold perfectly still for `frames`, collecting everything emitted.
    fn hold_still(m: &mut HoverAndHoldInteraction, ts: &mut i64, frames: usize) -> Vec<InputAction> {
        let mut actions = Vec::new();
        for _ in 0..frames {
            *ts += FRAME_US;
            if let Some(action) = m.update(Some(&still_hand()), *ts) {
                actions.push(action);
            }
        }
        actions
    }

    #[test]
    fn test_still_hand_clicks_after_hold() {
        let mut m = module();
        let mut ts = 0;
        // Default timing: 500ms hover start + 600ms complete + 200ms
        // click hold = 1300ms; 200 frames of 10ms is plenty.
        let actions = hold_still(&mut m, &mut ts, 200);

        let down_idx = actions
            .iter()
            .position(|a| a.input_type == InputType::Down)
            .expect("hold must produce a Down");
        assert!(
            (actions[down_idx].progress_to_click - 1.0).abs() < 1e-6,
            "progress must be exactly 1.0 at Down"
        );

        let up_after = actions[down_idx..]
            .iter()
            .any(|a| a.input_type == InputType::Up);
        assert!(up_after, "a completed hold must release on its own");
    }

    #[test]
    fn test_progress_ramps_before_down() {
        let mut m = module();
        let mut ts = 0;
        let actions = hold_still(&mut m, &mut ts, 80);
        // After 800ms: hover triggered at 500, progress timer running.
        let last = actions.last().unwrap();
        assert!(last.progress_to_click > 0.0 && last.progress_to_click < 1.0);
        // Progress never decreases frame to frame while holding.
        let progressing: Vec<f32> = actions.iter().map(|a| a.progress_to_click).collect();
        assert!(
            progressing.windows(2).all(|w| w[1] >= w[0]),
            "progress must be continuous while holding"
        );
    }

    #[test]
    fn test_movement_before_down_cancels() {
        let mut m = module();
        let mut ts = 0;
        hold_still(&mut m, &mut ts, 90); // hover armed, timer running

        // Jump the hand well outside the hover zone.
        ts += FRAME_US;
        let moved = flat_hand(Chirality::Right, Vec3::new(0.08, 0.15, 0.25));
        let action = m.update(Some(&moved), ts).unwrap();
        assert_eq!(
            action.input_type,
            InputType::Cancel,
            "moving away before the click must cancel"
        );
        assert_eq!(action.progress_to_click, 0.0);
    }

    #[test]
    fn test_hand_loss_cancels_once() {
        let mut m = module();
        let mut ts = 0;
        hold_still(&mut m, &mut ts, 30);
        ts += FRAME_US;
        let action = m.update(None, ts).unwrap();
        assert_eq!(action.input_type, InputType::Cancel);
        ts += FRAME_US;
        assert!(m.update(None, ts).is_none(), "second lost frame stays silent");
    }

    #[test]
    fn test_timers_restart_after_cancel() {
        let mut m = module();
        let mut ts = 0;
        hold_still(&mut m, &mut ts, 90);
        ts += FRAME_US;
        let moved = flat_hand(Chirality::Right, Vec3::new(0.08, 0.15, 0.25));
        m.update(Some(&moved), ts);

        // A fresh hold from the new spot must still click.
        let mut actions = Vec::new();
        for _ in 0..200 {
            ts += FRAME_US;
            if let Some(a) = m.update(Some(&moved), ts) {
                actions.push(a);
            }
        }
        assert!(
            actions.iter().any(|a| a.input_type == InputType::Down),
            "hover must re-arm after a cancel"
        );
    }
}
