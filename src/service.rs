//! The sensor-rate pipeline: poll tracking, run the active interaction,
//! feed the action queue, and surface hand-presence transitions.
//!
//! One `Service` owns the whole chain; there is no ambient state. The
//! dispatch side (queue draining, broadcasting) lives in `net::server`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::SharedConfig;
use crate::interaction::{create_interaction, InteractionModule};
use crate::net::ConnectionRegistry;
use crate::queue::ActionQueue;
use crate::tracking::{HandFrame, HandPresence, HandSample, TrackingProvider};

pub struct Service {
    provider: Box<dyn TrackingProvider>,
    config: SharedConfig,
    config_generation: u64,
    module: Box<dyn InteractionModule>,

    interaction_zone_enabled: bool,
    zone_min_mm: f32,
    zone_max_mm: f32,

    queue: Arc<ActionQueue>,
    registry: Arc<ConnectionRegistry>,
    tracking_connected: Arc<AtomicBool>,

    presence: HandPresence,
}

impl Service {
    pub fn new(
        provider: Box<dyn TrackingProvider>,
        config: SharedConfig,
        queue: Arc<ActionQueue>,
        registry: Arc<ConnectionRegistry>,
        tracking_connected: Arc<AtomicBool>,
    ) -> Self {
        let (module, generation, zone) = {
            let store = config.read().unwrap();
            let interaction = store.interaction();
            (
                create_interaction(interaction, store.physical()),
                store.generation(),
                (
                    interaction.interaction_zone_enabled,
                    interaction.interaction_min_distance_mm,
                    interaction.interaction_max_distance_mm,
                ),
            )
        };
        info!(
            interaction = ?module.interaction_type(),
            "interaction pipeline ready"
        );
        Self {
            provider,
            config,
            config_generation: generation,
            module,
            interaction_zone_enabled: zone.0,
            zone_min_mm: zone.1,
            zone_max_mm: zone.2,
            queue,
            registry,
            tracking_connected,
            presence: HandPresence::HandsLost,
        }
    }

    /// Swap in a freshly-built interaction when configuration changed.
    /// Mode switches are immediate and reset all interaction state.
    fn reload_if_config_changed(&mut self) {
        let store = self.config.read().unwrap();
        if store.generation() == self.config_generation {
            return;
        }
        self.config_generation = store.generation();
        let interaction = store.interaction();
        self.module = create_interaction(interaction, store.physical());
        self.interaction_zone_enabled = interaction.interaction_zone_enabled;
        self.zone_min_mm = interaction.interaction_min_distance_mm;
        self.zone_max_mm = interaction.interaction_max_distance_mm;
        drop(store);
        self.queue.clear();
        debug!(interaction = ?self.module.interaction_type(), "configuration reloaded");
    }

    fn update_presence(&mut self, frame: &HandFrame) {
        let next = if frame.has_hands() {
            HandPresence::HandFound
        } else {
            HandPresence::HandsLost
        };
        if next != self.presence {
            self.presence = next;
            info!(state = ?next, "hand presence changed");
            self.registry.broadcast_presence(next);
        }
    }

    /// Treat a hand outside the configured interaction zone as absent.
    fn in_zone<'a>(&self, hand: Option<&'a HandSample>) -> Option<&'a HandSample> {
        let hand = hand?;
        if !self.interaction_zone_enabled {
            return Some(hand);
        }
        let distance_mm = hand.palm_position.z * 1000.0;
        (distance_mm >= self.zone_min_mm && distance_mm <= self.zone_max_mm).then_some(hand)
    }

    /// One sensor tick: at most one action enqueued per hand per tick.
    pub fn tick(&mut self) {
        self.reload_if_config_changed();
        self.tracking_connected
            .store(self.provider.connected(), Ordering::Relaxed);

        let Some(frame) = self.provider.poll_frame() else {
            return;
        };
        self.update_presence(&frame);

        let hand = self.in_zone(frame.primary_hand());
        if let Some(action) = self.module.update(hand, frame.timestamp_us) {
            self.queue.push(action);
        }
    }
}

/// Drive the sensor loop on its own interval, decoupled from dispatch.
pub async fn run_sensor_loop(mut service: Service, sensor_hz: u32) {
    let period = Duration::from_micros(1_000_000 / u64::from(sensor_hz.max(1)));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        service.tick();
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{shared_default, InteractionConfig};
    use crate::geom::Vec3;
    use crate::interaction::{InputAction, InputType, InteractionType};
    use crate::tracking::synthetic::{flat_hand, pinching_hand, SyntheticProvider};
    use crate::tracking::Chirality;

    const FRAME_US: i64 = 10_000;

    fn grab_config() -> SharedConfig {
        let config = shared_default();
        let mut interaction = InteractionConfig::default();
        interaction.interaction_type = InteractionType::Grab;
        config.write().unwrap().set_interaction(interaction);
        config
    }

    fn service_with_frames(config: SharedConfig, frames: Vec<HandFrame>) -> (Service, Arc<ActionQueue>) {
        let queue = Arc::new(ActionQueue::default());
        let registry = Arc::new(ConnectionRegistry::new());
        let provider = Box::new(SyntheticProvider::from_frames(frames, FRAME_US));
        let service = Service::new(
            provider,
            config,
            queue.clone(),
            registry,
            Arc::new(AtomicBool::new(false)),
        );
        (service, queue)
    }

    fn frame(ts: i64, hand: Option<crate::tracking::HandSample>) -> HandFrame {
        HandFrame {
            timestamp_us: ts,
            left: None,
            right: hand,
        }
    }

    /// Move in, pinch, hold, release, move out: the canonical click.
    fn click_trajectory() -> Vec<HandFrame> {
        let mut frames = Vec::new();
        let mut ts = 0;

        // Approach and travel: well beyond the deadzone each frame.
        for i in 0..12 {
            ts += FRAME_US;
            let x = -0.06 + 0.005 * i as f32;
            frames.push(frame(ts, Some(flat_hand(Chirality::Right, Vec3::new(x, 0.15, 0.25)))));
        }
        // Settle so the velocity gate opens.
        for _ in 0..4 {
            ts += FRAME_US;
            frames.push(frame(ts, Some(flat_hand(Chirality::Right, Vec3::new(0.0, 0.15, 0.25)))));
        }
        // Pinch and hold.
        for _ in 0..6 {
            ts += FRAME_US;
            frames.push(frame(
                ts,
                Some(pinching_hand(Chirality::Right, Vec3::new(0.0, 0.15, 0.25), 0.004)),
            ));
        }
        // Release and drift.
        for i in 0..6 {
            ts += FRAME_US;
            let x = 0.005 * i as f32;
            frames.push(frame(ts, Some(flat_hand(Chirality::Right, Vec3::new(x, 0.15, 0.25)))));
        }
        frames
    }

    fn run_and_collect(service: &mut Service, queue: &ActionQueue, ticks: usize) -> Vec<InputAction> {
        let mut actions = Vec::new();
        for _ in 0..ticks {
            service.tick();
            // Drain in step with production so nothing is culled.
            while let Some(action) = queue.drain_one() {
                actions.push(action);
            }
        }
        actions
    }

    #[test]
    fn test_end_to_end_click_sequence() {
        let frames = click_trajectory();
        let tick_count = frames.len();
        let (mut service, queue) = service_with_frames(grab_config(), frames);
        let actions = run_and_collect(&mut service, &queue, tick_count);

        // Project to the discrete skeleton: must be move*, down, move*, up.
        assert!(!actions.is_empty());
        let down_idx = actions
            .iter()
            .position(|a| a.input_type == InputType::Down)
            .expect("pinch must produce a Down");
        let up_idx = actions
            .iter()
            .position(|a| a.input_type == InputType::Up)
            .expect("release must produce an Up");
        assert!(down_idx < up_idx, "Down must precede Up");
        assert!(
            actions[..down_idx]
                .iter()
                .all(|a| a.input_type == InputType::Move),
            "everything before Down is a Move"
        );
        assert!(
            actions[down_idx + 1..up_idx]
                .iter()
                .all(|a| a.input_type == InputType::Move),
            "everything between Down and Up is a Move"
        );

        // Timestamps strictly increase through the whole sequence.
        assert!(
            actions.windows(2).all(|w| w[0].timestamp_us < w[1].timestamp_us),
            "timestamps must be strictly increasing"
        );

        // Progress hits 1.0 exactly at the Down.
        assert_eq!(actions[down_idx].progress_to_click, 1.0);
        assert!(actions[..down_idx]
            .iter()
            .all(|a| a.progress_to_click < 1.0));

        // And the moves actually travelled before the press.
        let first = actions.first().unwrap().cursor_position;
        let at_down = actions[down_idx].cursor_position;
        assert!(
            first.distance(at_down) > 1.0,
            "the approach should have moved the cursor"
        );
    }

    #[test]
    fn test_presence_transitions_found_then_lost() {
        let mut frames = Vec::new();
        let mut ts = 0;
        for _ in 0..3 {
            ts += FRAME_US;
            frames.push(frame(ts, Some(flat_hand(Chirality::Right, Vec3::new(0.0, 0.15, 0.25)))));
        }
        for _ in 0..3 {
            ts += FRAME_US;
            frames.push(frame(ts, None));
        }

        let (mut service, _queue) = service_with_frames(grab_config(), frames);
        assert_eq!(service.presence, HandPresence::HandsLost);
        service.tick();
        assert_eq!(service.presence, HandPresence::HandFound);
        for _ in 0..5 {
            service.tick();
        }
        assert_eq!(service.presence, HandPresence::HandsLost);
    }

    #[test]
    fn test_config_change_swaps_interaction() {
        let config = grab_config();
        let (mut service, _queue) = service_with_frames(config.clone(), Vec::new());
        assert_eq!(service.module.interaction_type(), InteractionType::Grab);

        let mut interaction = InteractionConfig::default();
        interaction.interaction_type = InteractionType::Touchplane;
        config.write().unwrap().set_interaction(interaction);

        service.tick();
        assert_eq!(service.module.interaction_type(), InteractionType::Touchplane);
    }

    #[test]
    fn test_interaction_zone_gates_hand() {
        let config = grab_config();
        {
            let mut store = config.write().unwrap();
            let mut interaction = store.interaction().clone();
            interaction.interaction_zone_enabled = true;
            interaction.interaction_min_distance_mm = 0.0;
            interaction.interaction_max_distance_mm = 200.0;
            store.set_interaction(interaction);
        }

        // Hand at 250mm: outside the zone, so the module never sees it
        // and no actions are produced.
        let mut frames = Vec::new();
        for i in 0..5 {
            frames.push(frame(
                (i + 1) * FRAME_US,
                Some(flat_hand(Chirality::Right, Vec3::new(0.0, 0.15, 0.25))),
            ));
        }
        let (mut service, queue) = service_with_frames(config, frames);
        let actions = run_and_collect(&mut service, &queue, 5);
        assert!(
            actions.is_empty(),
            "a hand outside the interaction zone must produce nothing"
        );
    }
}
