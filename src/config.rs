//! Service configuration: interaction tuning and physical screen layout.
//!
//! Clients read and replace these over the wire, so every struct
//! round-trips through serde with the field names the protocol uses.
//! The live store carries a generation counter; the sensor loop watches
//! it and rebuilds the active interaction when it changes.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::interaction::InteractionType;

// ── Mode selection ─────────────────────────────────────────

/// Which grab-detection algorithm the grab interaction drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrabDetectorKind {
    Classic,
    SafetyPinch,
    DuckPinch,
    ThumblessGrab,
    PhysicsGrab,
}

/// Hand-shape signal driving the physics grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhysicsMetricKind {
    InverseVolume,
    CurlSum,
    Swan,
}

// ── Per-interaction settings ───────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HoverAndHoldSettings {
    pub hover_start_time_s: f32,
    pub hover_complete_time_s: f32,
}

impl Default for HoverAndHoldSettings {
    fn default() -> Self {
        Self {
            hover_start_time_s: 0.5,
            hover_complete_time_s: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TouchPlaneSettings {
    pub activation_distance_mm: f32,
}

impl Default for TouchPlaneSettings {
    fn default() -> Self {
        Self {
            activation_distance_mm: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AirPushSettings {
    /// Speed bounds (mm/s) between which spring stiffness interpolates.
    pub speed_min: f32,
    pub speed_max: f32,
    /// Push distance (mm) required to click at the speed bounds.
    pub dist_at_speed_min_mm: f32,
    pub dist_at_speed_max_mm: f32,
    pub horizontal_decay_dist_mm: f32,
    /// Motion angles (degrees): below theta_one is "towards the screen",
    /// above theta_two is "backwards", between is "horizontal".
    pub theta_one: f32,
    pub theta_two: f32,
    pub unclick_threshold: f32,
    pub unclick_threshold_drag: f32,
    pub decay_force_on_click: bool,
    pub force_decay_time_s: f32,
    pub use_touch_plane_force: bool,
    pub dist_past_touch_plane_mm: f32,
    pub drag_start_distance_threshold_mm: f32,
    pub drag_deadzone_shrink_rate: f32,
    pub deadzone_max_size_increase_mm: f32,
    pub deadzone_shrink_rate: f32,
}

impl Default for AirPushSettings {
    fn default() -> Self {
        Self {
            speed_min: 150.0,
            speed_max: 500.0,
            dist_at_speed_min_mm: 42.0,
            dist_at_speed_max_mm: 8.0,
            horizontal_decay_dist_mm: 50.0,
            theta_one: 65.0,
            theta_two: 135.0,
            unclick_threshold: 0.97,
            unclick_threshold_drag: 0.97,
            decay_force_on_click: true,
            force_decay_time_s: 0.1,
            use_touch_plane_force: true,
            dist_past_touch_plane_mm: 20.0,
            drag_start_distance_threshold_mm: 30.0,
            drag_deadzone_shrink_rate: 0.9,
            deadzone_max_size_increase_mm: 20.0,
            deadzone_shrink_rate: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VelocitySwipeSettings {
    pub min_scroll_velocity_mmps: f32,
    pub upwards_min_velocity_decrease_mmps: f32,
    pub downwards_min_velocity_increase_mmps: f32,
    pub max_release_velocity_mmps: f32,
    pub max_lateral_velocity_mmps: f32,
    pub max_opposing_velocity_mmps: f32,
    pub scroll_delay_ms: f64,
    pub min_swipe_length_mm: f32,
    pub max_swipe_width_mm: f32,
    pub swipe_width_scaling: f32,
    pub allow_horizontal_scroll: bool,
    pub allow_vertical_scroll: bool,
    pub allow_bidirectional_scroll: bool,
}

impl Default for VelocitySwipeSettings {
    fn default() -> Self {
        Self {
            min_scroll_velocity_mmps: 625.0,
            upwards_min_velocity_decrease_mmps: 50.0,
            downwards_min_velocity_increase_mmps: 50.0,
            max_release_velocity_mmps: 200.0,
            max_lateral_velocity_mmps: 300.0,
            max_opposing_velocity_mmps: 65.0,
            scroll_delay_ms: 450.0,
            min_swipe_length_mm: 10.0,
            max_swipe_width_mm: 10.0,
            swipe_width_scaling: 0.2,
            allow_horizontal_scroll: false,
            allow_vertical_scroll: true,
            allow_bidirectional_scroll: false,
        }
    }
}

// ── Grab detector settings ─────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClassicGrabSettings {
    pub pinch_threshold: f32,
    pub unpinch_threshold: f32,
    pub grab_threshold: f32,
    pub ungrab_threshold: f32,
}

impl Default for ClassicGrabSettings {
    fn default() -> Self {
        Self {
            pinch_threshold: 0.8,
            unpinch_threshold: 0.7,
            grab_threshold: 0.8,
            ungrab_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SafetyPinchSettings {
    /// Thumb–index closest-approach distances, meters.
    pub pinch_activate_distance: f32,
    pub pinch_deactivate_distance: f32,
    pub failed_pinch_reset_distance: f32,
    /// Middle/ring fingers must clear these palm angles (degrees).
    pub min_palm_middle_angle: f32,
    pub min_palm_ring_angle: f32,
    /// Eligibility angles relax by this factor once already eligible.
    pub safety_hysteresis_mult: f32,
    pub max_index_angle_activation: f32,
    pub max_index_angle_deactivation: f32,
    pub max_thumb_angle_activation: f32,
    pub max_thumb_angle_deactivation: f32,
    /// Frames that must pass after a release before a new pinch.
    pub min_reactivate_frames: u32,
    pub min_deactivate_frames: u32,
}

impl Default for SafetyPinchSettings {
    fn default() -> Self {
        Self {
            pinch_activate_distance: 0.0075,
            pinch_deactivate_distance: 0.025,
            failed_pinch_reset_distance: 0.010,
            min_palm_middle_angle: 65.0,
            min_palm_ring_angle: 65.0,
            safety_hysteresis_mult: 0.8,
            max_index_angle_activation: 98.0,
            max_index_angle_deactivation: 110.0,
            max_thumb_angle_activation: 85.0,
            max_thumb_angle_deactivation: 100.0,
            min_reactivate_frames: 5,
            min_deactivate_frames: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DuckPinchSettings {
    pub pinch_activate_distance: f32,
    pub pinch_deactivate_distance: f32,
    /// Metric value at which reported strength falls to zero.
    pub strength_zero_distance: f32,
}

impl Default for DuckPinchSettings {
    fn default() -> Self {
        Self {
            pinch_activate_distance: 0.01,
            pinch_deactivate_distance: 0.025,
            strength_zero_distance: 0.08,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ThumblessGrabSettings {
    pub click_angle: f32,
    pub unclick_angle: f32,
}

impl Default for ThumblessGrabSettings {
    fn default() -> Self {
        Self {
            click_angle: 70.0,
            unclick_angle: 40.0,
        }
    }
}

/// Empirically tuned spring-grab parameters. The constants have no
/// documented derivation upstream, so they live here as tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PhysicsGrabSettings {
    pub metric: PhysicsMetricKind,
    pub metric_deadzone: f32,
    pub max_stiffness: f32,
    pub trigger_velocity_threshold: f32,
    pub untrigger_velocity_threshold: f32,
    /// Cursor speed (m/s) above which strength is bled off pre-grab.
    pub cursor_velocity_limit: f32,
    pub inverse_volume_bounds: (f32, f32),
    pub swan_typical_trigger_value: f32,
    pub swan_stiffness_scale: f32,
}

impl Default for PhysicsGrabSettings {
    fn default() -> Self {
        Self {
            metric: PhysicsMetricKind::CurlSum,
            metric_deadzone: 0.05,
            max_stiffness: 10.0,
            trigger_velocity_threshold: 1.0,
            untrigger_velocity_threshold: 0.001,
            cursor_velocity_limit: 0.15,
            inverse_volume_bounds: (0.5, 10.0),
            swan_typical_trigger_value: -0.01,
            swan_stiffness_scale: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GrabSettings {
    pub detector: GrabDetectorSelection,
    pub classic: ClassicGrabSettings,
    pub safety_pinch: SafetyPinchSettings,
    pub duck_pinch: DuckPinchSettings,
    pub thumbless: ThumblessGrabSettings,
    pub physics: PhysicsGrabSettings,
    /// Deadzone growth applied when a grab press lands, mm.
    pub deadzone_enlargement_mm: f32,
    pub deadzone_shrink_speed: f32,
    /// Hand speed (mm/s) above which a new grab will not start.
    pub max_hand_velocity_mmps: f32,
    pub drag_start_distance_threshold_mm: f32,
}

/// Wrapper so the selected kind serializes next to the per-kind blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrabDetectorSelection(pub GrabDetectorKind);

impl Default for GrabDetectorSelection {
    fn default() -> Self {
        Self(GrabDetectorKind::Classic)
    }
}

impl Default for GrabSettings {
    fn default() -> Self {
        Self {
            detector: GrabDetectorSelection::default(),
            classic: ClassicGrabSettings::default(),
            safety_pinch: SafetyPinchSettings::default(),
            duck_pinch: DuckPinchSettings::default(),
            thumbless: ThumblessGrabSettings::default(),
            physics: PhysicsGrabSettings::default(),
            deadzone_enlargement_mm: 20.0,
            deadzone_shrink_speed: 0.3,
            max_hand_velocity_mmps: 500.0,
            drag_start_distance_threshold_mm: 10.0,
        }
    }
}

// ── Top-level configs ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InteractionConfig {
    pub use_scrolling_or_dragging: bool,
    pub use_swipe_interaction: bool,
    pub deadzone_radius_mm: f32,
    pub interaction_zone_enabled: bool,
    pub interaction_min_distance_mm: f32,
    pub interaction_max_distance_mm: f32,
    pub interaction_type: InteractionType,
    pub hover_and_hold: HoverAndHoldSettings,
    pub touch_plane: TouchPlaneSettings,
    pub air_push: AirPushSettings,
    pub velocity_swipe: VelocitySwipeSettings,
    pub grab: GrabSettings,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            use_scrolling_or_dragging: true,
            use_swipe_interaction: false,
            deadzone_radius_mm: 3.0,
            interaction_zone_enabled: false,
            interaction_min_distance_mm: 0.0,
            interaction_max_distance_mm: 250.0,
            interaction_type: InteractionType::Push,
            hover_and_hold: HoverAndHoldSettings::default(),
            touch_plane: TouchPlaneSettings::default(),
            air_push: AirPushSettings::default(),
            velocity_swipe: VelocitySwipeSettings::default(),
            grab: GrabSettings::default(),
        }
    }
}

/// Physical screen layout. Only the pieces the mapping math needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PhysicalConfig {
    pub screen_width_px: u32,
    pub screen_height_px: u32,
    pub screen_height_m: f32,
}

impl Default for PhysicalConfig {
    fn default() -> Self {
        Self {
            screen_width_px: 1920,
            screen_height_px: 1080,
            screen_height_m: 0.33,
        }
    }
}

// ── Live store ─────────────────────────────────────────────

/// The configuration pair plus a generation counter bumped on every
/// accepted change. Readers compare generations instead of subscribing.
#[derive(Debug, Default)]
pub struct ConfigStore {
    interaction: InteractionConfig,
    physical: PhysicalConfig,
    generation: u64,
}

/// Shared handle; the sensor loop, the protocol layer, and tests all
/// hold clones of this.
pub type SharedConfig = Arc<RwLock<ConfigStore>>;

pub fn shared_default() -> SharedConfig {
    Arc::new(RwLock::new(ConfigStore::default()))
}

impl ConfigStore {
    pub fn interaction(&self) -> &InteractionConfig {
        &self.interaction
    }

    pub fn physical(&self) -> &PhysicalConfig {
        &self.physical
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_interaction(&mut self, config: InteractionConfig) {
        self.interaction = config;
        self.generation += 1;
    }

    pub fn set_physical(&mut self, config: PhysicalConfig) {
        self.physical = config;
        self.generation += 1;
    }
}

// ── Tests ──────────────────────────────────────────────────
