//! Wire payloads: the `{action, content}` envelope, the packed input
//! action, and the response shapes.
//!
//! Envelopes are parsed structurally with serde; a nested-brace content
//! payload is just another JSON object, never a pattern-matching hazard.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geom::Vec2;
use crate::interaction::{HandType, InputAction, InputType, InteractionType};
use crate::tracking::{Chirality, HandPresence};

use super::codes::ActionCode;

/// One message frame: `{"action": "<CODE>", "content": {…}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub action: String,
    pub content: serde_json::Value,
}

impl Envelope {
    pub fn new<T: Serialize>(action: ActionCode, content: &T) -> Envelope {
        Envelope {
            action: action.as_str().to_string(),
            content: serde_json::to_value(content).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ── Input action bitmask ───────────────────────────────────

// Flag bits, one block per field. Adding bits anywhere but the end is a
// breaking protocol change.
pub const FLAG_LEFT: u32 = 1;
pub const FLAG_RIGHT: u32 = 2;
pub const FLAG_PRIMARY: u32 = 4;
pub const FLAG_SECONDARY: u32 = 8;
pub const FLAG_NONE_INPUT: u32 = 16;
pub const FLAG_CANCEL: u32 = 32;
pub const FLAG_DOWN: u32 = 64;
pub const FLAG_MOVE: u32 = 128;
pub const FLAG_UP: u32 = 256;
pub const FLAG_GRAB: u32 = 512;
pub const FLAG_HOVER: u32 = 1024;
pub const FLAG_PUSH: u32 = 2048;
pub const FLAG_TOUCHPLANE: u32 = 4096;
pub const FLAG_VELOCITYSWIPE: u32 = 8192;

/// Pack the four enums into one flags integer.
pub fn pack_flags(
    interaction: InteractionType,
    hand_type: HandType,
    chirality: Chirality,
    input_type: InputType,
) -> u32 {
    let mut flags = 0;

    flags |= match hand_type {
        HandType::Primary => FLAG_PRIMARY,
        HandType::Secondary => FLAG_SECONDARY,
    };
    flags |= match chirality {
        Chirality::Left => FLAG_LEFT,
        Chirality::Right => FLAG_RIGHT,
    };
    flags |= match input_type {
        InputType::None => FLAG_NONE_INPUT,
        InputType::Cancel => FLAG_CANCEL,
        InputType::Move => FLAG_MOVE,
        InputType::Up => FLAG_UP,
        InputType::Down => FLAG_DOWN,
    };
    flags |= match interaction {
        InteractionType::Push => FLAG_PUSH,
        InteractionType::Hover => FLAG_HOVER,
        InteractionType::Grab => FLAG_GRAB,
        InteractionType::Touchplane => FLAG_TOUCHPLANE,
        InteractionType::Velocityswipe => FLAG_VELOCITYSWIPE,
    };
    flags
}

/// Favours RIGHT when the bits are missing or contradictory.
pub fn chirality_from_flags(flags: u32) -> Chirality {
    if flags & FLAG_RIGHT != 0 {
        Chirality::Right
    } else if flags & FLAG_LEFT != 0 {
        Chirality::Left
    } else {
        warn!("input action flags carry no chirality; defaulting to RIGHT");
        Chirality::Right
    }
}

/// Favours PRIMARY when the bits are missing or contradictory.
pub fn hand_type_from_flags(flags: u32) -> HandType {
    if flags & FLAG_PRIMARY != 0 {
        HandType::Primary
    } else if flags & FLAG_SECONDARY != 0 {
        HandType::Secondary
    } else {
        warn!("input action flags carry no hand type; defaulting to PRIMARY");
        HandType::Primary
    }
}

/// Favours NONE when no input bit is set; CANCEL wins over UP over DOWN
/// over MOVE when several are.
pub fn input_type_from_flags(flags: u32) -> InputType {
    if flags & FLAG_NONE_INPUT != 0 {
        InputType::None
    } else if flags & FLAG_CANCEL != 0 {
        InputType::Cancel
    } else if flags & FLAG_UP != 0 {
        InputType::Up
    } else if flags & FLAG_DOWN != 0 {
        InputType::Down
    } else if flags & FLAG_MOVE != 0 {
        InputType::Move
    } else {
        warn!("input action flags carry no input type; defaulting to NONE");
        InputType::None
    }
}

/// Favours PUSH when no interaction bit is set.
pub fn interaction_from_flags(flags: u32) -> InteractionType {
    if flags & FLAG_PUSH != 0 {
        InteractionType::Push
    } else if flags & FLAG_HOVER != 0 {
        InteractionType::Hover
    } else if flags & FLAG_GRAB != 0 {
        InteractionType::Grab
    } else if flags & FLAG_TOUCHPLANE != 0 {
        InteractionType::Touchplane
    } else if flags & FLAG_VELOCITYSWIPE != 0 {
        InteractionType::Velocityswipe
    } else {
        warn!("input action flags carry no interaction type; defaulting to PUSH");
        InteractionType::Push
    }
}

/// The `INPUT_ACTION` content payload: flags instead of four enums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireInputAction {
    pub timestamp: i64,
    pub interaction_flags: u32,
    pub cursor_position: Vec2,
    pub distance_from_screen: f32,
    pub progress_to_click: f32,
}

impl From<&InputAction> for WireInputAction {
    fn from(action: &InputAction) -> Self {
        Self {
            timestamp: action.timestamp_us,
            interaction_flags: pack_flags(
                action.interaction,
                action.hand_type,
                action.chirality,
                action.input_type,
            ),
            cursor_position: action.cursor_position,
            distance_from_screen: action.distance_from_screen_m,
            progress_to_click: action.progress_to_click,
        }
    }
}

impl WireInputAction {
    /// Unpack back into the rich form (client side, and tests).
    pub fn unpack(&self) -> InputAction {
        InputAction {
            timestamp_us: self.timestamp,
            interaction: interaction_from_flags(self.interaction_flags),
            hand_type: hand_type_from_flags(self.interaction_flags),
            chirality: chirality_from_flags(self.interaction_flags),
            input_type: input_type_from_flags(self.interaction_flags),
            cursor_position: self.cursor_position,
            distance_from_screen_m: self.distance_from_screen,
            progress_to_click: self.progress_to_click,
        }
    }
}

// ── Response payloads ──────────────────────────────────────

/// Generic request-correlated response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseToClient {
    #[serde(rename = "requestID")]
    pub request_id: String,
    pub status: String,
    pub message: String,
    #[serde(rename = "originalRequest")]
    pub original_request: String,
}

impl ResponseToClient {
    pub fn success(request_id: &str, message: &str, original_request: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            status: "Success".to_string(),
            message: message.to_string(),
            original_request: original_request.to_string(),
        }
    }

    pub fn failure(request_id: &str, message: &str, original_request: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            status: "Failure".to_string(),
            message: message.to_string(),
            original_request: original_request.to_string(),
        }
    }
}

/// Handshake response carries the version pair on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    #[serde(flatten)]
    pub response: ResponseToClient,
    #[serde(rename = "serviceVersion")]
    pub service_version: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
}

/// Broadcast when tracking finds or loses all hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandPresenceEvent {
    pub state: HandPresence,
}

/// Full configuration snapshot, correlated to a request when non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigStateMessage {
    #[serde(rename = "requestID")]
    pub request_id: String,
    pub interaction: crate::config::InteractionConfig,
    pub physical: crate::config::PhysicalConfig,
}

/// Liveness of the upstream tracking connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingServiceState {
    Unavailable,
    NoCamera,
    Connected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatusMessage {
    #[serde(rename = "requestID")]
    pub request_id: String,
    #[serde(rename = "trackingServiceState")]
    pub tracking_service_state: TrackingServiceState,
    #[serde(rename = "serviceVersion")]
    pub service_version: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
}

// ── Tracking state ─────────────────────────────────────────

/// Camera frame masking margins.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MaskingData {
    pub lower: f32,
    pub upper: f32,
    pub right: f32,
    pub left: f32,
}

/// Per-field result wrapper for tracking state responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessWrapper<T> {
    pub succeeded: bool,
    pub msg: String,
    pub content: Option<T>,
}

impl<T> SuccessWrapper<T> {
    pub fn ok(content: T) -> Self {
        Self {
            succeeded: true,
            msg: String::new(),
            content: Some(content),
        }
    }
}

/// `GET/SET_TRACKING_STATE(_RESPONSE)` content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingApiState {
    #[serde(rename = "requestID", default)]
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<SuccessWrapper<MaskingData>>,
    #[serde(rename = "allowImages", skip_serializing_if = "Option::is_none")]
    pub allow_images: Option<SuccessWrapper<bool>>,
    #[serde(rename = "cameraReversed", skip_serializing_if = "Option::is_none")]
    pub camera_reversed: Option<SuccessWrapper<bool>>,
    #[serde(rename = "analyticsEnabled", skip_serializing_if = "Option::is_none")]
    pub analytics_enabled: Option<SuccessWrapper<bool>>,
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip_nested_content() {
        // Nested braces in content must survive structural parsing.
        let raw = r#"{"action":"SET_CONFIGURATION_STATE","content":{"requestID":"r1","Interaction":{"HoverAndHold":{"HoverStartTimeS":0.7}}}}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.action, "SET_CONFIGURATION_STATE");
        assert_eq!(
            envelope.content["Interaction"]["HoverAndHold"]["HoverStartTimeS"],
            0.7
        );
    }

    #[test]
    fn test_flags_roundtrip_all_combinations() {
        for interaction in [
            InteractionType::Grab,
            InteractionType::Hover,
            InteractionType::Push,
            InteractionType::Touchplane,
            InteractionType::Velocityswipe,
        ] {
            for input in [
                InputType::None,
                InputType::Cancel,
                InputType::Down,
                InputType::Move,
                InputType::Up,
            ] {
                for chirality in [Chirality::Left, Chirality::Right] {
                    for hand_type in [HandType::Primary, HandType::Secondary] {
                        let flags = pack_flags(interaction, hand_type, chirality, input);
                        assert_eq!(interaction_from_flags(flags), interaction);
                        assert_eq!(input_type_from_flags(flags), input);
                        assert_eq!(chirality_from_flags(flags), chirality);
                        assert_eq!(hand_type_from_flags(flags), hand_type);
                    }
                }
            }
        }
    }

    #[test]
    fn test_empty_flags_use_documented_defaults() {
        assert_eq!(chirality_from_flags(0), Chirality::Right);
        assert_eq!(hand_type_from_flags(0), HandType::Primary);
        assert_eq!(input_type_from_flags(0), InputType::None);
        assert_eq!(interaction_from_flags(0), InteractionType::Push);
    }

    #[test]
    fn test_cancel_wins_over_other_input_bits() {
        let flags = FLAG_CANCEL | FLAG_UP | FLAG_DOWN | FLAG_MOVE;
        assert_eq!(input_type_from_flags(flags), InputType::Cancel);
    }

    #[test]
    fn test_wire_input_action_field_names() {
        let action = InputAction {
            timestamp_us: 123,
            interaction: InteractionType::Push,
            hand_type: HandType::Primary,
            chirality: Chirality::Right,
            input_type: InputType::Move,
            cursor_position: Vec2::new(10.0, 20.0),
            distance_from_screen_m: 0.1,
            progress_to_click: 0.5,
        };
        let wire = WireInputAction::from(&action);
        let json = serde_json::to_string(&wire).unwrap();
        assert!(json.contains("\"Timestamp\":123"));
        assert!(json.contains("\"InteractionFlags\""));
        assert!(json.contains("\"CursorPosition\":{\"x\":10.0,\"y\":20.0}"));
        assert!(json.contains("\"ProgressToClick\":0.5"));

        assert_eq!(wire.unpack(), action, "pack/unpack must be lossless");
    }

    #[test]
    fn test_response_uses_request_id_casing() {
        let response = ResponseToClient::success("abc", "ok", "{}");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"requestID\":\"abc\""));
        assert!(json.contains("\"originalRequest\""));
    }
}
