//! Protocol action codes and their service-side classification.

use serde::{Deserialize, Serialize};

/// Every message type the protocol knows, client- and service-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionCode {
    InputAction,

    ConfigurationState,
    ConfigurationResponse,
    SetConfigurationState,
    RequestConfigurationState,

    VersionHandshake,
    VersionHandshakeResponse,

    HandPresenceEvent,

    RequestServiceStatus,
    ServiceStatusResponse,
    ServiceStatus,

    GetTrackingState,
    GetTrackingStateResponse,
    SetTrackingState,
    SetTrackingStateResponse,
}

impl ActionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputAction => "INPUT_ACTION",
            Self::ConfigurationState => "CONFIGURATION_STATE",
            Self::ConfigurationResponse => "CONFIGURATION_RESPONSE",
            Self::SetConfigurationState => "SET_CONFIGURATION_STATE",
            Self::RequestConfigurationState => "REQUEST_CONFIGURATION_STATE",
            Self::VersionHandshake => "VERSION_HANDSHAKE",
            Self::VersionHandshakeResponse => "VERSION_HANDSHAKE_RESPONSE",
            Self::HandPresenceEvent => "HAND_PRESENCE_EVENT",
            Self::RequestServiceStatus => "REQUEST_SERVICE_STATUS",
            Self::ServiceStatusResponse => "SERVICE_STATUS_RESPONSE",
            Self::ServiceStatus => "SERVICE_STATUS",
            Self::GetTrackingState => "GET_TRACKING_STATE",
            Self::GetTrackingStateResponse => "GET_TRACKING_STATE_RESPONSE",
            Self::SetTrackingState => "SET_TRACKING_STATE",
            Self::SetTrackingStateResponse => "SET_TRACKING_STATE_RESPONSE",
        }
    }

    pub fn parse(s: &str) -> Option<ActionCode> {
        Some(match s {
            "INPUT_ACTION" => Self::InputAction,
            "CONFIGURATION_STATE" => Self::ConfigurationState,
            "CONFIGURATION_RESPONSE" => Self::ConfigurationResponse,
            "SET_CONFIGURATION_STATE" => Self::SetConfigurationState,
            "REQUEST_CONFIGURATION_STATE" => Self::RequestConfigurationState,
            "VERSION_HANDSHAKE" => Self::VersionHandshake,
            "VERSION_HANDSHAKE_RESPONSE" => Self::VersionHandshakeResponse,
            "HAND_PRESENCE_EVENT" => Self::HandPresenceEvent,
            "REQUEST_SERVICE_STATUS" => Self::RequestServiceStatus,
            "SERVICE_STATUS_RESPONSE" => Self::ServiceStatusResponse,
            "SERVICE_STATUS" => Self::ServiceStatus,
            "GET_TRACKING_STATE" => Self::GetTrackingState,
            "GET_TRACKING_STATE_RESPONSE" => Self::GetTrackingStateResponse,
            "SET_TRACKING_STATE" => Self::SetTrackingState,
            "SET_TRACKING_STATE_RESPONSE" => Self::SetTrackingStateResponse,
            _ => return None,
        })
    }

    /// Requests the service routes to a handler.
    pub fn handled_by_service(&self) -> bool {
        matches!(
            self,
            Self::SetConfigurationState
                | Self::RequestConfigurationState
                | Self::RequestServiceStatus
                | Self::GetTrackingState
                | Self::SetTrackingState
                | Self::VersionHandshake
        )
    }

    /// Codes only the service itself emits; receiving one is a client bug.
    pub fn unexpected_on_service(&self) -> bool {
        !self.handled_by_service()
    }
}
