//! Per-connection protocol state machine.
//!
//! Pure message-in/messages-out: the server layer owns the socket and
//! feeds text frames through [`ProtocolSession::handle_message`]. The
//! session gates everything behind the version handshake and routes
//! recognised requests onward; it never touches IO itself.

use serde_json::Value;
use tracing::{debug, error, warn};

use super::codes::ActionCode;
use super::version::{compatibility, Version, API_HEADER_NAME, API_VERSION};
use super::wire::{Envelope, HandshakeResponse, ResponseToClient};

/// Connection lifecycle. There is no path back to `AwaitingHandshake`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Active,
    Closed,
}

/// A post-handshake request the server must answer.
#[derive(Debug, Clone)]
pub struct RoutedRequest {
    pub action: ActionCode,
    pub content: Value,
}

/// What a handled message produced.
#[derive(Debug)]
pub enum SessionOutput {
    /// Serialized envelope to send back on this connection.
    Send(String),
    /// The handshake just completed; attach to the broadcast set and
    /// deliver the cached hand-presence state.
    Activated,
    /// A recognised request for the service layer.
    Route(RoutedRequest),
}

#[derive(Debug)]
pub struct ProtocolSession {
    id: u64,
    state: SessionState,
}

impl ProtocolSession {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: SessionState::AwaitingHandshake,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    pub fn handshake_completed(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Handle one inbound text frame.
    pub fn handle_message(&mut self, raw: &str) -> Vec<SessionOutput> {
        if self.state == SessionState::Closed {
            return Vec::new();
        }

        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                // No envelope means no requestID to answer to.
                warn!(session = self.id, %err, "malformed message envelope; dropping");
                return Vec::new();
            }
        };

        if self.state == SessionState::AwaitingHandshake {
            return self.process_handshake(&envelope);
        }

        let Some(action) = ActionCode::parse(&envelope.action) else {
            error!(
                session = self.id,
                action = %envelope.action,
                "received an unrecognised action; dropping"
            );
            return Vec::new();
        };

        match action {
            ActionCode::VersionHandshake => {
                // A second handshake is a protocol error, answered in
                // band; the session stays Active.
                let request_id = request_id_of(&envelope.content).unwrap_or_default();
                let response = ResponseToClient::failure(
                    &request_id,
                    "Handshake already completed on this connection.",
                    &envelope.content.to_string(),
                );
                error!(session = self.id, "duplicate version handshake rejected");
                vec![SessionOutput::Send(
                    Envelope::new(ActionCode::VersionHandshakeResponse, &response).to_json(),
                )]
            }
            _ if action.handled_by_service() => {
                debug!(session = self.id, action = action.as_str(), "routing request");
                vec![SessionOutput::Route(RoutedRequest {
                    action,
                    content: envelope.content,
                })]
            }
            _ => {
                error!(
                    session = self.id,
                    action = action.as_str(),
                    "received a service-only action; dropping"
                );
                Vec::new()
            }
        }
    }

    fn process_handshake(&mut self, envelope: &Envelope) -> Vec<SessionOutput> {
        let original_request = envelope.content.to_string();

        let Some(request_id) = request_id_of(&envelope.content) else {
            return self.handshake_failure(
                "",
                "Handshaking failed. This is due to a missing or invalid requestID",
                &original_request,
            );
        };

        if ActionCode::parse(&envelope.action) != Some(ActionCode::VersionHandshake) {
            return self.handshake_failure(
                &request_id,
                "Request Rejected: Requests cannot be processed until handshaking is complete.",
                &original_request,
            );
        }

        let Some(client_version) = envelope.content.get(API_HEADER_NAME).and_then(Value::as_str)
        else {
            return self.handshake_failure(
                &request_id,
                "Handshaking Failed: No API Version supplied.",
                &original_request,
            );
        };

        let Ok(client_version) = client_version.parse::<Version>() else {
            return self.handshake_failure(
                &request_id,
                "Handshaking Failed: Invalid API Version supplied.",
                &original_request,
            );
        };

        use super::version::Compatibility::*;
        match compatibility(client_version, API_VERSION) {
            Compatible => self.handshake_success(&request_id, "Handshake Successful.", &original_request),
            ClientOutdatedWarning => self.handshake_success(
                &request_id,
                "Handshake Warning: Client is outdated relative to Service.",
                &original_request,
            ),
            ServiceOutdatedWarning => self.handshake_success(
                &request_id,
                "Handshake Warning: Service is outdated relative to Client.",
                &original_request,
            ),
            ClientOutdated => self.handshake_failure(
                &request_id,
                "Handshake Failed: Client is outdated relative to Service.",
                &original_request,
            ),
            ServiceOutdated => self.handshake_failure(
                &request_id,
                "Handshake Failed: Service is outdated relative to Client.",
                &original_request,
            ),
        }
    }

    fn handshake_response(response: ResponseToClient) -> SessionOutput {
        let payload = HandshakeResponse {
            response,
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            api_version: API_VERSION.to_string(),
        };
        SessionOutput::Send(
            Envelope::new(ActionCode::VersionHandshakeResponse, &payload).to_json(),
        )
    }

    fn handshake_failure(
        &self,
        request_id: &str,
        message: &str,
        original_request: &str,
    ) -> Vec<SessionOutput> {
        error!(session = self.id, reason = message, "handshake rejected");
        vec![Self::handshake_response(ResponseToClient::failure(
            request_id,
            message,
            original_request,
        ))]
    }

    fn handshake_success(
        &mut self,
        request_id: &str,
        message: &str,
        original_request: &str,
    ) -> Vec<SessionOutput> {
        self.state = SessionState::Active;
        debug!(session = self.id, detail = message, "handshake completed");
        vec![
            Self::handshake_response(ResponseToClient::success(
                request_id,
                message,
                original_request,
            )),
            SessionOutput::Activated,
        ]
    }
}

/// Non-empty `requestID` out of a content object.
fn request_id_of(content: &Value) -> Option<String> {
    let id = content.get("requestID")?.as_str()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

// ── Tests ──────────────────────────────────────────────────
