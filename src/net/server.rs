//! WebSocket front end: accepts connections, runs one reader and one
//! writer task per session, drains the action queue on the dispatch
//! tick, and sweeps stale response callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::{InteractionConfig, PhysicalConfig, SharedConfig};
use crate::queue::ActionQueue;

use super::callbacks::{CallbackRegistry, SWEEP_INTERVAL};
use super::codes::ActionCode;
use super::registry::{ConnectionRegistry, SESSION_QUEUE_CAPACITY};
use super::session::{ProtocolSession, RoutedRequest, SessionOutput};
use super::version::API_VERSION;
use super::wire::{
    ConfigStateMessage, Envelope, MaskingData, ResponseToClient, ServiceStatusMessage,
    SuccessWrapper, TrackingApiState, TrackingServiceState,
};

/// Everything the protocol front end shares with the pipeline.
pub struct ServerContext {
    pub config: SharedConfig,
    pub queue: Arc<ActionQueue>,
    pub registry: Arc<ConnectionRegistry>,
    pub callbacks: Arc<CallbackRegistry>,
    pub tracking: mpsc::Sender<TrackingRequest>,
    /// Whether the upstream tracking connection is live; owned by the
    /// sensor loop, read for service status.
    pub tracking_connected: Arc<AtomicBool>,
}

/// Bind and serve until the task is cancelled.
pub async fn run(bind_addr: &str, dispatch_hz: u32, ctx: Arc<ServerContext>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding websocket listener on {bind_addr}"))?;
    info!(addr = %listener.local_addr()?, "listening for client connections");
    serve(listener, dispatch_hz, ctx).await
}

/// Serve on an already-bound listener (tests bind to an OS port first).
pub async fn serve(
    listener: TcpListener,
    dispatch_hz: u32,
    ctx: Arc<ServerContext>,
) -> anyhow::Result<()> {
    spawn_dispatch_tick(dispatch_hz, ctx.clone());
    spawn_callback_sweep(ctx.callbacks.clone());

    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "incoming connection");
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, ctx).await {
                debug!(%peer, %err, "connection ended");
            }
        });
    }
}

/// Drain one action per tick and broadcast it.
fn spawn_dispatch_tick(dispatch_hz: u32, ctx: Arc<ServerContext>) {
    let period = Duration::from_micros(1_000_000 / u64::from(dispatch_hz.max(1)));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Some(action) = ctx.queue.drain_one() {
                ctx.registry.broadcast_input_action(&action);
            }
        }
    });
}

fn spawn_callback_sweep(callbacks: Arc<CallbackRegistry>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick of a tokio interval is immediate; skip it so
        // nothing registered at startup is swept early.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            callbacks.sweep(SWEEP_INTERVAL);
        }
    });
}

async fn handle_connection(stream: TcpStream, ctx: Arc<ServerContext>) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();

    let (tx, mut rx) = mpsc::channel::<String>(SESSION_QUEUE_CAPACITY);
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let id = ctx.registry.next_session_id();
    let mut session = ProtocolSession::new(id);
    info!(session = id, "websocket connection opened");

    while let Some(message) = source.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                debug!(session = id, %err, "websocket read error");
                break;
            }
        };
        match message {
            Message::Text(text) => {
                for output in session.handle_message(&text) {
                    match output {
                        SessionOutput::Send(json) => {
                            if tx.send(json).await.is_err() {
                                break;
                            }
                        }
                        SessionOutput::Activated => {
                            let cached = ctx.registry.attach(id, tx.clone());
                            let payload = ConnectionRegistry::presence_payload(cached);
                            let _ = tx.send(payload).await;
                        }
                        SessionOutput::Route(request) => {
                            handle_routed(request, &ctx, &tx).await;
                        }
                    }
                }
            }
            Message::Close(_) => break,
            // Pings are answered by the protocol layer on the next write.
            _ => {}
        }
    }

    session.close();
    ctx.registry.detach(id);
    drop(tx);
    let _ = writer.await;
    info!(session = id, "websocket connection closed");
    Ok(())
}

// ── Routed request handling ────────────────────────────────

fn request_id_of(content: &Value) -> Option<String> {
    let id = content.get("requestID")?.as_str()?;
    (!id.is_empty()).then(|| id.to_string())
}

async fn send_envelope<T: serde::Serialize>(
    tx: &mpsc::Sender<String>,
    action: ActionCode,
    content: &T,
) {
    let _ = tx.send(Envelope::new(action, content).to_json()).await;
}

async fn handle_routed(request: RoutedRequest, ctx: &ServerContext, tx: &mpsc::Sender<String>) {
    match request.action {
        ActionCode::SetConfigurationState => handle_set_config(request, ctx, tx).await,
        ActionCode::RequestConfigurationState => handle_get_config(request, ctx, tx).await,
        ActionCode::RequestServiceStatus => handle_service_status(request, ctx, tx).await,
        ActionCode::GetTrackingState | ActionCode::SetTrackingState => {
            handle_tracking_state(request, ctx, tx).await
        }
        other => {
            warn!(action = other.as_str(), "routed request has no handler");
        }
    }
}

async fn handle_set_config(request: RoutedRequest, ctx: &ServerContext, tx: &mpsc::Sender<String>) {
    let original = request.content.to_string();
    let Some(request_id) = request_id_of(&request.content) else {
        let response = ResponseToClient::failure(
            "",
            "Configuration change rejected: missing or invalid requestID",
            &original,
        );
        send_envelope(tx, ActionCode::ConfigurationResponse, &response).await;
        return;
    };

    let interaction = match optional_field::<InteractionConfig>(&request.content, "interaction") {
        Ok(value) => value,
        Err(err) => {
            let response = ResponseToClient::failure(
                &request_id,
                &format!("Configuration change rejected: {err}"),
                &original,
            );
            send_envelope(tx, ActionCode::ConfigurationResponse, &response).await;
            return;
        }
    };
    let physical = match optional_field::<PhysicalConfig>(&request.content, "physical") {
        Ok(value) => value,
        Err(err) => {
            let response = ResponseToClient::failure(
                &request_id,
                &format!("Configuration change rejected: {err}"),
                &original,
            );
            send_envelope(tx, ActionCode::ConfigurationResponse, &response).await;
            return;
        }
    };

    {
        let mut store = ctx.config.write().unwrap();
        if let Some(interaction) = interaction {
            store.set_interaction(interaction);
        }
        if let Some(physical) = physical {
            store.set_physical(physical);
        }
    }

    let response = ResponseToClient::success(&request_id, "Configuration updated", &original);
    send_envelope(tx, ActionCode::ConfigurationResponse, &response).await;
}

fn optional_field<T: serde::de::DeserializeOwned>(
    content: &Value,
    key: &str,
) -> Result<Option<T>, String> {
    match content.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|err| format!("invalid `{key}` content: {err}")),
    }
}

async fn handle_get_config(request: RoutedRequest, ctx: &ServerContext, tx: &mpsc::Sender<String>) {
    let Some(request_id) = request_id_of(&request.content) else {
        let response = ResponseToClient::failure(
            "",
            "Configuration state request rejected: missing or invalid requestID",
            &request.content.to_string(),
        );
        send_envelope(tx, ActionCode::ConfigurationResponse, &response).await;
        return;
    };

    let message = {
        let store = ctx.config.read().unwrap();
        ConfigStateMessage {
            request_id,
            interaction: store.interaction().clone(),
            physical: store.physical().clone(),
        }
    };
    send_envelope(tx, ActionCode::ConfigurationState, &message).await;
}

async fn handle_service_status(
    request: RoutedRequest,
    ctx: &ServerContext,
    tx: &mpsc::Sender<String>,
) {
    let Some(request_id) = request_id_of(&request.content) else {
        let response = ResponseToClient::failure(
            "",
            "Service status request rejected: missing or invalid requestID",
            &request.content.to_string(),
        );
        send_envelope(tx, ActionCode::ServiceStatusResponse, &response).await;
        return;
    };

    let tracking_state = if ctx.tracking_connected.load(Ordering::Relaxed) {
        TrackingServiceState::Connected
    } else {
        TrackingServiceState::Unavailable
    };
    let message = ServiceStatusMessage {
        request_id,
        tracking_service_state: tracking_state,
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        api_version: API_VERSION.to_string(),
    };
    send_envelope(tx, ActionCode::ServiceStatus, &message).await;
}

async fn handle_tracking_state(
    request: RoutedRequest,
    ctx: &ServerContext,
    tx: &mpsc::Sender<String>,
) {
    let is_get = request.action == ActionCode::GetTrackingState;
    let response_code = if is_get {
        ActionCode::GetTrackingStateResponse
    } else {
        ActionCode::SetTrackingStateResponse
    };

    let Some(request_id) = request_id_of(&request.content) else {
        let response = ResponseToClient::failure(
            "",
            "Tracking state request rejected: missing or invalid requestID",
            &request.content.to_string(),
        );
        send_envelope(tx, response_code, &response).await;
        return;
    };

    // The tracking connection answers asynchronously; correlate the
    // response back to this session through the callback registry. If
    // it never answers, the sweep reclaims the entry.
    let reply_tx = tx.clone();
    ctx.callbacks.register(&request_id, move |state| {
        let envelope = Envelope {
            action: response_code.as_str().to_string(),
            content: state,
        };
        let _ = reply_tx.try_send(envelope.to_json());
    });

    let forwarded = ctx
        .tracking
        .try_send(TrackingRequest {
            is_get,
            request_id: request_id.clone(),
            content: request.content,
        })
        .is_ok();
    if !forwarded {
        warn!(request_id = %request_id, "tracking connection unavailable; request will expire");
    }
}

// ── Tracking connection ────────────────────────────────────

/// A get or set forwarded to the tracking connection task.
#[derive(Debug)]
pub struct TrackingRequest {
    pub is_get: bool,
    pub request_id: String,
    pub content: Value,
}

#[derive(Debug, Default)]
struct TrackingStore {
    mask: MaskingData,
    allow_images: bool,
    camera_reversed: bool,
    analytics_enabled: bool,
}

impl TrackingStore {
    fn full_state(&self, request_id: String) -> TrackingApiState {
        TrackingApiState {
            request_id,
            mask: Some(SuccessWrapper::ok(self.mask)),
            allow_images: Some(SuccessWrapper::ok(self.allow_images)),
            camera_reversed: Some(SuccessWrapper::ok(self.camera_reversed)),
            analytics_enabled: Some(SuccessWrapper::ok(self.analytics_enabled)),
        }
    }

    /// Apply the fields present in a set request; the response echoes a
    /// wrapper per field that was touched.
    fn apply(&mut self, request_id: String, content: &Value) -> TrackingApiState {
        let mut state = TrackingApiState {
            request_id,
            ..TrackingApiState::default()
        };

        if let Some(mask) = content.get("mask") {
            if let Ok(mask) = serde_json::from_value::<MaskingData>(mask.clone()) {
                self.mask = mask;
                state.mask = Some(SuccessWrapper::ok(mask));
            }
        }
        if let Some(allow) = content.get("allowImages").and_then(Value::as_bool) {
            self.allow_images = allow;
            state.allow_images = Some(SuccessWrapper::ok(allow));
        }
        if let Some(reversed) = content.get("cameraReversed").and_then(Value::as_bool) {
            self.camera_reversed = reversed;
            state.camera_reversed = Some(SuccessWrapper::ok(reversed));
        }
        if let Some(analytics) = content.get("analyticsEnabled").and_then(Value::as_bool) {
            self.analytics_enabled = analytics;
            state.analytics_enabled = Some(SuccessWrapper::ok(analytics));
        }
        state
    }
}

/// Spawn the in-process tracking connection: consumes forwarded
/// requests, mutates its state, and resolves the matching callback.
pub fn spawn_tracking_task(callbacks: Arc<CallbackRegistry>) -> mpsc::Sender<TrackingRequest> {
    let (tx, mut rx) = mpsc::channel::<TrackingRequest>(32);
    tokio::spawn(async move {
        let mut store = TrackingStore::default();
        while let Some(request) = rx.recv().await {
            let state = if request.is_get {
                store.full_state(request.request_id.clone())
            } else {
                store.apply(request.request_id.clone(), &request.content)
            };
            let value = serde_json::to_value(&state).unwrap_or(Value::Null);
            callbacks.resolve(&request.request_id, value);
        }
    });
    tx
}

// ── Tests ──────────────────────────────────────────────────
