//! The session actor: one connection, its registry, and its pending requests.
//!
//! [`Session::spawn`] starts a task that exclusively owns all mutable state.
//! Callers talk to it through a cloneable [`SessionHandle`]. Every command,
//! inbound frame, timer, and connect outcome is handled as one turn of a
//! single `select!` loop, so a turn never observes another half-done.
//!
//! Connection lifecycle:
//!
//! ```text
//! Idle ──ensure_connected──▶ Connecting ──ok──▶ Connected
//!                               │  ▲                │
//!                          fail │  │ delay elapsed  │ socket closed
//!                               ▼  │                ▼
//!                           Reconnecting { attempt } ◀┘
//!                               │
//!                               └── policy exhausted ──▶ Stopped
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domlink_core::{
    ActionId, BridgeError, DestinationUri, InboundFrame, OutboundFrame, ProtocolError,
    QueuedAction, decode_inbound,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::SessionConfig;
use crate::dispatch::ActionDispatch;
use crate::encoder::{OutboundEncoder, action_response_frame, tool_frame};
use crate::pending::{PendingRequestTable, Responder};
use crate::receiver::Receiver;
use crate::registry::{DestinationSnapshot, ReceiverRegistry, RegisterOutcome, RouteOutcome};
use crate::transport::{Connection, Connector};

/// Observable connection state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ConnectionState {
    /// No connection has been requested yet.
    Idle,
    /// First connection attempt in flight.
    Connecting,
    /// Socket open.
    Connected,
    /// Waiting for, or running, reconnect attempt `attempt` (1-based).
    Reconnecting {
        /// Attempt number since the last successful connection.
        attempt: u32,
    },
    /// Reconnects abandoned, or the session was shut down.
    Stopped,
}

/// Point-in-time view of a session, for diagnostics.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Connection state at snapshot time.
    pub connection: ConnectionState,
    /// Outstanding response-tracked requests.
    pub pending_requests: usize,
    /// Per-destination lifecycle state, sorted by URI.
    pub destinations: Vec<DestinationSnapshot>,
    /// When the last `sync-response` arrived.
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Inbound frames read from the socket.
    pub frames_received: u64,
    /// Inbound frames discarded as undecodable, unknown, or unroutable.
    pub frames_discarded: u64,
    /// Live action subscribers.
    pub action_subscribers: usize,
}

impl SessionSnapshot {
    /// Look up one destination.
    pub fn destination(&self, uri: &str) -> Option<&DestinationSnapshot> {
        self.destinations.iter().find(|d| d.uri.as_str() == uri)
    }

    /// Operations buffered across all destinations.
    pub fn buffered_total(&self) -> usize {
        self.destinations.iter().map(|d| d.buffered).sum()
    }
}

enum Command {
    EnsureConnected {
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },
    Register {
        uri: DestinationUri,
        receiver: Box<dyn Receiver>,
        reply: oneshot::Sender<RegisterOutcome>,
    },
    Unregister {
        uri: DestinationUri,
        reply: oneshot::Sender<bool>,
    },
    InvokeTool {
        tool_name: String,
        uri: DestinationUri,
        params: Map<String, Value>,
        responder: Option<Responder>,
    },
    RespondToAction {
        action_id: ActionId,
        result: Option<Value>,
        error: Option<String>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable handle to a running session.
///
/// Once the session stops every method fails with
/// [`BridgeError::SessionClosed`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    dispatch: ActionDispatch,
    state: watch::Receiver<ConnectionState>,
}

impl SessionHandle {
    /// Reuse the open connection, join an attempt in flight, or start one.
    ///
    /// Resolves with the outcome of the attempt joined. A failed attempt
    /// still leaves a reconnect scheduled.
    pub async fn ensure_connected(&self) -> Result<(), BridgeError> {
        self.request(|reply| Command::EnsureConnected { reply }).await?
    }

    /// Bind `receiver` to `uri` and replay anything buffered for it.
    ///
    /// Announces the destination to the server with `uri-active` when
    /// connected. A previous receiver for `uri` is dropped.
    pub async fn register(
        &self,
        uri: impl Into<DestinationUri>,
        receiver: impl Receiver + 'static,
    ) -> Result<RegisterOutcome, BridgeError> {
        let uri = uri.into();
        self.request(|reply| Command::Register {
            uri,
            receiver: Box::new(receiver),
            reply,
        })
        .await
    }

    /// Detach the receiver for `uri`, keeping its buffer.
    pub async fn unregister(&self, uri: impl Into<DestinationUri>) -> Result<bool, BridgeError> {
        let uri = uri.into();
        self.request(|reply| Command::Unregister { uri, reply }).await
    }

    /// Send a `tool` frame without tracking a response.
    ///
    /// Dropped silently when the socket is not open.
    pub async fn invoke_tool(
        &self,
        tool_name: impl Into<String>,
        uri: impl Into<DestinationUri>,
        params: Map<String, Value>,
    ) -> Result<(), BridgeError> {
        self.send(Command::InvokeTool {
            tool_name: tool_name.into(),
            uri: uri.into(),
            params,
            responder: None,
        })
        .await
    }

    /// Send a `tool` frame and wait for the matching `ui-message-response`.
    ///
    /// Fails immediately with [`BridgeError::NotConnected`] when the socket
    /// is not open, and with [`BridgeError::Timeout`] when no response
    /// arrives within the request timeout.
    pub async fn invoke_tool_and_wait(
        &self,
        tool_name: impl Into<String>,
        uri: impl Into<DestinationUri>,
        params: Map<String, Value>,
    ) -> Result<Value, BridgeError> {
        let tool_name = tool_name.into();
        let uri = uri.into();
        self.request(|responder| Command::InvokeTool {
            tool_name,
            uri,
            params,
            responder: Some(responder),
        })
        .await?
    }

    /// Answer a queued action. Fire-and-forget.
    pub async fn respond_to_action(
        &self,
        action_id: impl Into<ActionId>,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<(), BridgeError> {
        self.send(Command::RespondToAction {
            action_id: action_id.into(),
            result,
            error,
        })
        .await
    }

    /// Subscribe to queued actions. Every subscriber sees every action
    /// queued after it subscribed.
    pub fn subscribe_actions(&self) -> broadcast::Receiver<QueuedAction> {
        self.dispatch.subscribe()
    }

    /// Watch the connection state.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Capture diagnostics.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, BridgeError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stop the session. Outstanding tracked requests fail with
    /// [`BridgeError::SessionClosed`]. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.request(|reply| Command::Shutdown { reply }).await;
    }

    async fn send(&self, command: Command) -> Result<(), BridgeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| BridgeError::SessionClosed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| BridgeError::SessionClosed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Actor
// ─────────────────────────────────────────────────────────────────────────────

enum Link {
    Idle,
    Connecting,
    Open { inbound: mpsc::Receiver<String> },
    Waiting { at: Instant },
    Stopped,
}

/// Session actor. Constructed only through [`Session::spawn`].
pub struct Session {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    registry: ReceiverRegistry,
    pending: PendingRequestTable,
    encoder: OutboundEncoder,
    dispatch: ActionDispatch,
    state_tx: watch::Sender<ConnectionState>,
    link: Link,
    waiters: Vec<oneshot::Sender<Result<(), BridgeError>>>,
    attempt: u32,
    connect_tx: mpsc::UnboundedSender<Result<Connection, BridgeError>>,
    connect_rx: mpsc::UnboundedReceiver<Result<Connection, BridgeError>>,
    last_sync_at: Option<DateTime<Utc>>,
    frames_received: u64,
    frames_discarded: u64,
}

impl Session {
    /// Start a session task on the current runtime.
    ///
    /// Nothing connects until [`SessionHandle::ensure_connected`] is called.
    pub fn spawn(config: SessionConfig, connector: Arc<dyn Connector>) -> SessionHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let (connect_tx, connect_rx) = mpsc::unbounded_channel();
        let dispatch = ActionDispatch::new(config.action_channel_capacity);

        let session = Self {
            pending: PendingRequestTable::new(config.request_timeout),
            config,
            connector,
            registry: ReceiverRegistry::new(),
            encoder: OutboundEncoder::new(),
            dispatch: dispatch.clone(),
            state_tx,
            link: Link::Idle,
            waiters: Vec::new(),
            attempt: 0,
            connect_tx,
            connect_rx,
            last_sync_at: None,
            frames_received: 0,
            frames_discarded: 0,
        };
        let _ = tokio::spawn(session.run(cmd_rx));

        SessionHandle {
            commands: cmd_tx,
            dispatch,
            state: state_rx,
        }
    }

    #[instrument(skip_all, fields(url = %self.config.url))]
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let shutdown_reply = loop {
            let expiry = self.pending.next_deadline();
            let retry_at = match self.link {
                Link::Waiting { at } => Some(at),
                _ => None,
            };

            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => break Some(reply),
                    Some(cmd) => self.handle_command(cmd),
                    None => break None,
                },
                Some(outcome) = self.connect_rx.recv() => self.on_connect_outcome(outcome),
                frame = next_inbound(&mut self.link) => match frame {
                    Some(text) => self.handle_frame(&text),
                    None => self.on_close(),
                },
                () = sleep_until_opt(expiry) => {
                    let _ = self.pending.expire(Instant::now());
                }
                () = sleep_until_opt(retry_at) => self.start_connect(),
            }
        };

        self.encoder.detach();
        self.link = Link::Stopped;
        self.set_state(ConnectionState::Stopped);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(BridgeError::SessionClosed));
        }
        if !self.pending.is_empty() {
            warn!(pending = self.pending.len(), "abandoning unanswered requests");
        }
        info!("session stopped");
        // Dropping the table drops every responder; callers see SessionClosed.
        drop(self);
        drop(commands);
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    // ── commands ────────────────────────────────────────────────────────

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::EnsureConnected { reply } => self.ensure_connected(reply),
            Command::Register {
                uri,
                receiver,
                reply,
            } => {
                self.send_best_effort(&OutboundFrame::UriActive { uri: uri.clone() });
                let outcome = self.registry.register(uri, receiver);
                let _ = reply.send(outcome);
            }
            Command::Unregister { uri, reply } => {
                let _ = reply.send(self.registry.unregister(&uri));
            }
            Command::InvokeTool {
                tool_name,
                uri,
                params,
                responder,
            } => self.invoke_tool(tool_name, &uri, params, responder),
            Command::RespondToAction {
                action_id,
                result,
                error,
            } => {
                self.send_best_effort(&action_response_frame(action_id, result, error));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            // Handled by the run loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn ensure_connected(&mut self, reply: oneshot::Sender<Result<(), BridgeError>>) {
        match self.link {
            Link::Open { .. } => {
                let _ = reply.send(Ok(()));
            }
            Link::Connecting => self.waiters.push(reply),
            Link::Idle | Link::Waiting { .. } | Link::Stopped => {
                if matches!(self.link, Link::Stopped) {
                    self.attempt = 0;
                }
                self.waiters.push(reply);
                self.start_connect();
            }
        }
    }

    fn invoke_tool(
        &mut self,
        tool_name: String,
        uri: &DestinationUri,
        params: Map<String, Value>,
        responder: Option<Responder>,
    ) {
        let Some(responder) = responder else {
            let frame = tool_frame(tool_name, uri, params, None);
            if let Err(e) = self.encoder.send(&frame) {
                debug!(%uri, error = %e, "dropping tool frame");
            }
            return;
        };

        if !self.encoder.is_open() {
            debug!(%uri, tool = %tool_name, "tracked tool call while disconnected");
            let _ = responder.send(Err(BridgeError::NotConnected));
            return;
        }

        let message_id = self.pending.create(responder, Instant::now());
        debug!(%uri, tool = %tool_name, %message_id, "tracked tool call");
        let frame = tool_frame(tool_name, uri, params, Some(message_id.clone()));
        if let Err(e) = self.encoder.send(&frame) {
            let _ = self.pending.reject(&message_id, e);
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection: *self.state_tx.borrow(),
            pending_requests: self.pending.len(),
            destinations: self.registry.snapshot(),
            last_sync_at: self.last_sync_at,
            frames_received: self.frames_received,
            frames_discarded: self.frames_discarded,
            action_subscribers: self.dispatch.subscriber_count(),
        }
    }

    // ── connection ──────────────────────────────────────────────────────

    fn start_connect(&mut self) {
        self.link = Link::Connecting;
        if self.attempt == 0 {
            self.set_state(ConnectionState::Connecting);
        } else {
            self.set_state(ConnectionState::Reconnecting {
                attempt: self.attempt,
            });
        }
        debug!(attempt = self.attempt, "opening connection");

        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        let limit = self.config.connect_timeout;
        let tx = self.connect_tx.clone();
        let _ = tokio::spawn(async move {
            // A handshake that never completes must still yield an outcome,
            // or no reconnect is ever scheduled.
            let outcome = tokio::time::timeout(limit, connector.connect(&url))
                .await
                .unwrap_or_else(|_| {
                    Err(BridgeError::ConnectFailed {
                        url: url.clone(),
                        reason: format!("handshake timed out after {}ms", limit.as_millis()),
                    })
                });
            let _ = tx.send(outcome);
        });
    }

    fn on_connect_outcome(&mut self, outcome: Result<Connection, BridgeError>) {
        match outcome {
            Ok(conn) => {
                self.encoder.attach(conn.outbound);
                self.link = Link::Open {
                    inbound: conn.inbound,
                };
                self.attempt = 0;
                self.set_state(ConnectionState::Connected);
                info!("connected");

                self.send_best_effort(&OutboundFrame::Sync);
                for uri in self.registry.bound_uris() {
                    self.send_best_effort(&OutboundFrame::UriActive { uri });
                }
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(Ok(()));
                }
            }
            Err(e) => {
                warn!(attempt = self.attempt, error = %e, "connect failed");
                for waiter in self.waiters.drain(..) {
                    let _ = waiter.send(Err(e.clone()));
                }
                self.schedule_reconnect();
            }
        }
    }

    fn on_close(&mut self) {
        warn!(pending = self.pending.len(), "connection lost");
        self.encoder.detach();
        self.attempt = 0;
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
        if let Some(delay) = self.config.reconnect.delay_for_attempt(self.attempt) {
            info!(
                attempt = self.attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "scheduling reconnect"
            );
            self.link = Link::Waiting {
                at: Instant::now() + delay,
            };
            self.set_state(ConnectionState::Reconnecting {
                attempt: self.attempt,
            });
            return;
        }

        let attempts = self.attempt - 1;
        warn!(attempts, "reconnect policy exhausted, giving up");
        self.link = Link::Stopped;
        self.set_state(ConnectionState::Stopped);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(BridgeError::ReconnectExhausted { attempts }));
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send_replace(state);
    }

    fn send_best_effort(&self, frame: &OutboundFrame) {
        if let Err(e) = self.encoder.send(frame) {
            debug!(error = %e, "best-effort frame not sent");
        }
    }

    // ── inbound ─────────────────────────────────────────────────────────

    fn handle_frame(&mut self, text: &str) {
        self.frames_received += 1;
        let frame = match decode_inbound(text) {
            Ok(frame) => frame,
            Err(ProtocolError::UnknownType(frame_type)) => {
                debug!(%frame_type, "ignoring unknown frame type");
                self.frames_discarded += 1;
                return;
            }
            Err(e) => {
                warn!(error = %e, "discarding undecodable frame");
                self.frames_discarded += 1;
                return;
            }
        };

        match frame {
            InboundFrame::SyncResponse { timestamp, .. } => {
                // Tree is not applied; bound destinations were re-announced on open.
                self.last_sync_at = Some(Utc::now());
                debug!(?timestamp, "sync response received");
            }
            InboundFrame::RemoteDom { message, .. } => {
                let (uri, op) = message.into_routed();
                if self.registry.route(uri, op) == RouteOutcome::Dropped {
                    self.frames_discarded += 1;
                }
            }
            InboundFrame::ActionQueued { action, .. } => match action {
                Some(action) => {
                    debug!(action_id = %action.id, tool = %action.tool_name, "action queued");
                    let _ = self.dispatch.notify(action);
                }
                None => debug!("action-queued frame without action"),
            },
            InboundFrame::UiMessageReceived { message_id } => {
                debug!(?message_id, "server acknowledged message");
            }
            InboundFrame::UiMessageResponse {
                message_id,
                payload,
            } => {
                let _ = self.pending.settle(&message_id, payload);
            }
        }
    }
}

async fn next_inbound(link: &mut Link) -> Option<String> {
    match link {
        Link::Open { inbound } => inbound.recv().await,
        _ => std::future::pending().await,
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
