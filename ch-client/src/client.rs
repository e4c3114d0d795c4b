//! The chat hub client: connection lifecycle and outbound commands.
//!
//! Owns the single transport connection and its state machine, reconnects
//! with bounded exponential backoff on transient drops, routes inbound hub
//! invocations through the normalizer into the event registry, and exposes
//! the outbound command surface.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use ch_core::config::ServerConfig;
use ch_core::constants;
use ch_core::credentials::TokenProvider;
use ch_core::error::{HubError, HubResult};

use crate::endpoint::resolve_hub_url;
use crate::events::{ChatEvent, ConnectionState, EventRegistry};
use crate::message;
use crate::transport::{HubTransport, TransportEvent, TransportFactory, WebSocketFactory};

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt; doubles each attempt.
    pub base_delay: Duration,
    /// Cap on the per-attempt delay.
    pub max_delay: Duration,
    /// Attempts before the connection settles into `Disconnected`.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(constants::RECONNECT_BASE_DELAY_SECS),
            max_delay: Duration::from_secs(constants::RECONNECT_MAX_DELAY_SECS),
            max_attempts: constants::RECONNECT_MAX_ATTEMPTS,
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for a zero-based attempt number: `base * 2^attempt`,
    /// capped at `max_delay`. Deterministic and non-decreasing.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// Client for the chat hub.
///
/// One instance maintains one connection for a signed-in session. The
/// client is cheap to clone; clones share the connection, state, and
/// subscriber registry. Construct it where the session is set up and hand
/// clones to whatever components need it.
#[derive(Clone)]
pub struct ChatClient {
    config: ServerConfig,
    tokens: Arc<dyn TokenProvider>,
    factory: Arc<dyn TransportFactory>,
    registry: EventRegistry,
    reconnect: ReconnectConfig,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    transport: Arc<Mutex<Option<Arc<dyn HubTransport>>>>,
    pump_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    disconnect_notify: Arc<Notify>,
}

impl ChatClient {
    /// Create a client that connects over WebSockets.
    pub fn new(config: ServerConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_transport_factory(config, tokens, Arc::new(WebSocketFactory))
    }

    /// Create a client with a custom transport factory.
    pub fn with_transport_factory(
        config: ServerConfig,
        tokens: Arc<dyn TokenProvider>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            tokens,
            factory,
            registry: EventRegistry::new(),
            reconnect: ReconnectConfig::default(),
            state_tx: Arc::new(state_tx),
            transport: Arc::new(Mutex::new(None)),
            pump_task: Arc::new(Mutex::new(None)),
            disconnect_notify: Arc::new(Notify::new()),
        }
    }

    /// Set custom reconnection configuration.
    pub fn with_reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }

    /// The event registry, for subscribing to inbound events and state
    /// changes.
    pub fn events(&self) -> &EventRegistry {
        &self.registry
    }

    /// Current connection state, read synchronously.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Coarse connected/disconnected status.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to connection state changes as a watch channel.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Connect to the chat hub.
    ///
    /// No-op when a connection is already established or in progress. Fails
    /// fast with an authentication error when no token is available; the
    /// state stays `Disconnected` in that case. A connect failure reverts
    /// to `Disconnected`, notifies state subscribers, and returns the
    /// error; automatic recovery only applies to drops after a successful
    /// connect.
    pub async fn connect(&self) -> HubResult<()> {
        let current = self.state();
        if current != ConnectionState::Disconnected {
            debug!("connect skipped: already {current}");
            return Ok(());
        }

        let token = self
            .tokens
            .access_token()
            .ok_or_else(|| HubError::Auth("no access token available".into()))?;

        self.set_state(ConnectionState::Connecting);
        let hub_url = resolve_hub_url(&self.config);
        info!("connecting to chat hub at {hub_url}");

        match self.factory.open(&hub_url, &token).await {
            Ok((transport, events)) => {
                *self.transport.lock().await = Some(transport);
                self.spawn_pump(events).await;
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                error!("hub connect failed: {e}");
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Disconnect from the hub and stop any reconnection in progress.
    /// Safe to call when not connected.
    pub async fn disconnect(&self) {
        self.set_state(ConnectionState::Disconnected);
        self.disconnect_notify.notify_waiters();

        if let Some(transport) = self.transport.lock().await.take() {
            transport.stop().await;
        }
        if let Some(task) = self.pump_task.lock().await.take() {
            task.abort();
        }
        info!("disconnected from chat hub");
    }

    // -- Command facade --
    // Every command requires an established connection and resolves on the
    // server's acknowledgment of the invocation.

    /// Send a private 1:1 message.
    pub async fn send_private_message(&self, recipient_id: &str, content: &str) -> HubResult<()> {
        self.invoke("SendPrivateMessage", vec![json!(recipient_id), json!(content)])
            .await
    }

    /// Send a message to a group.
    pub async fn send_group_message(&self, group_id: &str, content: &str) -> HubResult<()> {
        self.invoke("SendGroupMessage", vec![json!(group_id), json!(content)])
            .await
    }

    /// Join a group. The server broadcasts a user-joined-group event back
    /// on success.
    pub async fn join_group(&self, group_id: &str) -> HubResult<()> {
        self.invoke("JoinGroup", vec![json!(group_id)]).await
    }

    /// Leave a group — intentionally disabled.
    ///
    /// Leaving is a product decision embedded here: the hub's `LeaveGroup`
    /// method is never invoked. The call logs and resolves successfully so
    /// the facade keeps a symmetric join/leave surface.
    pub async fn leave_group(&self, group_id: &str) -> HubResult<()> {
        if self.state() != ConnectionState::Connected {
            return Err(HubError::NotConnected);
        }
        warn!("leave_group({group_id}) is disabled; no hub invocation sent");
        Ok(())
    }

    /// Create a group.
    pub async fn create_group(
        &self,
        name: &str,
        description: Option<&str>,
        is_private: bool,
    ) -> HubResult<()> {
        self.invoke(
            "CreateGroup",
            vec![json!(name), json!(description), json!(is_private)],
        )
        .await
    }

    /// Add users to a group.
    pub async fn add_users_to_group(&self, group_id: &str, user_ids: &[String]) -> HubResult<()> {
        self.invoke("AddUsersToGroup", vec![json!(group_id), json!(user_ids)])
            .await
    }

    /// Request a page of private history with another user.
    ///
    /// The page arrives on the private-history event channel, not as this
    /// call's return value; subscribe before invoking.
    pub async fn get_private_history(
        &self,
        other_user_id: &str,
        page: u32,
        page_size: u32,
    ) -> HubResult<()> {
        self.invoke(
            "GetPrivateHistory",
            vec![json!(other_user_id), json!(page), json!(page_size)],
        )
        .await
    }

    /// Request a page of group history.
    ///
    /// The page arrives on the group-history event channel, not as this
    /// call's return value; subscribe before invoking.
    pub async fn get_group_history(
        &self,
        group_id: &str,
        page: u32,
        page_size: u32,
    ) -> HubResult<()> {
        self.invoke(
            "GetGroupHistory",
            vec![json!(group_id), json!(page), json!(page_size)],
        )
        .await
    }

    // -- Internals --

    /// Guarded hub invocation: rejects locally when not connected, without
    /// touching the transport.
    async fn invoke(&self, target: &str, arguments: Vec<Value>) -> HubResult<()> {
        if self.state() != ConnectionState::Connected {
            return Err(HubError::NotConnected);
        }
        let transport = {
            let guard = self.transport.lock().await;
            guard.as_ref().map(Arc::clone).ok_or(HubError::NotConnected)?
        };
        transport.invoke(target, arguments).await
    }

    /// Update the connection state, notifying the watch channel and the
    /// connection-state event channel on change.
    fn set_state(&self, new_state: ConnectionState) {
        let changed = self.state_tx.send_if_modified(|state| {
            if *state == new_state {
                false
            } else {
                info!("connection state: {} -> {}", *state, new_state);
                *state = new_state;
                true
            }
        });
        if changed {
            self.registry
                .dispatch(&ChatEvent::ConnectionStateChanged(new_state));
        }
    }

    async fn spawn_pump(&self, events: mpsc::UnboundedReceiver<TransportEvent>) {
        let client = self.clone();
        let task = tokio::spawn(run_pump(client, events));
        if let Some(old) = self.pump_task.lock().await.replace(task) {
            old.abort();
        }
    }

    /// Translate one inbound hub invocation into a normalized event and
    /// fan it out. Unknown targets are dropped.
    fn route_wire_event(&self, target: &str, arguments: &[Value]) {
        let payload = arguments.first().cloned().unwrap_or(Value::Null);
        let event = match target {
            "ReceivePrivateMessage" => {
                ChatEvent::PrivateMessage(message::normalize_private_message(&payload))
            }
            "ReceiveGroupMessage" => {
                ChatEvent::GroupMessage(message::normalize_group_message(&payload))
            }
            "UserJoinedGroup" => {
                ChatEvent::UserJoinedGroup(message::normalize_membership(&payload))
            }
            "UserLeftGroup" => ChatEvent::UserLeftGroup(message::normalize_membership(&payload)),
            "GroupCreated" => ChatEvent::GroupCreated(payload),
            "UsersAddedToGroup" => {
                ChatEvent::UsersAddedToGroup(message::normalize_users_added(&payload))
            }
            "ReceivePrivateHistory" => {
                ChatEvent::PrivateHistory(message::normalize_private_history(&payload))
            }
            "ReceiveGroupHistory" => {
                ChatEvent::GroupHistory(message::normalize_group_history(&payload))
            }
            other => {
                debug!("ignoring unknown hub target {other}");
                return;
            }
        };
        self.registry.dispatch(&event);
    }

    /// Attempt reconnection with bounded exponential backoff.
    ///
    /// Returns the new transport's event receiver on success, or `None`
    /// once attempts are exhausted or a disconnect was requested.
    async fn reconnect_loop(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.set_state(ConnectionState::Reconnecting);
        *self.transport.lock().await = None;

        for attempt in 0..self.reconnect.max_attempts {
            let delay = self.reconnect.delay_for(attempt);
            info!(
                "reconnect attempt {}/{} in {:.1}s",
                attempt + 1,
                self.reconnect.max_attempts,
                delay.as_secs_f64()
            );

            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.disconnect_notify.notified() => {
                    info!("reconnection cancelled by disconnect request");
                    return None;
                }
            }
            if self.state() != ConnectionState::Reconnecting {
                return None;
            }

            // The token is re-read each attempt so a refresh elsewhere in
            // the application is picked up transparently.
            let Some(token) = self.tokens.access_token() else {
                error!("no access token available for reconnection");
                break;
            };

            let hub_url = resolve_hub_url(&self.config);
            match self.factory.open(&hub_url, &token).await {
                Ok((transport, events)) => {
                    *self.transport.lock().await = Some(transport);
                    self.set_state(ConnectionState::Connected);
                    info!("reconnected after {} attempt(s)", attempt + 1);
                    return Some(events);
                }
                Err(e) => {
                    warn!("reconnect attempt {} failed: {e}", attempt + 1);
                }
            }
        }

        error!(
            "giving up after {} reconnection attempt(s)",
            self.reconnect.max_attempts
        );
        self.set_state(ConnectionState::Disconnected);
        None
    }
}

/// Consume transport events for the lifetime of the connection, crossing
/// reconnects: a recovered connection hands its receiver back into the
/// same loop.
async fn run_pump(client: ChatClient, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
    loop {
        match events.recv().await {
            Some(TransportEvent::Invocation { target, arguments }) => {
                client.route_wire_event(&target, &arguments);
            }
            Some(TransportEvent::Closed { error }) => {
                if client.state() == ConnectionState::Disconnected {
                    return;
                }
                match &error {
                    Some(e) => warn!("hub connection lost: {e}"),
                    None => warn!("hub connection closed"),
                }
                match client.reconnect_loop().await {
                    Some(next) => events = next,
                    None => return,
                }
            }
            None => {
                if client.state() == ConnectionState::Disconnected {
                    return;
                }
                match client.reconnect_loop().await {
                    Some(next) => events = next,
                    None => return,
                }
            }
        }
    }
}
