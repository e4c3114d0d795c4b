//! Hub transport: the seam between the connection manager and the wire.
//!
//! The manager only sees [`HubTransport`] (outbound invocations + stop) and
//! a stream of [`TransportEvent`]s (inbound invocations + close). The real
//! implementation negotiates over HTTP, opens a WebSocket, performs the
//! hub protocol handshake, and pumps frames both ways. Tests substitute a
//! recording factory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use uuid::Uuid;

use ch_core::constants;
use ch_core::error::{HubError, HubResult};

use crate::protocol::{self, HubFrame, NegotiateResponse, RECORD_SEPARATOR};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;
type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Option<String>>>>>;

/// Events surfaced by a transport to the connection manager.
#[derive(Debug)]
pub enum TransportEvent {
    /// The hub invoked a client-side method.
    Invocation {
        /// Hub method name.
        target: String,
        /// Positional arguments as raw JSON.
        arguments: Vec<Value>,
    },
    /// The transport closed. `error` is `None` on a clean close.
    Closed { error: Option<String> },
}

/// An open, handshaken hub connection.
#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Invoke a hub method and wait for the server's completion.
    async fn invoke(&self, target: &str, arguments: Vec<Value>) -> HubResult<()>;

    /// Close the connection and release its tasks. Idempotent.
    async fn stop(&self);
}

/// Builds transports. The access token is supplied per attempt so that
/// reconnections always carry a fresh credential.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Open a connection to `hub_url`, returning the transport and the
    /// receiver of its inbound events.
    async fn open(
        &self,
        hub_url: &str,
        access_token: &str,
    ) -> HubResult<(Arc<dyn HubTransport>, mpsc::UnboundedReceiver<TransportEvent>)>;
}

/// Production transport factory: negotiate + WebSocket + handshake.
#[derive(Debug, Clone, Default)]
pub struct WebSocketFactory;

#[async_trait]
impl TransportFactory for WebSocketFactory {
    async fn open(
        &self,
        hub_url: &str,
        access_token: &str,
    ) -> HubResult<(Arc<dyn HubTransport>, mpsc::UnboundedReceiver<TransportEvent>)> {
        let session_id = negotiate(hub_url, access_token).await?;
        let ws_url = websocket_url(hub_url, session_id.as_deref(), access_token);

        debug!("opening websocket to {hub_url}");
        let (mut stream, _response) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| HubError::Socket(format!("websocket connect failed: {e}")))?;

        let leftover = handshake(&mut stream).await?;
        let (writer, reader) = stream.split();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(WebSocketTransport::start(writer, reader, event_tx, leftover));
        Ok((transport, event_rx))
    }
}

/// Run the negotiate request and extract the connection token.
async fn negotiate(hub_url: &str, access_token: &str) -> HubResult<Option<String>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| HubError::Negotiate(format!("failed to build http client: {e}")))?;

    let url = format!("{hub_url}/negotiate?negotiateVersion=1");
    let response = client
        .post(&url)
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| HubError::Negotiate(e.to_string()))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(HubError::Auth(format!("negotiate rejected with status {status}")));
    }
    if !status.is_success() {
        return Err(HubError::Negotiate(format!("negotiate returned status {status}")));
    }

    let negotiated: NegotiateResponse = response
        .json()
        .await
        .map_err(|e| HubError::Negotiate(format!("invalid negotiate response: {e}")))?;
    Ok(negotiated.session_id().map(str::to_string))
}

/// Build the WebSocket URL: swap the scheme and attach the session id and
/// bearer token as query parameters, the way the hub expects them for
/// WebSocket transports.
fn websocket_url(hub_url: &str, session_id: Option<&str>, access_token: &str) -> String {
    let ws_base = if let Some(rest) = hub_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = hub_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        hub_url.to_string()
    };

    match session_id {
        Some(id) => format!("{ws_base}?id={id}&access_token={access_token}"),
        None => format!("{ws_base}?access_token={access_token}"),
    }
}

/// Send the handshake request and wait for the server's response. Returns
/// any frames that arrived in the same WebSocket message as the response.
async fn handshake(stream: &mut WsStream) -> HubResult<String> {
    stream
        .send(WsMessage::Text(protocol::handshake_frame()))
        .await
        .map_err(|e| HubError::Handshake(format!("failed to send handshake: {e}")))?;

    let response = tokio::time::timeout(Duration::from_secs(15), async {
        while let Some(message) = stream.next().await {
            match message {
                Ok(WsMessage::Text(text)) => return Ok(text),
                Ok(_) => continue,
                Err(e) => return Err(HubError::Handshake(format!("handshake read failed: {e}"))),
            }
        }
        Err(HubError::Handshake("connection closed during handshake".into()))
    })
    .await
    .map_err(|_| HubError::Handshake("timed out waiting for handshake response".into()))??;

    let (first, rest) = match response.split_once(RECORD_SEPARATOR) {
        Some((first, rest)) => (first.to_string(), rest.to_string()),
        None => (response, String::new()),
    };
    protocol::parse_handshake_response(&first)?;
    Ok(rest)
}

/// The live WebSocket transport: a writer guarded by a mutex, a background
/// read pump, a keepalive ping task, and the pending-invocation map.
pub struct WebSocketTransport {
    writer: Arc<Mutex<WsSink>>,
    pending: PendingMap,
    read_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    ping_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WebSocketTransport {
    fn start(
        writer: WsSink,
        reader: WsSource,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
        leftover: String,
    ) -> Self {
        let writer = Arc::new(Mutex::new(writer));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let read_task = tokio::spawn(read_pump(
            reader,
            Arc::clone(&pending),
            event_tx,
            leftover,
        ));
        let ping_task = tokio::spawn(keepalive(Arc::clone(&writer)));

        Self {
            writer,
            pending,
            read_task: Mutex::new(Some(read_task)),
            ping_task: Mutex::new(Some(ping_task)),
        }
    }
}

#[async_trait]
impl HubTransport for WebSocketTransport {
    async fn invoke(&self, target: &str, arguments: Vec<Value>) -> HubResult<()> {
        let invocation_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(invocation_id.clone(), tx);

        let frame = protocol::invocation_frame(&invocation_id, target, &arguments);
        let send_result = {
            let mut writer = self.writer.lock().await;
            writer.send(WsMessage::Text(frame)).await
        };
        if let Err(e) = send_result {
            self.pending.lock().await.remove(&invocation_id);
            return Err(HubError::Socket(format!("failed to send invocation: {e}")));
        }

        match rx.await {
            Ok(None) => Ok(()),
            Ok(Some(message)) => Err(HubError::Invocation {
                target: target.to_string(),
                message,
            }),
            // Sender dropped: the connection went away before completion.
            Err(_) => Err(HubError::ConnectionClosed),
        }
    }

    async fn stop(&self) {
        if let Some(task) = self.ping_task.lock().await.take() {
            task.abort();
        }

        // Best-effort close frame; the server may already be gone.
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.send(WsMessage::Close(None)).await;
        }

        if let Some(task) = self.read_task.lock().await.take() {
            task.abort();
        }
        self.pending.lock().await.clear();
    }
}

/// Pump inbound WebSocket messages into transport events until the
/// connection ends, then fail all pending invocations.
async fn read_pump(
    mut reader: WsSource,
    pending: PendingMap,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    leftover: String,
) {
    let mut sent_closed =
        !leftover.is_empty() && handle_frames(&leftover, &pending, &event_tx).await;

    while !sent_closed {
        match reader.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                sent_closed = handle_frames(&text, &pending, &event_tx).await;
            }
            Some(Ok(WsMessage::Close(frame))) => {
                let reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                let _ = event_tx.send(TransportEvent::Closed { error: reason });
                sent_closed = true;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                let _ = event_tx.send(TransportEvent::Closed { error: Some(e.to_string()) });
                sent_closed = true;
            }
            None => break,
        }
    }

    // Dropping the senders fails any in-flight invocations.
    pending.lock().await.clear();
    if !sent_closed {
        let _ = event_tx.send(TransportEvent::Closed { error: None });
    }
}

/// Decode and route one WebSocket text payload. Returns true when a Close
/// frame was seen; its Closed event has already been forwarded and the
/// pump should stop.
async fn handle_frames(
    text: &str,
    pending: &PendingMap,
    event_tx: &mpsc::UnboundedSender<TransportEvent>,
) -> bool {
    for frame in protocol::parse_frames(text) {
        match frame {
            HubFrame::Invocation { target, arguments, .. } => {
                let _ = event_tx.send(TransportEvent::Invocation { target, arguments });
            }
            HubFrame::Completion { invocation_id, error } => {
                if let Some(tx) = pending.lock().await.remove(&invocation_id) {
                    let _ = tx.send(error);
                } else {
                    debug!("completion for unknown invocation {invocation_id}");
                }
            }
            HubFrame::Ping => {}
            HubFrame::Close { error } => {
                let _ = event_tx.send(TransportEvent::Closed { error });
                return true;
            }
            HubFrame::Other(frame_type) => {
                debug!("ignoring unsupported hub frame type {frame_type}");
            }
        }
    }
    false
}

/// Write a keepalive ping on a fixed interval until the writer errors.
async fn keepalive(writer: Arc<Mutex<WsSink>>) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(constants::KEEPALIVE_INTERVAL_SECS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so pings start one interval in.
    interval.tick().await;

    loop {
        interval.tick().await;
        let mut writer = writer.lock().await;
        if let Err(e) = writer.send(WsMessage::Text(protocol::ping_frame())).await {
            warn!("keepalive ping failed: {e}");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url_scheme_swap() {
        assert_eq!(
            websocket_url("http://localhost:7151/hubs/chat", Some("abc"), "tok"),
            "ws://localhost:7151/hubs/chat?id=abc&access_token=tok"
        );
        assert_eq!(
            websocket_url("https://lms.example.edu/hubs/chat", Some("abc"), "tok"),
            "wss://lms.example.edu/hubs/chat?id=abc&access_token=tok"
        );
    }

    #[test]
    fn test_websocket_url_without_session_id() {
        assert_eq!(
            websocket_url("http://localhost:7151/hubs/chat", None, "tok"),
            "ws://localhost:7151/hubs/chat?access_token=tok"
        );
    }
}
