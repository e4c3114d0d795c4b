//! ClassHub Client - realtime messaging client for the chat hub.
//!
//! This crate maintains one persistent, auto-reconnecting connection to the
//! ClassHub chat hub and exposes it as:
//! - Hub endpoint resolution from configuration
//! - A canonical message model with wire-payload normalization
//! - A typed event registry with per-channel subscriptions
//! - The SignalR JSON hub protocol over WebSockets
//! - A command facade for sends, group management, and history requests

pub mod client;
pub mod endpoint;
pub mod events;
pub mod message;
pub mod protocol;
pub mod transport;

// Re-export key types
pub use client::{ChatClient, ReconnectConfig};
pub use endpoint::resolve_hub_url;
pub use events::{ChatEvent, ConnectionState, EventKind, EventRegistry, Subscription};
pub use message::{ChatMessage, GroupMembership, UsersAdded};
pub use transport::{HubTransport, TransportEvent, TransportFactory, WebSocketFactory};
