//! Typed event channels and the subscriber registry.
//!
//! Every raw hub event is normalized at the transport boundary and fanned
//! out here as a [`ChatEvent`]. Registration returns a [`Subscription`]
//! handle; dispatch is synchronous, in registration order, over a snapshot
//! of the subscriber list, so handlers may subscribe or unsubscribe
//! (including themselves) while a dispatch is in flight.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tracing::{debug, warn};

use crate::message::{ChatMessage, GroupMembership, UsersAdded};

/// Connection state of the hub client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying to connect.
    Disconnected,
    /// Attempting to establish the initial connection.
    Connecting,
    /// Connected and receiving events.
    Connected,
    /// Connection lost, attempting to reconnect.
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// A normalized event delivered to subscribers.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A private 1:1 message arrived.
    PrivateMessage(ChatMessage),
    /// A group message arrived.
    GroupMessage(ChatMessage),
    /// A user joined a group.
    UserJoinedGroup(GroupMembership),
    /// A user left a group.
    UserLeftGroup(GroupMembership),
    /// A group was created. The server's descriptor is passed through
    /// unmodified; roster state is owned by the application.
    GroupCreated(Value),
    /// Users were added to a group.
    UsersAddedToGroup(UsersAdded),
    /// A requested page of private history arrived.
    PrivateHistory(Vec<ChatMessage>),
    /// A requested page of group history arrived.
    GroupHistory(Vec<ChatMessage>),
    /// The connection state changed.
    ConnectionStateChanged(ConnectionState),
}

impl ChatEvent {
    /// The channel this event is delivered on.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PrivateMessage(_) => EventKind::PrivateMessage,
            Self::GroupMessage(_) => EventKind::GroupMessage,
            Self::UserJoinedGroup(_) => EventKind::UserJoinedGroup,
            Self::UserLeftGroup(_) => EventKind::UserLeftGroup,
            Self::GroupCreated(_) => EventKind::GroupCreated,
            Self::UsersAddedToGroup(_) => EventKind::UsersAddedToGroup,
            Self::PrivateHistory(_) => EventKind::PrivateHistory,
            Self::GroupHistory(_) => EventKind::GroupHistory,
            Self::ConnectionStateChanged(_) => EventKind::ConnectionStateChanged,
        }
    }
}

/// Event channel identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PrivateMessage,
    GroupMessage,
    UserJoinedGroup,
    UserLeftGroup,
    GroupCreated,
    UsersAddedToGroup,
    PrivateHistory,
    GroupHistory,
    ConnectionStateChanged,
}

impl EventKind {
    /// Channel name, for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrivateMessage => "private-message-received",
            Self::GroupMessage => "group-message-received",
            Self::UserJoinedGroup => "user-joined-group",
            Self::UserLeftGroup => "user-left-group",
            Self::GroupCreated => "group-created",
            Self::UsersAddedToGroup => "users-added-to-group",
            Self::PrivateHistory => "private-history-received",
            Self::GroupHistory => "group-history-received",
            Self::ConnectionStateChanged => "connection-state-changed",
        }
    }
}

type Handler = Arc<dyn Fn(&ChatEvent) + Send + Sync>;

struct HandlerEntry {
    id: u64,
    handler: Handler,
}

struct RegistryInner {
    channels: Mutex<HashMap<EventKind, Vec<HandlerEntry>>>,
    next_id: AtomicU64,
}

/// Per-channel subscriber registry with snapshot-based dispatch.
///
/// Not a queue: an event arriving with zero subscribers on its channel is
/// dropped.
#[derive(Clone)]
pub struct EventRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                channels: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a handler on a channel. Handlers on the same channel are
    /// invoked in registration order.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = HandlerEntry {
            id,
            handler: Arc::new(handler),
        };
        let mut channels = self.inner.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.entry(kind).or_default().push(entry);
        Subscription {
            registry: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Deliver an event to every current subscriber of its channel.
    ///
    /// The subscriber list is snapshotted under the lock and invoked outside
    /// it, so reentrant subscribe/unsubscribe cannot corrupt iteration. A
    /// panicking handler is isolated; the remaining handlers still run.
    pub fn dispatch(&self, event: &ChatEvent) {
        let kind = event.kind();
        let snapshot: Vec<Handler> = {
            let channels = self.inner.channels.lock().unwrap_or_else(|e| e.into_inner());
            match channels.get(&kind) {
                Some(entries) => entries.iter().map(|e| Arc::clone(&e.handler)).collect(),
                None => Vec::new(),
            }
        };

        if snapshot.is_empty() {
            debug!("no subscribers for {}", kind.as_str());
            return;
        }

        debug!("dispatching {} to {} subscriber(s)", kind.as_str(), snapshot.len());
        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!("subscriber for {} panicked; continuing dispatch", kind.as_str());
            }
        }
    }

    /// Number of subscribers currently registered on a channel.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        let channels = self.inner.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.get(&kind).map_or(0, Vec::len)
    }

    // -- Typed registration helpers, one per channel --

    /// Subscribe to private messages.
    pub fn on_private_message<F>(&self, f: F) -> Subscription
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        self.on(EventKind::PrivateMessage, move |e| {
            if let ChatEvent::PrivateMessage(m) = e {
                f(m)
            }
        })
    }

    /// Subscribe to group messages.
    pub fn on_group_message<F>(&self, f: F) -> Subscription
    where
        F: Fn(&ChatMessage) + Send + Sync + 'static,
    {
        self.on(EventKind::GroupMessage, move |e| {
            if let ChatEvent::GroupMessage(m) = e {
                f(m)
            }
        })
    }

    /// Subscribe to user-joined-group events.
    pub fn on_user_joined_group<F>(&self, f: F) -> Subscription
    where
        F: Fn(&GroupMembership) + Send + Sync + 'static,
    {
        self.on(EventKind::UserJoinedGroup, move |e| {
            if let ChatEvent::UserJoinedGroup(m) = e {
                f(m)
            }
        })
    }

    /// Subscribe to user-left-group events.
    pub fn on_user_left_group<F>(&self, f: F) -> Subscription
    where
        F: Fn(&GroupMembership) + Send + Sync + 'static,
    {
        self.on(EventKind::UserLeftGroup, move |e| {
            if let ChatEvent::UserLeftGroup(m) = e {
                f(m)
            }
        })
    }

    /// Subscribe to group-created events.
    pub fn on_group_created<F>(&self, f: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on(EventKind::GroupCreated, move |e| {
            if let ChatEvent::GroupCreated(g) = e {
                f(g)
            }
        })
    }

    /// Subscribe to users-added-to-group events.
    pub fn on_users_added_to_group<F>(&self, f: F) -> Subscription
    where
        F: Fn(&UsersAdded) + Send + Sync + 'static,
    {
        self.on(EventKind::UsersAddedToGroup, move |e| {
            if let ChatEvent::UsersAddedToGroup(u) = e {
                f(u)
            }
        })
    }

    /// Subscribe to private-history batches. Subscribe before requesting
    /// history; the batch arrives here, not as the request's return value.
    pub fn on_private_history<F>(&self, f: F) -> Subscription
    where
        F: Fn(&[ChatMessage]) + Send + Sync + 'static,
    {
        self.on(EventKind::PrivateHistory, move |e| {
            if let ChatEvent::PrivateHistory(batch) = e {
                f(batch)
            }
        })
    }

    /// Subscribe to group-history batches.
    pub fn on_group_history<F>(&self, f: F) -> Subscription
    where
        F: Fn(&[ChatMessage]) + Send + Sync + 'static,
    {
        self.on(EventKind::GroupHistory, move |e| {
            if let ChatEvent::GroupHistory(batch) = e {
                f(batch)
            }
        })
    }

    /// Subscribe to connection state changes.
    pub fn on_connection_state_changed<F>(&self, f: F) -> Subscription
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.on(EventKind::ConnectionStateChanged, move |e| {
            if let ChatEvent::ConnectionStateChanged(s) = e {
                f(*s)
            }
        })
    }
}

/// Handle for one registered handler. Dropping the handle does NOT
/// unsubscribe; call [`Subscription::unsubscribe`] explicitly.
pub struct Subscription {
    registry: Weak<RegistryInner>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Remove exactly this handler instance from its channel. Calling it
    /// again, or after the registry is gone, is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.registry.upgrade() {
            let mut channels = inner.channels.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entries) = channels.get_mut(&self.kind) {
                entries.retain(|e| e.id != self.id);
            }
        }
    }

    /// The channel this subscription belongs to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    fn message(id: &str) -> ChatMessage {
        crate::message::normalize_private_message(&serde_json::json!({
            "id": id,
            "chatThreadId": "t1",
            "content": "hello",
        }))
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = EventRegistry::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.on_private_message(move |_| order.lock().unwrap().push(tag));
        }

        registry.dispatch(&ChatEvent::PrivateMessage(message("m1")));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_removes_exactly_one_handler() {
        let registry = EventRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = |hits: &Arc<AtomicUsize>| {
            let hits = Arc::clone(hits);
            move |_: &ChatMessage| {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        };
        let first = registry.on_private_message(h(&hits));
        let _second = registry.on_private_message(h(&hits));
        assert_eq!(registry.subscriber_count(EventKind::PrivateMessage), 2);

        first.unsubscribe();
        assert_eq!(registry.subscriber_count(EventKind::PrivateMessage), 1);

        // Unsubscribing a second time is a no-op.
        first.unsubscribe();
        assert_eq!(registry.subscriber_count(EventKind::PrivateMessage), 1);

        registry.dispatch(&ChatEvent::PrivateMessage(message("m1")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remaining_handlers_keep_relative_order_after_unsubscribe() {
        let registry = EventRegistry::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        let first = {
            let order = Arc::clone(&order);
            registry.on_private_message(move |_| order.lock().unwrap().push("first"))
        };
        {
            let order = Arc::clone(&order);
            registry.on_private_message(move |_| order.lock().unwrap().push("second"));
        }

        first.unsubscribe();
        registry.dispatch(&ChatEvent::PrivateMessage(message("m1")));
        assert_eq!(*order.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn test_reentrant_self_unsubscribe_is_safe() {
        let registry = EventRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let later = Arc::new(AtomicUsize::new(0));

        // The first handler unsubscribes itself mid-dispatch.
        let slot: Arc<StdMutex<Option<Subscription>>> = Arc::new(StdMutex::new(None));
        let sub = {
            let hits = Arc::clone(&hits);
            let slot = Arc::clone(&slot);
            registry.on_private_message(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().unwrap().as_ref() {
                    sub.unsubscribe();
                }
            })
        };
        *slot.lock().unwrap() = Some(sub);

        {
            let later = Arc::clone(&later);
            registry.on_private_message(move |_| {
                later.fetch_add(1, Ordering::SeqCst);
            });
        }

        registry.dispatch(&ChatEvent::PrivateMessage(message("m1")));
        // The second handler was neither skipped nor double-invoked.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(later.load(Ordering::SeqCst), 1);

        registry.dispatch(&ChatEvent::PrivateMessage(message("m2")));
        // The self-unsubscribed handler is gone for good.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(later.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_delivery() {
        let registry = EventRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        registry.on_private_message(|_| panic!("subscriber bug"));
        {
            let hits = Arc::clone(&hits);
            registry.on_private_message(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        registry.dispatch(&ChatEvent::PrivateMessage(message("m1")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_subscriber_event_is_dropped() {
        let registry = EventRegistry::new();
        // Must not panic or queue anything.
        registry.dispatch(&ChatEvent::GroupCreated(serde_json::json!({"id": "g1"})));
        assert_eq!(registry.subscriber_count(EventKind::GroupCreated), 0);
    }

    #[test]
    fn test_channels_are_independent() {
        let registry = EventRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = Arc::clone(&hits);
            registry.on_group_message(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        registry.dispatch(&ChatEvent::PrivateMessage(message("m1")));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_connection_state_channel() {
        let registry = EventRegistry::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            registry.on_connection_state_changed(move |s| seen.lock().unwrap().push(s));
        }

        registry.dispatch(&ChatEvent::ConnectionStateChanged(ConnectionState::Connecting));
        registry.dispatch(&ChatEvent::ConnectionStateChanged(ConnectionState::Connected));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::PrivateMessage.as_str(), "private-message-received");
        assert_eq!(EventKind::ConnectionStateChanged.as_str(), "connection-state-changed");
    }
}
