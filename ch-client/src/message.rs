//! Canonical message model and wire-payload normalization.
//!
//! The hub pushes four message-shaped payloads (private message, group
//! message, and the two history batches). All of them funnel through this
//! module into one canonical [`ChatMessage`] shape, so nothing downstream
//! branches on which wire event produced a message.
//!
//! Normalization is a permissive mapping, not validation: missing or
//! mistyped fields become defaults/`None` rather than errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ch_core::constants;

/// Canonical normalized chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned message identifier. Empty when absent from the wire.
    pub id: String,
    /// Identifier of the originating user.
    pub sender_id: String,
    /// Private 1:1 conversation identifier, when this is a private message.
    pub thread_id: Option<String>,
    /// Group conversation identifier, when this is a group message.
    pub group_id: Option<String>,
    /// Message body.
    pub content: String,
    /// Server-assigned send timestamp.
    pub sent_at: Option<DateTime<Utc>>,
    /// Creation timestamp; equals `sent_at` (no independent client-side
    /// timestamp is tracked).
    pub created_at: Option<DateTime<Utc>>,
    /// Last-update timestamp; equals `sent_at` at creation time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Whether the server flagged this message as edited.
    pub edited: bool,
    /// Whether the server flagged this message as deleted.
    pub deleted: bool,
    /// Conversation key: `thread_id` or else `group_id`, so consumers can
    /// key a conversation without branching on message kind.
    pub conversation_id: Option<String>,
    /// Content type. Always `"text"`; no other types are modeled.
    pub message_type: String,
    /// Local-only read flag. Never set by the server.
    pub is_read: bool,
}

/// Membership-change payload for join/leave events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    /// Group the change applies to.
    pub group_id: String,
    /// User that joined or left.
    pub user_id: String,
}

/// Payload for a batch of users added to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersAdded {
    /// Group the users were added to.
    pub group_id: String,
    /// The added user identifiers.
    pub user_ids: Vec<String>,
}

/// Normalize a private-message wire payload (`chatThreadId` keyed).
pub fn normalize_private_message(data: &Value) -> ChatMessage {
    normalize_message(data, str_opt(data, "chatThreadId"), None)
}

/// Normalize a group-message wire payload (`chatGroupId` keyed).
pub fn normalize_group_message(data: &Value) -> ChatMessage {
    normalize_message(data, None, str_opt(data, "chatGroupId"))
}

/// Normalize a private-history batch, preserving server order.
pub fn normalize_private_history(data: &Value) -> Vec<ChatMessage> {
    items(data).map(|batch| batch.iter().map(normalize_private_message).collect())
        .unwrap_or_default()
}

/// Normalize a group-history batch, preserving server order.
pub fn normalize_group_history(data: &Value) -> Vec<ChatMessage> {
    items(data).map(|batch| batch.iter().map(normalize_group_message).collect())
        .unwrap_or_default()
}

/// Extract a membership-change payload (`{ groupId, userId }`).
pub fn normalize_membership(data: &Value) -> GroupMembership {
    GroupMembership {
        group_id: str_field(data, "groupId"),
        user_id: str_field(data, "userId"),
    }
}

/// Extract a users-added payload (`{ groupId, userIds }`).
pub fn normalize_users_added(data: &Value) -> UsersAdded {
    let user_ids = data
        .get("userIds")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    UsersAdded {
        group_id: str_field(data, "groupId"),
        user_ids,
    }
}

fn normalize_message(
    data: &Value,
    thread_id: Option<String>,
    group_id: Option<String>,
) -> ChatMessage {
    let sent_at = data
        .get("sentAt")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let conversation_id = thread_id.clone().or_else(|| group_id.clone());

    ChatMessage {
        id: str_field(data, "id"),
        sender_id: str_field(data, "senderId"),
        thread_id,
        group_id,
        content: str_field(data, "content"),
        sent_at,
        created_at: sent_at,
        updated_at: sent_at,
        edited: bool_field(data, "edited"),
        deleted: bool_field(data, "deleted"),
        conversation_id,
        message_type: constants::MESSAGE_TYPE_TEXT.to_string(),
        is_read: false,
    }
}

fn items(data: &Value) -> Option<&Vec<Value>> {
    data.as_array()
}

fn str_field(data: &Value, key: &str) -> String {
    str_opt(data, key).unwrap_or_default()
}

fn str_opt(data: &Value, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(data: &Value, key: &str) -> bool {
    data.get(key).and_then(Value::as_bool).unwrap_or(false)
}
