//! CLI command implementations.

pub mod auth;
pub mod group;
pub mod history;
pub mod send;
pub mod tail;

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use ch_client::client::ChatClient;
use ch_client::message::ChatMessage;
use ch_core::config::AppConfig;
use ch_core::credentials::{StaticTokenProvider, TokenProvider, TokenStore};
use ch_core::error::HubResult;

/// Build a chat client from configuration, using either the token passed
/// on the command line or the stored one.
pub fn build_client(config: &AppConfig, token: Option<String>) -> HubResult<ChatClient> {
    let tokens: Arc<dyn TokenProvider> = match token {
        Some(token) => Arc::new(StaticTokenProvider::new(token)),
        None => Arc::new(TokenStore::open_default()?),
    };
    Ok(ChatClient::new(config.server.clone(), tokens))
}

/// Format a message timestamp in local time, or a placeholder when absent.
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// One-line rendering of a message for event tailing.
pub fn format_message(kind: &str, message: &ChatMessage) -> String {
    let conversation = message.conversation_id.as_deref().unwrap_or("?");
    format!(
        "[{}] {kind} {conversation} <{}> {}",
        format_timestamp(message.sent_at),
        message.sender_id,
        message.content
    )
}
