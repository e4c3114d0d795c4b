//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "ClassHub";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default base URL for the ClassHub REST API, used to derive the hub URL
/// when no explicit hub URL is configured. Matches the development server.
pub const DEFAULT_API_BASE_URL: &str = "https://localhost:7151/api";

/// Path suffix that identifies the REST API root on the base URL.
pub const API_PATH_SUFFIX: &str = "/api";

/// Hub path appended to the server origin to reach the chat hub.
pub const CHAT_HUB_PATH: &str = "/hubs/chat";

/// Base delay for reconnection backoff in seconds.
pub const RECONNECT_BASE_DELAY_SECS: u64 = 1;

/// Maximum reconnection backoff delay in seconds.
pub const RECONNECT_MAX_DELAY_SECS: u64 = 30;

/// Maximum number of automatic reconnection attempts before giving up.
pub const RECONNECT_MAX_ATTEMPTS: u32 = 8;

/// Interval between keepalive pings on an open hub connection, in seconds.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 15;

/// The only message content type the chat model carries.
pub const MESSAGE_TYPE_TEXT: &str = "text";

/// Default page size for history requests.
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 50;

/// File name of the stored bearer token inside the data directory.
pub const TOKEN_FILE_NAME: &str = "auth_token";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url_has_api_suffix() {
        assert!(DEFAULT_API_BASE_URL.ends_with(API_PATH_SUFFIX));
    }

    #[test]
    fn test_reconnect_bounds_are_sane() {
        assert!(RECONNECT_BASE_DELAY_SECS < RECONNECT_MAX_DELAY_SECS);
        assert!(RECONNECT_MAX_ATTEMPTS > 0);
    }
}
