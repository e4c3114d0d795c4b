//! Chat hub endpoint resolution.
//!
//! Pure string transformation from configuration to the single URL the
//! connection manager dials. No network I/O happens here.

use ch_core::config::ServerConfig;
use ch_core::constants;

/// Resolve the chat hub URL from configuration.
///
/// An explicit `hub_url` wins; otherwise the URL is derived from the base
/// API URL by stripping its `/api` suffix and appending the hub path.
/// Either way, a secure scheme on a loopback host is downgraded to plain
/// `http`: local development hubs do not terminate TLS and the handshake
/// would hard-fail otherwise.
pub fn resolve_hub_url(config: &ServerConfig) -> String {
    let url = match &config.hub_url {
        Some(explicit) => explicit.trim_end_matches('/').to_string(),
        None => {
            let base = config.api_base_url.trim_end_matches('/');
            let origin = base
                .strip_suffix(constants::API_PATH_SUFFIX)
                .unwrap_or(base);
            format!("{origin}{}", constants::CHAT_HUB_PATH)
        }
    };
    downgrade_loopback_scheme(&url)
}

/// Replace `https` with `http` when the host is a loopback/development
/// address. Non-loopback hosts are left untouched.
fn downgrade_loopback_scheme(url: &str) -> String {
    match url.strip_prefix("https://") {
        Some(rest) if is_loopback_host(rest) => format!("http://{rest}"),
        _ => url.to_string(),
    }
}

/// Whether the host portion of a scheme-stripped URL is a loopback address.
fn is_loopback_host(rest: &str) -> bool {
    let authority = rest.split('/').next().unwrap_or(rest);
    // Strip the port, minding bracketed IPv6 hosts.
    let host = if let Some(stripped) = authority.strip_prefix('[') {
        stripped.split(']').next().unwrap_or(stripped)
    } else {
        authority.split(':').next().unwrap_or(authority)
    };
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(hub_url: Option<&str>, api_base_url: &str) -> ServerConfig {
        ServerConfig {
            hub_url: hub_url.map(str::to_string),
            api_base_url: api_base_url.to_string(),
        }
    }

    #[test]
    fn test_derives_hub_url_from_api_base() {
        let cfg = config(None, "https://localhost:7151/api");
        assert_eq!(resolve_hub_url(&cfg), "http://localhost:7151/hubs/chat");
    }

    #[test]
    fn test_non_loopback_keeps_https() {
        let cfg = config(None, "https://lms.example.edu/api");
        assert_eq!(resolve_hub_url(&cfg), "https://lms.example.edu/hubs/chat");
    }

    #[test]
    fn test_explicit_hub_url_wins() {
        let cfg = config(
            Some("https://chat.example.edu/hubs/chat"),
            "https://other.example.edu/api",
        );
        assert_eq!(resolve_hub_url(&cfg), "https://chat.example.edu/hubs/chat");
    }

    #[test]
    fn test_explicit_hub_url_still_downgraded_on_loopback() {
        let cfg = config(Some("https://127.0.0.1:7151/hubs/chat"), "");
        assert_eq!(resolve_hub_url(&cfg), "http://127.0.0.1:7151/hubs/chat");
    }

    #[test]
    fn test_trailing_slashes_normalized() {
        let cfg = config(None, "https://lms.example.edu/api/");
        assert_eq!(resolve_hub_url(&cfg), "https://lms.example.edu/hubs/chat");

        let cfg = config(Some("https://lms.example.edu/hubs/chat/"), "");
        assert_eq!(resolve_hub_url(&cfg), "https://lms.example.edu/hubs/chat");
    }

    #[test]
    fn test_base_without_api_suffix() {
        let cfg = config(None, "https://lms.example.edu");
        assert_eq!(resolve_hub_url(&cfg), "https://lms.example.edu/hubs/chat");
    }

    #[test]
    fn test_default_config_resolves_to_local_dev_hub() {
        let cfg = ServerConfig::default();
        assert_eq!(resolve_hub_url(&cfg), "http://localhost:7151/hubs/chat");
    }

    #[test]
    fn test_ipv6_loopback() {
        let cfg = config(Some("https://[::1]:7151/hubs/chat"), "");
        assert_eq!(resolve_hub_url(&cfg), "http://[::1]:7151/hubs/chat");
    }

    #[test]
    fn test_plain_http_left_alone() {
        let cfg = config(Some("http://lms.example.edu/hubs/chat"), "");
        assert_eq!(resolve_hub_url(&cfg), "http://lms.example.edu/hubs/chat");
    }
}
