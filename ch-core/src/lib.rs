//! ClassHub Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by the other ClassHub crates:
//! - Application configuration (hub/API endpoints, logging settings)
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - Platform directory utilities
//! - Bearer-token storage and the credential-provider seam
//! - Common constants

pub mod config;
pub mod constants;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod platform;

// Re-export commonly used items at the crate root
pub use config::AppConfig;
pub use credentials::{StaticTokenProvider, TokenProvider, TokenStore};
pub use error::{HubError, HubResult};
pub use logging::init_logging;
pub use platform::Platform;
