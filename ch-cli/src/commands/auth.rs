//! Login/logout commands - manage the stored bearer token.

use ch_core::credentials::{TokenProvider, TokenStore};
use ch_core::error::{HubError, HubResult};

/// Store the bearer token for subsequent commands.
pub fn login(token: &str) -> HubResult<()> {
    if token.trim().is_empty() {
        return Err(HubError::Auth("refusing to store an empty token".into()));
    }
    let store = TokenStore::open_default()?;
    store.save(token)?;
    println!("Token stored at {}", store.path().display());
    Ok(())
}

/// Remove the stored bearer token.
pub fn logout() -> HubResult<()> {
    let store = TokenStore::open_default()?;
    if store.access_token().is_none() {
        println!("No token was stored.");
        return Ok(());
    }
    store.clear()?;
    println!("Token removed.");
    Ok(())
}
