//! Group commands - create, join, and add users.

use ch_core::config::AppConfig;
use ch_core::error::HubResult;

use super::build_client;

/// Create a group.
pub async fn create(
    config: AppConfig,
    token: Option<String>,
    name: &str,
    description: Option<&str>,
    is_private: bool,
) -> HubResult<()> {
    let client = build_client(&config, token)?;
    client.connect().await?;

    let result = client.create_group(name, description, is_private).await;
    client.disconnect().await;
    result?;

    println!(
        "Created {} group {name}.",
        if is_private { "private" } else { "public" }
    );
    Ok(())
}

/// Join a group.
pub async fn join(config: AppConfig, token: Option<String>, group: &str) -> HubResult<()> {
    let client = build_client(&config, token)?;
    client.connect().await?;

    let result = client.join_group(group).await;
    client.disconnect().await;
    result?;

    println!("Joined group {group}.");
    Ok(())
}

/// Add users to a group.
pub async fn add_users(
    config: AppConfig,
    token: Option<String>,
    group: &str,
    users: &[String],
) -> HubResult<()> {
    let client = build_client(&config, token)?;
    client.connect().await?;

    let result = client.add_users_to_group(group, users).await;
    client.disconnect().await;
    result?;

    println!("Added {} user(s) to group {group}.", users.len());
    Ok(())
}
