//! Send commands - one-shot private and group messages.

use ch_core::config::AppConfig;
use ch_core::error::HubResult;

use super::build_client;

/// Send a private message and disconnect.
pub async fn private_message(
    config: AppConfig,
    token: Option<String>,
    recipient: &str,
    content: &str,
) -> HubResult<()> {
    let client = build_client(&config, token)?;
    client.connect().await?;

    let result = client.send_private_message(recipient, content).await;
    client.disconnect().await;
    result?;

    println!("Sent to {recipient}.");
    Ok(())
}

/// Send a group message and disconnect.
pub async fn group_message(
    config: AppConfig,
    token: Option<String>,
    group: &str,
    content: &str,
) -> HubResult<()> {
    let client = build_client(&config, token)?;
    client.connect().await?;

    let result = client.send_group_message(group, content).await;
    client.disconnect().await;
    result?;

    println!("Sent to group {group}.");
    Ok(())
}
