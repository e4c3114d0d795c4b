//! Tail command - connect to the hub and print events until interrupted.

use tracing::info;

use ch_core::config::AppConfig;
use ch_core::error::HubResult;

use super::{build_client, format_message};

/// Run the tail command. Blocks until Ctrl-C.
pub async fn run(config: AppConfig, token: Option<String>) -> HubResult<()> {
    let client = build_client(&config, token)?;
    let events = client.events();

    events.on_connection_state_changed(|state| {
        println!("* connection {state}");
    });
    events.on_private_message(|message| {
        println!("{}", format_message("private", message));
    });
    events.on_group_message(|message| {
        println!("{}", format_message("group", message));
    });
    events.on_user_joined_group(|membership| {
        println!("* {} joined group {}", membership.user_id, membership.group_id);
    });
    events.on_user_left_group(|membership| {
        println!("* {} left group {}", membership.user_id, membership.group_id);
    });
    events.on_group_created(|descriptor| {
        let name = descriptor
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("(unnamed)");
        println!("* group created: {name}");
    });
    events.on_users_added_to_group(|added| {
        println!(
            "* {} user(s) added to group {}",
            added.user_ids.len(),
            added.group_id
        );
    });

    client.connect().await?;
    info!("tailing hub events; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    client.disconnect().await;
    Ok(())
}
