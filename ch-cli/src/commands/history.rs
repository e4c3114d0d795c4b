//! History commands - fetch and render message history pages.

use std::time::Duration;

use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use tokio::sync::mpsc;

use ch_client::message::ChatMessage;
use ch_core::config::AppConfig;
use ch_core::constants;
use ch_core::error::{HubError, HubResult};

use super::{build_client, format_timestamp};

/// History subcommands.
#[derive(Subcommand)]
pub enum HistoryAction {
    /// Private 1:1 history with another user.
    Private {
        /// The other user's id.
        user: String,
        /// Page number to fetch.
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// Messages per page.
        #[arg(long, default_value_t = constants::DEFAULT_HISTORY_PAGE_SIZE)]
        page_size: u32,
    },
    /// Group history.
    Group {
        /// Group id.
        group: String,
        /// Page number to fetch.
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// Messages per page.
        #[arg(long, default_value_t = constants::DEFAULT_HISTORY_PAGE_SIZE)]
        page_size: u32,
    },
}

/// Run a history command.
pub async fn run(config: AppConfig, token: Option<String>, action: HistoryAction) -> HubResult<()> {
    let client = build_client(&config, token)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<ChatMessage>>();

    // Subscribe before requesting: the page arrives as an event, not as
    // the request's return value.
    let subscription = match &action {
        HistoryAction::Private { .. } => {
            let tx = tx.clone();
            client.events().on_private_history(move |batch| {
                let _ = tx.send(batch.to_vec());
            })
        }
        HistoryAction::Group { .. } => {
            let tx = tx.clone();
            client.events().on_group_history(move |batch| {
                let _ = tx.send(batch.to_vec());
            })
        }
    };

    client.connect().await?;

    let request = match &action {
        HistoryAction::Private { user, page, page_size } => {
            client.get_private_history(user, *page, *page_size).await
        }
        HistoryAction::Group { group, page, page_size } => {
            client.get_group_history(group, *page, *page_size).await
        }
    };
    if let Err(e) = request {
        client.disconnect().await;
        return Err(e);
    }

    let batch = tokio::time::timeout(Duration::from_secs(10), rx.recv()).await;
    subscription.unsubscribe();
    client.disconnect().await;

    match batch {
        Ok(Some(messages)) => {
            render(&messages);
            Ok(())
        }
        _ => Err(HubError::Internal("timed out waiting for history".into())),
    }
}

fn render(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("No messages.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Sent", "Sender", "Message", "Flags"]);
    for message in messages {
        let mut flags = Vec::new();
        if message.edited {
            flags.push("edited");
        }
        if message.deleted {
            flags.push("deleted");
        }
        table.add_row(vec![
            format_timestamp(message.sent_at),
            message.sender_id.clone(),
            message.content.clone(),
            flags.join(","),
        ]);
    }
    println!("{table}");
}
