//! ClassHub CLI - command-line driver for the chat hub client.
//!
//! Connects to a ClassHub chat hub from the terminal: tail live events,
//! send private and group messages, manage groups, and fetch history.
//! Useful for headless operation, scripting, and debugging.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;

use ch_core::config::AppConfig;
use ch_core::error::HubResult;
use ch_core::logging;

/// ClassHub - realtime chat client for the ClassHub learning platform.
#[derive(Parser)]
#[command(
    name = "classhub",
    version,
    about = "ClassHub chat hub CLI",
    long_about = "A command-line interface for the ClassHub chat hub.\n\
                   Authenticate once with `classhub login`, then tail events or send messages."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Bearer token override (defaults to the stored token).
    #[arg(short, long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the bearer token used for hub authentication.
    Login {
        /// The bearer token issued by the ClassHub backend.
        token: String,
    },
    /// Remove the stored bearer token.
    Logout,
    /// Connect to the hub and print events as they arrive.
    Tail,
    /// Send a private message to a user.
    SendPrivate {
        /// Recipient user id.
        recipient: String,
        /// Message body.
        content: String,
    },
    /// Send a message to a group.
    SendGroup {
        /// Group id.
        group: String,
        /// Message body.
        content: String,
    },
    /// Create a group.
    CreateGroup {
        /// Group name.
        name: String,
        /// Optional description.
        #[arg(short, long)]
        description: Option<String>,
        /// Create the group as private.
        #[arg(short, long)]
        private: bool,
    },
    /// Join a group.
    JoinGroup {
        /// Group id.
        group: String,
    },
    /// Add users to a group.
    AddUsers {
        /// Group id.
        group: String,
        /// User ids to add.
        #[arg(required = true)]
        users: Vec<String>,
    },
    /// Fetch message history.
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
}

#[tokio::main]
async fn main() -> HubResult<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    logging::init_console_logging(log_level);

    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from_file(std::path::Path::new(path))?,
        None => AppConfig::load_default()?,
    };

    info!("ClassHub CLI v{}", ch_core::constants::APP_VERSION);

    match cli.command {
        Commands::Login { token } => commands::auth::login(&token),
        Commands::Logout => commands::auth::logout(),
        Commands::Tail => commands::tail::run(config, cli.token).await,
        Commands::SendPrivate { recipient, content } => {
            commands::send::private_message(config, cli.token, &recipient, &content).await
        }
        Commands::SendGroup { group, content } => {
            commands::send::group_message(config, cli.token, &group, &content).await
        }
        Commands::CreateGroup {
            name,
            description,
            private,
        } => commands::group::create(config, cli.token, &name, description.as_deref(), private).await,
        Commands::JoinGroup { group } => commands::group::join(config, cli.token, &group).await,
        Commands::AddUsers { group, users } => {
            commands::group::add_users(config, cli.token, &group, &users).await
        }
        Commands::History { action } => commands::history::run(config, cli.token, action).await,
    }
}
