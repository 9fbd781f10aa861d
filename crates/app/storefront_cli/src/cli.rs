use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use storefront_core::ClientConfig;
use storefront_core::notifications::ReadFilter;

#[derive(Parser, Debug)]
#[command(name = "storefront", version, about = "Storefront command-line client")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Backend origin, e.g. `https://shop.example.com`.
    #[arg(long, global = true, env = "STOREFRONT_BASE_URL")]
    pub base_url: Option<String>,

    /// Passphrase for the encrypted session file.
    #[arg(long, global = true, env = "STOREFRONT_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Session file location.
    #[arg(long, global = true, env = "STOREFRONT_STORAGE_PATH")]
    pub storage_path: Option<PathBuf>,
}

impl GlobalArgs {
    /// Environment configuration with the command-line flags applied on top.
    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(secret_key) = &self.secret_key {
            config.secret_key = secret_key.clone();
        }
        if let Some(path) = &self.storage_path {
            config.storage_path = path.clone();
        }
        config
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print version information.
    Version,

    /// Sign in and store the session token.
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },

    /// Forget the session token.
    Logout,

    /// Show the identity claims of the stored token.
    Whoami,

    /// Show the cached user profile.
    Profile {
        /// Refresh the cache from the backend first.
        #[arg(long)]
        sync: bool,
    },

    /// Order notifications.
    #[command(subcommand)]
    Notifications(NotificationCommands),
}

#[derive(Subcommand, Debug)]
pub enum NotificationCommands {
    /// List existing notifications.
    List {
        /// All users' notifications (admin view).
        #[arg(long)]
        admin: bool,

        /// all, unread or read.
        #[arg(long, default_value = "all")]
        filter: ReadFilter,
    },

    /// Mark one notification as read.
    Read { id: String },

    /// Print notifications as they arrive, until Ctrl-C.
    Watch {
        /// Ring the terminal bell for each notification.
        #[arg(long)]
        bell: bool,
    },
}
