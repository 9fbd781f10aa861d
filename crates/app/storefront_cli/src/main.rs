// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands, NotificationCommands};

mod cli;
mod commands;
mod logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();
    let config = args.global.config();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::Login { phone, password } => {
            commands::login(config, &phone, &password).await?;
        }
        Commands::Logout => commands::logout(config),
        Commands::Whoami => commands::whoami(config)?,
        Commands::Profile { sync } => commands::profile(config, sync).await?,
        Commands::Notifications(command) => match command {
            NotificationCommands::List { admin, filter } => {
                commands::list_notifications(config, admin, filter).await?;
            }
            NotificationCommands::Read { id } => commands::read_notification(config, &id).await?,
            NotificationCommands::Watch { bell } => commands::watch(config, bell).await?,
        },
    }

    Ok(())
}
