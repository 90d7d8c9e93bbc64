pub mod commands;
pub mod utils;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::config;
use crate::database::DatabaseManager;

#[derive(Parser)]
#[command(name = "leadctl")]
#[command(about = "Leadboard operator CLI - schema migrations, companies, users and sync")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply or inspect schema migrations")]
    Migrate {
        #[command(subcommand)]
        cmd: commands::migrate::MigrateCommands,
    },

    #[command(about = "Company (tenant) management")]
    Company {
        #[command(subcommand)]
        cmd: commands::company::CompanyCommands,
    },

    #[command(about = "Dashboard user management")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "Run delta sync on demand")]
    Sync {
        #[command(subcommand)]
        cmd: commands::sync::SyncCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

async fn connect() -> anyhow::Result<DatabaseManager> {
    DatabaseManager::connect(&config().database)
        .await
        .context("connecting to database (is DATABASE_URL set?)")
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let db = connect().await?;

    let result = match cli.command {
        Commands::Migrate { cmd } => commands::migrate::handle(cmd, &db, output_format).await,
        Commands::Company { cmd } => commands::company::handle(cmd, &db, output_format).await,
        Commands::User { cmd } => commands::user::handle(cmd, &db, output_format).await,
        Commands::Sync { cmd } => commands::sync::handle(cmd, &db, output_format).await,
    };

    db.close().await;
    result
}
