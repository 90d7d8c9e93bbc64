use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;

#[derive(Subcommand)]
pub enum MigrateCommands {
    #[command(about = "Apply pending migrations")]
    Run,

    #[command(about = "List migrations and whether each is applied")]
    Status,
}

pub async fn handle(
    cmd: MigrateCommands,
    db: &DatabaseManager,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        MigrateCommands::Run => {
            let applied = db.migrate().await?;
            let message = match applied {
                0 => "Schema is up to date".to_string(),
                n => format!("Applied {} migration(s)", n),
            };
            output_success(output_format, &message, Some(json!({ "applied": applied })))
        }
        MigrateCommands::Status => {
            let status = db.migration_status().await?;
            let rows = status
                .iter()
                .map(|m| {
                    vec![
                        m.version.to_string(),
                        m.description.clone(),
                        if m.applied { "applied" } else { "pending" }.to_string(),
                    ]
                })
                .collect();
            let items = status
                .iter()
                .map(|m| json!({ "version": m.version, "description": m.description, "applied": m.applied }))
                .collect();
            output_table(
                output_format,
                "migrations",
                items,
                &["VERSION", "DESCRIPTION", "STATUS"],
                rows,
                "No migrations found",
            )
        }
    }
}
