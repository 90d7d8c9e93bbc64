use std::sync::Arc;

use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::crm::HttpCrmConnector;
use crate::crypto::CredentialCipher;
use crate::database::DatabaseManager;
use crate::sync::DeltaSyncService;

#[derive(Subcommand)]
pub enum SyncCommands {
    #[command(about = "Sync one company's leads from the CRM now")]
    Run {
        #[arg(help = "Company slug or id")]
        company: String,

        #[arg(long, help = "Ignore the watermark and prune leads removed from the CRM")]
        full: bool,
    },
}

pub async fn handle(
    cmd: SyncCommands,
    db: &DatabaseManager,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        SyncCommands::Run { company, full } => {
            let company = find_company(db, &company).await?;
            let config = config();

            let service = DeltaSyncService::new(
                db.clone(),
                Arc::new(HttpCrmConnector::new(config.crm.clone())?),
                Arc::new(CredentialCipher::from_config(&config.security, config.environment)?),
                config.sync.clone(),
                &config.crm,
            );
            let report = service.sync_company(company.id, full).await?;

            if output_format == OutputFormat::Text {
                println!("✓ Synced '{}'", company.slug);
                println!("  pages:     {}", report.pages);
                println!("  fetched:   {}", report.fetched);
                println!("  changed:   {}", report.changed);
                println!("  written:   {}", report.written);
                if report.full_resync {
                    println!("  pruned:    {}", report.pruned);
                }
                println!("  watermark: {}", format_time(report.watermark));
                return Ok(());
            }
            output_success(
                output_format,
                &format!("Synced '{}'", company.slug),
                Some(json!({ "report": report })),
            )
        }
    }
}
