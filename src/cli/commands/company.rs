use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::crypto::{generate_secret, CredentialCipher};
use crate::database::models::company::validate_slug;
use crate::database::models::Company;
use crate::database::DatabaseManager;

#[derive(Subcommand)]
pub enum CompanyCommands {
    #[command(about = "Create a company")]
    Create {
        #[arg(help = "URL slug used at login, e.g. acme-roofing")]
        slug: String,

        #[arg(help = "Display name")]
        name: String,

        #[arg(long, help = "Delta sync interval in seconds")]
        interval: Option<i32>,
    },

    #[command(about = "List companies")]
    List,

    #[command(about = "Store the company's CRM API credential (read from stdin when --credential is omitted)")]
    SetCredential {
        #[arg(help = "Company slug or id")]
        company: String,

        #[arg(long, help = "CRM API credential")]
        credential: Option<String>,
    },

    #[command(about = "Generate a new webhook signing secret")]
    RotateWebhookSecret {
        #[arg(help = "Company slug or id")]
        company: String,
    },
}

pub async fn handle(
    cmd: CompanyCommands,
    db: &DatabaseManager,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        CompanyCommands::Create { slug, name, interval } => {
            validate_slug(&slug).map_err(|e| anyhow::anyhow!(e))?;
            if name.trim().is_empty() {
                anyhow::bail!("Company name cannot be empty");
            }
            let interval = interval.unwrap_or(config().sync.default_interval_secs);

            let company = Company::create(db.pool(), &slug, &name, interval).await?;
            output_success(
                output_format,
                &format!("Created company '{}' ({})", company.slug, company.id),
                Some(json!({ "company": company })),
            )
        }
        CompanyCommands::List => {
            let companies = Company::list(db.pool()).await?;
            let rows = companies
                .iter()
                .map(|c| {
                    vec![
                        c.slug.clone(),
                        c.name.clone(),
                        if c.is_active { "active" } else { "inactive" }.to_string(),
                        if c.has_crm_credential() { "yes" } else { "no" }.to_string(),
                        if c.sync_enabled { format!("every {}s", c.sync_interval_secs) } else { "off".to_string() },
                        format_time(c.last_synced_at),
                    ]
                })
                .collect();
            let items = companies.iter().map(|c| json!(c)).collect();
            output_table(
                output_format,
                "companies",
                items,
                &["SLUG", "NAME", "STATUS", "CRM", "SYNC", "LAST SYNC"],
                rows,
                "No companies found",
            )
        }
        CompanyCommands::SetCredential { company, credential } => {
            let company = find_company(db, &company).await?;
            let credential = read_secret(credential, "CRM credential")?;

            let settings = &config().security;
            let cipher = CredentialCipher::from_config(settings, config().environment)?;
            let sealed = cipher.encrypt(credential.trim())?;
            Company::set_crm_credential(db.pool(), company.id, Some(&sealed)).await?;

            output_success(
                output_format,
                &format!("Stored CRM credential for '{}'", company.slug),
                None,
            )
        }
        CompanyCommands::RotateWebhookSecret { company } => {
            let company = find_company(db, &company).await?;
            let secret = generate_secret();
            Company::set_webhook_secret(db.pool(), company.id, &secret).await?;

            if output_format == OutputFormat::Text {
                println!("Webhook secret for '{}':", company.slug);
                println!("{}", secret);
                println!("Configure the CRM to sign deliveries to /webhooks/crm/{} with it.", company.slug);
                return Ok(());
            }
            output_success(
                output_format,
                &format!("Rotated webhook secret for '{}'", company.slug),
                Some(json!({ "secret": secret })),
            )
        }
    }
}
