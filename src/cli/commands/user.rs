use clap::Subcommand;
use serde_json::json;

use crate::auth::{hash_password, Role};
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::models::user::validate_email_format;
use crate::database::models::{NewUser, User};
use crate::database::DatabaseManager;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a dashboard user (password read from stdin when --password is omitted)")]
    Create {
        #[arg(help = "Company slug or id")]
        company: String,

        #[arg(help = "Login email")]
        email: String,

        #[arg(long, help = "Full name")]
        name: String,

        #[arg(long, help = "office_manager, sales_rep, canvasser or project_manager")]
        role: String,

        #[arg(long, help = "The user's id in the CRM, used to scope field users' leads")]
        crm_user_id: Option<String>,

        #[arg(long, help = "Initial password")]
        password: Option<String>,
    },

    #[command(about = "List a company's users")]
    List {
        #[arg(help = "Company slug or id")]
        company: String,
    },
}

pub async fn handle(
    cmd: UserCommands,
    db: &DatabaseManager,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create {
            company,
            email,
            name,
            role,
            crm_user_id,
            password,
        } => {
            let company = find_company(db, &company).await?;
            validate_email_format(&email).map_err(|e| anyhow::anyhow!(e))?;
            let role: Role = role.parse()?;
            if role != Role::OfficeManager && crm_user_id.is_none() {
                eprintln!("Warning: field users without --crm-user-id see no leads");
            }

            let password = read_secret(password, "Password")?;
            let password_hash = hash_password(&password, config().security.bcrypt_cost)?;

            let user = User::create(
                db.pool(),
                &NewUser {
                    company_id: company.id,
                    email,
                    password_hash,
                    full_name: name,
                    role,
                    crm_user_id,
                },
            )
            .await?;

            output_success(
                output_format,
                &format!("Created {} '{}' in '{}'", role, user.email, company.slug),
                Some(json!({ "user": user })),
            )
        }
        UserCommands::List { company } => {
            let company = find_company(db, &company).await?;
            let users = User::list_by_company(db.pool(), company.id).await?;
            let rows = users
                .iter()
                .map(|u| {
                    vec![
                        u.email.clone(),
                        u.full_name.clone(),
                        u.role.clone(),
                        u.crm_user_id.clone().unwrap_or_else(|| "-".to_string()),
                        if u.is_active { "active" } else { "inactive" }.to_string(),
                        format_time(u.last_login_at),
                    ]
                })
                .collect();
            let items = users.iter().map(|u| json!(u)).collect();
            output_table(
                output_format,
                "users",
                items,
                &["EMAIL", "NAME", "ROLE", "CRM USER", "STATUS", "LAST LOGIN"],
                rows,
                "No users found",
            )
        }
    }
}
