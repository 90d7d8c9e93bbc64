use std::collections::HashMap;

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};

use crate::crm::{CrmError, CrmUser};
use crate::crypto::generate_secret;
use crate::database::models::{Company, CompanySettingsUpdate};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::state::AppState;

pub const MIN_SYNC_INTERVAL_SECS: i32 = 60;
pub const MAX_SYNC_INTERVAL_SECS: i32 = 86_400;

#[derive(Debug, Serialize)]
pub struct CompanySettings {
    #[serde(flatten)]
    pub company: Company,
    pub has_crm_credential: bool,
    pub webhook_configured: bool,
}

impl From<Company> for CompanySettings {
    fn from(company: Company) -> Self {
        let has_crm_credential = company.has_crm_credential();
        let webhook_configured = company.webhook_secret.as_deref().is_some_and(|s| !s.is_empty());
        Self {
            company,
            has_crm_credential,
            webhook_configured,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    /// Empty or missing clears the stored credential
    pub credential: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CredentialTest {
    pub ok: bool,
    pub crm_user: CrmUser,
}

#[derive(Debug, Serialize)]
pub struct WebhookSecret {
    /// Shown once to the caller
    pub secret: String,
    pub signature_header: &'static str,
}

pub fn validate_settings(update: &CompanySettingsUpdate) -> Result<(), ApiError> {
    let mut field_errors = HashMap::new();

    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        field_errors.insert("name".to_string(), "Company name cannot be empty".to_string());
    }
    if let Some(interval) = update.sync_interval_secs {
        if !(MIN_SYNC_INTERVAL_SECS..=MAX_SYNC_INTERVAL_SECS).contains(&interval) {
            field_errors.insert(
                "sync_interval_secs".to_string(),
                format!(
                    "Sync interval must be between {MIN_SYNC_INTERVAL_SECS} and {MAX_SYNC_INTERVAL_SECS} seconds"
                ),
            );
        }
    }
    if update.settings.as_ref().is_some_and(|s| !s.is_object()) {
        field_errors.insert("settings".to_string(), "Settings must be a JSON object".to_string());
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation_error("Invalid company settings", Some(field_errors)))
    }
}

/// GET /api/company/settings
pub async fn settings_get(Extension(current): Extension<CurrentUser>) -> ApiResult<CompanySettings> {
    current.require_office()?;
    Ok(ApiResponse::success(CompanySettings::from(current.company)))
}

/// PUT /api/company/settings - Partial update of name, sync options and free-form settings
pub async fn settings_put(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(update): Json<CompanySettingsUpdate>,
) -> ApiResult<CompanySettings> {
    current.require_office()?;
    validate_settings(&update)?;

    let company = Company::update_settings(state.pool(), current.company.id, &update).await?;
    tracing::info!(company = %company.slug, user_id = %current.user.id, "Company settings updated");
    Ok(ApiResponse::success(CompanySettings::from(company)))
}

/// PUT /api/company/crm-credential - Store the CRM API credential, sealed with AES-256-GCM
pub async fn crm_credential_put(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<CredentialRequest>,
) -> ApiResult<CompanySettings> {
    current.require_office()?;
    let pool = state.pool();
    let company_id = current.company.id;

    if state.sync.is_running(company_id) {
        return Err(ApiError::conflict(
            "A sync is running for this company, change the credential once it finishes",
        ));
    }

    match payload.credential.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(credential) => {
            let sealed = state.cipher.encrypt(credential)?;
            Company::set_crm_credential(pool, company_id, Some(&sealed)).await?;
            tracing::info!(company = %current.company.slug, "CRM credential stored");
        }
        None => {
            Company::set_crm_credential(pool, company_id, None).await?;
            tracing::info!(company = %current.company.slug, "CRM credential cleared");
        }
    }

    let company = Company::find_by_id(pool, company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))?;
    Ok(ApiResponse::success(CompanySettings::from(company)))
}

/// POST /api/company/crm-credential/test - Ask the CRM who the stored credential belongs to
pub async fn crm_credential_test(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<CredentialTest> {
    current.require_office()?;
    let api = state.crm_for(&current.company)?;

    match api.current_user().await {
        Ok(crm_user) => Ok(ApiResponse::success(CredentialTest { ok: true, crm_user })),
        Err(CrmError::InvalidCredential) => Err(ApiError::unprocessable_entity(
            "The CRM rejected the stored credential",
        )),
        Err(e) => Err(e.into()),
    }
}

/// POST /api/company/webhook-secret - Generate (or rotate) the webhook signing secret
pub async fn webhook_secret_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<WebhookSecret> {
    current.require_office()?;
    let secret = generate_secret();
    Company::set_webhook_secret(state.pool(), current.company.id, &secret).await?;
    tracing::info!(company = %current.company.slug, "Webhook secret rotated");

    Ok(ApiResponse::created(WebhookSecret {
        secret,
        signature_header: "X-Crm-Signature",
    }))
}
