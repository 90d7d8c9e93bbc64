use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crm::CrmLead;
use crate::crypto::verify_signature;
use crate::database::models::{Company, Lead, LeadRecord};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-crm-signature";

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: String,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct DeletedLead {
    id: String,
}

#[derive(Debug, PartialEq)]
pub enum LeadEvent {
    Upsert(CrmLead),
    Delete(String),
    Ignored(String),
}

#[derive(Debug, Serialize)]
pub struct WebhookReceipt {
    pub event: String,
    pub lead_id: Option<String>,
    /// Whether the local mirror changed
    pub applied: bool,
}

pub fn parse_event(body: &[u8]) -> Result<(String, LeadEvent), ApiError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid webhook payload: {e}")))?;

    let event = match envelope.event.as_str() {
        "lead.created" | "lead.updated" => {
            let lead: CrmLead = serde_json::from_value(envelope.data)
                .map_err(|e| ApiError::bad_request(format!("Invalid lead in webhook: {e}")))?;
            LeadEvent::Upsert(lead)
        }
        "lead.deleted" => {
            let deleted: DeletedLead = serde_json::from_value(envelope.data)
                .map_err(|e| ApiError::bad_request(format!("Invalid lead in webhook: {e}")))?;
            LeadEvent::Delete(deleted.id)
        }
        other => LeadEvent::Ignored(other.to_string()),
    };

    Ok((envelope.event, event))
}

/// POST /webhooks/crm/:company - Signed lead change notifications
///
/// The `X-Crm-Signature` header carries `sha256=<hex HMAC-SHA256(body)>` keyed
/// with the company's webhook secret. Created and updated leads go through the
/// same newer-wins upsert as delta sync, so redelivered or out-of-order events
/// are harmless.
pub async fn crm_webhook(
    State(state): State<AppState>,
    Path(company_slug): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookReceipt> {
    let pool = state.pool();
    let company = Company::find_by_slug(pool, &company_slug)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| ApiError::not_found("Company not found"))?;

    let Some(secret) = company.webhook_secret.as_deref().filter(|s| !s.is_empty()) else {
        tracing::warn!(company = %company.slug, "Webhook received but no webhook secret is configured");
        return Err(ApiError::unauthorized("Webhooks are not enabled for this company"));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(secret, &body, signature) {
        tracing::warn!(company = %company.slug, "Webhook rejected: bad signature");
        return Err(ApiError::unauthorized("Invalid webhook signature"));
    }

    let (event_name, event) = parse_event(&body)?;
    let receipt = match event {
        LeadEvent::Upsert(lead) => {
            let record = LeadRecord::from_crm(company.id, &lead);
            let applied = Lead::upsert(pool, &record).await?;
            WebhookReceipt { event: event_name, lead_id: Some(lead.id), applied }
        }
        LeadEvent::Delete(id) => {
            let applied = Lead::delete_by_external_id(pool, company.id, &id).await?;
            WebhookReceipt { event: event_name, lead_id: Some(id), applied }
        }
        LeadEvent::Ignored(name) => {
            tracing::debug!(company = %company.slug, event = %name, "Ignoring webhook event");
            WebhookReceipt { event: event_name, lead_id: None, applied: false }
        }
    };

    tracing::info!(
        company = %company.slug,
        event = %receipt.event,
        lead_id = ?receipt.lead_id,
        applied = receipt.applied,
        "Webhook processed"
    );
    Ok(ApiResponse::accepted(receipt))
}
