use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::manager::DatabaseError;

const COMPANY_COLUMNS: &str = r#"
    id, slug, name, crm_credential, webhook_secret, sync_enabled, sync_interval_secs,
    last_synced_at, sync_watermark, is_active, settings, created_at, updated_at
"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub crm_credential: Option<String>,
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
    pub sync_enabled: bool,
    pub sync_interval_secs: i32,
    /// When the last successful sync finished, local clock
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Greatest remote `updated_at` mirrored so far
    pub sync_watermark: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable company settings from the admin configuration screen
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanySettingsUpdate {
    pub name: Option<String>,
    pub sync_enabled: Option<bool>,
    pub sync_interval_secs: Option<i32>,
    pub settings: Option<serde_json::Value>,
}

impl Company {
    pub fn has_crm_credential(&self) -> bool {
        self.crm_credential.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Whether the sync interval has elapsed since the last successful sync
    pub fn sync_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active || !self.sync_enabled || !self.has_crm_credential() {
            return false;
        }
        match self.last_synced_at {
            None => true,
            Some(last) => now - last >= chrono::Duration::seconds(self.sync_interval_secs.max(0) as i64),
        }
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, DatabaseError> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1");
        Ok(sqlx::query_as::<_, Self>(&sql).bind(id).fetch_optional(pool).await?)
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, DatabaseError> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE slug = $1");
        Ok(sqlx::query_as::<_, Self>(&sql)
            .bind(slug.trim().to_lowercase())
            .fetch_optional(pool)
            .await?)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, DatabaseError> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies ORDER BY slug");
        Ok(sqlx::query_as::<_, Self>(&sql).fetch_all(pool).await?)
    }

    pub async fn list_sync_enabled(pool: &PgPool) -> Result<Vec<Self>, DatabaseError> {
        let sql = format!(
            "SELECT {COMPANY_COLUMNS} FROM companies
             WHERE sync_enabled = TRUE AND is_active = TRUE AND crm_credential IS NOT NULL
             ORDER BY last_synced_at ASC NULLS FIRST"
        );
        Ok(sqlx::query_as::<_, Self>(&sql).fetch_all(pool).await?)
    }

    pub async fn create(
        pool: &PgPool,
        slug: &str,
        name: &str,
        sync_interval_secs: i32,
    ) -> Result<Self, DatabaseError> {
        let sql = format!(
            "INSERT INTO companies (slug, name, sync_interval_secs)
             VALUES ($1, $2, $3)
             RETURNING {COMPANY_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Self>(&sql)
            .bind(slug.trim().to_lowercase())
            .bind(name.trim())
            .bind(sync_interval_secs)
            .fetch_one(pool)
            .await?)
    }

    pub async fn update_settings(
        pool: &PgPool,
        id: Uuid,
        update: &CompanySettingsUpdate,
    ) -> Result<Self, DatabaseError> {
        let sql = format!(
            "UPDATE companies SET
                name = COALESCE($2, name),
                sync_enabled = COALESCE($3, sync_enabled),
                sync_interval_secs = COALESCE($4, sync_interval_secs),
                settings = COALESCE($5, settings),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COMPANY_COLUMNS}"
        );
        sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .bind(update.name.as_deref().map(str::trim))
            .bind(update.sync_enabled)
            .bind(update.sync_interval_secs)
            .bind(update.settings.as_ref())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Company {id}")))
    }

    /// Store an already-encrypted CRM credential. The watermark is cleared in
    /// the same statement, so the next run is a full resync against whatever
    /// account the new credential belongs to.
    pub async fn set_crm_credential(
        pool: &PgPool,
        id: Uuid,
        sealed: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE companies
             SET crm_credential = $2, sync_watermark = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(sealed)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Company {id}")));
        }
        Ok(())
    }

    pub async fn set_webhook_secret(pool: &PgPool, id: Uuid, secret: &str) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            "UPDATE companies SET webhook_secret = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(secret)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Company {id}")));
        }
        Ok(())
    }

    /// Record a successful sync; the watermark never moves backwards.
    ///
    /// Only applies while the company still holds `sealed_credential`, the
    /// credential the run pulled with. Returns false when it was replaced
    /// mid-run, leaving the cleared watermark alone.
    pub async fn mark_synced(
        pool: &PgPool,
        id: Uuid,
        sealed_credential: &str,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE companies
             SET last_synced_at = NOW(),
                 sync_watermark = GREATEST(sync_watermark, $3),
                 updated_at = NOW()
             WHERE id = $1 AND crm_credential = $2",
        )
        .bind(id)
        .bind(sealed_credential)
        .bind(watermark)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Lowercase letters, digits and hyphens; 2..=64 characters.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    let slug = slug.trim();
    if slug.len() < 2 || slug.len() > 64 {
        return Err("Company slug must be between 2 and 64 characters".to_string());
    }
    if !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err("Company slug can only contain lowercase letters, digits, and hyphens".to_string());
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err("Company slug cannot start or end with a hyphen".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> Company {
        Company {
            id: Uuid::new_v4(),
            slug: "acme".to_string(),
            name: "Acme Roofing".to_string(),
            crm_credential: Some("sealed".to_string()),
            webhook_secret: None,
            sync_enabled: true,
            sync_interval_secs: 300,
            last_synced_at: None,
            sync_watermark: None,
            is_active: true,
            settings: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn never_synced_company_is_due() {
        assert!(company().sync_due(Utc::now()));
    }

    #[test]
    fn sync_due_respects_interval() {
        let now = Utc::now();
        let mut c = company();
        c.last_synced_at = Some(now - chrono::Duration::seconds(120));
        assert!(!c.sync_due(now));
        c.last_synced_at = Some(now - chrono::Duration::seconds(300));
        assert!(c.sync_due(now));
    }

    #[test]
    fn disabled_inactive_or_unconfigured_companies_are_never_due() {
        let now = Utc::now();

        let mut c = company();
        c.sync_enabled = false;
        assert!(!c.sync_due(now));

        let mut c = company();
        c.is_active = false;
        assert!(!c.sync_due(now));

        let mut c = company();
        c.crm_credential = Some(String::new());
        assert!(!c.sync_due(now));
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut c = company();
        c.webhook_secret = Some("whsec".to_string());
        let value = serde_json::to_value(&c).unwrap();
        assert!(value.get("crm_credential").is_none());
        assert!(value.get("webhook_secret").is_none());
        assert_eq!(value["slug"], "acme");
    }

    #[test]
    fn slug_validation() {
        assert!(validate_slug("acme-roofing").is_ok());
        assert!(validate_slug("a").is_err());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("-acme").is_err());
        assert!(validate_slug("acme_roofing").is_err());
    }
}
