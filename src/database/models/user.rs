use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::auth::Role;
use crate::database::manager::DatabaseError;

const USER_COLUMNS: &str = r#"
    id, company_id, email, password_hash, full_name, role, crm_user_id,
    is_active, last_login_at, created_at, updated_at
"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub company_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub role: String,
    pub crm_user_id: Option<String>,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub company_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub crm_user_id: Option<String>,
}

impl User {
    /// Parsed role; rows are constrained by a CHECK so this only fails on drift.
    pub fn role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, DatabaseError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, Self>(&sql).bind(id).fetch_optional(pool).await?)
    }

    pub async fn find_by_email(
        pool: &PgPool,
        company_id: Uuid,
        email: &str,
    ) -> Result<Option<Self>, DatabaseError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE company_id = $1 AND lower(email) = lower($2)"
        );
        Ok(sqlx::query_as::<_, Self>(&sql)
            .bind(company_id)
            .bind(email.trim())
            .fetch_optional(pool)
            .await?)
    }

    pub async fn list_by_company(pool: &PgPool, company_id: Uuid) -> Result<Vec<Self>, DatabaseError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE company_id = $1 ORDER BY full_name, email"
        );
        Ok(sqlx::query_as::<_, Self>(&sql).bind(company_id).fetch_all(pool).await?)
    }

    pub async fn create(pool: &PgPool, new_user: &NewUser) -> Result<Self, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (company_id, email, password_hash, full_name, role, crm_user_id)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Self>(&sql)
            .bind(new_user.company_id)
            .bind(new_user.email.trim())
            .bind(&new_user.password_hash)
            .bind(new_user.full_name.trim())
            .bind(new_user.role.as_str())
            .bind(new_user.crm_user_id.as_deref())
            .fetch_one(pool)
            .await?)
    }

    pub async fn touch_last_login(pool: &PgPool, id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

/// Minimal shape check; the CRM is the source of truth for contact details.
pub fn validate_email_format(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email cannot be empty".to_string());
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || !parts[1].contains('.') {
        return Err("Invalid email format".to_string());
    }
    if email.chars().any(char::is_whitespace) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}
