use chrono::{Duration, Utc};
use once_cell::sync::OnceCell;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub const TOKEN_ISSUER: &str = "leadboard";
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Role types governing which leads and tasks a user may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    OfficeManager,
    SalesRep,
    Canvasser,
    ProjectManager,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::OfficeManager,
        Role::SalesRep,
        Role::Canvasser,
        Role::ProjectManager,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::OfficeManager => "office_manager",
            Role::SalesRep => "sales_rep",
            Role::Canvasser => "canvasser",
            Role::ProjectManager => "project_manager",
        }
    }

    pub fn is_office(&self) -> bool {
        matches!(self, Role::OfficeManager)
    }

    /// Canvassers only knock doors; lead fields are edited by the rest.
    pub fn can_edit_leads(&self) -> bool {
        !matches!(self, Role::Canvasser)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "office_manager" | "manager" | "office" => Ok(Role::OfficeManager),
            "sales_rep" | "sales" => Ok(Role::SalesRep),
            "canvasser" => Ok(Role::Canvasser),
            "project_manager" => Ok(Role::ProjectManager),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub company_id: Uuid,
    pub company: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        company_id: Uuid,
        company: String,
        email: String,
        role: Role,
        expiry_hours: u64,
    ) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: user_id,
            company_id,
            company,
            email,
            role,
            iat: now.timestamp(),
            exp,
            iss: TOKEN_ISSUER.to_string(),
        }
    }

    /// Same identity with a fresh issue/expiry window.
    pub fn renewed(&self, expiry_hours: u64) -> Self {
        Self::new(
            self.sub,
            self.company_id,
            self.company.clone(),
            self.email.clone(),
            self.role,
            expiry_hours,
        )
    }

    pub fn expires_in(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(0)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    #[error("Password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// Verify signature and issuer. `allow_expired` skips the expiry check and is
/// reserved for token refresh.
pub fn decode_token(token: &str, secret: &str, allow_expired: bool) -> Result<Claims, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.validate_exp = !allow_expired;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))
}

pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    validate_password_strength(password)?;
    Ok(bcrypt::hash(password, cost)?)
}

/// Hash verified when a login names no account, so a miss costs as much as a
/// wrong password. Computed once at the first configured cost.
pub fn dummy_password_hash(cost: u32) -> &'static str {
    static DUMMY: OnceCell<String> = OnceCell::new();
    DUMMY.get_or_init(|| bcrypt::hash("leadboard-no-such-account", cost).unwrap_or_default())
}

/// Malformed stored hashes count as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Stored password hash could not be verified: {}", e);
            false
        }
    }
}
