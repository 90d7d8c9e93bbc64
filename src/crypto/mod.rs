// Credential encryption at rest and webhook signature checks.
//
// CRM API keys are stored per company as base64(nonce || ciphertext) under
// AES-256-GCM. The key never leaves process memory.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{Environment, SecurityConfig};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Header prefix used by the CRM when signing webhook deliveries.
pub const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("credential key is not configured")]
    MissingKey,

    #[error("credential key must be {KEY_LEN} bytes of base64, got {0} bytes")]
    InvalidKeyLength(usize),

    #[error("invalid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("stored credential is truncated")]
    Truncated,

    #[error("credential could not be decrypted")]
    Decrypt,

    #[error("credential could not be encrypted")]
    Encrypt,

    #[error("decrypted credential is not valid UTF-8")]
    Utf8,
}

/// Symmetric cipher for per-company CRM credentials.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCipher(..)")
    }
}

impl CredentialCipher {
    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }
        let key = Key::<Aes256Gcm>::from_slice(bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    pub fn from_base64_key(encoded: &str) -> Result<Self, CryptoError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(CryptoError::MissingKey);
        }
        let bytes = STANDARD.decode(encoded)?;
        Self::from_key_bytes(&bytes)
    }

    /// Build the cipher from configuration. Development falls back to a key
    /// derived from the JWT secret so a fresh checkout works without setup.
    pub fn from_config(
        security: &SecurityConfig,
        environment: Environment,
    ) -> Result<Self, CryptoError> {
        if !security.credential_key.trim().is_empty() {
            return Self::from_base64_key(&security.credential_key);
        }
        if environment != Environment::Development || security.jwt_secret.is_empty() {
            return Err(CryptoError::MissingKey);
        }

        tracing::warn!("CREDENTIAL_KEY not set; deriving a development key from JWT_SECRET");
        let digest = Sha256::digest(security.jwt_secret.as_bytes());
        Self::from_key_bytes(digest.as_slice())
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let sealed = STANDARD.decode(stored.trim())?;
        if sealed.len() <= NONCE_LEN {
            return Err(CryptoError::Truncated);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
    }
}

/// Random 32-byte secret, hex encoded.
pub fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Hex HMAC-SHA256 of `body`, prefixed the way the CRM sends it.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a `sha256=<hex>` signature header.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_sig) = header.trim().strip_prefix(SIGNATURE_PREFIX) else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn cipher() -> CredentialCipher {
        CredentialCipher::from_key_bytes(&[7u8; KEY_LEN]).unwrap()
    }

    #[test]
    fn encrypts_with_fresh_nonce_each_time() {
        let c = cipher();
        let a = c.encrypt("crm-api-key").unwrap();
        let b = c.encrypt("crm-api-key").unwrap();
        assert_ne!(a, b);
        assert_eq!(c.decrypt(&a).unwrap(), "crm-api-key");
        assert_eq!(c.decrypt(&b).unwrap(), "crm-api-key");
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let c = cipher();
        let sealed = c.encrypt("secret").unwrap();
        let mut bytes = STANDARD.decode(&sealed).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = STANDARD.encode(bytes);
        assert!(matches!(c.decrypt(&tampered), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn rejects_wrong_key() {
        let sealed = cipher().encrypt("secret").unwrap();
        let other = CredentialCipher::from_key_bytes(&[9u8; KEY_LEN]).unwrap();
        assert!(matches!(other.decrypt(&sealed), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn rejects_truncated_input() {
        let short = STANDARD.encode([0u8; NONCE_LEN]);
        assert!(matches!(cipher().decrypt(&short), Err(CryptoError::Truncated)));
    }

    #[test]
    fn validates_key_length() {
        let encoded = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            CredentialCipher::from_base64_key(&encoded),
            Err(CryptoError::InvalidKeyLength(16))
        ));
        assert!(matches!(
            CredentialCipher::from_base64_key("  "),
            Err(CryptoError::MissingKey)
        ));
    }

    #[test]
    fn development_derives_key_from_jwt_secret() {
        let config = AppConfig::development();
        let a = CredentialCipher::from_config(&config.security, Environment::Development).unwrap();
        let b = CredentialCipher::from_config(&config.security, Environment::Development).unwrap();
        let sealed = a.encrypt("k").unwrap();
        assert_eq!(b.decrypt(&sealed).unwrap(), "k");

        assert!(matches!(
            CredentialCipher::from_config(&config.security, Environment::Production),
            Err(CryptoError::MissingKey)
        ));
    }

    #[test]
    fn signatures_verify_only_for_matching_body_and_secret() {
        let header = sign_payload("whsec", b"{\"event\":\"lead.updated\"}");
        assert!(header.starts_with(SIGNATURE_PREFIX));
        assert!(verify_signature("whsec", b"{\"event\":\"lead.updated\"}", &header));
        assert!(!verify_signature("whsec", b"{\"event\":\"lead.deleted\"}", &header));
        assert!(!verify_signature("other", b"{\"event\":\"lead.updated\"}", &header));
        assert!(!verify_signature("whsec", b"x", "sha256=not-hex"));
        assert!(!verify_signature("whsec", b"x", "md5=abcd"));
    }

    #[test]
    fn generated_secrets_are_distinct_hex() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
