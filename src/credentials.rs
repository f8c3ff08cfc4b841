// 🎖️ Credentials & Entities - the records the matching core reads
// Credentials are immutable, issuer-attested claims; entities are never
// mutated by scoring, which is a pure read-side computation.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Placeholder hash carried by credentials registered without an attestation.
pub const UNATTESTED_HASH: &str = "0x0000...0000";

// ============================================================================
// CREDENTIAL CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialCategory {
    Skill,
    Character,
    Loyalty,
    Project,
    Certification,
}

impl CredentialCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialCategory::Skill => "skill",
            CredentialCategory::Character => "character",
            CredentialCategory::Loyalty => "loyalty",
            CredentialCategory::Project => "project",
            CredentialCategory::Certification => "certification",
        }
    }
}

// ============================================================================
// CREDENTIAL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(alias = "type")]
    pub category: CredentialCategory,

    pub name: String,

    pub issuer: String,

    /// Issue date as supplied by the issuer (free-form date string)
    #[serde(alias = "issue_date")]
    pub issued: String,

    #[serde(default = "default_verification_hash")]
    pub verification_hash: String,
}

fn default_verification_hash() -> String {
    UNATTESTED_HASH.to_string()
}

impl Credential {
    /// Create a credential whose verification hash is derived from its content
    pub fn new(category: CredentialCategory, name: &str, issuer: &str, issued: &str) -> Self {
        let mut credential = Credential {
            category,
            name: name.to_string(),
            issuer: issuer.to_string(),
            issued: issued.to_string(),
            verification_hash: String::new(),
        };
        credential.verification_hash = format!("0x{}", credential.digest());
        credential
    }

    /// SHA-256 over the attested fields. Used as a content fingerprint,
    /// not as a proof of anything.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            self.category.as_str(),
            self.name,
            self.issuer,
            self.issued
        ));
        format!("{:x}", hasher.finalize())
    }

    pub fn is_attested(&self) -> bool {
        self.verification_hash != UNATTESTED_HASH
    }
}

// ============================================================================
// ENTITY
// ============================================================================

/// A credentialed candidate. Identifier uniqueness is owned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(alias = "wallet_address")]
    pub identifier: String,

    #[serde(alias = "tokens", default)]
    pub credentials: Vec<Credential>,

    #[serde(alias = "years_experience")]
    pub experience_years: u32,

    /// Predictive score in [0, 100]
    #[serde(alias = "base_predictive_score")]
    pub base_score: f64,
}

impl Entity {
    pub fn new(identifier: &str, experience_years: u32, base_score: f64) -> Self {
        Entity {
            identifier: identifier.to_string(),
            credentials: Vec::new(),
            experience_years,
            base_score,
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credentials.push(credential);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.identifier.trim().is_empty() {
            return Err(ValidationError::new("identifier", "must not be empty"));
        }
        if !(0.0..=100.0).contains(&self.base_score) {
            return Err(ValidationError::new(
                "base_score",
                format!("{} is outside [0, 100]", self.base_score),
            ));
        }
        if let Some(credential) = self.credentials.iter().find(|c| c.name.trim().is_empty()) {
            return Err(ValidationError::new(
                "credentials",
                format!("{} credential has an empty name", credential.category.as_str()),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_digest_is_stable() {
        let a = Credential::new(CredentialCategory::Skill, "Rust", "Guild", "2024-01");
        let b = Credential::new(CredentialCategory::Skill, "Rust", "Guild", "2024-01");
        let c = Credential::new(CredentialCategory::Project, "Rust", "Guild", "2024-01");

        assert_eq!(a.verification_hash, b.verification_hash);
        assert_ne!(a.verification_hash, c.verification_hash);
        assert_eq!(a.digest().len(), 64);
        assert!(a.is_attested());
    }

    #[test]
    fn test_deserialize_legacy_field_names() {
        let json = r#"{
            "wallet_address": "0xabc",
            "tokens": [
                {"type": "loyalty", "name": "5yr Tenure", "issuer": "Acme", "issue_date": "2020-01"}
            ],
            "years_experience": 12,
            "base_predictive_score": 80.0
        }"#;

        let entity: Entity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.identifier, "0xabc");
        assert_eq!(entity.experience_years, 12);
        assert_eq!(entity.credentials[0].category, CredentialCategory::Loyalty);
        assert_eq!(entity.credentials[0].verification_hash, UNATTESTED_HASH);
        assert!(!entity.credentials[0].is_attested());
    }

    #[test]
    fn test_entity_validation() {
        assert!(Entity::new("a", 1, 50.0).validate().is_ok());
        assert!(Entity::new("a", 1, 100.0).validate().is_ok());

        let err = Entity::new("", 1, 50.0).validate().unwrap_err();
        assert_eq!(err.field, "identifier");

        let err = Entity::new("a", 1, 100.5).validate().unwrap_err();
        assert_eq!(err.field, "base_score");

        let err = Entity::new("a", 1, 50.0)
            .with_credential(Credential::new(CredentialCategory::Skill, " ", "x", "2024"))
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "credentials");
    }
}
