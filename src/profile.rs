// 🧾 Credential Profile - normalized lookup built once per entity per query
// Shared by the match predicate and the regime score adjuster.

use crate::credentials::{CredentialCategory, Entity};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialProfile {
    pub skills: HashSet<String>,
    pub character: HashSet<String>,
    pub loyalty: HashSet<String>,

    /// Every credential name lower-cased, across all categories, in order
    pub lowercase_names: Vec<String>,
}

impl CredentialProfile {
    /// Single pass over the entity's credentials
    pub fn build(entity: &Entity) -> Self {
        let mut profile = CredentialProfile::default();

        for credential in &entity.credentials {
            profile.lowercase_names.push(credential.name.to_lowercase());

            match credential.category {
                CredentialCategory::Skill => {
                    profile.skills.insert(credential.name.clone());
                }
                CredentialCategory::Character => {
                    profile.character.insert(credential.name.clone());
                }
                CredentialCategory::Loyalty => {
                    profile.loyalty.insert(credential.name.clone());
                }
                CredentialCategory::Project | CredentialCategory::Certification => {}
            }
        }

        profile
    }

    pub fn has_loyalty(&self) -> bool {
        !self.loyalty.is_empty()
    }

    pub fn has_innovation(&self) -> bool {
        self.name_contains(&["innovation"])
    }

    /// Stability is keyword-based and independent of the loyalty category
    pub fn has_stability(&self) -> bool {
        self.name_contains(&["loyalty", "mentor"])
    }

    fn name_contains(&self, keywords: &[&str]) -> bool {
        self.lowercase_names
            .iter()
            .any(|name| keywords.iter().any(|k| name.contains(k)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credential;

    fn entity() -> Entity {
        Entity::new("e1", 4, 75.0)
            .with_credential(Credential::new(CredentialCategory::Skill, "Rust", "Guild", "2024"))
            .with_credential(Credential::new(CredentialCategory::Skill, "Rust", "Other", "2023"))
            .with_credential(Credential::new(CredentialCategory::Character, "Integrity", "Peers", "2024"))
            .with_credential(Credential::new(CredentialCategory::Loyalty, "5yr Tenure", "Acme", "2020"))
            .with_credential(Credential::new(CredentialCategory::Project, "Innovation Award", "Acme", "2022"))
            .with_credential(Credential::new(CredentialCategory::Certification, "Team Mentor", "Acme", "2021"))
    }

    #[test]
    fn test_build_splits_categories() {
        let profile = CredentialProfile::build(&entity());

        assert_eq!(profile.skills.len(), 1);
        assert!(profile.skills.contains("Rust"));
        assert!(profile.character.contains("Integrity"));
        assert!(profile.loyalty.contains("5yr Tenure"));
        assert_eq!(profile.lowercase_names.len(), 6);
        assert_eq!(profile.lowercase_names[4], "innovation award");
    }

    #[test]
    fn test_feature_flags() {
        let profile = CredentialProfile::build(&entity());
        assert!(profile.has_loyalty());
        assert!(profile.has_innovation());
        assert!(profile.has_stability());

        let empty = CredentialProfile::build(&Entity::new("e2", 1, 10.0));
        assert!(!empty.has_loyalty());
        assert!(!empty.has_innovation());
        assert!(!empty.has_stability());
    }

    #[test]
    fn test_loyalty_category_without_keyword_is_not_stability() {
        let e = Entity::new("e3", 12, 80.0)
            .with_credential(Credential::new(CredentialCategory::Loyalty, "10yr Tenure", "Acme", "2015"));
        let profile = CredentialProfile::build(&e);

        assert!(profile.has_loyalty());
        assert!(!profile.has_stability());
    }
}
