// 🔐 Match Predicate - deterministic containment gate
// Stands in for "zero-knowledge" verification: a boolean check over the
// pre-built profile sets, not a cryptographic protocol.

use crate::pipeline::Query;
use crate::profile::CredentialProfile;
use std::collections::HashSet;

/// True iff every required skill, character trait and loyalty credential is
/// present in the profile. Empty requirement sets trivially pass.
pub fn evaluate(profile: &CredentialProfile, query: &Query) -> bool {
    contains_all(&profile.skills, &query.required_skills)
        && contains_all(&profile.character, &query.required_character)
        && contains_all(&profile.loyalty, &query.required_loyalty)
}

fn contains_all(held: &HashSet<String>, required: &HashSet<String>) -> bool {
    required.is_subset(held)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credential, CredentialCategory, Entity};

    fn profile_with_skills(skills: &[&str]) -> CredentialProfile {
        let mut entity = Entity::new("p", 3, 50.0);
        for skill in skills {
            entity = entity.with_credential(Credential::new(CredentialCategory::Skill, skill, "i", "2024"));
        }
        CredentialProfile::build(&entity)
    }

    fn query_requiring(skills: &[&str]) -> Query {
        Query {
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            ..Query::default()
        }
    }

    #[test]
    fn test_containment() {
        let profile = profile_with_skills(&["A"]);

        assert!(!evaluate(&profile, &query_requiring(&["A", "B"])));
        assert!(evaluate(&profile, &query_requiring(&["A"])));
        assert!(evaluate(&profile, &query_requiring(&[])));
    }

    #[test]
    fn test_exact_names_only() {
        let profile = profile_with_skills(&["Python Mastery"]);

        assert!(!evaluate(&profile, &query_requiring(&["python mastery"])));
        assert!(!evaluate(&profile, &query_requiring(&["Python"])));
    }

    #[test]
    fn test_category_must_match() {
        let entity = Entity::new("c", 3, 50.0)
            .with_credential(Credential::new(CredentialCategory::Skill, "Integrity", "i", "2024"));
        let profile = CredentialProfile::build(&entity);

        let query = Query {
            required_character: ["Integrity".to_string()].into_iter().collect(),
            ..Query::default()
        };
        assert!(!evaluate(&profile, &query));
    }
}
