// 👥 Candidate Pool - in-memory entity store
//
// Owns identifier uniqueness. Matching never reads the pool directly:
// callers take a frozen `snapshot()` for the duration of one invocation.

use crate::credentials::{CredentialCategory, Entity};
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

pub const LOW_LOYALTY_RATIO: f64 = 0.3;
pub const HIGH_SKILL_RATIO: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolError {
    #[error("identifier already registered: {0}")]
    Duplicate(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

// ============================================================================
// AGGREGATES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub average_experience: f64,
    pub average_base_score: f64,
    /// Keyed `"category:name"`
    pub credential_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSeverity {
    Warning,
    Positive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TalentSignal {
    pub signal: String,
    pub severity: SignalSeverity,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TalentFlow {
    pub average_credentials: f64,
    pub loyalty_concentration: f64,
    pub skill_concentration: f64,
    pub signals: Vec<TalentSignal>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// CANDIDATE POOL
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    entities: Vec<Entity>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from already-stored entities, enforcing uniqueness
    pub fn from_entities(entities: Vec<Entity>) -> Result<Self, PoolError> {
        let mut pool = CandidatePool::new();
        for entity in entities {
            pool.register(entity)?;
        }
        Ok(pool)
    }

    pub fn register(&mut self, entity: Entity) -> Result<(), PoolError> {
        entity.validate()?;
        if self.contains(&entity.identifier) {
            return Err(PoolError::Duplicate(entity.identifier));
        }
        info!(
            identifier = %entity.identifier,
            credentials = entity.credentials.len(),
            "entity registered"
        );
        self.entities.push(entity);
        Ok(())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entities.iter().any(|e| e.identifier == identifier)
    }

    pub fn get(&self, identifier: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.identifier == identifier)
    }

    pub fn remove(&mut self, identifier: &str) -> Option<Entity> {
        let position = self.entities.iter().position(|e| e.identifier == identifier)?;
        Some(self.entities.remove(position))
    }

    /// Frozen copy in registration order
    pub fn snapshot(&self) -> Vec<Entity> {
        self.entities.clone()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    pub fn stats(&self) -> PoolStats {
        let total = self.entities.len();
        let mut credential_distribution = BTreeMap::new();

        for entity in &self.entities {
            for credential in &entity.credentials {
                *credential_distribution
                    .entry(format!("{}:{}", credential.category.as_str(), credential.name))
                    .or_insert(0) += 1;
            }
        }

        let (average_experience, average_base_score) = if total == 0 {
            (0.0, 0.0)
        } else {
            let experience: f64 = self.entities.iter().map(|e| e.experience_years as f64).sum();
            let score: f64 = self.entities.iter().map(|e| e.base_score).sum();
            (round2(experience / total as f64), round2(score / total as f64))
        };

        PoolStats {
            total,
            average_experience,
            average_base_score,
            credential_distribution,
        }
    }

    /// Aggregate credential mix read as a labor-market signal
    pub fn talent_flow(&self) -> TalentFlow {
        if self.entities.is_empty() {
            return TalentFlow {
                average_credentials: 0.0,
                loyalty_concentration: 0.0,
                skill_concentration: 0.0,
                signals: Vec::new(),
            };
        }

        let total = self.entities.len() as f64;
        let count = |category: CredentialCategory| -> usize {
            self.entities
                .iter()
                .flat_map(|e| e.credentials.iter())
                .filter(|c| c.category == category)
                .count()
        };

        let credentials: usize = self.entities.iter().map(|e| e.credentials.len()).sum();
        let loyalty_ratio = count(CredentialCategory::Loyalty) as f64 / total;
        let skill_ratio = count(CredentialCategory::Skill) as f64 / total;

        let mut signals = Vec::new();
        if loyalty_ratio < LOW_LOYALTY_RATIO {
            signals.push(TalentSignal {
                signal: "LOW_LOYALTY_CONCENTRATION".to_string(),
                severity: SignalSeverity::Warning,
                interpretation: "Potential workforce instability - increased churn risk".to_string(),
            });
        }
        if skill_ratio > HIGH_SKILL_RATIO {
            signals.push(TalentSignal {
                signal: "HIGH_UPSKILLING_ACTIVITY".to_string(),
                severity: SignalSeverity::Positive,
                interpretation: "Workforce adapting to market changes - resilience indicator"
                    .to_string(),
            });
        }

        TalentFlow {
            average_credentials: round2(credentials as f64 / total),
            loyalty_concentration: round2(loyalty_ratio),
            skill_concentration: round2(skill_ratio),
            signals,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
