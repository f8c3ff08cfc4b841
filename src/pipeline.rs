// 🧭 Matching Pipeline - filter, re-score and rank a candidate pool
//
// Per entity: build profile once → predicate gate → min score on the
// unadjusted base score → optional regime adjustment → emit.
// Output is sorted by adjusted score descending, identifier ascending on ties.

use crate::config::Settings;
use crate::credentials::Entity;
use crate::error::ValidationError;
use crate::index_engine::IndexSnapshot;
use crate::predicate;
use crate::profile::CredentialProfile;
use crate::regime::{MarketRegime, RegimeScoreAdjuster};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

// ============================================================================
// QUERY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub required_skills: HashSet<String>,

    #[serde(default)]
    pub required_character: HashSet<String>,

    #[serde(default)]
    pub required_loyalty: HashSet<String>,

    /// Threshold on the base score, in [0, 100]
    #[serde(default = "default_min_score", alias = "min_predictive_score")]
    pub min_score: f64,

    #[serde(default = "default_apply_regime", alias = "consider_market_regime")]
    pub apply_regime: bool,
}

fn default_min_score() -> f64 {
    70.0
}

fn default_apply_regime() -> bool {
    true
}

impl Default for Query {
    fn default() -> Self {
        Query {
            required_skills: HashSet::new(),
            required_character: HashSet::new(),
            required_loyalty: HashSet::new(),
            min_score: default_min_score(),
            apply_regime: default_apply_regime(),
        }
    }
}

impl Query {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=100.0).contains(&self.min_score) {
            return Err(ValidationError::new(
                "min_score",
                format!("{} is outside [0, 100]", self.min_score),
            ));
        }
        Ok(())
    }
}

/// Query as received from a client. An omitted threshold or regime flag
/// falls back to the configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub required_skills: HashSet<String>,
    #[serde(default)]
    pub required_character: HashSet<String>,
    #[serde(default)]
    pub required_loyalty: HashSet<String>,
    #[serde(default, alias = "min_predictive_score")]
    pub min_score: Option<f64>,
    #[serde(default, alias = "consider_market_regime")]
    pub apply_regime: Option<bool>,
}

impl QueryRequest {
    pub fn into_query(self, settings: &Settings) -> Query {
        Query {
            required_skills: self.required_skills,
            required_character: self.required_character,
            required_loyalty: self.required_loyalty,
            min_score: self.min_score.unwrap_or(settings.default_min_score),
            apply_regime: self.apply_regime.unwrap_or(settings.default_apply_regime),
        }
    }
}

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub identifier: String,
    pub base_score: f64,
    pub adjusted_score: f64,
    pub adjustment_delta: f64,
    pub credential_count: usize,
    pub experience_years: u32,
    pub predicate_verified: bool,
}

/// Summary of one matching invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub regime: Option<MarketRegime>,
    pub regime_applied: bool,
    pub screened: usize,
    pub matches: Vec<MatchResult>,
}

// ============================================================================
// PIPELINE
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingPipeline {
    adjuster: RegimeScoreAdjuster,
}

impl MatchingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rank the pool against the query. Pure: the pool is only read.
    pub fn match_entities(
        &self,
        pool: &[Entity],
        query: &Query,
        snapshot: Option<&IndexSnapshot>,
    ) -> Vec<MatchResult> {
        let regime = snapshot
            .filter(|_| query.apply_regime)
            .map(|s| s.regime);

        let mut results: Vec<MatchResult> = pool
            .iter()
            .filter_map(|entity| self.evaluate_entity(entity, query, regime))
            .collect();

        results.sort_by(rank_order);
        results
    }

    /// Same as [`match_entities`](Self::match_entities), with screening totals
    pub fn report(
        &self,
        pool: &[Entity],
        query: &Query,
        snapshot: Option<&IndexSnapshot>,
    ) -> MatchReport {
        MatchReport {
            regime: snapshot.map(|s| s.regime),
            regime_applied: query.apply_regime && snapshot.is_some(),
            screened: pool.len(),
            matches: self.match_entities(pool, query, snapshot),
        }
    }

    fn evaluate_entity(
        &self,
        entity: &Entity,
        query: &Query,
        regime: Option<MarketRegime>,
    ) -> Option<MatchResult> {
        let profile = CredentialProfile::build(entity);

        if !predicate::evaluate(&profile, query) {
            debug!(identifier = %entity.identifier, "predicate not satisfied");
            return None;
        }

        if entity.base_score < query.min_score {
            debug!(
                identifier = %entity.identifier,
                base_score = entity.base_score,
                min_score = query.min_score,
                "below minimum score"
            );
            return None;
        }

        let (adjusted_score, adjustment_delta) = match regime {
            Some(regime) => {
                let adjusted = self.adjuster.adjust(
                    entity.base_score,
                    &profile,
                    entity.experience_years,
                    regime,
                );
                (adjusted, adjusted - entity.base_score)
            }
            None => (entity.base_score, 0.0),
        };

        Some(MatchResult {
            identifier: entity.identifier.clone(),
            base_score: entity.base_score,
            adjusted_score,
            adjustment_delta,
            credential_count: entity.credentials.len(),
            experience_years: entity.experience_years,
            predicate_verified: true,
        })
    }
}

fn rank_order(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.adjusted_score
        .total_cmp(&a.adjusted_score)
        .then_with(|| a.identifier.cmp(&b.identifier))
}

// ============================================================================
// TESTS
// ============================================================================
