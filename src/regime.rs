// 📈 Market Regime - classification, score adjustment, playbooks
//
// Regime thresholds are exact: only a trust score strictly beyond ±0.05
// leaves neutral.

use crate::index_engine::IndexSnapshot;
use crate::profile::CredentialProfile;
use serde::{Deserialize, Serialize};

pub const BULLISH_THRESHOLD: f64 = 0.05;
pub const BEARISH_THRESHOLD: f64 = -0.05;
pub const SCORE_CEILING: f64 = 100.0;

// ============================================================================
// MARKET REGIME
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketRegime {
    Bullish,
    Bearish,
    Neutral,
}

impl MarketRegime {
    pub fn classify(trust_score: f64) -> Self {
        if trust_score > BULLISH_THRESHOLD {
            MarketRegime::Bullish
        } else if trust_score < BEARISH_THRESHOLD {
            MarketRegime::Bearish
        } else {
            MarketRegime::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::Bullish => "bullish",
            MarketRegime::Bearish => "bearish",
            MarketRegime::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bullish" => Some(MarketRegime::Bullish),
            "bearish" => Some(MarketRegime::Bearish),
            "neutral" => Some(MarketRegime::Neutral),
            _ => None,
        }
    }

    /// Hiring posture recommended for this regime
    pub fn playbook(&self) -> RegimePlaybook {
        match self {
            MarketRegime::Bullish => RegimePlaybook::new(
                "aggressive_growth",
                &["innovation", "growth_potential", "risk_taking"],
                "Market confidence high - invest in transformative talent",
            ),
            MarketRegime::Bearish => RegimePlaybook::new(
                "defensive_stability",
                &["loyalty", "proven_performance", "crisis_management"],
                "Market fear elevated - secure reliable, stable talent",
            ),
            MarketRegime::Neutral => RegimePlaybook::new(
                "balanced",
                &["versatility", "adaptability", "core_competencies"],
                "Market equilibrium - maintain strategic flexibility",
            ),
        }
    }
}

// ============================================================================
// REGIME SCORE ADJUSTER
// ============================================================================

/// Multiplicative, regime-keyed adjustment of a base score.
///
/// Rules within a regime compose: every applicable multiplier is applied.
/// The result is capped at 100 but has no floor.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegimeScoreAdjuster;

impl RegimeScoreAdjuster {
    pub fn adjust(
        &self,
        base_score: f64,
        profile: &CredentialProfile,
        experience_years: u32,
        regime: MarketRegime,
    ) -> f64 {
        let has_loyalty = profile.has_loyalty();
        let has_innovation = profile.has_innovation();
        let has_stability = profile.has_stability();

        let mut score = base_score;

        match regime {
            MarketRegime::Bearish => {
                if has_stability {
                    score *= 1.15;
                }
                if has_loyalty {
                    score *= 1.10;
                }
                if has_innovation && !has_stability {
                    score *= 0.95;
                }
            }
            MarketRegime::Bullish => {
                if has_innovation {
                    score *= 1.15;
                }
                if experience_years < 5 {
                    score *= 1.08;
                }
                if has_loyalty && experience_years > 10 {
                    score *= 0.98;
                }
            }
            MarketRegime::Neutral => {}
        }

        score.min(SCORE_CEILING)
    }
}

// ============================================================================
// PLAYBOOK & FORECAST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimePlaybook {
    pub hiring_strategy: String,
    pub prioritize: Vec<String>,
    pub rationale: String,
}

impl RegimePlaybook {
    fn new(strategy: &str, prioritize: &[&str], rationale: &str) -> Self {
        RegimePlaybook {
            hiring_strategy: strategy.to_string(),
            prioritize: prioritize.iter().map(|p| p.to_string()).collect(),
            rationale: rationale.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiringForecast {
    pub current_regime: MarketRegime,
    pub trust_score: f64,
    pub gold_silver_ratio: f64,
    pub forecast_horizon: String,
    pub confidence_level: String,
    pub recommendation: String,
    pub risk_factors: Vec<String>,
    pub opportunity: String,
}

impl HiringForecast {
    pub fn from_snapshot(snapshot: &IndexSnapshot) -> Self {
        let (recommendation, risk_factors, opportunity): (&str, &[&str], &str) =
            match snapshot.regime {
                MarketRegime::Bullish => (
                    "Accelerate hiring for growth roles",
                    &["Potential overheating", "Wage inflation"],
                    "High - capture market share through talent acquisition",
                ),
                MarketRegime::Bearish => (
                    "Defensive hiring - focus on retention and critical roles",
                    &["Economic downturn", "Budget constraints"],
                    "Moderate - acquire undervalued senior talent",
                ),
                MarketRegime::Neutral => (
                    "Maintain current hiring pace with strategic flexibility",
                    &["Market uncertainty"],
                    "Moderate - balanced approach",
                ),
            };

        HiringForecast {
            current_regime: snapshot.regime,
            trust_score: snapshot.trust_score,
            gold_silver_ratio: snapshot.gold_silver_ratio,
            forecast_horizon: "3-6 months".to_string(),
            confidence_level: "moderate".to_string(),
            recommendation: recommendation.to_string(),
            risk_factors: risk_factors.iter().map(|r| r.to_string()).collect(),
            opportunity: opportunity.to_string(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
