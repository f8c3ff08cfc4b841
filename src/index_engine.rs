// 🪙 Index Engine - composite trust index and market regime
//
// Raw economic inputs → goodwill components → unified trust (history) →
// momentum → trust score → regime.
//
// The history and weights live on the engine instance; nothing is global.
// Callers that share one engine across requests serialize access themselves.

use crate::error::{DomainError, ValidationError};
use crate::regime::MarketRegime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Fixed weights of the unified trust average
pub const GENERAL_WEIGHT: f64 = 0.6;
pub const CONSUMER_WEIGHT: f64 = 0.4;

/// Substituted for a zero consumer backlash
pub const BACKLASH_EPSILON: f64 = 0.001;

pub const DEFAULT_MOMENTUM_WINDOW: usize = 2;

/// Volatility above this switches to defensive weights
pub const VOLATILITY_THRESHOLD: f64 = 25.0;

// ============================================================================
// WEIGHTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexWeights {
    pub w_goodwill: f64,
    pub w_gsr: f64,
}

impl IndexWeights {
    pub const DEFAULT: IndexWeights = IndexWeights { w_goodwill: 1.0, w_gsr: 0.01 };
    pub const HIGH_VOLATILITY: IndexWeights = IndexWeights { w_goodwill: 0.8, w_gsr: 0.015 };
    pub const MA_SURGE: IndexWeights = IndexWeights { w_goodwill: 1.2, w_gsr: 0.005 };
}

impl Default for IndexWeights {
    fn default() -> Self {
        IndexWeights::DEFAULT
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Inputs the snapshot was computed from. Volatility is `None` until the
/// engine has been reweighted at least once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawInputs {
    pub gold_price: f64,
    pub silver_price: f64,
    pub volatility: Option<f64>,
    pub ma_surge: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub trust_score: f64,
    pub momentum: f64,
    pub gold_silver_ratio: f64,
    pub regime: MarketRegime,
    pub raw_inputs: RawInputs,
    pub computed_at: DateTime<Utc>,
}

// ============================================================================
// MARKET INPUTS
// ============================================================================

/// One reading from the market input feed. Goodwill components default to
/// the reference values used when a feed supplies only prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInputs {
    pub gold_price: f64,
    pub silver_price: f64,

    // General goodwill components
    #[serde(default = "defaults::retention", alias = "CR")]
    pub retention: f64,
    #[serde(default = "defaults::employee_satisfaction", alias = "ES")]
    pub employee_satisfaction: f64,
    #[serde(default = "defaults::brand_trust", alias = "BT")]
    pub brand_trust: f64,
    #[serde(default = "defaults::revenue_growth", alias = "RG")]
    pub revenue_growth: f64,
    #[serde(default = "defaults::backlash", alias = "NCB")]
    pub backlash: f64,

    // Consumer goodwill components
    #[serde(default = "defaults::customer_satisfaction", alias = "CS")]
    pub customer_satisfaction: f64,
    #[serde(default = "defaults::brand_reputation", alias = "BR")]
    pub brand_reputation: f64,
    #[serde(default = "defaults::customer_advocacy", alias = "CA")]
    pub customer_advocacy: f64,
    #[serde(default = "defaults::service_speed", alias = "SS")]
    pub service_speed: f64,
    #[serde(default = "defaults::consumer_backlash", alias = "NCB_consumer")]
    pub consumer_backlash: f64,

    // Reweighting signals
    #[serde(default = "defaults::volatility", alias = "VIX")]
    pub volatility: f64,
    #[serde(default, alias = "M_A_Surges")]
    pub ma_surge: bool,
}

mod defaults {
    pub fn retention() -> f64 { 0.85 }
    pub fn employee_satisfaction() -> f64 { 0.75 }
    pub fn brand_trust() -> f64 { 0.80 }
    pub fn revenue_growth() -> f64 { 1.05 }
    pub fn backlash() -> f64 { 0.1 }
    pub fn customer_satisfaction() -> f64 { 0.90 }
    pub fn brand_reputation() -> f64 { 0.85 }
    pub fn customer_advocacy() -> f64 { 0.70 }
    pub fn service_speed() -> f64 { 0.80 }
    pub fn consumer_backlash() -> f64 { 0.05 }
    pub fn volatility() -> f64 { 20.0 }
}

impl MarketInputs {
    pub fn new(gold_price: f64, silver_price: f64) -> Self {
        MarketInputs {
            gold_price,
            silver_price,
            retention: defaults::retention(),
            employee_satisfaction: defaults::employee_satisfaction(),
            brand_trust: defaults::brand_trust(),
            revenue_growth: defaults::revenue_growth(),
            backlash: defaults::backlash(),
            customer_satisfaction: defaults::customer_satisfaction(),
            brand_reputation: defaults::brand_reputation(),
            customer_advocacy: defaults::customer_advocacy(),
            service_speed: defaults::service_speed(),
            consumer_backlash: defaults::consumer_backlash(),
            volatility: defaults::volatility(),
            ma_surge: false,
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    pub fn with_ma_surge(mut self, ma_surge: bool) -> Self {
        self.ma_surge = ma_surge;
        self
    }

    /// Prices must be strictly positive at the boundary
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.gold_price > 0.0) {
            return Err(ValidationError::new("gold_price", "must be greater than zero"));
        }
        if !(self.silver_price > 0.0) {
            return Err(ValidationError::new("silver_price", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Everything produced by one full market update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketUpdate {
    pub snapshot: IndexSnapshot,
    pub general_goodwill: f64,
    pub consumer_goodwill: f64,
    pub unified_trust: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub history_len: usize,
    pub weights: IndexWeights,
}

// ============================================================================
// INDEX ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct IndexEngine {
    weights: IndexWeights,
    history: Vec<f64>,
    last_volatility: Option<f64>,
    last_ma_surge: bool,
}

impl IndexEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// General goodwill: `CR·ES·BT·(RG^time_weight − backlash) / T`
    #[allow(clippy::too_many_arguments)]
    pub fn composite_trust(
        &self,
        retention: f64,
        employee_satisfaction: f64,
        brand_trust: f64,
        revenue_growth: f64,
        time_weight: f64,
        backlash: f64,
        period: f64,
    ) -> Result<f64, DomainError> {
        if period == 0.0 {
            return Err(DomainError::division_by_zero("composite_trust"));
        }
        let numerator = retention
            * employee_satisfaction
            * brand_trust
            * (revenue_growth.powf(time_weight) - backlash);
        Ok(numerator / period)
    }

    /// Consumer goodwill: `CS·BR·CA·SS / consumer_backlash`.
    ///
    /// A zero backlash is replaced with [`BACKLASH_EPSILON`] instead of failing.
    pub fn external_trust(
        &self,
        customer_satisfaction: f64,
        brand_reputation: f64,
        customer_advocacy: f64,
        service_speed: f64,
        consumer_backlash: f64,
    ) -> f64 {
        let backlash = if consumer_backlash == 0.0 {
            warn!("consumer backlash is zero, substituting {}", BACKLASH_EPSILON);
            BACKLASH_EPSILON
        } else {
            consumer_backlash
        };
        customer_satisfaction * brand_reputation * customer_advocacy * service_speed / backlash
    }

    /// Weighted average of general and consumer goodwill. Appends to history.
    pub fn unified_trust(
        &mut self,
        general: f64,
        consumer: f64,
        period: f64,
    ) -> Result<f64, DomainError> {
        if period == 0.0 {
            return Err(DomainError::division_by_zero("unified_trust"));
        }
        let value = (GENERAL_WEIGHT * general + CONSUMER_WEIGHT * consumer) / period;
        self.history.push(value);
        debug!(value, history_len = self.history.len(), "unified trust recorded");
        Ok(value)
    }

    /// Relative change of unified trust over `window` entries.
    /// Neutral (0.0) when history is too short or the reference value is 0.
    pub fn momentum(&self, window: usize) -> f64 {
        if window == 0 || self.history.len() < window {
            return 0.0;
        }
        let latest = self.history[self.history.len() - 1];
        let reference = self.history[self.history.len() - window];
        if reference == 0.0 {
            return 0.0;
        }
        (latest - reference) / reference
    }

    /// Volatility takes precedence over the M&A flag
    pub fn reweight(&mut self, volatility: f64, ma_surge: bool) {
        self.weights = if volatility > VOLATILITY_THRESHOLD {
            IndexWeights::HIGH_VOLATILITY
        } else if ma_surge {
            IndexWeights::MA_SURGE
        } else {
            IndexWeights::DEFAULT
        };
        self.last_volatility = Some(volatility);
        self.last_ma_surge = ma_surge;

        info!(
            volatility,
            ma_surge,
            w_goodwill = self.weights.w_goodwill,
            w_gsr = self.weights.w_gsr,
            "index reweighted"
        );
    }

    pub fn gold_silver_ratio(&self, gold: f64, silver: f64) -> Result<f64, DomainError> {
        if silver == 0.0 {
            return Err(DomainError::division_by_zero("gold_silver_ratio"));
        }
        Ok(gold / silver)
    }

    /// `score = w_goodwill·momentum − w_gsr·ratio`, then classify
    pub fn compute_index(&self, gold: f64, silver: f64) -> Result<IndexSnapshot, DomainError> {
        let ratio = self.gold_silver_ratio(gold, silver)?;
        let momentum = self.momentum(DEFAULT_MOMENTUM_WINDOW);
        let trust_score = self.weights.w_goodwill * momentum - self.weights.w_gsr * ratio;
        let regime = MarketRegime::classify(trust_score);

        Ok(IndexSnapshot {
            trust_score,
            momentum,
            gold_silver_ratio: ratio,
            regime,
            raw_inputs: RawInputs {
                gold_price: gold,
                silver_price: silver,
                volatility: self.last_volatility,
                ma_surge: self.last_ma_surge,
            },
            computed_at: Utc::now(),
        })
    }

    /// Full update: goodwill → unified trust → reweight → index.
    ///
    /// A failure in `compute_index` leaves the unified trust value appended.
    pub fn update(&mut self, inputs: &MarketInputs) -> Result<MarketUpdate, DomainError> {
        let general_goodwill = self.composite_trust(
            inputs.retention,
            inputs.employee_satisfaction,
            inputs.brand_trust,
            inputs.revenue_growth,
            1.0,
            inputs.backlash,
            1.0,
        )?;
        let consumer_goodwill = self.external_trust(
            inputs.customer_satisfaction,
            inputs.brand_reputation,
            inputs.customer_advocacy,
            inputs.service_speed,
            inputs.consumer_backlash,
        );
        let unified_trust = self.unified_trust(general_goodwill, consumer_goodwill, 1.0)?;

        self.reweight(inputs.volatility, inputs.ma_surge);
        let snapshot = self.compute_index(inputs.gold_price, inputs.silver_price)?;

        info!(
            trust_score = snapshot.trust_score,
            momentum = snapshot.momentum,
            regime = snapshot.regime.as_str(),
            "trust index updated"
        );

        Ok(MarketUpdate {
            snapshot,
            general_goodwill,
            consumer_goodwill,
            unified_trust,
        })
    }

    /// Clear history and restore default weights
    pub fn reset(&mut self) {
        *self = IndexEngine::default();
        info!("index engine reset");
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn weights(&self) -> IndexWeights {
        self.weights
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            history_len: self.history.len(),
            weights: self.weights,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
