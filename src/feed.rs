// 📂 Market Input Feed - CSV readings replayed through the index engine

use crate::error::DomainError;
use crate::index_engine::{IndexEngine, MarketInputs, MarketUpdate};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Load market readings from CSV. Headers are field names (or their short
/// aliases such as `VIX`); absent goodwill columns fall back to defaults.
pub fn load_market_csv(csv_path: &Path) -> Result<Vec<MarketInputs>> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("Failed to open market feed: {:?}", csv_path))?;

    let mut readings = Vec::new();

    for (line, result) in rdr.deserialize().enumerate() {
        let inputs: MarketInputs =
            result.with_context(|| format!("Failed to parse market reading {}", line + 1))?;
        inputs
            .validate()
            .with_context(|| format!("Invalid market reading {}", line + 1))?;
        readings.push(inputs);
    }

    info!(readings = readings.len(), "market feed loaded");
    Ok(readings)
}

/// Run each reading through `update` in order. Stops at the first failure.
pub fn replay(engine: &mut IndexEngine, readings: &[MarketInputs]) -> Result<Vec<MarketUpdate>, DomainError> {
    readings.iter().map(|inputs| engine.update(inputs)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::MarketRegime;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_with_defaults() {
        let file = write_csv("gold_price,silver_price,VIX,ma_surge\n2500,25,30,false\n2400,30,18,true\n");
        let readings = load_market_csv(file.path()).unwrap();

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].volatility, 30.0);
        assert!(readings[1].ma_surge);
        assert_eq!(readings[1].brand_trust, 0.80);
    }

    #[test]
    fn test_load_rejects_non_positive_prices() {
        let file = write_csv("gold_price,silver_price\n2500,0\n");
        assert!(load_market_csv(file.path()).is_err());
    }

    #[test]
    fn test_replay_builds_history() {
        let mut engine = IndexEngine::new();
        let readings = vec![
            MarketInputs::new(2500.0, 25.0),
            MarketInputs {
                customer_satisfaction: 0.99,
                ..MarketInputs::new(2500.0, 25.0)
            },
        ];

        let updates = replay(&mut engine, &readings).unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(engine.history().len(), 2);
        assert_eq!(updates[0].snapshot.momentum, 0.0);
        assert!(updates[1].snapshot.momentum > 0.0);
        assert_eq!(updates[1].snapshot.regime, MarketRegime::Bearish);
    }

    #[test]
    fn test_replay_stops_on_domain_error() {
        let mut engine = IndexEngine::new();
        let readings = vec![
            MarketInputs::new(2500.0, 25.0),
            MarketInputs::new(2500.0, 0.0),
            MarketInputs::new(2500.0, 25.0),
        ];

        assert!(replay(&mut engine, &readings).is_err());
        assert_eq!(engine.history().len(), 2);
    }
}
