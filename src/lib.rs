// Merit Regime - Core Library
// Regime-adaptive candidate matching: trust index → market regime → re-scored matches.
// Exposes all modules for use in the CLI, the API server, and tests.

pub mod error;
pub mod credentials;
pub mod profile;
pub mod predicate;
pub mod regime;
pub mod index_engine;
pub mod pipeline;
pub mod pool;
pub mod store;
pub mod feed;
pub mod config;
pub mod logging;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use error::{DomainError, ValidationError};
pub use credentials::{Credential, CredentialCategory, Entity};
pub use profile::CredentialProfile;
pub use regime::{HiringForecast, MarketRegime, RegimePlaybook, RegimeScoreAdjuster};
pub use index_engine::{
    EngineStatus, IndexEngine, IndexSnapshot, IndexWeights, MarketInputs, MarketUpdate, RawInputs,
};
pub use pipeline::{MatchReport, MatchResult, MatchingPipeline, Query, QueryRequest};
pub use pool::{CandidatePool, PoolError, PoolStats, TalentFlow, TalentSignal};
pub use store::{ActivityEvent, Store};
pub use feed::{load_market_csv, replay};
pub use config::Settings;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
