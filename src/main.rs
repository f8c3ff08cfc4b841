use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use merit_regime::logging::init_tracing;
use merit_regime::{
    load_market_csv, replay, ActivityEvent, CandidatePool, Entity, IndexEngine, IndexSnapshot,
    MarketInputs, MatchingPipeline, QueryRequest, Settings, Store,
};

#[derive(Parser, Debug)]
#[command(name = "merit-regime", version, about = "Regime-adaptive candidate matching")]
struct Cli {
    #[arg(long, global = true, help = "tracing filter used when RUST_LOG is unset")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute one trust index snapshot from market inputs
    Index {
        #[command(flatten)]
        market: MarketArgs,
        #[arg(long, help = "Persist the snapshot to this SQLite database")]
        db: Option<PathBuf>,
    },
    /// Replay a CSV market feed through a fresh engine
    Replay {
        csv: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Rank a candidate pool against a query
    Match {
        #[arg(long, help = "JSON array of candidates (defaults to the --db pool)")]
        pool: Option<PathBuf>,
        #[arg(long, help = "JSON query (defaults to an empty query)")]
        query: Option<PathBuf>,
        #[command(flatten)]
        market: OptionalMarketArgs,
        #[arg(long, help = "Read the pool and latest snapshot from this database")]
        db: Option<PathBuf>,
    },
    /// Import candidates from JSON into a database
    Import {
        pool: PathBuf,
        #[arg(long)]
        db: PathBuf,
    },
    /// Pool statistics and talent-flow signals
    Stats {
        pool: PathBuf,
    },
}

#[derive(Args, Debug)]
struct MarketArgs {
    #[arg(long)]
    gold: f64,
    #[arg(long)]
    silver: f64,
    #[arg(long, default_value_t = 20.0)]
    volatility: f64,
    #[arg(long, default_value_t = false)]
    ma_surge: bool,
}

impl MarketArgs {
    fn inputs(&self) -> MarketInputs {
        MarketInputs::new(self.gold, self.silver)
            .with_volatility(self.volatility)
            .with_ma_surge(self.ma_surge)
    }
}

#[derive(Args, Debug)]
struct OptionalMarketArgs {
    #[arg(long, requires = "silver")]
    gold: Option<f64>,
    #[arg(long, requires = "gold")]
    silver: Option<f64>,
    #[arg(long, default_value_t = 20.0)]
    volatility: f64,
    #[arg(long, default_value_t = false)]
    ma_surge: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    init_tracing(cli.log_level.as_deref().unwrap_or(&settings.log_level));

    match cli.command {
        Commands::Index { market, db } => run_index(&market.inputs(), db.as_deref()),
        Commands::Replay { csv, db } => run_replay(&csv, db.as_deref()),
        Commands::Match { pool, query, market, db } => {
            run_match(pool.as_deref(), query.as_deref(), &market, db.as_deref(), &settings)
        }
        Commands::Import { pool, db } => run_import(&pool, &db),
        Commands::Stats { pool } => run_stats(&pool),
    }
}

fn run_index(inputs: &MarketInputs, db: Option<&Path>) -> Result<()> {
    inputs.validate()?;
    let mut engine = IndexEngine::new();
    let update = engine.update(inputs)?;

    if let Some(db) = db {
        let event = ActivityEvent::new(
            "index_updated",
            None,
            serde_json::json!({ "regime": update.snapshot.regime }),
            "cli",
        );
        Store::open(db)?.atomically(|store| {
            store.save_snapshot(&update.snapshot)?;
            store.log_activity(&event)
        })?;
    }

    print_json(&update)
}

fn run_replay(csv: &Path, db: Option<&Path>) -> Result<()> {
    let readings = load_market_csv(csv)?;
    let mut engine = IndexEngine::new();
    let updates = replay(&mut engine, &readings)?;

    if let Some(db) = db {
        let store = Store::open(db)?;
        for update in &updates {
            store.save_snapshot(&update.snapshot)?;
        }
    }

    info!(readings = updates.len(), "replay complete");
    print_json(&updates)
}

fn run_match(
    pool: Option<&Path>,
    query: Option<&Path>,
    market: &OptionalMarketArgs,
    db: Option<&Path>,
    settings: &Settings,
) -> Result<()> {
    let store = db.map(Store::open).transpose()?;

    let entities = match (pool, &store) {
        (Some(path), _) => read_pool(path)?,
        (None, Some(store)) => store.load_entities()?,
        (None, None) => bail!("either --pool or --db is required"),
    };

    let request = match query {
        Some(path) => read_json::<QueryRequest>(path)?,
        None => QueryRequest::default(),
    };
    let query = request.into_query(settings);
    query.validate()?;

    let snapshot: Option<IndexSnapshot> = match (market.gold, market.silver, &store) {
        (Some(gold), Some(silver), _) => {
            let inputs = MarketInputs::new(gold, silver)
                .with_volatility(market.volatility)
                .with_ma_surge(market.ma_surge);
            inputs.validate()?;
            Some(IndexEngine::new().update(&inputs)?.snapshot)
        }
        (_, _, Some(store)) => store.latest_snapshot()?,
        _ => None,
    };

    let report = MatchingPipeline::new().report(&entities, &query, snapshot.as_ref());
    print_json(&report)
}

fn run_import(pool: &Path, db: &Path) -> Result<()> {
    let entities = read_pool(pool)?;
    let store = Store::open(db)?;

    let mut inserted = 0;
    for entity in &entities {
        let stored = store.atomically(|store| {
            if !store.save_entity(entity)? {
                return Ok(false);
            }
            store.log_activity(&ActivityEvent::new(
                "entity_registered",
                Some(&entity.identifier),
                serde_json::json!({ "credential_count": entity.credentials.len() }),
                "cli_importer",
            ))?;
            Ok(true)
        })?;
        if stored {
            inserted += 1;
        }
    }

    info!(inserted, duplicates = entities.len() - inserted, "import complete");
    print_json(&serde_json::json!({
        "inserted": inserted,
        "duplicates": entities.len() - inserted,
    }))
}

fn run_stats(pool: &Path) -> Result<()> {
    let pool = CandidatePool::from_entities(read_pool(pool)?)?;
    print_json(&serde_json::json!({
        "stats": pool.stats(),
        "talent_flow": pool.talent_flow(),
    }))
}

/// Parse and validate a JSON array of candidates
fn read_pool(path: &Path) -> Result<Vec<Entity>> {
    let entities: Vec<Entity> = read_json(path)?;
    for entity in &entities {
        entity
            .validate()
            .with_context(|| format!("Invalid candidate {:?}", entity.identifier))?;
    }
    Ok(entities)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
