// 🗄️ SQLite Store - entities, index snapshots, activity log
//
// The matching core never touches this module. The pool is restored from it
// on restart; index snapshots and the audit trail are append-only history.

use crate::credentials::{Credential, Entity};
use crate::error::ValidationError;
use crate::index_engine::{IndexSnapshot, RawInputs};
use crate::regime::MarketRegime;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

// ============================================================================
// ACTIVITY EVENT
// ============================================================================

/// Audit trail entry ("every change is an event")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub entity_id: Option<String>,
    pub details: serde_json::Value,
    pub actor: String,
}

impl ActivityEvent {
    pub fn new(action: &str, entity_id: Option<&str>, details: serde_json::Value, actor: &str) -> Self {
        ActivityEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action: action.to_string(),
            entity_id: entity_id.map(str::to_string),
            details,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database: {:?}", path.as_ref()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Store { conn })
    }

    /// Run `f` inside one transaction. Any error rolls every write back.
    pub fn atomically<T>(&self, f: impl FnOnce(&Store) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let value = f(self)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    // ------------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------------

    /// Returns false when the identifier is already stored
    pub fn save_entity(&self, entity: &Entity) -> Result<bool> {
        let credentials = serde_json::to_string(&entity.credentials)?;

        let result = self.conn.execute(
            "INSERT INTO entities (identifier, credentials, experience_years, base_score, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entity.identifier,
                credentials,
                entity.experience_years,
                entity.base_score,
                Utc::now().to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                debug!(identifier = %entity.identifier, "entity already stored");
                Ok(false)
            }
            Err(e) => Err(e).context("Failed to insert entity"),
        }
    }

    pub fn entity_exists(&self, identifier: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entities WHERE identifier = ?1",
            params![identifier],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// All entities in insertion order
    pub fn load_entities(&self) -> Result<Vec<Entity>> {
        let mut stmt = self.conn.prepare(
            "SELECT identifier, credentials, experience_years, base_score
             FROM entities ORDER BY id",
        )?;
        let entities = stmt
            .query_map([], entity_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entities)
    }

    pub fn get_entity(&self, identifier: &str) -> Result<Option<Entity>> {
        let entity = self
            .conn
            .query_row(
                "SELECT identifier, credentials, experience_years, base_score
                 FROM entities WHERE identifier = ?1",
                params![identifier],
                entity_from_row,
            )
            .optional()?;
        Ok(entity)
    }

    pub fn delete_entity(&self, identifier: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM entities WHERE identifier = ?1", params![identifier])?;
        Ok(deleted > 0)
    }

    pub fn clear_entities(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM entities", [])?)
    }

    // ------------------------------------------------------------------------
    // Index snapshots
    // ------------------------------------------------------------------------

    pub fn save_snapshot(&self, snapshot: &IndexSnapshot) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO index_snapshots (
                trust_score, momentum, gold_silver_ratio, regime,
                gold_price, silver_price, volatility, ma_surge, computed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                snapshot.trust_score,
                snapshot.momentum,
                snapshot.gold_silver_ratio,
                snapshot.regime.as_str(),
                snapshot.raw_inputs.gold_price,
                snapshot.raw_inputs.silver_price,
                snapshot.raw_inputs.volatility,
                snapshot.raw_inputs.ma_surge,
                snapshot.computed_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn latest_snapshot(&self) -> Result<Option<IndexSnapshot>> {
        Ok(self.snapshot_history(1)?.into_iter().next())
    }

    /// Most recent first
    pub fn snapshot_history(&self, limit: usize) -> Result<Vec<IndexSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT trust_score, momentum, gold_silver_ratio, regime,
                    gold_price, silver_price, volatility, ma_surge, computed_at
             FROM index_snapshots ORDER BY id DESC LIMIT ?1",
        )?;
        let snapshots = stmt
            .query_map(params![limit as i64], snapshot_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    // ------------------------------------------------------------------------
    // Activity log
    // ------------------------------------------------------------------------

    pub fn log_activity(&self, event: &ActivityEvent) -> Result<()> {
        let details = serde_json::to_string(&event.details)?;

        self.conn.execute(
            "INSERT INTO activity_log (event_id, timestamp, action, entity_id, details, actor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.event_id,
                event.timestamp.to_rfc3339(),
                event.action,
                event.entity_id,
                details,
                event.actor,
            ],
        )?;

        Ok(())
    }

    /// Most recent first
    pub fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, action, entity_id, details, actor
             FROM activity_log ORDER BY id DESC LIMIT ?1",
        )?;

        let events = stmt
            .query_map(params![limit as i64], |row| {
                let timestamp: String = row.get(1)?;
                let details: String = row.get(4)?;

                Ok(ActivityEvent {
                    event_id: row.get(0)?,
                    timestamp: parse_timestamp(1, &timestamp)?,
                    action: row.get(2)?,
                    entity_id: row.get(3)?,
                    details: serde_json::from_str(&details)
                        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
                    actor: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier TEXT UNIQUE NOT NULL,
            credentials TEXT NOT NULL,
            experience_years INTEGER NOT NULL,
            base_score REAL NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS index_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            trust_score REAL NOT NULL,
            momentum REAL NOT NULL,
            gold_silver_ratio REAL NOT NULL,
            regime TEXT NOT NULL,
            gold_price REAL NOT NULL,
            silver_price REAL NOT NULL,
            volatility REAL,
            ma_surge INTEGER NOT NULL,
            computed_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activity_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            action TEXT NOT NULL,
            entity_id TEXT,
            details TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snapshots_regime ON index_snapshots(computed_at, regime)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_activity_action ON activity_log(action, timestamp)",
        [],
    )?;

    Ok(())
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    let credentials: String = row.get(1)?;
    let credentials: Vec<Credential> = serde_json::from_str(&credentials)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(Entity {
        identifier: row.get(0)?,
        credentials,
        experience_years: row.get(2)?,
        base_score: row.get(3)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<IndexSnapshot> {
    let regime: String = row.get(3)?;
    let regime = MarketRegime::parse(&regime).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            Box::new(ValidationError::new("regime", format!("unknown regime {:?}", regime))),
        )
    })?;
    let computed_at: String = row.get(8)?;

    Ok(IndexSnapshot {
        trust_score: row.get(0)?,
        momentum: row.get(1)?,
        gold_silver_ratio: row.get(2)?,
        regime,
        raw_inputs: RawInputs {
            gold_price: row.get(4)?,
            silver_price: row.get(5)?,
            volatility: row.get(6)?,
            ma_surge: row.get(7)?,
        },
        computed_at: parse_timestamp(8, &computed_at)?,
    })
}

fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialCategory;
    use crate::index_engine::{IndexEngine, MarketInputs};

    fn sample_entity(id: &str) -> Entity {
        Entity::new(id, 7, 82.5)
            .with_credential(Credential::new(CredentialCategory::Skill, "Rust", "Guild", "2024-01"))
            .with_credential(Credential::new(CredentialCategory::Loyalty, "Tenure", "Acme", "2019-06"))
    }

    #[test]
    fn test_entity_roundtrip_and_duplicates() {
        let store = Store::open_in_memory().unwrap();

        assert!(store.save_entity(&sample_entity("a")).unwrap());
        assert!(store.save_entity(&sample_entity("b")).unwrap());
        assert!(!store.save_entity(&sample_entity("a")).unwrap());

        let loaded = store.load_entities().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], sample_entity("a"));
        assert_eq!(loaded[1].identifier, "b");

        assert!(store.entity_exists("a").unwrap());
        assert_eq!(store.get_entity("b").unwrap(), Some(sample_entity("b")));
        assert!(store.delete_entity("a").unwrap());
        assert!(!store.delete_entity("a").unwrap());
        assert_eq!(store.get_entity("a").unwrap(), None);
    }

    #[test]
    fn test_snapshot_history() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.latest_snapshot().unwrap().is_none());

        let mut engine = IndexEngine::new();
        let first = engine.update(&MarketInputs::new(2500.0, 25.0)).unwrap().snapshot;
        let second = engine
            .update(&MarketInputs::new(2400.0, 30.0).with_ma_surge(true))
            .unwrap()
            .snapshot;

        store.save_snapshot(&first).unwrap();
        store.save_snapshot(&second).unwrap();

        let latest = store.latest_snapshot().unwrap().unwrap();
        assert_eq!(latest.regime, second.regime);
        assert_eq!(latest.raw_inputs, second.raw_inputs);
        assert!((latest.trust_score - second.trust_score).abs() < 1e-12);

        assert_eq!(store.snapshot_history(10).unwrap().len(), 2);
    }

    #[test]
    fn test_activity_log() {
        let store = Store::open_in_memory().unwrap();

        store
            .log_activity(&ActivityEvent::new("entity_registered", Some("a"), serde_json::json!({"credentials": 2}), "api"))
            .unwrap();
        store
            .log_activity(&ActivityEvent::new("system_reset", None, serde_json::json!({}), "admin"))
            .unwrap();

        let events = store.recent_activity(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "system_reset");
        assert_eq!(events[0].entity_id, None);
        assert_eq!(events[1].details["credentials"], 2);
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let store = Store::open_in_memory().unwrap();
        store.conn.execute("DROP TABLE activity_log", []).unwrap();

        let result = store.atomically(|s| {
            s.save_entity(&sample_entity("a"))?;
            s.log_activity(&ActivityEvent::new("entity_registered", Some("a"), serde_json::json!({}), "api"))
        });

        assert!(result.is_err());
        assert!(!store.entity_exists("a").unwrap());

        let inserted = store.atomically(|s| s.save_entity(&sample_entity("b"))).unwrap();
        assert!(inserted);
        assert!(store.entity_exists("b").unwrap());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merit.db");

        {
            let store = Store::open(&path).unwrap();
            store.save_entity(&sample_entity("persisted")).unwrap();
        }

        let reopened = Store::open(&path).unwrap();
        assert!(reopened.entity_exists("persisted").unwrap());
    }
}
