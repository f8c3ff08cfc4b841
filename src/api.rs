// 🌐 HTTP API - thin axum layer over the index engine and matching pipeline
//
// All mutable state (engine history, pool, latest snapshot, store) sits
// behind one mutex, which serializes writers. Matching runs on a frozen
// copy of the pool taken under the lock.

use crate::config::Settings;
use crate::credentials::Entity;
use crate::error::{DomainError, ValidationError};
use crate::index_engine::{EngineStatus, IndexEngine, MarketInputs, MarketUpdate};
use crate::pipeline::{MatchReport, MatchingPipeline, QueryRequest};
use crate::pool::{CandidatePool, PoolError, PoolStats, TalentFlow};
use crate::regime::{HiringForecast, MarketRegime, RegimePlaybook};
use crate::store::{ActivityEvent, Store};
use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const API_ACTOR: &str = "api";

// ============================================================================
// RESPONSE ENVELOPE & ERRORS
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("index computation failed: {0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Duplicate(_) => ApiError::Conflict(err.to_string()),
            PoolError::Invalid(e) => ApiError::Validation(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {:#}", self);
        }
        let body = ApiResponse {
            success: false,
            data: serde_json::Value::Null,
            error: Some(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

// ============================================================================
// STATE
// ============================================================================

struct ServiceState {
    engine: IndexEngine,
    pool: CandidatePool,
    latest: Option<MarketUpdate>,
    store: Option<Store>,
}

impl ServiceState {
    /// Run the store writes of one request in a single transaction.
    /// `None` when running without a store.
    fn persist<T>(
        &self,
        f: impl FnOnce(&Store) -> anyhow::Result<T>,
    ) -> Result<Option<T>, ApiError> {
        match &self.store {
            Some(store) => Ok(Some(store.atomically(f)?)),
            None => Ok(None),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<ServiceState>>,
    settings: Arc<Settings>,
}

impl AppState {
    /// In-memory only: nothing survives a restart
    pub fn new(settings: Settings) -> Self {
        Self::build(settings, CandidatePool::new(), None)
    }

    /// Restore the pool from the store; new registrations are written through
    pub fn with_store(settings: Settings, store: Store) -> anyhow::Result<Self> {
        let pool = CandidatePool::from_entities(store.load_entities()?)?;
        info!(entities = pool.len(), "candidate pool restored");
        Ok(Self::build(settings, pool, Some(store)))
    }

    fn build(settings: Settings, pool: CandidatePool, store: Option<Store>) -> Self {
        AppState {
            inner: Arc::new(Mutex::new(ServiceState {
                engine: IndexEngine::new(),
                pool,
                latest: None,
                store,
            })),
            settings: Arc::new(settings),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// REQUEST / RESPONSE BODIES
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct Registered {
    pub identifier: String,
    pub credential_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegimeView {
    pub regime: MarketRegime,
    pub trust_score: f64,
    pub playbook: RegimePlaybook,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub engine: EngineStatus,
    pub candidates: usize,
    pub index_available: bool,
    pub current_regime: Option<MarketRegime>,
    pub persistent: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResetParams {
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    #[serde(default = "default_activity_limit")]
    pub limit: usize,
}

fn default_activity_limit() -> usize {
    100
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health
async fn health() -> ApiResult<serde_json::Value> {
    ok(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// POST /market/update
async fn update_market(
    State(state): State<AppState>,
    Json(inputs): Json<MarketInputs>,
) -> ApiResult<MarketUpdate> {
    inputs.validate()?;

    let mut guard = state.lock();

    // In-memory state changes only once the store has accepted the update
    let mut engine = guard.engine.clone();
    let update = engine.update(&inputs)?;

    let event = ActivityEvent::new(
        "index_updated",
        None,
        serde_json::json!({
            "trust_score": update.snapshot.trust_score,
            "regime": update.snapshot.regime,
        }),
        API_ACTOR,
    );
    guard.persist(|store| {
        store.save_snapshot(&update.snapshot)?;
        store.log_activity(&event)
    })?;

    guard.engine = engine;
    guard.latest = Some(update.clone());
    ok(update)
}

/// GET /market/index
async fn current_index(State(state): State<AppState>) -> ApiResult<MarketUpdate> {
    let guard = state.lock();
    match &guard.latest {
        Some(update) => ok(update.clone()),
        None => Err(no_index()),
    }
}

/// GET /market/regime
async fn current_regime(State(state): State<AppState>) -> ApiResult<RegimeView> {
    let guard = state.lock();
    let snapshot = &guard.latest.as_ref().ok_or_else(no_index)?.snapshot;
    ok(RegimeView {
        regime: snapshot.regime,
        trust_score: snapshot.trust_score,
        playbook: snapshot.regime.playbook(),
    })
}

/// POST /candidates
async fn register_candidate(
    State(state): State<AppState>,
    Json(entity): Json<Entity>,
) -> Result<(StatusCode, Json<ApiResponse<Registered>>), ApiError> {
    let mut guard = state.lock();

    // Validate and check the pool before touching the store
    entity.validate()?;
    if guard.pool.contains(&entity.identifier) {
        return Err(PoolError::Duplicate(entity.identifier).into());
    }

    let registered = Registered {
        identifier: entity.identifier.clone(),
        credential_count: entity.credentials.len(),
    };
    let event = ActivityEvent::new(
        "entity_registered",
        Some(&registered.identifier),
        serde_json::json!({ "credential_count": registered.credential_count }),
        API_ACTOR,
    );
    let stored = guard.persist(|store| {
        if !store.save_entity(&entity)? {
            return Ok(false);
        }
        store.log_activity(&event)?;
        Ok(true)
    })?;
    if stored == Some(false) {
        return Err(PoolError::Duplicate(entity.identifier).into());
    }

    guard.pool.register(entity)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(registered))))
}

/// GET /candidates/:identifier
async fn get_candidate(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Entity> {
    let guard = state.lock();
    match guard.pool.get(&identifier) {
        Some(entity) => ok(entity.clone()),
        None => Err(ApiError::NotFound(format!("no candidate {}", identifier))),
    }
}

/// GET /candidates/stats
async fn candidate_stats(State(state): State<AppState>) -> ApiResult<PoolStats> {
    ok(state.lock().pool.stats())
}

/// POST /candidates/query
async fn query_candidates(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<MatchReport> {
    let query = request.into_query(&state.settings);
    query.validate()?;

    let (pool, snapshot) = {
        let guard = state.lock();
        (
            guard.pool.snapshot(),
            guard.latest.as_ref().map(|u| u.snapshot.clone()),
        )
    };

    let report = MatchingPipeline::new().report(&pool, &query, snapshot.as_ref());
    info!(
        screened = report.screened,
        matched = report.matches.len(),
        regime_applied = report.regime_applied,
        "candidate query served"
    );
    ok(report)
}

/// GET /intelligence/forecast
async fn hiring_forecast(State(state): State<AppState>) -> ApiResult<HiringForecast> {
    let guard = state.lock();
    let update = guard.latest.as_ref().ok_or_else(no_index)?;
    ok(HiringForecast::from_snapshot(&update.snapshot))
}

/// GET /intelligence/talent-flow
async fn talent_flow(State(state): State<AppState>) -> ApiResult<TalentFlow> {
    ok(state.lock().pool.talent_flow())
}

/// GET /system/status
async fn system_status(State(state): State<AppState>) -> ApiResult<SystemStatus> {
    let guard = state.lock();
    ok(SystemStatus {
        version: crate::VERSION.to_string(),
        engine: guard.engine.status(),
        candidates: guard.pool.len(),
        index_available: guard.latest.is_some(),
        current_regime: guard.latest.as_ref().map(|u| u.snapshot.regime),
        persistent: guard.store.is_some(),
    })
}

/// GET /system/activity
async fn recent_activity(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ActivityParams>,
) -> ApiResult<Vec<ActivityEvent>> {
    let guard = state.lock();
    match &guard.store {
        Some(store) => ok(store.recent_activity(params.limit)?),
        None => ok(Vec::new()),
    }
}

/// POST /system/reset?confirm=true
async fn reset_system(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ResetParams>,
) -> ApiResult<serde_json::Value> {
    if !params.confirm {
        return Err(ApiError::BadRequest(
            "reset must be confirmed with ?confirm=true".to_string(),
        ));
    }

    let mut guard = state.lock();
    let cleared = guard.pool.len();
    let event = ActivityEvent::new(
        "system_reset",
        None,
        serde_json::json!({ "entities_cleared": cleared }),
        API_ACTOR,
    );
    guard.persist(|store| {
        store.clear_entities()?;
        store.log_activity(&event)
    })?;

    guard.engine.reset();
    guard.pool.clear();
    guard.latest = None;

    ok(serde_json::json!({ "entities_cleared": cleared }))
}

fn no_index() -> ApiError {
    ApiError::NotFound("no index data available, update market data first".to_string())
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn router(state: AppState) -> Router {
    let cors = if state.settings.enable_cors {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health))
        .route("/market/update", post(update_market))
        .route("/market/index", get(current_index))
        .route("/market/regime", get(current_regime))
        .route("/candidates", post(register_candidate))
        .route("/candidates/stats", get(candidate_stats))
        .route("/candidates/query", post(query_candidates))
        .route("/candidates/:identifier", get(get_candidate))
        .route("/intelligence/forecast", get(hiring_forecast))
        .route("/intelligence/talent-flow", get(talent_flow))
        .route("/system/status", get(system_status))
        .route("/system/activity", get(recent_activity))
        .route("/system/reset", post(reset_system))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(Settings::default()))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn veteran() -> Value {
        json!({
            "identifier": "veteran",
            "experience_years": 12,
            "base_score": 80.0,
            "credentials": [
                { "category": "loyalty", "name": "10yr Tenure", "issuer": "Acme", "issued": "2014" },
                { "category": "skill", "name": "Rust", "issuer": "Guild", "issued": "2020" }
            ]
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_index_routes_404_before_first_update() {
        let app = app();
        for uri in ["/market/index", "/market/regime", "/intelligence/forecast"] {
            let (status, body) = send(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
            assert_eq!(body["success"], false);
        }
    }

    #[tokio::test]
    async fn test_market_update_then_regime() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/market/update",
            Some(json!({ "gold_price": 2500.0, "silver_price": 25.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        // First reading has no momentum, so the ratio term alone decides
        assert_eq!(body["data"]["snapshot"]["regime"], "bearish");

        let (status, body) = send(&app, Method::GET, "/market/regime", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["regime"], "bearish");
        assert!(body["data"]["playbook"].is_object());
    }

    #[tokio::test]
    async fn test_invalid_market_input_rejected() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/market/update",
            Some(json!({ "gold_price": 2500.0, "silver_price": 0.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_register_and_duplicate() {
        let app = app();
        let (status, body) = send(&app, Method::POST, "/candidates", Some(veteran())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["credential_count"], 2);

        let (status, _) = send(&app, Method::POST, "/candidates", Some(veteran())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&app, Method::GET, "/candidates/veteran", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["experience_years"], 12);

        let (status, _) = send(&app, Method::GET, "/candidates/nobody", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_query_applies_bearish_adjustment() {
        let app = app();
        send(&app, Method::POST, "/candidates", Some(veteran())).await;

        // Without an index the base score passes through
        let (_, body) = send(&app, Method::POST, "/candidates/query", Some(json!({}))).await;
        assert_eq!(body["data"]["regime_applied"], false);
        assert_eq!(body["data"]["matches"][0]["adjusted_score"], 80.0);

        send(
            &app,
            Method::POST,
            "/market/update",
            Some(json!({ "gold_price": 2500.0, "silver_price": 25.0 })),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/candidates/query",
            Some(json!({ "required_loyalty": ["10yr Tenure"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["regime_applied"], true);
        let adjusted = body["data"]["matches"][0]["adjusted_score"].as_f64().unwrap();
        assert!((adjusted - 88.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_reset_requires_confirmation() {
        let app = app();
        send(&app, Method::POST, "/candidates", Some(veteran())).await;

        let (status, _) = send(&app, Method::POST, "/system/reset", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, Method::POST, "/system/reset?confirm=true", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["entities_cleared"], 1);

        let (_, body) = send(&app, Method::GET, "/system/status", None).await;
        assert_eq!(body["data"]["candidates"], 0);
        assert_eq!(body["data"]["index_available"], false);
    }

    #[tokio::test]
    async fn test_store_backed_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merit.db");

        let app = router(AppState::with_store(Settings::default(), Store::open(&path).unwrap()).unwrap());
        send(&app, Method::POST, "/candidates", Some(veteran())).await;

        let app = router(AppState::with_store(Settings::default(), Store::open(&path).unwrap()).unwrap());
        let (status, _) = send(&app, Method::GET, "/candidates/veteran", None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, Method::GET, "/system/activity?limit=10", None).await;
        assert_eq!(body["data"][0]["action"], "entity_registered");
    }

    #[tokio::test]
    async fn test_failed_persistence_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merit.db");
        let app = router(AppState::with_store(Settings::default(), Store::open(&path).unwrap()).unwrap());

        let side = rusqlite::Connection::open(&path).unwrap();
        side.execute("DROP TABLE index_snapshots", []).unwrap();

        let (status, _) = send(
            &app,
            Method::POST,
            "/market/update",
            Some(json!({ "gold_price": 2500.0, "silver_price": 25.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (_, body) = send(&app, Method::GET, "/system/status", None).await;
        assert_eq!(body["data"]["engine"]["history_len"], 0);
        assert_eq!(body["data"]["index_available"], false);

        // A failed audit write must not leave the candidate half-registered
        side.execute("DROP TABLE activity_log", []).unwrap();
        let (status, _) = send(&app, Method::POST, "/candidates", Some(veteran())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = send(&app, Method::GET, "/candidates/veteran", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let stored: i64 = side
            .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))
            .unwrap();
        assert_eq!(stored, 0);
    }
}
