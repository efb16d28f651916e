//! HTTP API.
//!
//! Routes:
//! - `POST /api/ttn-webhook`           uplink ingestion
//! - `GET  /api/water-data`            current reading with classification
//! - `GET  /api/recent-history?limit=` newest readings, classified
//! - `POST /api/water-label`           label the newest reading
//! - `GET  /api/status`                store and upstream verification
//!
//! The store and upstream clients are blocking, so every handler runs its
//! work on the blocking pool. One store client is shared behind a mutex,
//! held per store call and never across an upstream request.

use std::sync::{Arc, Mutex};

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::ingest::ttn::UplinkSource;
use crate::ingest::uplink::ingest_webhook;
use crate::label::annotate;
use crate::logging::{self, DataSource};
use crate::model::{AnnotateError, IngestError, StoreError, ValidationError};
use crate::resolve::ResolverPolicy;
use crate::store::{ReadingStore, StoreAccess};
use crate::verify::{verify_store, verify_upstream, VerificationReport};
use crate::view::{current_view_shared, recent_history};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

pub type DynStore = Box<dyn ReadingStore + Send>;
pub type DynUpstream = Box<dyn UplinkSource + Send + Sync>;

pub struct AppState {
    store: Mutex<DynStore>,
    upstream: DynUpstream,
    config: ServiceConfig,
    policy: ResolverPolicy,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: DynStore, upstream: DynUpstream, config: ServiceConfig) -> Self {
        let policy = ResolverPolicy::from(&config.resolver);
        AppState { store: Mutex::new(store), upstream, config, policy }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Runs `f` with exclusive access to the store. A poisoned lock is
    /// reported as an unavailable store.
    fn with_store<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut DynStore) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut store = self
            .store
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        f(&mut store)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    /// Rejected input, HTTP 400.
    Validation(ValidationError),
    /// Store unreachable or failing, HTTP 503.
    Store(StoreError),
    /// Nothing to act on, HTTP 404.
    NotFound(String),
    /// Worker task failed, HTTP 500.
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Validation(v) => ApiError::Validation(v),
            IngestError::Store(s) => ApiError::Store(s),
        }
    }
}

impl From<AnnotateError> for ApiError {
    fn from(e: AnnotateError) -> Self {
        match e {
            AnnotateError::Validation(v) => ApiError::Validation(v),
            AnnotateError::NothingToLabel(_) => ApiError::NotFound(e.to_string()),
            AnnotateError::Store(s) => ApiError::Store(s),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(ValidationError::InvalidRequest(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(ValidationError::InvalidRequest(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Store(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}

async fn blocking<T, F>(state: SharedState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| ApiError::Internal(format!("worker failed: {}", e)))?
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn ttn_webhook(State(state): State<SharedState>, body: String) -> Result<Json<Value>, ApiError> {
    let receipt = blocking(state, move |s| {
        s.with_store(|store| ingest_webhook(store, &body, Utc::now()))
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Data saved to database",
        "record_id": receipt.record_id,
        "device_id": receipt.device_id,
        "status": receipt.status,
        "timestamp": receipt.timestamp,
    })))
}

async fn water_data(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let view = blocking(state, |s| {
        let device_id = s.config.device_id.clone();
        current_view_shared(&s.store, s.upstream.as_ref(), &s.policy, &device_id, Utc::now())
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "source": view.source,
        "message": view.provenance,
        "data_age_seconds": view.data_age_seconds,
        "timestamp": Utc::now(),
        "data": view,
    })))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

async fn history(
    State(state): State<SharedState>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(params) = params?;
    let entries = blocking(state, move |s| {
        let limit = s.config.history.clamp_limit(params.limit);
        let device_id = s.config.device_id.clone();
        s.with_store(|store| recent_history(store, &device_id, limit))
            .map_err(ApiError::from)
    })
    .await?;

    let empty = entries.is_empty();
    let mut body = json!({
        "success": true,
        "count": entries.len(),
        "timestamp": Utc::now(),
        "data": entries,
    });
    if empty {
        body["message"] = json!("No records found");
    }
    Ok(Json(body))
}

async fn water_label(
    State(state): State<SharedState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let label = match body.get("label").and_then(Value::as_str) {
        Some(l) => l.to_string(),
        None => return Err(ApiError::Validation(ValidationError::EmptyLabel)),
    };

    let updated = blocking(state, move |s| {
        let device_id = s.config.device_id.clone();
        s.with_store(|store| annotate(store, &device_id, &label)).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Water label updated",
        "data": updated,
    })))
}

async fn status(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let report = blocking(state, |s| {
        let device_id = s.config.device_id.clone();
        let store = s.store.with_store(|store| Ok(verify_store(store, &device_id)))?;
        let upstream = verify_upstream(s.upstream.as_ref(), &device_id);
        Ok(VerificationReport {
            timestamp: Utc::now(),
            device_id,
            store,
            upstream,
        })
    })
    .await?;

    Ok(Json(json!({
        "success": report.is_operational(),
        "data": report,
    })))
}

// ---------------------------------------------------------------------------
// Router and server
// ---------------------------------------------------------------------------

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/ttn-webhook", post(ttn_webhook))
        .route("/api/water-data", get(water_data))
        .route("/api/recent-history", get(history))
        .route("/api/water-label", post(water_label))
        .route("/api/status", get(status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve(state: SharedState) -> std::io::Result<()> {
    let bind = state.config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    logging::info(DataSource::System, None, &format!("listening on {}", bind));
    axum::serve(listener, router(state)).await
}
