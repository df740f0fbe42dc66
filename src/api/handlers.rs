//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.
//!
//! Every handler that mutates the store flushes pending change
//! notifications before releasing the write lock, which closes the
//! synchronous turn for that request.

use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    extract::{Query, State},
    http::{
        header::{ETAG, IF_NONE_MATCH},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheStore, EntryFields, Origin};
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, EntryResponse, HealthResponse, InvalidateRequest, InvalidateResponse, KeyQuery,
    MetaResponse, PathQuery, SetRequest, SetResponse, StatsResponse, SyncRequest, SyncResponse,
};
use crate::sync::{
    build_not_modified, content_hash, encode, parse_etag_list, RequestContext, SyncCoordinator,
    SyncPayload,
};

/// Header carrying a revalidation directive on payload-free replies.
pub const CACHE_DIRECTIVE_HEADER: &str = "x-cache-directive";

/// Application state shared across all handlers.
///
/// The store sits behind one `RwLock`; its write guard is the critical
/// section for every evict-then-insert sequence.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe cache store
    pub cache: Arc<RwLock<CacheStore<Value>>>,
    pub coordinator: Arc<SyncCoordinator>,
}

impl AppState {
    /// Creates a new AppState with the given cache store.
    pub fn new(cache: CacheStore<Value>) -> Self {
        let extend_seconds = cache.default_ttl();
        Self::with_coordinator(cache, SyncCoordinator::new(extend_seconds))
    }

    pub fn with_coordinator(cache: CacheStore<Value>, coordinator: SyncCoordinator) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            coordinator: Arc::new(coordinator),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        let cache = CacheStore::new(config.max_entries, config.default_ttl);
        Self::with_coordinator(cache, SyncCoordinator::new(config.extend_ttl))
    }
}

/// Handler for PUT /entries
///
/// Stores a value under the key derived from method, url and tags.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let key = req.key();
    let etag = content_hash(&req.value)?;

    let mut cache = state.cache.write().await;
    let ttl = req.ttl.unwrap_or_else(|| cache.default_ttl());
    let fields = EntryFields::new(req.value, ttl)
        .with_tags(req.tags)
        .with_remote_tags(req.remote_tags)
        .with_hash(etag.clone())
        .with_origin(Origin::Manual);
    cache.set(&key, fields);
    cache.flush_notifications();

    Ok(Json(SetResponse::new(key, Some(etag))))
}

/// Handler for GET /entries?key=
///
/// Stale entries are still served, flagged `expired`. A fresh entry whose
/// ETag appears in `If-None-Match` is answered with `304` and an
/// `extend-ttl` directive instead of the payload.
pub async fn get_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
    headers: HeaderMap,
) -> Result<Response> {
    let now = current_timestamp_ms();
    let known = headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(parse_etag_list)
        .unwrap_or_default();

    // Write lock: reads touch recency
    let mut cache = state.cache.write().await;
    let entry = cache
        .get(&query.key)
        .ok_or_else(|| CacheError::NotFound(query.key.clone()))?;

    if let Some(etag) = entry.content_hash.as_deref() {
        if !entry.is_expired_at(now) && known.iter().any(|k| k == etag || k == "*") {
            let reply = build_not_modified(etag, entry.ttl_remaining_secs(now));
            debug!("Revalidated {} with {}", query.key, reply.directive);
            return Ok(not_modified_response(&reply.etag, &reply.directive));
        }
    }

    let body = EntryResponse::from_entry(query.key.clone(), entry, now);
    let mut response = Json(body).into_response();
    if let Some(etag) = entry.content_hash.as_deref() {
        if let Ok(value) = HeaderValue::from_str(etag) {
            response.headers_mut().insert(ETAG, value);
        }
    }
    Ok(response)
}

fn not_modified_response(etag: &str, directive: &str) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(etag) {
        headers.insert(ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(directive) {
        headers.insert(HeaderName::from_static(CACHE_DIRECTIVE_HEADER), value);
    }
    response
}

/// Handler for DELETE /entries?key=
pub async fn delete_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> Result<Json<DeleteResponse>> {
    let mut cache = state.cache.write().await;
    if !cache.delete(&query.key) {
        return Err(CacheError::NotFound(query.key));
    }
    cache.flush_notifications();

    Ok(Json(DeleteResponse::new(query.key)))
}

/// Handler for POST /invalidate
///
/// Force-expires (or with `purge`, deletes) every entry carrying any of the
/// given tags.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if req.tags.iter().all(|t| t.trim().is_empty()) {
        return Err(CacheError::InvalidRequest(
            "At least one tag is required".to_string(),
        ));
    }

    let mut cache = state.cache.write().await;
    let affected = if req.purge {
        cache.purge_by_tags(&req.tags)
    } else {
        cache.invalidate_by_tags(&req.tags)
    };
    cache.flush_notifications();

    Ok(Json(InvalidateResponse {
        affected,
        purged: req.purge,
    }))
}

/// Handler for GET /meta?path=
///
/// Reports what the cache believes about every key under a path.
pub async fn meta_handler(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Json<MetaResponse> {
    let now = current_timestamp_ms();
    let facts = {
        // Write lock: lookups purge dangling index references
        let mut cache = state.cache.write().await;
        cache.facts_for_path(&query.path, now)
    };
    let encoded = encode(&facts);

    Json(MetaResponse {
        path: query.path,
        facts,
        encoded,
    })
}

/// Handler for POST /sync
///
/// Runs the reconciliation state machine for one fresh response against
/// the facts the remote side reported.
pub async fn sync_handler(
    State(state): State<AppState>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<SyncResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let key = req.key();
    let mut ctx = RequestContext::from_encoded(req.facts.as_deref().unwrap_or_default());

    let mut cache = state.cache.write().await;
    let ttl = req.ttl.unwrap_or_else(|| cache.default_ttl());
    let payload = SyncPayload::new(req.value, ttl)
        .with_tags(req.tags)
        .with_remote_tags(req.remote_tags);
    let outcome = state.coordinator.reconcile(&mut *cache, &mut ctx, &key, payload);
    cache.flush_notifications();
    drop(cache);

    Ok(Json(SyncResponse::new(key, outcome, ctx.encode_outbound())))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.read().await;
    Json(StatsResponse::from(cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
