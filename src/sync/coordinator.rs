//! Reconciliation between the local cache and remotely reported cache facts.
//!
//! For each key in a request/response cycle the coordinator classifies what
//! the remote side reported against the freshly computed ETag of the
//! response, then decides whether to write the payload (`Hydrate`), only
//! extend a lifetime (`ExtendOnly`), or leave things to the side that is
//! already fresh (`Delegate`). Anything ambiguous hydrates.

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{current_timestamp_ms, CacheStore, EntryFields, EntryPatch, Origin};

use super::codec::CacheFact;
use super::context::RequestContext;
use super::hash::{build_not_modified, content_hash, parse_etag_list, parse_extend_directive, NotModified};

// == Sync State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Remote side reported nothing for this key
    NoRemoteFacts,
    /// Remote entry is stale and carries no hash
    StaleNoHash,
    /// Remote entry is stale and its hash differs from the fresh value
    StaleHashMismatch,
    /// Remote entry is stale but still holds the fresh value
    StaleHashMatch,
    /// Remote entry still has TTL left
    FreshDelegate,
    /// Remote facts were malformed or the fresh value could not be hashed
    Indeterminate,
}

// == Sync Action ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// Write the full payload, hash and tags
    Hydrate,
    /// Skip the payload, extend the lifetime
    ExtendOnly,
    /// Do nothing
    Delegate,
}

impl SyncState {
    pub fn action(&self) -> SyncAction {
        match self {
            SyncState::StaleHashMatch => SyncAction::ExtendOnly,
            SyncState::FreshDelegate => SyncAction::Delegate,
            SyncState::NoRemoteFacts
            | SyncState::StaleNoHash
            | SyncState::StaleHashMismatch
            | SyncState::Indeterminate => SyncAction::Hydrate,
        }
    }
}

/// Classifies a remote fact against the fresh hash.
///
/// `fresh_hash` is `None` when hashing the response failed. The remote hash
/// may list several tags, any of which can match.
pub fn classify(remote: Option<&CacheFact>, fresh_hash: Option<&str>) -> SyncState {
    let Some(fact) = remote else {
        return SyncState::NoRemoteFacts;
    };
    if fact.ttl_remaining < 0 || fact.cache_key.trim().is_empty() {
        return SyncState::Indeterminate;
    }
    if fact.ttl_remaining > 0 {
        return SyncState::FreshDelegate;
    }

    let known = fact.hash.as_deref().map(parse_etag_list).unwrap_or_default();
    if known.is_empty() {
        return SyncState::StaleNoHash;
    }
    match fresh_hash {
        Some(hash) if known.iter().any(|k| k == hash) => SyncState::StaleHashMatch,
        Some(_) => SyncState::StaleHashMismatch,
        None => SyncState::Indeterminate,
    }
}

// == Sync Payload ==
/// A fresh response headed for the cache.
#[derive(Debug, Clone)]
pub struct SyncPayload<T> {
    pub data: T,
    pub ttl_seconds: i64,
    pub tags: Vec<String>,
    pub remote_tags: Vec<String>,
    pub sidecar_headers: Option<BTreeMap<String, String>>,
}

impl<T> SyncPayload<T> {
    pub fn new(data: T, ttl_seconds: i64) -> Self {
        Self {
            data,
            ttl_seconds,
            tags: Vec::new(),
            remote_tags: Vec::new(),
            sidecar_headers: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_remote_tags(mut self, tags: Vec<String>) -> Self {
        self.remote_tags = tags;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.sidecar_headers = Some(headers);
        self
    }
}

// == Sync Outcome ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub state: SyncState,
    pub action: SyncAction,
    /// Weak ETag of the fresh payload, when it could be computed
    pub etag: Option<String>,
    /// Set for `ExtendOnly`
    pub not_modified: Option<NotModified>,
}

// == Sync Coordinator ==
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    /// Lifetime granted by an extension when the payload names none
    extend_seconds: i64,
}

impl SyncCoordinator {
    pub fn new(extend_seconds: i64) -> Self {
        Self {
            extend_seconds: extend_seconds.max(1),
        }
    }

    pub fn extend_seconds(&self) -> i64 {
        self.extend_seconds
    }

    // == Reconcile ==
    /// Decides and applies the action for one key.
    ///
    /// All writes go through `set`/`update`. The local fact for the key, if
    /// any survives, is appended to the context's outbound facts.
    pub fn reconcile<T>(
        &self,
        store: &mut CacheStore<T>,
        ctx: &mut RequestContext,
        key: &str,
        payload: SyncPayload<T>,
    ) -> SyncOutcome
    where
        T: Clone + Serialize + DeserializeOwned,
    {
        let fresh_hash = match content_hash(&payload.data) {
            Ok(hash) => Some(hash),
            Err(err) => {
                warn!("Could not hash response for {}: {}", key, err);
                None
            }
        };
        let state = classify(ctx.remote_fact(key), fresh_hash.as_deref());
        let action = state.action();
        debug!("Sync {} -> {:?} ({:?})", key, state, action);

        let mut not_modified = None;
        match action {
            SyncAction::Hydrate => {
                let mut fields = EntryFields::new(payload.data, payload.ttl_seconds)
                    .with_tags(payload.tags)
                    .with_remote_tags(payload.remote_tags)
                    .with_origin(Origin::Fetched);
                if let Some(hash) = &fresh_hash {
                    fields = fields.with_hash(hash.clone());
                }
                if let Some(headers) = payload.sidecar_headers {
                    fields = fields.with_headers(headers);
                }
                store.set(key, fields);
            }
            SyncAction::ExtendOnly => {
                let hash = fresh_hash.clone().unwrap_or_default();
                let extend = if payload.ttl_seconds > 0 {
                    payload.ttl_seconds
                } else {
                    self.extend_seconds
                };
                store.update(
                    key,
                    EntryPatch {
                        ttl_seconds: Some(extend),
                        content_hash: Some(hash.clone()),
                        ..EntryPatch::default()
                    },
                );
                let reply = build_not_modified(hash, extend);
                ctx.record_extension(key, reply.clone());
                not_modified = Some(reply);
            }
            SyncAction::Delegate => {}
        }

        if let Some(fact) = store.fact_for(key, current_timestamp_ms()) {
            ctx.push_outbound(fact);
        }

        SyncOutcome {
            state,
            action,
            etag: fresh_hash,
            not_modified,
        }
    }

    // == Outbound ==
    /// Facts describing what the local cache currently believes about `keys`,
    /// for attaching to an outgoing request.
    pub fn outbound<T, S>(&self, store: &CacheStore<T>, keys: &[S]) -> Vec<CacheFact>
    where
        T: Clone + Serialize + DeserializeOwned,
        S: AsRef<str>,
    {
        let now = current_timestamp_ms();
        keys.iter()
            .filter_map(|key| store.fact_for(key.as_ref(), now))
            .collect()
    }

    // == Apply Not Modified ==
    /// Applies a received `extend-ttl=<n>` directive to the local entry.
    ///
    /// Returns false when the directive is unreadable or the key is absent;
    /// the caller should then refetch with a full payload.
    pub fn apply_not_modified<T>(&self, store: &mut CacheStore<T>, key: &str, directive: &str) -> bool
    where
        T: Clone + Serialize + DeserializeOwned,
    {
        let Some(seconds) = parse_extend_directive(directive) else {
            warn!("Ignoring unreadable revalidation directive '{}' for {}", directive, key);
            return false;
        };
        store.update(key, EntryPatch::extend(seconds.max(1)))
    }
}
