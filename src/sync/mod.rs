//! Sync Module
//!
//! Cross-tier coherence: content hashing, the metadata codec, request-scoped
//! context and the reconciliation state machine.

pub mod codec;
mod context;
mod coordinator;
pub mod hash;

pub use codec::{decode, encode, CacheFact, MAX_METADATA_BYTES};
pub use context::RequestContext;
pub use coordinator::{classify, SyncAction, SyncCoordinator, SyncOutcome, SyncPayload, SyncState};
pub use hash::{
    build_not_modified, content_hash, matches, parse_etag_list, parse_extend_directive,
    NotModified, EXTEND_DIRECTIVE,
};
