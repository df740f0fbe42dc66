//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `PUT /entries` - Store a result under its derived cache key
//! - `GET /entries?key=` - Read a result, stale entries flagged
//! - `DELETE /entries?key=` - Delete a result
//! - `POST /invalidate` - Expire or purge by tag
//! - `GET /meta?path=` - Encoded cache facts for a path
//! - `POST /sync` - Run reconciliation for a fresh response
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
