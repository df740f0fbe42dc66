//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: removes entries once their stale grace window has passed

mod cleanup;

pub use cleanup::spawn_cleanup_task;
