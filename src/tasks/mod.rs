//! Background Tasks Module
//!
//! Periodic housekeeping spawned by the binary next to the HTTP server.
//!
//! # Tasks
//! - Expiry sweep: reclaims expired keys of the in-memory store (Redis
//!   expires keys itself and gets no sweeper)

mod cleanup;

pub use cleanup::spawn_cleanup_task;
