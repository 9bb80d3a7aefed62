//! SQLite storage for matches and snapshots.
//!
//! Provides persistence for match records (credentials, access profiles,
//! Discord mappings) and the per-player snapshot archive.

mod db;
mod models;
mod queries;
mod snapshot_queries;


pub use db::MatchDatabase;
pub use npscan_core::db::DatabaseError;
