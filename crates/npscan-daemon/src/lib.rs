//! `npscan` Daemon Library
//!
//! Everything behind the `npscan` binary:
//! - SQLite storage for matches, credentials and snapshots
//! - Neptune's Pride API client and the snapshot poller
//! - Shared-secret access control
//! - Threat notifications with at-most-once delivery
//! - Periodic scheduler and the HTTP read API

pub mod access;
pub mod actions;
pub mod error;
pub mod locks;
pub mod matches;
pub mod notifications;
pub mod npapi;
pub mod poller;
pub mod scheduler;
pub mod storage;
pub mod web;

pub use actions::Scanner;
pub use error::{Error, Result};
