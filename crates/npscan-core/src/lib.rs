//! `npscan` Core Library
//!
//! Shared functionality for `npscan` components:
//! - Snapshot model for the Neptune's Pride scanning API
//! - Snapshot fusion (merging several players' views into one)
//! - Threat detection over a fused snapshot
//! - Configuration resolution and hierarchy
//! - Error aggregation and common error types

pub mod config;
pub mod db;
pub mod error;
pub mod fusion;
pub mod multierror;
pub mod snapshot;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod threats;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use fusion::{FusionError, merge};
pub use snapshot::{Fleet, Player, Snapshot, Star};
pub use threats::{Threat, find_threats};
