//! Read-mostly JSON API over the stored matches.
//!
//! - `GET /api/matches`
//! - `GET /api/matches/{match}`
//! - `POST /api/matches/{match}/api-key`
//! - `GET /api/matches/{match}/player-snapshots/{player}`
//! - `GET /api/matches/{match}/merged-snapshot`

mod error;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::watch;
use tracing::info;

use crate::actions::Scanner;

pub use error::ApiError;
pub use routes::{CredentialView, MatchSummary, MatchView};

pub fn build_router(scanner: Arc<Scanner>) -> Router {
    Router::new()
        .route("/api/matches", get(routes::list_matches))
        .route("/api/matches/{match_id}", get(routes::get_match))
        .route("/api/matches/{match_id}/api-key", post(routes::set_api_key))
        .route(
            "/api/matches/{match_id}/player-snapshots/{player}",
            get(routes::player_snapshots),
        )
        .route(
            "/api/matches/{match_id}/merged-snapshot",
            get(routes::merged_snapshot),
        )
        .with_state(scanner)
}

/// Serve the API until `shutdown` flips to `true` or its sender is dropped.
pub async fn serve(
    addr: SocketAddr,
    scanner: Arc<Scanner>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP API listening");

    axum::serve(listener, build_router(scanner))
        .with_graceful_shutdown(async move {
            // A dropped sender also counts as shutdown.
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}
