//! Route handlers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use npscan_core::Snapshot;
use npscan_core::snapshot::PlayerId;
use serde::{Deserialize, Serialize};

use crate::actions::{Scanner, parse_snapshot_limit};
use crate::error::{Error, Result};
use crate::matches::{Credential, Match};

/// Match entry in the index. Carries no credentials or access data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: String,
    pub name: String,
    pub finished: bool,
    pub last_poll: Option<i64>,
    pub protected: bool,
}

impl From<&Match> for MatchSummary {
    fn from(m: &Match) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            finished: m.finished,
            last_poll: m.last_poll,
            protected: m.has_access_code(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialView {
    pub player_uid: PlayerId,
    pub alias: String,
    /// Always empty.
    pub api_key: String,
    pub last_poll: Option<i64>,
    pub latest_snapshot: Option<i64>,
    pub disabled: bool,
}

impl From<&Credential> for CredentialView {
    fn from(cred: &Credential) -> Self {
        Self {
            player_uid: cred.player_uid,
            alias: cred.alias.clone(),
            api_key: String::new(),
            last_poll: cred.last_poll,
            latest_snapshot: cred.latest_snapshot(),
            disabled: cred.is_disabled(),
        }
    }
}

/// A match with the credentials the caller may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchView {
    #[serde(flatten)]
    pub summary: MatchSummary,
    pub credentials: Vec<CredentialView>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccessQuery {
    #[serde(default)]
    pub access_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiKeyQuery {
    #[serde(rename = "api-key")]
    pub api_key: String,
    #[serde(default)]
    pub access_code: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub access_code: String,
    pub limit: Option<String>,
}

/// `GET /api/matches`
pub async fn list_matches(State(scanner): State<Arc<Scanner>>) -> Result<Json<Vec<MatchSummary>>> {
    let matches = scanner.match_index().await?;
    Ok(Json(matches.iter().map(MatchSummary::from).collect()))
}

/// `GET /api/matches/{match}`
pub async fn get_match(
    State(scanner): State<Arc<Scanner>>,
    Path(match_id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<MatchView>> {
    let m = scanner.visible_match(&match_id, &query.access_code).await?;
    Ok(Json(MatchView {
        summary: MatchSummary::from(&m),
        credentials: m.credentials.values().map(CredentialView::from).collect(),
    }))
}

/// `POST /api/matches/{match}/api-key`
pub async fn set_api_key(
    State(scanner): State<Arc<Scanner>>,
    Path(match_id): Path<String>,
    Query(query): Query<ApiKeyQuery>,
) -> Result<StatusCode> {
    scanner
        .authorize_credential_change(&match_id, &query.access_code)
        .await?;
    scanner.set_credentials(&match_id, &query.api_key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/matches/{match}/player-snapshots/{player}`
pub async fn player_snapshots(
    State(scanner): State<Arc<Scanner>>,
    Path((match_id, player)): Path<(String, PlayerId)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<i64>>> {
    let limit = parse_snapshot_limit(query.limit.as_deref())?;
    let times = scanner
        .player_snapshot_times(&match_id, &query.access_code, player, limit)
        .await?;
    Ok(Json(times))
}

/// `GET /api/matches/{match}/merged-snapshot`
///
/// Every query parameter other than `access_code` names a player and the
/// capture time (or `latest`) to use for them.
pub async fn merged_snapshot(
    State(scanner): State<Arc<Scanner>>,
    Path(match_id): Path<String>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Json<Snapshot>> {
    let access_code = params.remove("access_code").unwrap_or_default();
    let overrides = parse_overrides(params)?;
    let merged = scanner
        .merged_view(&match_id, &access_code, &overrides)
        .await?;
    Ok(Json(merged))
}

fn parse_overrides(params: HashMap<String, String>) -> Result<BTreeMap<PlayerId, String>> {
    params
        .into_iter()
        .map(|(key, value)| {
            key.parse::<PlayerId>()
                .map(|player| (player, value))
                .map_err(|_| Error::Validation(format!("unknown query parameter {key:?}")))
        })
        .collect()
}
