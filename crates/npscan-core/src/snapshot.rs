//! Snapshot model for the Neptune's Pride scanning API.
//!
//! A [`Snapshot`] is one player's view of the galaxy at a point in time. Every
//! entity is split into a public part (visible to everyone) and a private
//! part that is only populated when the viewing player can actually see it.
//!
//! The API serializes "never observed" and "observed as zero" identically, so
//! each private block exposes a `useful()` predicate that infers whether the
//! block carries information from its values alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

pub type PlayerId = i64;
pub type StarId = i64;
pub type FleetId = i64;

/// Owner id used by the API for stars nobody holds.
pub const UNOWNED: PlayerId = -1;

/// `conceded` status codes reported for each player.
pub mod conceded {
    pub const NO: i64 = 0;
    pub const YES: i64 = 1;
    pub const INACTIVE: i64 = 2;
    pub const WIPED_OUT: i64 = 3;
}

/// Envelope returned by the scanning API.
///
/// A request can fail while still answering 200; in that case `error` is
/// non-empty and `scanning_data` is meaningless.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub scanning_data: Snapshot,
}

/// One player's view of the galaxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    /// Player whose credentials produced this snapshot.
    pub player_uid: PlayerId,
    /// Capture time on the game server's clock (milliseconds).
    pub now: i64,
    pub tick_fragment: f64,
    pub paused: bool,
    pub started: bool,
    #[serde(deserialize_with = "bool_or_int")]
    pub game_over: bool,
    pub start_time: i64,
    /// Production counter; advances once per production cycle.
    pub productions: i64,
    pub production_rate: i64,
    pub production_counter: i64,
    pub tick: i64,
    pub admin: i64,
    pub name: String,
    pub stars_for_victory: i64,
    pub total_stars: i64,
    pub tick_rate: i64,
    pub fleet_speed: f64,
    pub players: BTreeMap<PlayerId, Player>,
    pub stars: BTreeMap<StarId, Star>,
    pub fleets: BTreeMap<FleetId, Fleet>,
}

/// Why a player's credential should no longer be polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elimination {
    /// The API explicitly reports the player as wiped out.
    WipedOut,
    /// The game is running and the player holds nothing, but the API has not
    /// (yet) reported the wiped-out status. Seen when players go AFK before
    /// being destroyed.
    NothingLeft,
}

impl Snapshot {
    /// Decode a snapshot from its stored JSON form.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode this snapshot as JSON for storage.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// The player record of the snapshot's owner.
    pub fn viewer(&self) -> Option<&Player> {
        self.player(self.player_uid)
    }

    /// Alias of the snapshot's owner, empty when unknown.
    pub fn viewer_alias(&self) -> &str {
        self.viewer().map_or("", |p| p.public.alias.as_str())
    }

    /// Whether the viewing player has been eliminated from the game.
    pub fn viewer_elimination(&self) -> Option<Elimination> {
        let viewer = self.viewer()?;
        if viewer.public.conceded == conceded::WIPED_OUT {
            return Some(Elimination::WipedOut);
        }
        if self.started && viewer.public.total_strength == 0 && viewer.public.total_stars == 0 {
            return Some(Elimination::NothingLeft);
        }
        None
    }
}

/// A fleet (carrier). Fleets are only ever visible to players who can scan
/// them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fleet {
    pub uid: FleetId,
    #[serde(rename = "puid")]
    pub player_id: PlayerId,
    #[serde(rename = "n", skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub lx: f64,
    pub ly: f64,
    #[serde(rename = "exp")]
    pub xp: f64,
    pub speed: f64,
    #[serde(rename = "st")]
    pub strength: i64,
    #[serde(rename = "lsuid")]
    pub last_star: StarId,
    #[serde(rename = "ouid")]
    pub current_star: StarId,
    /// Waypoint orders: `[delay, destination star, action, ships]`.
    #[serde(rename = "o")]
    pub orders: Vec<Vec<i64>>,
}

/// The star visibility flag. The API sends it either as a number or as a
/// string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VisibleFlag {
    Number(i64),
    Text(String),
}

impl Default for VisibleFlag {
    fn default() -> Self {
        Self::Number(0)
    }
}

impl VisibleFlag {
    pub fn is_visible(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0,
            Self::Text(s) => !s.is_empty() && s != "0",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicStar {
    pub uid: StarId,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "puid")]
    pub player_id: PlayerId,
    #[serde(rename = "v")]
    pub visible: VisibleFlag,
    pub x: f64,
    pub y: f64,
}

impl Default for PublicStar {
    fn default() -> Self {
        Self {
            uid: 0,
            name: String::new(),
            player_id: UNOWNED,
            visible: VisibleFlag::default(),
            x: 0.0,
            y: 0.0,
        }
    }
}

/// Star attributes only visible inside the viewer's scanning range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivateStar {
    #[serde(rename = "r")]
    pub resources: i64,
    #[serde(rename = "nr")]
    pub natural_resources: i64,
    pub yard: f64,
    #[serde(rename = "e")]
    pub economy: i64,
    #[serde(rename = "i")]
    pub industry: i64,
    #[serde(rename = "s")]
    pub science: i64,
    #[serde(rename = "ga")]
    pub warp_gate: i64,
    #[serde(rename = "st")]
    pub strength: i64,
}

impl PrivateStar {
    /// Whether this block was actually observed. All-zero is treated as
    /// "not observed".
    pub const fn useful(&self) -> bool {
        self.economy > 0
            || self.industry > 0
            || self.science > 0
            || self.resources > 0
            || self.warp_gate > 0
            || self.natural_resources > 0
            || self.strength > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Star {
    #[serde(flatten)]
    pub public: PublicStar,
    #[serde(flatten)]
    pub private: PrivateStar,
}

impl Star {
    /// The owning player, or `None` for unowned stars.
    pub const fn owner(&self) -> Option<PlayerId> {
        if self.public.player_id < 0 {
            None
        } else {
            Some(self.public.player_id)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicTechStatus {
    pub kind: i64,
    pub level: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivateTechStatus {
    pub research: i64,
    pub cost: i64,
}

impl PrivateTechStatus {
    pub const fn useful(&self) -> bool {
        self.research > 0 || self.cost > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechStatus {
    #[serde(flatten)]
    pub public: PublicTechStatus,
    #[serde(flatten)]
    pub private: PrivateTechStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicPlayer {
    pub uid: PlayerId,
    pub alias: String,
    pub avatar: i64,
    pub color: i64,
    pub shape: i64,
    pub total_stars: i64,
    pub total_fleets: i64,
    pub total_strength: i64,
    pub total_economy: i64,
    pub total_industry: i64,
    pub total_science: i64,
    pub karma_to_give: i64,
    pub ready: i64,
    pub missed_turns: i64,
    pub conceded: i64,
    pub ai: i64,
    pub regard: i64,
    /// Technology status keyed by tech kind. Some kinds are absent when the
    /// game disables them. Keys stay strings: this struct is flattened, and
    /// flattened maps cannot parse numeric keys.
    pub tech: BTreeMap<String, TechStatus>,
}

/// Player attributes only visible to the player themself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrivatePlayer {
    pub cash: i64,
    pub researching: i64,
    pub researching_next: i64,
    pub war: BTreeMap<String, i64>,
    #[serde(rename = "countdown_to_war")]
    pub countdown_to_war: BTreeMap<String, i64>,
    pub stars_abandoned: i64,
    pub home: i64,
}

impl PrivatePlayer {
    pub fn useful(&self) -> bool {
        self.cash > 0
            || self.researching != 0
            || self.researching_next != 0
            || !self.war.is_empty()
            || !self.countdown_to_war.is_empty()
            || self.stars_abandoned > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(flatten)]
    pub public: PublicPlayer,
    #[serde(flatten)]
    pub private: PrivatePlayer,
}

/// Accept `true`/`false` as well as `0`/`1` for flags whose wire type changed
/// between API versions.
fn bool_or_int<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
    })
}
