//! Snapshot builders for tests.
//!
//! Compiled for this crate's own tests and for dependents that enable the
//! `test-utils` feature.

use crate::snapshot::{
    Fleet, FleetId, Player, PlayerId, PrivateTechStatus, PublicTechStatus, Snapshot, Star, StarId,
    TechStatus, VisibleFlag,
};

/// Fluent builder for a [`Snapshot`] seen by `viewer` at time `now`.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new(viewer: PlayerId, now: i64) -> Self {
        Self {
            snapshot: Snapshot {
                player_uid: viewer,
                now,
                started: true,
                name: "Test Galaxy".to_string(),
                ..Snapshot::default()
            },
        }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.snapshot.name = name.to_string();
        self
    }

    #[must_use]
    pub fn started(mut self, started: bool) -> Self {
        self.snapshot.started = started;
        self
    }

    #[must_use]
    pub fn game_over(mut self) -> Self {
        self.snapshot.game_over = true;
        self
    }

    #[must_use]
    pub fn productions(mut self, productions: i64) -> Self {
        self.snapshot.productions = productions;
        self
    }

    #[must_use]
    pub fn player(mut self, player: Player) -> Self {
        self.snapshot.players.insert(player.public.uid, player);
        self
    }

    #[must_use]
    pub fn star(mut self, star: Star) -> Self {
        self.snapshot.stars.insert(star.public.uid, star);
        self
    }

    #[must_use]
    pub fn fleet(mut self, fleet: Fleet) -> Self {
        self.snapshot.fleets.insert(fleet.uid, fleet);
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

/// A live player holding one star and ten ships, with no private data.
pub fn player(uid: PlayerId, alias: &str) -> Player {
    let mut player = Player::default();
    player.public.uid = uid;
    player.public.alias = alias.to_string();
    player.public.total_stars = 1;
    player.public.total_strength = 10;
    player
}

impl Player {
    #[must_use]
    pub fn with_cash(mut self, cash: i64) -> Self {
        self.private.cash = cash;
        self
    }

    #[must_use]
    pub fn with_totals(mut self, stars: i64, strength: i64) -> Self {
        self.public.total_stars = stars;
        self.public.total_strength = strength;
        self
    }

    #[must_use]
    pub fn with_conceded(mut self, code: i64) -> Self {
        self.public.conceded = code;
        self
    }

    #[must_use]
    pub fn with_research(mut self, kind: i64, research: i64, cost: i64) -> Self {
        self.public.tech.insert(
            kind.to_string(),
            TechStatus {
                public: PublicTechStatus { kind, level: 1 },
                private: PrivateTechStatus { research, cost },
            },
        );
        self
    }
}

/// A star with only its public block populated.
pub fn star(uid: StarId, owner: PlayerId) -> Star {
    let mut star = Star::default();
    star.public.uid = uid;
    star.public.name = format!("Star {uid}");
    star.public.player_id = owner;
    star.public.visible = VisibleFlag::Number(0);
    star
}

impl Star {
    /// Populate the private block with a garrison, marking the star visible.
    #[must_use]
    pub fn with_strength(mut self, strength: i64) -> Self {
        self.private.strength = strength;
        self.public.visible = VisibleFlag::Number(1);
        self
    }
}

/// A fleet with the given orders (`[delay, destination, action, ships]`).
pub fn fleet(uid: FleetId, owner: PlayerId, strength: i64, orders: Vec<Vec<i64>>) -> Fleet {
    Fleet {
        uid,
        player_id: owner,
        name: format!("Fleet {uid}"),
        strength,
        orders,
        ..Fleet::default()
    }
}
