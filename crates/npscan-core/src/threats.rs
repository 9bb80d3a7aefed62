//! Threat detection.
//!
//! A threat is a fleet order whose destination is a star owned by another
//! player. Detection runs over a (usually fused) snapshot and never fails:
//! malformed or inconsistent upstream data is skipped.

use crate::snapshot::{Fleet, Player, Snapshot, Star};

/// One hostile fleet order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threat<'a> {
    pub fleet: &'a Fleet,
    pub order: &'a [i64],
    pub attacker: &'a Player,
    pub target: &'a Star,
    pub defender: &'a Player,
}

/// Find every fleet order that targets a star owned by someone else.
///
/// The result is in no particular order.
pub fn find_threats(snapshot: &Snapshot) -> Vec<Threat<'_>> {
    let mut threats = Vec::new();

    for fleet in snapshot.fleets.values() {
        for order in &fleet.orders {
            let Some(&target_id) = order.get(1) else {
                continue;
            };
            let Some(target) = snapshot.stars.get(&target_id) else {
                continue;
            };
            let Some(owner) = target.owner() else {
                continue;
            };
            if owner == fleet.player_id {
                continue;
            }

            let (Some(attacker), Some(defender)) =
                (snapshot.player(fleet.player_id), snapshot.player(owner))
            else {
                continue;
            };

            threats.push(Threat {
                fleet,
                order,
                attacker,
                target,
                defender,
            });
        }
    }

    threats
}
