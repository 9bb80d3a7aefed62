//! Snapshot fusion.
//!
//! Every player only sees part of the galaxy. [`merge`] combines one snapshot
//! per player into a single view that knows everything any of them knew.
//!
//! Later snapshots only ever add information: fleets seen once are kept,
//! private star and player data replaces the previous value only when the
//! incoming block is `useful()`, so a less-informed view can never downgrade
//! data that was already known.

use std::collections::btree_map::Entry;

use crate::snapshot::{Player, Snapshot, Star};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FusionError {
    #[error("no snapshots to merge")]
    Empty,
}

/// Merge a set of snapshots into one.
///
/// Input order does not matter: snapshots are sorted by capture time (then by
/// viewing player, to break ties) and the earliest one becomes the base.
pub fn merge<I>(snapshots: I) -> Result<Snapshot, FusionError>
where
    I: IntoIterator<Item = Snapshot>,
{
    let mut snapshots: Vec<Snapshot> = snapshots.into_iter().collect();
    snapshots.sort_by_key(|s| (s.now, s.player_uid));

    let mut rest = snapshots.into_iter();
    let mut base = rest.next().ok_or(FusionError::Empty)?;

    for other in rest {
        absorb(&mut base, other);
    }

    Ok(base)
}

fn absorb(base: &mut Snapshot, other: Snapshot) {
    for (id, fleet) in other.fleets {
        base.fleets.entry(id).or_insert(fleet);
    }

    for (id, star) in other.stars {
        match base.stars.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(star);
            }
            Entry::Occupied(mut slot) => absorb_star(slot.get_mut(), star),
        }
    }

    for (id, player) in other.players {
        match base.players.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(player);
            }
            Entry::Occupied(mut slot) => absorb_player(slot.get_mut(), player),
        }
    }
}

fn absorb_star(known: &mut Star, incoming: Star) {
    if incoming.private.useful() {
        known.private = incoming.private;
        known.public.visible = incoming.public.visible;
    }
}

fn absorb_player(known: &mut Player, incoming: Player) {
    if !incoming.private.useful() {
        return;
    }

    known.private = incoming.private;

    // Research progress is only visible alongside the rest of the private
    // player block.
    for (kind, status) in incoming.public.tech {
        match known.public.tech.entry(kind) {
            Entry::Vacant(slot) => {
                slot.insert(status);
            }
            Entry::Occupied(mut slot) => slot.get_mut().private = status.private,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{SnapshotBuilder, fleet, player, star};

    /// Player 4 at t=100: owns star 1 (garrison 9) and fleet 1.
    fn view_a() -> Snapshot {
        SnapshotBuilder::new(4, 100)
            .player(player(4, "Aburrido").with_cash(250))
            .player(player(6, "Burrito"))
            .star(star(1, 4).with_strength(9))
            .fleet(fleet(1, 4, 12, vec![]))
            .build()
    }

    /// Player 6 at t=200: sees star 1 publicly only, owns fleet 2.
    fn view_b() -> Snapshot {
        SnapshotBuilder::new(6, 200)
            .player(player(4, "Aburrido"))
            .player(player(6, "Burrito").with_cash(80).with_research(5, 10, 40))
            .star(star(1, 4))
            .star(star(2, 6).with_strength(21))
            .fleet(fleet(2, 6, 3, vec![]))
            .build()
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(merge(Vec::new()), Err(FusionError::Empty));
    }

    #[test]
    fn single_snapshot_is_returned_unchanged() {
        let a = view_a();
        assert_eq!(merge(vec![a.clone()]).unwrap(), a);
    }

    #[test]
    fn public_view_does_not_erase_known_garrison() {
        let merged = merge(vec![view_a(), view_b()]).unwrap();

        assert!(merged.fleets.contains_key(&1));
        assert!(merged.fleets.contains_key(&2));
        assert_eq!(merged.stars[&1].private.strength, 9);
        assert_eq!(merged.stars[&2].private.strength, 21);
    }

    #[test]
    fn earliest_snapshot_is_the_base() {
        let merged = merge(vec![view_b(), view_a()]).unwrap();
        assert_eq!(merged.now, 100);
        assert_eq!(merged.player_uid, 4);
    }

    #[test]
    fn useful_private_player_data_is_imported_with_research() {
        let merged = merge(vec![view_a(), view_b()]).unwrap();

        assert_eq!(merged.players[&4].private.cash, 250);
        let burrito = &merged.players[&6];
        assert_eq!(burrito.private.cash, 80);
        let weapons = &burrito.public.tech["5"];
        assert_eq!(weapons.private.research, 10);
        assert_eq!(weapons.private.cost, 40);
    }

    #[test]
    fn newer_useful_star_data_overwrites_older() {
        let later = SnapshotBuilder::new(6, 300)
            .star(star(1, 4).with_strength(2))
            .build();
        let merged = merge(vec![view_a(), later]).unwrap();
        assert_eq!(merged.stars[&1].private.strength, 2);
    }

    #[test]
    fn zeroed_garrison_does_not_overwrite_known_value() {
        // Zero on the wire is indistinguishable from "not visible".
        let later = SnapshotBuilder::new(4, 300).star(star(1, 4)).build();
        let merged = merge(vec![view_a(), later]).unwrap();
        assert_eq!(merged.stars[&1].private.strength, 9);
    }

    #[test]
    fn merge_is_commutative() {
        let ab = merge(vec![view_a(), view_b()]).unwrap();
        let ba = merge(vec![view_b(), view_a()]).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn merge_is_commutative_with_equal_capture_times() {
        let a = SnapshotBuilder::new(4, 100)
            .star(star(1, 4).with_strength(9))
            .build();
        let b = SnapshotBuilder::new(6, 100)
            .star(star(1, 4).with_strength(3))
            .build();
        let ab = merge(vec![a.clone(), b.clone()]).unwrap();
        let ba = merge(vec![b, a]).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn merge_is_idempotent() {
        let a = view_a();
        assert_eq!(merge(vec![a.clone(), a.clone()]).unwrap(), a);
    }

    #[test]
    fn merge_is_monotonic() {
        let inputs = vec![view_a(), view_b()];
        let merged = merge(inputs.clone()).unwrap();

        for input in &inputs {
            for id in input.fleets.keys() {
                assert!(merged.fleets.contains_key(id), "fleet {id} lost");
            }
            for (id, star) in &input.stars {
                let fused = &merged.stars[id];
                if star.private.useful() {
                    assert!(fused.private.useful(), "star {id} lost private data");
                }
            }
            for (id, player) in &input.players {
                let fused = &merged.players[id];
                if player.private.useful() {
                    assert!(fused.private.useful(), "player {id} lost private data");
                }
            }
        }
    }
}
