//! Threat notifications for one match.

use std::collections::BTreeMap;

use npscan_core::find_threats;
use npscan_core::snapshot::{FleetId, PlayerId, StarId};
use npscan_core::threats::Threat;
use tracing::{debug, info};

use super::Scanner;
use crate::access::Visibility;
use crate::error::{Error, Result};
use crate::notifications::{DispatchReport, Notifiable, RenderStyle, send_guarded};

/// An incoming attack, detached from the snapshot it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreatNotice {
    pub match_id: String,
    pub productions: i64,
    pub fleet_uid: FleetId,
    pub fleet_name: String,
    pub strength: i64,
    pub star_uid: StarId,
    pub star_name: String,
    pub attacker: String,
    pub defender: String,
    pub defender_uid: PlayerId,
    /// Discord user to mention instead of the defender's alias.
    pub defender_mention: Option<String>,
}

impl ThreatNotice {
    pub fn new(
        match_id: &str,
        productions: i64,
        threat: &Threat<'_>,
        discord_user_ids: &BTreeMap<PlayerId, String>,
    ) -> Self {
        let defender_uid = threat.defender.public.uid;
        Self {
            match_id: match_id.to_string(),
            productions,
            fleet_uid: threat.fleet.uid,
            fleet_name: threat.fleet.name.clone(),
            strength: threat.fleet.strength,
            star_uid: threat.target.public.uid,
            star_name: threat.target.public.name.clone(),
            attacker: threat.attacker.public.alias.clone(),
            defender: threat.defender.public.alias.clone(),
            defender_uid,
            defender_mention: discord_user_ids.get(&defender_uid).cloned(),
        }
    }
}

impl Notifiable for ThreatNotice {
    fn id(&self) -> String {
        format!(
            "threat-{}-{}-{}-{}-{}",
            self.match_id, self.productions, self.fleet_uid, self.strength, self.star_uid
        )
    }

    fn render(&self, style: RenderStyle) -> String {
        let defender = match (style, &self.defender_mention) {
            (RenderStyle::ChatMentions, Some(user)) => format!("<@{user}>"),
            _ => self.defender.clone(),
        };
        format!(
            "{}'s carrier {} is attacking {defender}'s star {} with {} units",
            self.attacker, self.fleet_name, self.star_name, self.strength
        )
    }
}

impl Scanner {
    /// Detect threats in the match's fused view and dispatch the new ones.
    pub async fn notify_threats(&self, match_id: &str) -> Result<DispatchReport> {
        let m = self.db().find_match(match_id).await?;

        let merged = match self
            .merged_for(&m, &Visibility::Everyone, &BTreeMap::new())
            .await
        {
            Ok(merged) => merged,
            Err(Error::NothingToMerge) => {
                debug!(match_id, "No snapshots, skipping threat detection");
                return Ok(DispatchReport::default());
            }
            Err(e) => return Err(e),
        };

        let notices: Vec<ThreatNotice> = find_threats(&merged)
            .iter()
            .map(|threat| ThreatNotice::new(match_id, merged.productions, threat, &m.discord_user_ids))
            .collect();
        info!(match_id, threats = notices.len(), "Threats detected");

        Ok(send_guarded(self.guard.as_ref(), &notices, &self.sinks, self.pacing).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use npscan_core::testing::{SnapshotBuilder, fleet, player, star};

    use super::super::testing::harness;
    use super::*;

    fn notice() -> ThreatNotice {
        ThreatNotice {
            match_id: "100".into(),
            productions: 12,
            fleet_uid: 7,
            fleet_name: "Hammer".into(),
            strength: 40,
            star_uid: 20,
            star_name: "Vega".into(),
            attacker: "Aburrido".into(),
            defender: "Burrito".into(),
            defender_uid: 6,
            defender_mention: Some("555".into()),
        }
    }

    #[test]
    fn identity_covers_tick_fleet_strength_and_target() {
        assert_eq!(notice().id(), "threat-100-12-7-40-20");

        let stronger = ThreatNotice {
            strength: 41,
            ..notice()
        };
        assert_ne!(stronger.id(), notice().id());

        let next_tick = ThreatNotice {
            productions: 13,
            ..notice()
        };
        assert_eq!(next_tick.id(), "threat-100-13-7-40-20");
    }

    #[test]
    fn mentions_only_for_chat_sinks() {
        assert_eq!(
            notice().render(RenderStyle::Plain),
            "Aburrido's carrier Hammer is attacking Burrito's star Vega with 40 units"
        );
        assert_eq!(
            notice().render(RenderStyle::ChatMentions),
            "Aburrido's carrier Hammer is attacking <@555>'s star Vega with 40 units"
        );

        let unmapped = ThreatNotice {
            defender_mention: None,
            ..notice()
        };
        assert_eq!(
            unmapped.render(RenderStyle::ChatMentions),
            unmapped.render(RenderStyle::Plain)
        );
    }

    #[tokio::test]
    async fn attack_is_notified_once_per_tick() {
        let h = harness().await;
        let attacking = |now| {
            SnapshotBuilder::new(4, now)
                .productions(3)
                .player(player(4, "Aburrido"))
                .player(player(6, "Burrito"))
                .star(star(20, 6))
                .fleet(fleet(7, 4, 40, vec![vec![0, 20, 0, 0]]))
                .build()
        };
        h.client.stage("k4", attacking(1000));
        h.scanner.set_credentials("100", "k4").await.unwrap();

        let first = h.scanner.notify_threats("100").await.unwrap();
        assert_eq!(first.sent, 1);

        h.client.stage("k4", attacking(2000));
        h.scanner.set_credentials("100", "k4").await.unwrap();
        let second = h.scanner.notify_threats("100").await.unwrap();
        assert_eq!(second.sent, 0);
        assert_eq!(second.skipped, 1);

        assert_eq!(
            h.sink.messages(),
            vec!["Aburrido's carrier Fleet 7 is attacking Burrito's star Star 20 with 40 units"]
        );
    }

    #[tokio::test]
    async fn self_target_is_not_a_threat() {
        let h = harness().await;
        h.client.stage(
            "k4",
            SnapshotBuilder::new(4, 1000)
                .player(player(4, "Aburrido"))
                .star(star(20, 4))
                .fleet(fleet(7, 4, 40, vec![vec![0, 20, 0, 0]]))
                .build(),
        );
        h.scanner.set_credentials("100", "k4").await.unwrap();

        let report = h.scanner.notify_threats("100").await.unwrap();
        assert_eq!(report, DispatchReport::default());
        assert!(h.sink.messages().is_empty());
    }

    #[tokio::test]
    async fn match_without_snapshots_sends_nothing() {
        let h = harness().await;
        h.scanner
            .db()
            .save_match(&crate::matches::Match::new("100"))
            .await
            .unwrap();
        let report = h.scanner.notify_threats("100").await.unwrap();
        assert_eq!(report, DispatchReport::default());
    }
}
