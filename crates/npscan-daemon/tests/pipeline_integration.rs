//! End-to-end poll, fuse, detect and notify runs over in-memory stores.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use npscan_core::Snapshot;
use npscan_core::config::SnapshotEncoding;
use npscan_core::testing::{SnapshotBuilder, fleet, player, star};

use npscan_daemon::Error;
use npscan_daemon::Scanner;
use npscan_daemon::locks::MatchLocks;
use npscan_daemon::matches::{Credential, Match};
use npscan_daemon::notifications::{NotificationDatabase, NotificationError, RenderStyle, Sink};
use npscan_daemon::npapi::{ClientError, GameClient};
use npscan_daemon::poller::{PollOptions, Poller};
use npscan_daemon::storage::MatchDatabase;

#[derive(Default)]
struct FakeGame {
    views: Mutex<HashMap<String, Snapshot>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGame {
    fn show(&self, api_key: &str, snapshot: Snapshot) {
        self.views
            .lock()
            .unwrap()
            .insert(api_key.to_string(), snapshot);
    }

    fn calls(&self, api_key: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|k| *k == api_key)
            .count()
    }
}

#[async_trait]
impl GameClient for FakeGame {
    async fn fetch(&self, _game_number: &str, api_key: &str) -> Result<Snapshot, ClientError> {
        self.calls.lock().unwrap().push(api_key.to_string());
        self.views
            .lock()
            .unwrap()
            .get(api_key)
            .cloned()
            .ok_or_else(|| ClientError::Api("Invalid code".into()))
    }
}

struct ChatSink {
    style: RenderStyle,
    messages: Mutex<Vec<String>>,
}

impl ChatSink {
    fn new(style: RenderStyle) -> Self {
        Self {
            style,
            messages: Mutex::new(Vec::new()),
        }
    }

    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sink for ChatSink {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn render_style(&self) -> RenderStyle {
        self.style
    }

    async fn send(&self, message: &str) -> Result<(), NotificationError> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

struct Setup {
    scanner: Scanner,
    game: Arc<FakeGame>,
    plain: Arc<ChatSink>,
    chat: Arc<ChatSink>,
}

async fn setup(creds: &[(i64, &str)]) -> Setup {
    let db = MatchDatabase::open_in_memory().await.unwrap();
    let mut m = Match::new("100");
    for (uid, key) in creds {
        m.credentials.insert(*uid, Credential::new(*uid, "", *key));
    }
    db.save_match(&m).await.unwrap();

    let game = Arc::new(FakeGame::default());
    let plain = Arc::new(ChatSink::new(RenderStyle::Plain));
    let chat = Arc::new(ChatSink::new(RenderStyle::ChatMentions));
    let poller = Poller::new(db, game.clone(), MatchLocks::new(), SnapshotEncoding::Json);
    let guard = NotificationDatabase::open_in_memory().await.unwrap();
    let scanner = Scanner::new(
        poller,
        Arc::new(guard),
        vec![plain.clone() as Arc<dyn Sink>, chat.clone() as Arc<dyn Sink>],
        Duration::ZERO,
    );

    Setup {
        scanner,
        game,
        plain,
        chat,
    }
}

fn forced() -> PollOptions {
    PollOptions {
        force: true,
        ..PollOptions::default()
    }
}

/// Player 4 holds star 1 with a garrison of 9. Player 6 only sees star 1
/// publicly, and sends carrier 2 at it.
fn view_of_4(now: i64) -> Snapshot {
    SnapshotBuilder::new(4, now)
        .productions(7)
        .player(player(4, "Aburrido").with_cash(100))
        .player(player(6, "Burrito"))
        .star(star(1, 4).with_strength(9))
        .fleet(fleet(1, 4, 5, vec![]))
        .build()
}

fn view_of_6(now: i64) -> Snapshot {
    SnapshotBuilder::new(6, now)
        .productions(7)
        .player(player(4, "Aburrido"))
        .player(player(6, "Burrito").with_cash(50))
        .star(star(1, 4))
        .star(star(2, 6).with_strength(3))
        .fleet(fleet(2, 6, 30, vec![vec![0, 1, 0, 0]]))
        .build()
}

#[tokio::test]
async fn two_partial_views_fuse_and_raise_one_alert() {
    let s = setup(&[(4, "k4"), (6, "k6")]).await;
    s.game.show("k4", view_of_4(100));
    s.game.show("k6", view_of_6(200));

    let outcomes = s.scanner.poll_and_notify(&[], &forced()).await.unwrap();
    assert!(outcomes["100"].changed);

    let merged = s
        .scanner
        .merged_view("100", "", &BTreeMap::new())
        .await
        .unwrap();
    assert!(merged.fleets.contains_key(&1));
    assert!(merged.fleets.contains_key(&2));
    assert_eq!(merged.stars[&1].private.strength, 9);
    assert_eq!(merged.players[&4].private.cash, 100);
    assert_eq!(merged.players[&6].private.cash, 50);

    assert_eq!(
        s.plain.messages(),
        vec!["Burrito's carrier Fleet 2 is attacking Aburrido's star Star 1 with 30 units"]
    );
}

#[tokio::test]
async fn repeated_scans_of_the_same_tick_alert_once() {
    let s = setup(&[(4, "k4"), (6, "k6")]).await;
    s.game.show("k4", view_of_4(100));
    s.game.show("k6", view_of_6(200));
    s.scanner.poll_and_notify(&[], &forced()).await.unwrap();

    // Same capture times: nothing changed.
    let outcomes = s.scanner.poll_and_notify(&[], &forced()).await.unwrap();
    assert!(!outcomes["100"].changed);

    // Newer captures within the same production tick.
    s.game.show("k4", view_of_4(300));
    s.game.show("k6", view_of_6(400));
    let outcomes = s.scanner.poll_and_notify(&[], &forced()).await.unwrap();
    assert!(outcomes["100"].changed);

    assert_eq!(s.plain.messages().len(), 1);
}

#[tokio::test]
async fn unresolved_attack_alerts_again_next_tick() {
    let s = setup(&[(4, "k4"), (6, "k6")]).await;
    s.game.show("k4", view_of_4(100));
    s.game.show("k6", view_of_6(200));
    s.scanner.poll_and_notify(&[], &forced()).await.unwrap();

    let (mut view_4, mut view_6) = (view_of_4(300), view_of_6(400));
    view_4.productions = 8;
    view_6.productions = 8;
    s.game.show("k4", view_4);
    s.game.show("k6", view_6);
    let outcomes = s.scanner.poll_and_notify(&[], &forced()).await.unwrap();
    assert!(outcomes["100"].changed);

    assert_eq!(
        s.plain.messages(),
        vec![
            "Burrito's carrier Fleet 2 is attacking Aburrido's star Star 1 with 30 units";
            2
        ]
    );
}

#[tokio::test]
async fn chat_sink_mentions_mapped_defender() {
    let s = setup(&[(4, "k4"), (6, "k6")]).await;
    s.scanner
        .set_discord_user("100", 4, "424242", false)
        .await
        .unwrap();
    s.game.show("k4", view_of_4(100));
    s.game.show("k6", view_of_6(200));

    s.scanner.poll_and_notify(&[], &forced()).await.unwrap();

    assert_eq!(
        s.chat.messages(),
        vec!["Burrito's carrier Fleet 2 is attacking <@424242>'s star Star 1 with 30 units"]
    );
    assert!(s.plain.messages()[0].contains("Aburrido's star"));
}

#[tokio::test]
async fn fleet_heading_home_raises_nothing() {
    let s = setup(&[(3, "k3")]).await;
    s.game.show(
        "k3",
        SnapshotBuilder::new(3, 100)
            .player(player(3, "Tres"))
            .star(star(5, 3))
            .fleet(fleet(9, 3, 12, vec![vec![0, 5, 0, 0]]))
            .build(),
    );

    let outcomes = s.scanner.poll_and_notify(&[], &forced()).await.unwrap();
    assert!(outcomes["100"].changed);
    assert!(s.plain.messages().is_empty());
}

#[tokio::test]
async fn eliminated_player_is_never_polled_again() {
    let s = setup(&[(4, "k4")]).await;
    s.game.show(
        "k4",
        SnapshotBuilder::new(4, 100)
            .player(player(4, "Aburrido").with_totals(0, 0))
            .build(),
    );

    s.scanner.poll_and_notify(&[], &forced()).await.unwrap();
    let m = s.scanner.db().find_match("100").await.unwrap();
    assert!(m.credentials[&4].is_disabled());

    s.scanner.poll_and_notify(&[], &forced()).await.unwrap();
    assert_eq!(s.game.calls("k4"), 1);

    // Only the operator brings it back.
    s.scanner.enable_player("100", 4).await.unwrap();
    s.scanner.poll_and_notify(&[], &forced()).await.unwrap();
    assert_eq!(s.game.calls("k4"), 2);
}

#[tokio::test]
async fn failing_credential_is_reported_after_siblings_are_stored() {
    let s = setup(&[(4, "k4"), (6, "revoked")]).await;
    s.game.show("k4", view_of_4(100));

    let err = s
        .scanner
        .poll_and_notify(&[], &forced())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Poll { player: Some(6), .. }));

    let m = s.scanner.db().find_match("100").await.unwrap();
    assert_eq!(m.credentials[&4].latest_snapshot(), Some(100));
    assert_eq!(m.credentials[&6].latest_snapshot(), None);
}

#[tokio::test]
async fn unknown_match_does_not_stop_known_ones() {
    let s = setup(&[(4, "k4")]).await;
    s.game.show("k4", view_of_4(100));

    let ids = vec!["404".to_string(), "100".to_string()];
    let err = s.scanner.poll_and_notify(&ids, &forced()).await.unwrap_err();
    assert!(matches!(err, Error::Poll { .. }));

    let m = s.scanner.db().find_match("100").await.unwrap();
    assert_eq!(m.credentials[&4].latest_snapshot(), Some(100));
}
