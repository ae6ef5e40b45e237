//! End-to-end session lifecycle through the production runtime.
//!
//! Every test runs the real `Runtime`, `Session` and RSA key exchange against
//! the in-memory relay. Mid-run state is captured with `Step::Snapshot`
//! because the runtime tears the session down when the script ends.

use std::time::Duration;

use swapchat_app::{App, AppAction, Driver, MessageBody, Screen, SessionSelection, SessionView};
use swapchat_core::{PLACEHOLDER_TEXT, SessionState};
use swapchat_harness::{SimRelay, SimRuntime, Simulation, Step, StoredBody};
use serde_json::json;
use swapchat_proto::{ClientEvent, FileData};

const TEST_TIMEOUT: Duration = Duration::from_secs(120);

fn world(seed: u64) -> Simulation {
    let sim = Simulation::new(seed).unwrap();
    sim.account("alice", "tok-alice");
    sim.account("bob", "tok-bob");
    sim.backend.log_in_as("alice");
    sim
}

fn open(uuid: &str) -> Step {
    Step::Act(AppAction::OpenSession(SessionSelection::DirectLink { uuid: uuid.into() }))
}

fn view(app: &App) -> Option<&SessionView> {
    app.session()
}

fn wait_active() -> Step {
    Step::wait_until("session active", |app| view(app).is_some_and(|s| s.state == SessionState::Active))
}

fn texts(view: &SessionView) -> Vec<String> {
    view.groups.iter().flat_map(|g| g.messages.iter().map(|m| m.text().to_string())).collect()
}

async fn run(runtime: &mut SimRuntime) {
    tokio::time::timeout(TEST_TIMEOUT, runtime.run()).await.unwrap().unwrap();
}

#[tokio::test]
async fn send_round_trips_through_relay() {
    let sim = world(1);
    let mut runtime = sim.runtime(vec![
        open("bob"),
        wait_active(),
        Step::Act(AppAction::SendText("hello bob".into())),
        Step::wait_until("echo", |app| view(app).is_some_and(|s| s.message_count() == 1 && !s.pending)),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let snapshot = &runtime.driver().snapshots()[0];
    let session = view(snapshot).unwrap();
    assert_eq!(texts(session), vec!["hello bob"]);
    assert!(session.groups[0].messages[0].by_me);
    assert_eq!(session.counterpart.name, "bob");

    let relay = sim.relay.lock();
    assert_eq!(relay.history("alice", "bob")[0].body, StoredBody::Text("hello bob".into()));
    assert_eq!(relay.joins("alice").len(), 1);
    assert_eq!(relay.sends_from("alice"), 1);
}

#[tokio::test]
async fn join_precedes_history_request() {
    let sim = world(2);
    let mut runtime = sim.runtime(vec![open("bob"), wait_active()]);
    run(&mut runtime).await;

    let events = sim.relay.lock().received_from("alice");
    assert!(matches!(&events[0], ClientEvent::JoinConversation { to, public_key } if to == "bob" && public_key.contains("BEGIN PUBLIC KEY")));
    assert!(matches!(&events[1], ClientEvent::PreviousChats { to } if to == "bob"));
}

#[tokio::test]
async fn corrupted_history_entry_becomes_placeholder() {
    let sim = world(3);
    {
        let mut relay = sim.relay.lock();
        for i in 0..5 {
            let from = if i % 2 == 0 { "alice" } else { "bob" };
            let to = if from == "alice" { "bob" } else { "alice" };
            relay.seed(from, to, StoredBody::Text(format!("m{i}")));
        }
        relay.corrupt_history_at(2);
    }

    let mut runtime = sim.runtime(vec![open("bob"), wait_active(), Step::Snapshot]);
    run(&mut runtime).await;

    let session = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    assert_eq!(texts(&session), vec!["m0", "m1", PLACEHOLDER_TEXT, "m3", "m4"]);
    let messages: Vec<_> = session.groups.iter().flat_map(|g| g.messages.iter()).collect();
    assert!(matches!(messages[2].body, MessageBody::Placeholder(_)));
    assert!(messages[0].by_me);
    assert!(!messages[1].by_me);
}

#[tokio::test]
async fn corrupt_live_message_does_not_stop_the_session() {
    let sim = world(4);
    let relay = sim.relay.clone();
    let mut runtime = sim.runtime(vec![
        open("bob"),
        wait_active(),
        Step::wait_until("inject", move |_| {
            relay.lock().inject_corrupt("alice");
            true
        }),
        Step::wait_until("placeholder", |app| view(app).is_some_and(|s| s.message_count() == 1)),
        Step::Act(AppAction::SendText("still here".into())),
        Step::wait_until("echo", |app| view(app).is_some_and(|s| s.message_count() == 2)),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let session = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    assert_eq!(texts(&session), vec![PLACEHOLDER_TEXT.to_string(), "still here".to_string()]);
    assert_eq!(session.state, SessionState::Active);
}

#[tokio::test]
async fn second_send_while_pending_is_rejected() {
    let sim = world(5);
    let mut runtime = sim.runtime(vec![
        open("bob"),
        wait_active(),
        Step::Act(AppAction::SendText("one".into())),
        Step::Act(AppAction::SendText("two".into())),
        Step::Snapshot,
        Step::wait_until("echo", |app| view(app).is_some_and(|s| s.message_count() == 1 && !s.pending)),
    ]);
    run(&mut runtime).await;

    let snapshot = &runtime.driver().snapshots()[0];
    assert!(snapshot.status().is_some_and(|s| s.starts_with("Message not sent")));
    assert_eq!(sim.relay.lock().sends_from("alice"), 1);
    assert_eq!(sim.relay.lock().history("alice", "bob").len(), 1);
}

#[tokio::test]
async fn self_connect_never_activates() {
    let sim = world(6);
    let mut runtime = sim.runtime(vec![
        open("alice"),
        Step::wait_until("navigated away", |app| app.screen() == Screen::ChatList && app.session().is_none()),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let snapshot = &runtime.driver().snapshots()[0];
    assert_eq!(snapshot.status(), Some("cannot open a conversation with yourself"));

    let relay = sim.relay.lock();
    assert!(!relay.went_offline("alice"));
    assert_eq!(relay.sends_from("alice"), 0);
    assert_eq!(relay.connection_count(), 0);
}

#[tokio::test]
async fn relay_disconnect_blocks_sends() {
    let sim = world(7);
    let relay = sim.relay.clone();
    let mut runtime = sim.runtime(vec![
        open("bob"),
        wait_active(),
        Step::wait_until("disconnect", move |_| {
            relay.lock().disconnect("alice", "io server disconnect");
            true
        }),
        Step::wait_until("disconnected", |app| view(app).is_some_and(|s| s.state == SessionState::Disconnected)),
        Step::Snapshot,
        Step::Act(AppAction::SendText("anyone?".into())),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let disconnected = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    assert_eq!(disconnected.notice.as_deref(), Some("disconnected: io server disconnect"));
    assert!(!disconnected.can_send());

    let after = &runtime.driver().snapshots()[1];
    assert!(after.status().is_some_and(|s| s.starts_with("Message not sent")));
    assert_eq!(sim.relay.lock().sends_from("alice"), 0);
}

#[tokio::test]
async fn withheld_history_then_disconnect_is_history_unavailable() {
    let sim = world(8);
    sim.relay.lock().withhold_history(true);
    let relay = sim.relay.clone();
    let mut runtime = sim.runtime(vec![
        open("bob"),
        Step::wait_until("history requested", move |_| {
            let mut relay = relay.lock();
            let requested =
                relay.received_from("alice").iter().any(|e| matches!(e, ClientEvent::PreviousChats { .. }));
            if requested {
                relay.disconnect("alice", "transport close");
            }
            requested
        }),
        Step::wait_until("disconnected", |app| view(app).is_some_and(|s| s.state == SessionState::Disconnected)),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let session = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    assert_eq!(session.notice.as_deref(), Some("history unavailable: transport close"));
    assert_eq!(session.message_count(), 0);
}

#[tokio::test]
async fn unreadable_relay_key_ends_session() {
    let sim = world(9);
    sim.relay.lock().corrupt_relay_key(true);
    let mut runtime = sim.runtime(vec![
        open("bob"),
        Step::wait_until("disconnected", |app| view(app).is_some_and(|s| s.state == SessionState::Disconnected)),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let session = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    assert!(session.notice.is_some_and(|n| n.starts_with("history unavailable")));
}

/// Waits for alice's history request, then lets `respond` act as the relay.
fn history_requested(sim: &Simulation, respond: impl Fn(&mut SimRelay) + Send + 'static) -> Step {
    let relay = sim.relay.clone();
    Step::wait_until("history requested", move |_| {
        let mut relay = relay.lock();
        let requested = relay.received_from("alice").iter().any(|e| matches!(e, ClientEvent::PreviousChats { .. }));
        if requested {
            respond(&mut relay);
        }
        requested
    })
}

#[tokio::test]
async fn history_with_broken_entries_still_activates() {
    let sim = world(15);
    sim.relay.lock().withhold_history(true);
    let relay_key = sim.relay.lock().public_key_pem().to_string();
    let mut runtime = sim.runtime(vec![
        open("bob"),
        history_requested(&sim, move |relay| {
            let args = json!({
                "chats": [
                    { "type": "file", "content": "https://files.sim.invalid/1/notes.pdf", "byMe": true },
                    { "type": "text", "content": null, "timestamp": null, "deleted": true },
                    42,
                    { "type": "image", "content": "https://files.sim.invalid/2/cat.png", "timestamp": "yesterday" },
                ],
                "archived": null,
                "server_public_key": relay_key,
            });
            relay.inject_event("alice", "previous_chats", args);
        }),
        wait_active(),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let session = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    assert!(!session.archived);
    assert_eq!(session.message_count(), 4);
    let messages: Vec<_> = session.groups.iter().flat_map(|g| g.messages.iter()).collect();
    assert!(matches!(&messages[0].body, MessageBody::File { url, .. } if url.ends_with("notes.pdf")));
    assert!(messages[0].by_me);
    assert_eq!(messages[1].body, MessageBody::Deleted);
    assert!(matches!(messages[2].body, MessageBody::Placeholder(_)));
    assert!(matches!(messages[3].body, MessageBody::Placeholder(_)));
}

#[tokio::test]
async fn history_without_relay_key_is_history_unavailable() {
    let sim = world(16);
    sim.relay.lock().withhold_history(true);
    let mut runtime = sim.runtime(vec![
        open("bob"),
        history_requested(&sim, |relay| relay.inject_event("alice", "previous_chats", json!({ "chats": [] }))),
        Step::wait_until("disconnected", |app| view(app).is_some_and(|s| s.state == SessionState::Disconnected)),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let session = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    assert!(session.notice.as_ref().is_some_and(|n| n.starts_with("history unavailable: undecodable history")));
    assert_eq!(session.message_count(), 0);
}

#[tokio::test]
async fn unreadable_echo_clears_pending_send() {
    let sim = world(17);
    sim.relay.lock().withhold_echoes(true);
    let relay = sim.relay.clone();
    let mut runtime = sim.runtime(vec![
        open("bob"),
        wait_active(),
        Step::Act(AppAction::SendText("lost in transit".into())),
        Step::wait_until("pending", |app| view(app).is_some_and(|s| s.pending)),
        Step::wait_until("broken echo", move |_| {
            relay.lock().inject_event("alice", "message_received", json!({ "type": "text", "content": 7, "byMe": true }));
            true
        }),
        Step::wait_until("settled", |app| view(app).is_some_and(|s| s.message_count() == 1 && !s.pending)),
        Step::Snapshot,
        Step::Act(AppAction::SendText("second try".into())),
        Step::wait_until("pending again", |app| view(app).is_some_and(|s| s.pending)),
    ]);
    run(&mut runtime).await;

    let session = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    assert_eq!(texts(&session), vec![PLACEHOLDER_TEXT]);
    assert!(session.groups[0].messages[0].by_me);
    assert_eq!(session.state, SessionState::Active);
    assert_eq!(sim.relay.lock().sends_from("alice"), 2);
}

#[tokio::test]
async fn leaving_emits_offline_and_closes() {
    let sim = world(10);
    let mut runtime = sim.runtime(vec![
        open("bob"),
        wait_active(),
        Step::Act(AppAction::LeaveSession),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let snapshot = &runtime.driver().snapshots()[0];
    assert_eq!(snapshot.screen(), Screen::ChatList);
    assert!(snapshot.session().is_none());

    let relay = sim.relay.lock();
    let offline: Vec<_> =
        relay.received_from("alice").into_iter().filter(|e| matches!(e, ClientEvent::Offline { .. })).collect();
    assert_eq!(offline, vec![ClientEvent::Offline { to: "bob".into() }]);
    assert_eq!(relay.connection_count(), 0);
    assert!(!runtime.driver().is_connected());
}

#[tokio::test]
async fn script_end_tears_down_open_session() {
    let sim = world(11);
    let mut runtime = sim.runtime(vec![open("bob"), wait_active()]);
    run(&mut runtime).await;

    assert!(runtime.driver().is_stopped());
    assert!(runtime.bridge().session().is_none());
    assert!(sim.relay.lock().went_offline("alice"));
}

#[tokio::test]
async fn archived_history_shows_banner() {
    let sim = world(12);
    {
        let mut relay = sim.relay.lock();
        relay.seed("bob", "alice", StoredBody::Deleted);
        relay.seed("bob", "alice", StoredBody::File("https://cdn.sim.invalid/notes.pdf?sig=1".into()));
        relay.set_archived("alice", "bob", true);
    }
    let mut runtime = sim.runtime(vec![open("bob"), wait_active(), Step::Snapshot]);
    run(&mut runtime).await;

    let session = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    assert_eq!(session.banner(), Some("Previous Conversations have been archived."));
    assert_eq!(texts(&session), vec!["This message is deleted", "A certain .pdf file shared"]);
}

#[tokio::test]
async fn file_share_is_echoed_as_link() {
    let sim = world(13);
    let file = FileData { name: "diagram.png".into(), buffer: vec![0x89, 0x50, 0x4e, 0x47], mime: "image/png".into() };
    let mut runtime = sim.runtime(vec![
        open("bob"),
        wait_active(),
        Step::Act(AppAction::SendFile(file)),
        Step::wait_until("echo", |app| view(app).is_some_and(|s| s.message_count() == 1 && !s.pending)),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let session = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    let message = &session.groups[0].messages[0];
    assert!(matches!(&message.body, MessageBody::File { url, .. } if url.ends_with("diagram.png")));
    assert_eq!(message.text(), "A certain .png file shared");
}

#[tokio::test]
async fn unknown_relay_token_is_rejected() {
    let sim = world(14);
    sim.backend.add_account("carol", "carol", "carol@sim.invalid", "password", "tok-unknown-to-relay");
    sim.backend.log_in_as("carol");
    let mut runtime = sim.runtime(vec![
        open("bob"),
        Step::wait_until("disconnected", |app| view(app).is_some_and(|s| s.state == SessionState::Disconnected)),
        Step::Snapshot,
    ]);
    run(&mut runtime).await;

    let session = view(&runtime.driver().snapshots()[0]).unwrap().clone();
    assert!(session.notice.is_some_and(|n| n.contains("unauthorized")));
    assert_eq!(runtime.driver().connects(), 0);
}

#[tokio::test]
async fn same_seed_same_keys() {
    let first = world(99);
    let second = world(99);
    assert_eq!(first.relay.lock().public_key_pem(), second.relay.lock().public_key_pem());
}
