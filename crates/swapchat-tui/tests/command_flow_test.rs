//! Typed commands driving the runtime end to end.
//!
//! Command lines are parsed and mapped the way the terminal does it, then
//! handed to the production runtime over the simulated relay and backend.

use std::time::Duration;

use swapchat_app::{App, AppAction, AppEvent, AuthState, Screen};
use swapchat_core::SessionState;
use swapchat_harness::{Simulation, Step};
use swapchat_proto::rest::{ChatSummary, User};
use swapchat_tui::{actions_for, commands::parse};

fn acts(line: &str, app: &mut App) -> Vec<Step> {
    actions_for(parse(line), app).into_iter().map(Step::Act).collect()
}

fn in_conversation() -> App {
    let mut app = App::new();
    let user = User { email: "alice@sim.invalid".into(), username: "alice".into(), uuid: Some("alice".into()) };
    app.handle(AppEvent::AuthChanged(AuthState::Authenticated(user)));
    app.handle(AppEvent::SessionOpened(swapchat_core::Counterpart {
        to: "bob".into(),
        name: "bob".into(),
        profile_pic: None,
    }));
    app
}

#[tokio::test]
async fn login_open_send_and_leave() {
    let sim = Simulation::new(21).unwrap();
    sim.account("alice", "tok-alice");
    sim.account("bob", "tok-bob");
    sim.backend.add_chat("alice", "bob");

    let mut scratch = App::new();
    let mut listed = App::new();
    listed.handle(AppEvent::ChatsLoaded(vec![ChatSummary {
        convo_id: "bob".into(),
        name: "bob".into(),
        profile_pic: None,
    }]));
    let mut chatting = in_conversation();

    let mut steps = acts("/login alice@sim.invalid wrong", &mut scratch);
    steps.push(Step::Snapshot);
    steps.extend(acts("/login alice@sim.invalid password", &mut scratch));
    steps.push(Step::wait_until("chat list", |app| app.screen() == Screen::ChatList && app.chats().len() == 1));
    steps.extend(acts("/open 1", &mut listed));
    steps.push(Step::wait_until("active", |app| {
        app.session().is_some_and(|s| s.state == SessionState::Active)
    }));
    steps.extend(acts("hi bob", &mut chatting));
    steps.push(Step::wait_until("echo", |app| app.session().is_some_and(|s| s.message_count() == 1 && !s.pending)));
    steps.extend(acts("/back", &mut chatting));
    steps.push(Step::Snapshot);

    let mut runtime = sim.runtime(steps);
    tokio::time::timeout(Duration::from_secs(120), runtime.run()).await.unwrap().unwrap();

    let snapshots = runtime.driver().snapshots();
    assert!(snapshots[0].status().is_some_and(|s| s.starts_with("Login failed")));
    assert_eq!(snapshots[0].screen(), Screen::Login);
    assert_eq!(snapshots[1].screen(), Screen::ChatList);
    assert!(snapshots[1].session().is_none());

    let relay = sim.relay.lock();
    assert_eq!(relay.sends_from("alice"), 1);
    assert!(relay.went_offline("alice"));
}

#[tokio::test]
async fn quit_command_stops_runtime_before_script_ends() {
    let sim = Simulation::new(22).unwrap();
    sim.account("alice", "tok-alice");
    sim.backend.log_in_as("alice");

    let mut scratch = App::new();
    let mut steps = acts("/quit", &mut scratch);
    steps.push(Step::Act(AppAction::Refresh));

    let mut runtime = sim.runtime(steps);
    tokio::time::timeout(Duration::from_secs(30), runtime.run()).await.unwrap().unwrap();

    assert!(runtime.driver().is_stopped());
    assert_eq!(runtime.driver().remaining_steps(), 1);
}
