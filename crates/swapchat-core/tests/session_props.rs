//! Property tests for history isolation and the pending-send guard.

use std::{
    future::Future,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use swapchat_core::{
    Body, Counterpart, Environment, OutgoingMessage, PLACEHOLDER_TEXT, SendRejection, Session,
    SessionAction, SessionConfig, SessionError, SessionEvent, SessionState,
};
use swapchat_crypto::{KeyPair, encrypt_for};
use swapchat_proto::{ClientEvent, HistorySnapshot, MessageKind, RelayEvent, Timestamp, WireMessage};

#[derive(Clone, Default)]
struct SeqEnv(Arc<AtomicU64>);

impl Environment for SeqEnv {
    type Rng = ChaCha20Rng;

    fn rng(&self) -> Self::Rng {
        ChaCha20Rng::seed_from_u64(self.0.fetch_add(1, Ordering::Relaxed))
    }

    fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
        std::future::ready(())
    }

    fn now_millis(&self) -> i64 {
        0
    }
}

fn client_keys() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(1)).unwrap())
}

fn relay_keys() -> &'static KeyPair {
    static KEYS: OnceLock<KeyPair> = OnceLock::new();
    KEYS.get_or_init(|| KeyPair::generate(&mut ChaCha20Rng::seed_from_u64(2)).unwrap())
}

fn joined() -> Session<SeqEnv> {
    let counterpart = Counterpart { to: "u-peer".into(), name: "Peer".into(), profile_pic: None };
    let mut session = Session::new(SeqEnv::default(), counterpart, SessionConfig::default());
    session.handle(SessionEvent::TransportConnected).unwrap();
    session.handle(SessionEvent::KeyPairReady(client_keys().clone())).unwrap();
    session
}

fn snapshot(chats: Vec<WireMessage>) -> SessionEvent {
    SessionEvent::Relay(RelayEvent::PreviousChats(HistorySnapshot {
        chats,
        archived: false,
        server_public_key: relay_keys().public_key_pem().to_string(),
    }))
}

fn sealed(index: usize, by_me: bool) -> WireMessage {
    let mut rng = ChaCha20Rng::seed_from_u64(index as u64);
    WireMessage {
        kind: MessageKind::Text,
        content: encrypt_for(client_keys().public_key(), &format!("message {index}"), &mut rng).unwrap(),
        timestamp: Timestamp::Millis(index as i64),
        by_me,
        deleted: false,
    }
}

#[derive(Debug, Clone)]
enum Step {
    Send,
    Echo,
    Incoming,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![Just(Step::Send), Just(Step::Echo), Just(Step::Incoming)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn corrupt_history_entry_is_isolated(len in 1usize..12, pick in any::<prop::sample::Index>()) {
        let corrupt = pick.index(len);
        let chats: Vec<_> = (0..len)
            .map(|i| {
                let mut message = sealed(i, false);
                if i == corrupt {
                    message.content = "AAAA".repeat(i + 1);
                }
                message
            })
            .collect();

        let mut session = joined();
        session.handle(snapshot(chats)).unwrap();

        prop_assert_eq!(session.state(), SessionState::Active);
        prop_assert_eq!(session.messages().len(), len);
        for (i, message) in session.messages().iter().enumerate() {
            let Body::Text(plaintext) = &message.body else {
                return Err(TestCaseError::fail("expected text body"));
            };
            if i == corrupt {
                prop_assert_eq!(plaintext.as_str(), PLACEHOLDER_TEXT);
            } else {
                prop_assert_eq!(plaintext.as_str(), format!("message {i}"));
            }
            prop_assert_eq!(&message.timestamp, &Timestamp::Millis(i as i64));
        }
    }

    #[test]
    fn never_more_than_one_send_in_flight(steps in prop::collection::vec(step(), 1..24)) {
        let mut session = joined();
        session.handle(snapshot(vec![])).unwrap();

        let mut in_flight = 0usize;
        for (i, step) in steps.into_iter().enumerate() {
            match step {
                Step::Send => {
                    let result = session.handle(SessionEvent::Send(OutgoingMessage::Text(format!("hi {i}"))));
                    match result {
                        Ok(actions) => {
                            let sent = actions
                                .iter()
                                .filter(|a| matches!(a, SessionAction::Emit(ClientEvent::MessageSent { .. })))
                                .count();
                            prop_assert_eq!(sent, 1);
                            in_flight += 1;
                        },
                        Err(err) => {
                            prop_assert_eq!(err, SessionError::SendRejected(SendRejection::SendPending));
                            prop_assert_eq!(in_flight, 1);
                        },
                    }
                },
                Step::Echo => {
                    session.handle(SessionEvent::Relay(RelayEvent::MessageReceived(sealed(i, true)))).unwrap();
                    in_flight = 0;
                },
                Step::Incoming => {
                    session.handle(SessionEvent::Relay(RelayEvent::MessageReceived(sealed(i, false)))).unwrap();
                },
            }

            prop_assert!(in_flight <= 1);
            prop_assert_eq!(session.is_send_pending(), in_flight == 1);
        }
    }
}
