//! Integration test common infrastructure.
//!
//! Builds a full relay over the in-memory store backend with a recording
//! transport, plus helpers for seeding profiles, preferences, and ratings,
//! and the cross-cutting invariant checks.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use veilbot::Uid;
use veilbot::config::Config;
use veilbot::relay::Relay;
use veilbot::state::SessionState;
use veilbot::store::memory::MemoryBackend;
use veilbot::store::{Store, keys};
use veilbot::transport::{Envelope, Transport, TransportError};

/// The configured admin id in every test harness.
pub const ADMIN: Uid = 900;

/// What the recording transport saw.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(String),
    Prompt(String),
    Envelope(Envelope),
}

/// Transport double: records everything, optionally fails per recipient.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Uid, Sent)>>,
    unreachable: Mutex<HashSet<Uid>>,
    transient_failures: Mutex<std::collections::HashMap<Uid, usize>>,
}

impl RecordingTransport {
    fn deliver(&self, to: Uid, item: Sent) -> Result<(), TransportError> {
        if self.unreachable.lock().contains(&to) {
            return Err(TransportError::Unreachable);
        }
        let mut failures = self.transient_failures.lock();
        if let Some(remaining) = failures.get_mut(&to) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Transient("injected".into()));
            }
        }
        drop(failures);
        self.sent.lock().push((to, item));
        Ok(())
    }

    /// Mark a recipient as gone (blocked the bot / deactivated).
    pub fn set_unreachable(&self, uid: Uid) {
        self.unreachable.lock().insert(uid);
    }

    /// Fail the next `count` sends to `uid` with a transient error.
    pub fn fail_transient(&self, uid: Uid, count: usize) {
        self.transient_failures.lock().insert(uid, count);
    }

    /// Every text (including prompts) sent to `uid`, in order.
    pub fn texts_for(&self, uid: Uid) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| *to == uid)
            .filter_map(|(_, sent)| match sent {
                Sent::Text(text) | Sent::Prompt(text) => Some(text.clone()),
                Sent::Envelope(_) => None,
            })
            .collect()
    }

    /// Every envelope relayed to `uid`, in order.
    pub fn envelopes_for(&self, uid: Uid) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .filter(|(to, _)| *to == uid)
            .filter_map(|(_, sent)| match sent {
                Sent::Envelope(envelope) => Some(envelope.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, to: Uid, text: &str) -> Result<(), TransportError> {
        self.deliver(to, Sent::Text(text.to_string()))
    }

    async fn send_rating_prompt(&self, to: Uid, text: &str) -> Result<(), TransportError> {
        self.deliver(to, Sent::Prompt(text.to_string()))
    }

    async fn send_envelope(&self, to: Uid, envelope: &Envelope) -> Result<(), TransportError> {
        self.deliver(to, Sent::Envelope(envelope.clone()))
    }
}

/// A fully wired relay over the memory backend.
pub struct Harness {
    pub relay: Arc<Relay>,
    pub store: Store,
    pub transport: Arc<RecordingTransport>,
}

pub fn harness() -> Harness {
    harness_with(|_| {})
}

pub fn harness_with(customize: impl FnOnce(&mut Config)) -> Harness {
    let mut config: Config = toml::from_str(&format!(
        r#"
        [bot]
        token = "42:TEST"
        admins = [{ADMIN}]
        "#
    ))
    .expect("test config parses");
    customize(&mut config);

    let store: Store = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());
    let relay = Relay::new(config, store.clone(), transport.clone());
    Harness {
        relay,
        store,
        transport,
    }
}

// ---------------------------------------------------------------------------
// Seeding helpers
// ---------------------------------------------------------------------------

pub async fn seed_profile(
    store: &Store,
    uid: Uid,
    nickname: &str,
    gender: Option<&str>,
    country: Option<&str>,
) {
    let mut fields = vec![("nickname", nickname.to_string())];
    if let Some(gender) = gender {
        fields.push(("gender", gender.to_string()));
    }
    if let Some(country) = country {
        fields.push(("country", country.to_string()));
    }
    store
        .hset_multiple(&keys::profile(uid), &fields)
        .await
        .unwrap();
}

pub async fn seed_preferences(
    store: &Store,
    uid: Uid,
    gender_filter: &str,
    country_filter: &str,
) {
    store
        .hset_multiple(
            &keys::preferences(uid),
            &[
                ("gender_filter", gender_filter.to_string()),
                ("country_filter", country_filter.to_string()),
            ],
        )
        .await
        .unwrap();
}

pub async fn seed_rating(store: &Store, uid: Uid, positive: i64, negative: i64) {
    store
        .hset_multiple(
            &keys::rating(uid),
            &[
                ("positive", positive.to_string()),
                ("negative", negative.to_string()),
            ],
        )
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Invariant checks
// ---------------------------------------------------------------------------

/// Assert the store-wide invariants over a known population.
pub async fn check_invariants(relay: &Relay, population: &[Uid]) {
    let queue = relay.queue.snapshot().await.unwrap();

    // No user appears twice in the queue.
    let unique: HashSet<_> = queue.iter().collect();
    assert_eq!(unique.len(), queue.len(), "duplicate queue entries: {queue:?}");

    for &uid in population {
        let state = relay.state.session(uid).await.unwrap();
        let partner = relay.state.partner(uid).await.unwrap();
        let queued = queue.contains(&uid);
        let banned = relay.moderation.check_ban(uid).await.unwrap().is_some();

        // Pair symmetry, both sides IN_CHAT, no self-pair.
        if let Some(partner) = partner {
            assert_ne!(partner, uid, "self-pair for {uid}");
            assert_eq!(
                relay.state.partner(partner).await.unwrap(),
                Some(uid),
                "asymmetric pair {uid}<->{partner}"
            );
            assert_eq!(state, SessionState::InChat, "paired {uid} not IN_CHAT");
            assert_eq!(
                relay.state.session(partner).await.unwrap(),
                SessionState::InChat,
                "paired {partner} not IN_CHAT"
            );
        }

        // Queue membership iff IN_QUEUE.
        assert_eq!(
            queued,
            state == SessionState::InQueue,
            "queue/state mismatch for {uid}: queued={queued}, state={state:?}"
        );

        // Ban monopoly: banned users are neither queued nor paired.
        if banned {
            assert!(!queued, "banned {uid} still queued");
            assert!(partner.is_none(), "banned {uid} still paired");
        }

        // Rating score bounds.
        let score = relay.ratings.record(uid).await.unwrap().score();
        assert!((0.0..=100.0).contains(&score), "score out of bounds: {score}");
    }
}
