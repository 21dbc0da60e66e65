//! The shared application context.
//!
//! One `Relay` is built at startup and handed to every dispatcher endpoint.
//! It owns nothing stateful itself - all session truth is in the store -
//! so it is safe to share across any number of concurrent update tasks
//! (and bot processes).

use crate::Uid;
use crate::config::Config;
use crate::matching::MatchingEngine;
use crate::moderation::ModerationStore;
use crate::profile::ProfileStore;
use crate::ratelimit::RateLimiter;
use crate::rating::RatingStore;
use crate::router::Router;
use crate::session::SessionManager;
use crate::state::StateStore;
use crate::state::queue::Queue;
use crate::store::Store;
use crate::transport::Transport;
use std::sync::Arc;

/// Shared context wiring every component of the relay core.
pub struct Relay {
    pub config: Config,
    pub store: Store,
    pub transport: Arc<dyn Transport>,
    pub state: StateStore,
    pub queue: Queue,
    pub profiles: ProfileStore,
    pub ratings: RatingStore,
    pub moderation: ModerationStore,
    pub limiter: RateLimiter,
    pub matching: MatchingEngine,
    pub sessions: SessionManager,
    pub router: Router,
}

impl Relay {
    pub fn new(config: Config, store: Store, transport: Arc<dyn Transport>) -> Arc<Self> {
        let chat_ttl = config.matching.chat_timeout();

        let state = StateStore::new(store.clone(), chat_ttl);
        let queue = Queue::new(store.clone(), config.matching.max_queue_size);
        let profiles = ProfileStore::new(store.clone());
        let ratings = RatingStore::new(store.clone());
        let moderation = ModerationStore::new(
            store.clone(),
            config.moderation.auto_ban_threshold,
            config.moderation.auto_ban_days,
        );
        let limiter = RateLimiter::new(store.clone(), config.limits.clone());
        let matching = MatchingEngine::new(
            store.clone(),
            state.clone(),
            queue.clone(),
            profiles.clone(),
            ratings.clone(),
            moderation.clone(),
            chat_ttl,
            config.matching.max_queue_size,
        );
        let sessions = SessionManager::new(
            store.clone(),
            state.clone(),
            queue.clone(),
            profiles.clone(),
            ratings.clone(),
            moderation.clone(),
            transport.clone(),
            chat_ttl,
        );
        let router = Router::new(
            state.clone(),
            moderation.clone(),
            limiter.clone(),
            sessions.clone(),
            transport.clone(),
            &config.moderation.blocked_terms,
        );

        Arc::new(Self {
            config,
            store,
            transport,
            state,
            queue,
            profiles,
            ratings,
            moderation,
            limiter,
            matching,
            sessions,
            router,
        })
    }

    /// Whether `uid` may run admin commands.
    pub fn is_admin(&self, uid: Uid) -> bool {
        self.config.bot.admins.contains(&uid)
    }
}
