//! Every tunable named in spec §5/§6.3, collected so none of it is a
//! hardcoded literal buried in control flow.

use std::time::Duration;

use crate::peer::IceServer;

/// Immutable configuration shared by every component. Built once at
/// startup via [`Config::default`] and optionally overridden by the
/// embedding application before the first [`crate::coordinator::SessionCoordinator`]
/// is constructed.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base path for the five backend endpoints, e.g. `https://host/video_chat`.
    pub backend_base_path: String,

    /// ICE servers handed to the peer connection factory.
    pub ice_servers: Vec<IceServer>,
    /// `iceCandidatePoolSize` equivalent.
    pub ice_candidate_pool_size: u8,

    /// Debounce window rejecting a second live swipe request.
    pub swipe_debounce: Duration,
    /// Token-validation retry cooldown.
    pub validation_cooldown: Duration,
    /// How long a successful token validation is cached.
    pub validation_cache_ttl: Duration,
    /// Match-status poll cadence.
    pub poll_interval: Duration,
    /// Deadline after entering live `connecting` before falling back.
    pub connection_timeout: Duration,
    /// Heartbeat cadence once `stable`.
    pub heartbeat_interval: Duration,
    /// Jittered delay before rejoining the queue after partner-left.
    pub rejoin_jitter: (Duration, Duration),
    /// Fixed delay before the initiator sends its offer, per §4.4.
    pub offer_delay: Duration,
    /// Capacity of the per-session duplicate-signal LRU.
    pub dedup_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_base_path: "/video_chat".to_owned(),
            ice_servers: vec![IceServer {
                urls: vec!["stun:stun.l.google.com:19302".to_owned()],
                username: None,
                credential: None,
            }],
            ice_candidate_pool_size: 10,
            swipe_debounce: Duration::from_millis(2000),
            validation_cooldown: Duration::from_millis(1000),
            validation_cache_ttl: Duration::from_secs(5 * 60),
            poll_interval: Duration::from_millis(800),
            connection_timeout: Duration::from_secs(15),
            heartbeat_interval: Duration::from_secs(30),
            rejoin_jitter: (Duration::from_millis(100), Duration::from_millis(500)),
            offer_delay: Duration::from_secs(2),
            dedup_capacity: 256,
        }
    }
}

impl Config {
    pub fn with_backend_base_path(mut self, path: impl Into<String>) -> Self {
        self.backend_base_path = path.into();
        self
    }

    pub fn with_ice_servers(mut self, servers: Vec<IceServer>) -> Self {
        self.ice_servers = servers;
        self
    }
}
