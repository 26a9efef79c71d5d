//! C3 — Peer Connection Controller.
//!
//! Exactly one [`webrtc::peer_connection::RTCPeerConnection`] per live
//! session. Grounded on
//! `examples/frecar-beam/crates/agent/src/peer.rs` for the concrete
//! `webrtc` crate call shapes (engine/API construction, ICE server
//! wiring, offer/answer, ICE candidate handling, connection-state
//! callback) and on `jason/src/peer/mod.rs` for the ICE-before-remote-
//! description queueing/draining logic.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use futures::future::try_join_all;
use log::{debug, warn};
use tokio::sync::Mutex;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::error::PeerError;
use crate::peer::signaling::PeerPhase;

/// ICE server configuration, mirrors `RTCIceServer` but kept free of the
/// `webrtc` crate in [`crate::config::Config`] so the config module does
/// not need the dependency directly.
#[derive(Clone, Debug)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl From<&IceServer> for RTCIceServer {
    fn from(s: &IceServer) -> Self {
        RTCIceServer {
            urls: s.urls.clone(),
            username: s.username.clone().unwrap_or_default(),
            credential: s.credential.clone().unwrap_or_default(),
            ..Default::default()
        }
    }
}

type LocalIceHandler = Arc<dyn Fn(RTCIceCandidate) + Send + Sync>;
type RemoteTrackHandler = Arc<dyn Fn(Arc<TrackRemote>) + Send + Sync>;
type ConnectionStateHandler = Arc<dyn Fn(RTCPeerConnectionState) + Send + Sync>;

struct Inner {
    pc: RefCell<Arc<RTCPeerConnection>>,
    phase: Cell<PeerPhase>,
    /// ICE candidates received before the remote description was set,
    /// drained in enqueue order once it is (spec §4.3).
    ice_queue: Mutex<Vec<RTCIceCandidateInit>>,
    has_remote_description: Cell<bool>,

    // Kept so `reset` can rebuild an equivalent connection and reattach
    // the same callers' callbacks.
    ice_servers: Vec<IceServer>,
    ice_candidate_pool_size: u8,
    local_tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
    local_ice_handler: RefCell<Option<LocalIceHandler>>,
    remote_track_handler: RefCell<Option<RemoteTrackHandler>>,
    connection_state_handler: RefCell<Option<ConnectionStateHandler>>,
}

/// Owns one peer connection for the lifetime of one live session.
/// Constructed fresh by [`crate::coordinator::SessionCoordinator`] for
/// every `matched(live)` session and torn down on swipe/failure. Cheaply
/// `Clone`-able (an `Rc` handle) so callers can pull a reference out of a
/// `RefCell` before an `.await` instead of holding the borrow across it.
pub struct PeerConnectionController {
    inner: Rc<Inner>,
}

impl Clone for PeerConnectionController {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

async fn build_pc(
    ice_servers: &[IceServer],
    ice_candidate_pool_size: u8,
    local_tracks: &[Arc<dyn TrackLocal + Send + Sync>],
) -> Result<Arc<RTCPeerConnection>, PeerError> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .map_err(|e| PeerError::Platform(e.to_string()))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| PeerError::Platform(e.to_string()))?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let config = RTCConfiguration {
        ice_servers: ice_servers.iter().map(RTCIceServer::from).collect(),
        ice_candidate_pool_size,
        ..Default::default()
    };

    let pc = Arc::new(
        api.new_peer_connection(config)
            .await
            .map_err(|e| PeerError::Platform(e.to_string()))?,
    );

    for track in local_tracks {
        pc.add_track(Arc::clone(track))
            .await
            .map_err(|e| PeerError::Platform(e.to_string()))?;
    }

    Ok(pc)
}

fn attach_local_ice(pc: &Arc<RTCPeerConnection>, handler: LocalIceHandler) {
    pc.on_ice_candidate(Box::new(move |candidate| {
        if let Some(candidate) = candidate {
            handler(candidate);
        }
        Box::pin(async {})
    }));
}

fn attach_remote_track(pc: &Arc<RTCPeerConnection>, handler: RemoteTrackHandler) {
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        handler(track);
        Box::pin(async {}) as BoxFuture<'static, ()>
    }));
}

fn attach_connection_state(pc: &Arc<RTCPeerConnection>, handler: ConnectionStateHandler) {
    pc.on_peer_connection_state_change(Box::new(move |state| {
        handler(state);
        Box::pin(async {})
    }));
}

impl PeerConnectionController {
    /// Builds the engine/API, registers interceptors, opens a peer
    /// connection against `ice_servers`, and attaches every track from
    /// `local_tracks`.
    pub async fn create(
        ice_servers: &[IceServer],
        ice_candidate_pool_size: u8,
        local_tracks: Vec<Arc<dyn TrackLocal + Send + Sync>>,
    ) -> Result<Self, PeerError> {
        let pc = build_pc(ice_servers, ice_candidate_pool_size, &local_tracks).await?;

        Ok(Self {
            inner: Rc::new(Inner {
                pc: RefCell::new(pc),
                phase: Cell::new(PeerPhase::Fresh),
                ice_queue: Mutex::new(Vec::new()),
                has_remote_description: Cell::new(false),
                ice_servers: ice_servers.to_vec(),
                ice_candidate_pool_size,
                local_tracks,
                local_ice_handler: RefCell::new(None),
                remote_track_handler: RefCell::new(None),
                connection_state_handler: RefCell::new(None),
            }),
        })
    }

    pub fn phase(&self) -> PeerPhase {
        self.inner.phase.get()
    }

    /// Registers the local-ICE-candidate callback. Must be called once,
    /// right after [`PeerConnectionController::create`]; survives a later
    /// [`PeerConnectionController::reset`].
    pub fn on_local_ice<F>(&self, handler: F)
    where
        F: Fn(RTCIceCandidate) + Send + Sync + 'static,
    {
        let handler: LocalIceHandler = Arc::new(handler);
        attach_local_ice(&self.inner.pc.borrow(), Arc::clone(&handler));
        *self.inner.local_ice_handler.borrow_mut() = Some(handler);
    }

    /// Registers the remote-track callback, fired the first time media
    /// arrives from the partner (spec §4.3 "Remote track policy"); survives
    /// a later [`PeerConnectionController::reset`].
    pub fn on_remote_track<F>(&self, handler: F)
    where
        F: Fn(Arc<TrackRemote>) + Send + Sync + 'static,
    {
        let handler: RemoteTrackHandler = Arc::new(handler);
        attach_remote_track(&self.inner.pc.borrow(), Arc::clone(&handler));
        *self.inner.remote_track_handler.borrow_mut() = Some(handler);
    }

    /// Registers the connection-state-change callback (spec §4.3
    /// `on_connection_state`); survives a later
    /// [`PeerConnectionController::reset`].
    pub fn on_connection_state<F>(&self, handler: F)
    where
        F: Fn(RTCPeerConnectionState) + Send + Sync + 'static,
    {
        let handler: ConnectionStateHandler = Arc::new(handler);
        attach_connection_state(&self.inner.pc.borrow(), Arc::clone(&handler));
        *self.inner.connection_state_handler.borrow_mut() = Some(handler);
    }

    /// Creates an offer, sets it as the local description. Preconditions
    /// `phase == Fresh`.
    pub async fn make_offer(&self) -> Result<String, PeerError> {
        self.inner.phase.get().check("make_offer")?;

        let pc = Arc::clone(&self.inner.pc.borrow());
        let offer = pc.create_offer(None).await.map_err(|e| PeerError::Platform(e.to_string()))?;
        pc.set_local_description(offer.clone())
            .await
            .map_err(|e| PeerError::Platform(e.to_string()))?;

        self.inner.phase.set(self.inner.phase.get().after("make_offer"));
        debug!("peer phase -> {}", self.inner.phase.get());
        Ok(offer.sdp)
    }

    /// Sets the remote offer, creates and sets the local answer, then
    /// drains any queued ICE candidates. Preconditions `phase ∈ {Fresh,
    /// HaveRemoteOffer}` — a duplicate/late offer arriving outside that set
    /// is not accepted here; the caller resets the connection first and
    /// re-calls this method (spec §4.4 "Edge-case policy").
    pub async fn accept_offer(&self, sdp: String) -> Result<String, PeerError> {
        self.inner.phase.get().check("accept_offer")?;

        let pc = Arc::clone(&self.inner.pc.borrow());
        let offer = RTCSessionDescription::offer(sdp).map_err(|e| PeerError::Platform(e.to_string()))?;
        pc.set_remote_description(offer)
            .await
            .map_err(|e| PeerError::Platform(e.to_string()))?;
        self.inner.has_remote_description.set(true);
        self.drain_ice_queue().await?;

        let answer = pc.create_answer(None).await.map_err(|e| PeerError::Platform(e.to_string()))?;
        pc.set_local_description(answer.clone())
            .await
            .map_err(|e| PeerError::Platform(e.to_string()))?;

        self.inner.phase.set(self.inner.phase.get().after("accept_offer"));
        debug!("peer phase -> {}", self.inner.phase.get());
        Ok(answer.sdp)
    }

    /// Sets the remote answer to our earlier offer, then drains any
    /// queued ICE candidates. Preconditions `phase == HaveLocalOffer`.
    pub async fn accept_answer(&self, sdp: String) -> Result<(), PeerError> {
        self.inner.phase.get().check("accept_answer")?;

        let pc = Arc::clone(&self.inner.pc.borrow());
        let answer =
            RTCSessionDescription::answer(sdp).map_err(|e| PeerError::Platform(e.to_string()))?;
        pc.set_remote_description(answer)
            .await
            .map_err(|e| PeerError::Platform(e.to_string()))?;
        self.inner.has_remote_description.set(true);
        self.drain_ice_queue().await?;

        self.inner.phase.set(self.inner.phase.get().after("accept_answer"));
        debug!("peer phase -> {}", self.inner.phase.get());
        Ok(())
    }

    /// Adds a remote ICE candidate, queueing it if the remote
    /// description hasn't been set yet (spec §4.3).
    pub async fn add_remote_ice(&self, candidate: RTCIceCandidateInit) -> Result<(), PeerError> {
        self.inner.phase.get().check("add_remote_ice")?;

        if !self.inner.has_remote_description.get() {
            self.inner.ice_queue.lock().await.push(candidate);
            return Ok(());
        }
        let pc = Arc::clone(&self.inner.pc.borrow());
        pc.add_ice_candidate(candidate)
            .await
            .map_err(|e| PeerError::IceRejected(e.to_string()))
    }

    async fn drain_ice_queue(&self) -> Result<(), PeerError> {
        let queued: Vec<_> = self.inner.ice_queue.lock().await.drain(..).collect();
        let pc = Arc::clone(&self.inner.pc.borrow());
        try_join_all(queued.into_iter().map(|candidate| {
            let pc = Arc::clone(&pc);
            async move { pc.add_ice_candidate(candidate).await }
        }))
        .await
        .map_err(|e| PeerError::IceRejected(e.to_string()))?;
        Ok(())
    }

    /// Closes the connection, idempotent. Does not stop local tracks —
    /// those are owned by [`crate::media::MediaResourceManager`], never
    /// by the peer connection (spec §3 invariant).
    pub async fn close(&self) {
        if self.inner.phase.get() == PeerPhase::Closed {
            return;
        }
        let pc = Arc::clone(&self.inner.pc.borrow());
        if let Err(e) = pc.close().await {
            warn!("error closing peer connection: {e}");
        }
        self.inner.ice_queue.lock().await.clear();
        self.inner.phase.set(PeerPhase::Closed);
        debug!("peer connection closed");
    }

    /// Tears down and rebuilds the underlying peer connection in place,
    /// reattaching whichever of `on_local_ice`/`on_remote_track`/
    /// `on_connection_state` were previously registered, and resets
    /// `signaling_phase` to `fresh` with an empty ICE queue. The only way
    /// to recover from an offer arriving outside `{fresh, have-remote-offer}`
    /// (spec §4.4 "Edge-case policy", §8 property #4): the caller resets
    /// here, then re-calls [`PeerConnectionController::accept_offer`].
    pub async fn reset(&self) -> Result<(), PeerError> {
        let old_pc = Arc::clone(&self.inner.pc.borrow());
        if let Err(e) = old_pc.close().await {
            warn!("error closing peer connection before reset: {e}");
        }

        let fresh_pc = build_pc(
            &self.inner.ice_servers,
            self.inner.ice_candidate_pool_size,
            &self.inner.local_tracks,
        )
        .await?;

        if let Some(h) = self.inner.local_ice_handler.borrow().as_ref() {
            attach_local_ice(&fresh_pc, Arc::clone(h));
        }
        if let Some(h) = self.inner.remote_track_handler.borrow().as_ref() {
            attach_remote_track(&fresh_pc, Arc::clone(h));
        }
        if let Some(h) = self.inner.connection_state_handler.borrow().as_ref() {
            attach_connection_state(&fresh_pc, Arc::clone(h));
        }

        *self.inner.pc.borrow_mut() = fresh_pc;
        self.inner.ice_queue.lock().await.clear();
        self.inner.has_remote_description.set(false);
        self.inner.phase.set(PeerPhase::Fresh);
        debug!("peer connection reset");
        Ok(())
    }
}
