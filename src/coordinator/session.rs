//! C5 — Session Coordinator.
//!
//! Top-level orchestrator: drives the outer match state machine,
//! chooses video-vs-live handling, enforces cleanup ordering between
//! sessions, manages timeouts and recovery.
//!
//! Grounded on `jason/src/room.rs`'s `RoomHandle(Weak<InnerRoom>)`
//! external-handle pattern and `jason/src/jason.rs`'s top-level `Inner`
//! struct owning shared singletons (`media_manager`, `rpc`) for the life
//! of the application — this is the direct model for
//! `SessionCoordinatorHandle(Weak<Inner>)` owning C1/C2/C3/C6/C7/C8.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Instant;

use async_recursion::async_recursion;
use log::{debug, info, warn};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::track::track_remote::TrackRemote;

use crate::backend::{BackendClient, Partner};
use crate::config::Config;
use crate::coordinator::state::{MatchKind, OuterState, OuterStateCell, SessionDescriptor};
use crate::error::{PeerError, VchatError};
use crate::events::{ChatMessage, ConnectionKind, ConnectionState, EventDispatcher};
use crate::media::{MediaCapture, MediaResourceManager};
use crate::peer::{IceServer, PeerConnectionController};
use crate::poller::{MatchPoller, PollOutcome};
use crate::signal::{IceCandidateData, Signal, SignalBus, SignalTransport};
use crate::utils::time::jitter;

/// Spec §4.3: how long to wait for a first remote track after ICE reaches
/// `connected` before treating the session as failed.
const NO_TRACK_GRACE_PERIOD: std::time::Duration = std::time::Duration::from_secs(3);

/// Raised when a public method is called on a handle whose `Inner` has
/// already been dropped, mirroring `jason`'s `HandlerDetachedError`.
#[derive(Debug, thiserror::Error)]
#[error("session coordinator has already been disposed")]
pub struct DetachedError;

/// `Send`-safe notices forwarded from `webrtc`'s callback threads into the
/// `Rc`/`RefCell`-based coordinator over an mpsc channel; see
/// [`SessionCoordinatorHandle::handle_live`].
enum PeerNotice {
    LocalIce(IceCandidateData),
    RemoteTrack(Arc<TrackRemote>),
    StateChanged(RTCPeerConnectionState),
}

/// Result of one `/swipe` call, per [`SessionCoordinatorHandle::try_swipe`].
enum SwipeOutcome {
    Matched,
    Queued,
    Failed,
}

struct Inner<T: SignalTransport, C: MediaCapture, B: BackendClient> {
    config: Config,
    user_id: String,

    bus: SignalBus<T>,
    media: MediaResourceManager<C>,
    backend: Rc<B>,
    poller: Rc<MatchPoller>,
    events: Rc<EventDispatcher<C::Stream>>,

    outer_state: OuterStateCell,
    session: RefCell<Option<SessionDescriptor>>,
    peer: RefCell<Option<PeerConnectionController>>,
    last_swipe_at: Cell<Option<Instant>>,
    last_health_at: Cell<Option<Instant>>,
    remote_track_seen: Cell<bool>,
}

/// Strong owner of the whole session graph. Holds the coordinator alive
/// for the application's lifetime; the UI is handed a
/// [`SessionCoordinatorHandle`] instead so that dropping the UI-side
/// reference does not keep the graph alive.
pub struct SessionCoordinator<T: SignalTransport, C: MediaCapture, B: BackendClient> {
    inner: Rc<Inner<T, C, B>>,
}

/// Weak, UI-facing handle, mirroring `jason::room::RoomHandle`.
pub struct SessionCoordinatorHandle<T: SignalTransport, C: MediaCapture, B: BackendClient> {
    inner: Weak<Inner<T, C, B>>,
}

impl<T: SignalTransport, C: MediaCapture, B: BackendClient> Clone for SessionCoordinatorHandle<T, C, B> {
    fn clone(&self) -> Self {
        Self { inner: Weak::clone(&self.inner) }
    }
}

/// Upgrades a weak handle or returns [`DetachedError`], mirroring
/// `jason`'s `upgrade_inner!` macro.
macro_rules! upgrade {
    ($weak:expr) => {
        $weak.upgrade().ok_or(DetachedError)?
    };
}

impl<T, C, B> SessionCoordinator<T, C, B>
where
    T: SignalTransport + 'static,
    C: MediaCapture + 'static,
    B: BackendClient + 'static,
{
    pub fn new(config: Config, user_id: String, transport: T, capture: C, backend: B) -> Self {
        let dedup_capacity = config.dedup_capacity;
        Self {
            inner: Rc::new(Inner {
                bus: SignalBus::new(transport, dedup_capacity),
                media: MediaResourceManager::new(capture),
                backend: Rc::new(backend),
                poller: Rc::new(MatchPoller::new()),
                events: Rc::new(EventDispatcher::new()),
                outer_state: OuterStateCell::default(),
                session: RefCell::new(None),
                peer: RefCell::new(None),
                last_swipe_at: Cell::new(None),
                last_health_at: Cell::new(None),
                remote_track_seen: Cell::new(false),
                config,
                user_id,
            }),
        }
    }

    pub fn handle(&self) -> SessionCoordinatorHandle<T, C, B> {
        SessionCoordinatorHandle { inner: Rc::downgrade(&self.inner) }
    }

    pub fn events(&self) -> &EventDispatcher<C::Stream> {
        &self.inner.events
    }
}

impl<T, C, B> SessionCoordinatorHandle<T, C, B>
where
    T: SignalTransport + 'static,
    C: MediaCapture + 'static,
    B: BackendClient + 'static,
{
    /// Authenticates implicitly via the backend client's own token
    /// provider, ensures local media, joins the backend queue, and
    /// starts the match poller (spec §4.5 `join_queue`).
    pub async fn join_queue(&self) -> Result<(), DetachedError> {
        let inner = upgrade!(self.inner);

        match inner.media.ensure_local_stream().await {
            Ok(stream) => inner.events.emit_local_stream(stream),
            Err(e) => {
                inner.events.emit_error(VchatError::from(e));
                return Ok(());
            }
        }

        inner.outer_state.set(OuterState::Queued);
        match inner.backend.join().await {
            Ok(descriptor) if descriptor.is_matched() => {
                self.handle_match(&inner, descriptor).await;
            }
            Ok(_) => {
                self.start_polling(&inner);
            }
            Err(e) => {
                warn!("join failed: {e}");
                inner.events.emit_error(VchatError::from(e));
            }
        }
        Ok(())
    }

    fn start_polling(&self, inner: &Rc<Inner<T, C, B>>) {
        let weak = Weak::clone(&self.inner);
        let poll_interval = inner.config.poll_interval;
        inner.poller.start(Rc::clone(&inner.backend), poll_interval, move |outcome| {
            let Some(inner) = weak.upgrade() else { return };
            if let PollOutcome::Matched(descriptor) = outcome {
                let handle = SessionCoordinatorHandle { inner: Weak::clone(&weak) };
                let inner = Rc::clone(&inner);
                tokio::task::spawn_local(async move {
                    handle.handle_match(&inner, descriptor).await;
                });
            } else if matches!(outcome, PollOutcome::Unauthorized) {
                inner.events.emit_error(VchatError::Auth(crate::error::AuthError::TokenExpired));
            }
        });
    }

    async fn handle_match(&self, inner: &Rc<Inner<T, C, B>>, descriptor: crate::backend::MatchDescriptor) {
        inner.poller.stop();
        let Some(session) = SessionDescriptor::from_match_descriptor(&descriptor, &inner.user_id) else {
            warn!("received inconsistent match descriptor, ignoring");
            return;
        };
        inner.outer_state.set(OuterState::Matched);
        *inner.session.borrow_mut() = Some(session.clone());

        match session.match_kind {
            MatchKind::Video => self.handle_video(inner, &session).await,
            MatchKind::LiveReal | MatchKind::LiveStaff => self.handle_live(inner, &session).await,
        }
    }

    /// Spec §4.5 "Video handling": no peer connection, UI consumes the
    /// URL directly.
    async fn handle_video(&self, inner: &Rc<Inner<T, C, B>>, session: &SessionDescriptor) {
        inner.outer_state.set(OuterState::Playing);
        inner.events.emit_video_match(
            session.video_id.clone().unwrap_or_default(),
            session.video_url.clone().unwrap_or_default(),
            session.video_name.clone().unwrap_or_default(),
        );
        inner
            .events
            .emit_connection_state(ConnectionState::Connected, ConnectionKind::Video);
    }

    /// Spec §4.5 "Live handling": join the signaling channel, create the
    /// peer connection, and (if initiator) schedule the offer per §4.4.
    async fn handle_live(&self, inner: &Rc<Inner<T, C, B>>, session: &SessionDescriptor) {
        inner.outer_state.set(OuterState::Connecting);
        let kind = if session.match_kind == MatchKind::LiveStaff {
            ConnectionKind::Staff
        } else {
            ConnectionKind::RealUser
        };
        inner.events.emit_connection_state(ConnectionState::Connecting, kind);

        let local_stream = match inner.media.ensure_local_stream().await {
            Ok(s) => s,
            Err(e) => {
                inner.events.emit_error(VchatError::from(e));
                return;
            }
        };
        inner.events.emit_local_stream(local_stream);
        // TODO: bridge the local stream's tracks (`C::Stream`) into
        // `Arc<dyn TrackLocal + Send + Sync>` and add them to the peer
        // connection below, once a concrete native `MediaCapture` backend
        // exists to produce them.

        let peer = match PeerConnectionController::create(
            &inner.config.ice_servers,
            inner.config.ice_candidate_pool_size,
            Vec::new(),
        )
        .await
        {
            Ok(p) => p,
            Err(e) => {
                inner.events.emit_error(VchatError::from(e));
                return;
            }
        };

        let partner = session.partner_id.clone().unwrap_or_default();

        // `webrtc`'s callback registrations require `Send + Sync` closures
        // (they may fire from its own internal runtime threads), but the
        // coordinator's state is `Rc`/`RefCell`-based per spec §5's
        // single-threaded-cooperative scheduling model. Bridge the two with
        // a plain `Send`-safe channel: the webrtc-facing closures below only
        // ever touch the sender, and a `spawn_local` task owns the `Weak`
        // handle and drains the receiver.
        let (notice_tx, mut notice_rx) = tokio::sync::mpsc::unbounded_channel::<PeerNotice>();

        let tx = notice_tx.clone();
        peer.on_local_ice(move |candidate| match candidate.to_json() {
            Ok(init) => {
                let _ = tx.send(PeerNotice::LocalIce(IceCandidateData {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_mline_index: init.sdp_mline_index,
                }));
            }
            Err(e) => warn!("failed to serialize local ice candidate: {e}"),
        });

        let tx = notice_tx.clone();
        peer.on_connection_state(move |state| {
            let _ = tx.send(PeerNotice::StateChanged(state));
        });

        let tx = notice_tx.clone();
        peer.on_remote_track(move |track| {
            let _ = tx.send(PeerNotice::RemoteTrack(track));
        });
        drop(notice_tx);

        *inner.peer.borrow_mut() = Some(peer);

        let weak_for_notices = Weak::clone(&self.inner);
        let partner_for_notices = partner.clone();
        tokio::task::spawn_local(async move {
            while let Some(notice) = notice_rx.recv().await {
                let Some(inner) = weak_for_notices.upgrade() else { break };
                match notice {
                    PeerNotice::LocalIce(data) => {
                        if let Err(e) = inner.bus.send_ice(&partner_for_notices, data).await {
                            warn!("failed to send ice candidate: {e}");
                        }
                    }
                    PeerNotice::RemoteTrack(track) => {
                        // Spec §4.3 "Remote track policy": only the first
                        // track drives the connected transition; later
                        // tracks (e.g. a renegotiated video track) are
                        // left to the app via `remote_stream` itself.
                        if !inner.remote_track_seen.replace(true) {
                            debug!("first remote track received");
                            inner.events.emit_remote_stream(track);
                            inner.last_health_at.set(Some(Instant::now()));
                            inner.outer_state.set(OuterState::Connected);
                            inner.events.emit_connection_state(ConnectionState::Connected, kind);
                        }
                    }
                    PeerNotice::StateChanged(
                        state @ (RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected),
                    ) => {
                        debug!("peer connection state -> {state:?}");
                        inner.events.emit_connection_state(ConnectionState::Failed, kind);
                        let handle =
                            SessionCoordinatorHandle { inner: Weak::clone(&weak_for_notices) };
                        let _ = handle.handle_connection_failure().await;
                    }
                    PeerNotice::StateChanged(RTCPeerConnectionState::Connected) => {
                        // Spec §4.3: ICE reaching `connected` with no track
                        // yet isn't itself a success — give it a short
                        // grace period, then treat a continued absence of
                        // any track as a connection failure.
                        if !inner.remote_track_seen.get() {
                            let weak = Weak::clone(&weak_for_notices);
                            let room_id = inner.session.borrow().as_ref().map(|s| s.room_id.clone());
                            tokio::task::spawn_local(async move {
                                tokio::time::sleep(NO_TRACK_GRACE_PERIOD).await;
                                let Some(inner) = weak.upgrade() else { return };
                                let same_room = room_id.is_some_and(|room_id| {
                                    inner.session.borrow().as_ref().is_some_and(|s| s.room_id == room_id)
                                });
                                if same_room && !inner.remote_track_seen.get() {
                                    warn!("ICE connected but no remote track arrived within the grace period");
                                    let handle = SessionCoordinatorHandle { inner: weak };
                                    let _ = handle.handle_connection_failure().await;
                                }
                            });
                        }
                    }
                    PeerNotice::StateChanged(_) => {}
                }
            }
        });

        let weak_for_signal = Weak::clone(&self.inner);
        let partner_for_signal = partner.clone();
        if let Err(e) = inner
            .bus
            .join(&session.room_id, &session.session_version, &inner.user_id, move |signal, from| {
                Self::dispatch_incoming_signal(
                    Weak::clone(&weak_for_signal),
                    partner_for_signal.clone(),
                    signal,
                    from,
                );
            })
            .await
        {
            inner.events.emit_error(VchatError::from(e));
            return;
        }

        if let Err(e) = inner.bus.send_ready(&partner).await {
            warn!("failed to send ready: {e}");
        }

        if session.is_initiator {
            let weak = Weak::clone(&self.inner);
            let delay = inner.config.offer_delay;
            let partner = partner.clone();
            tokio::task::spawn_local(async move {
                tokio::time::sleep(delay).await;
                let Some(inner) = weak.upgrade() else { return };
                let Some(peer) = inner.peer.borrow().as_ref().cloned() else { return };
                let sdp = peer.make_offer().await;
                match sdp {
                    Ok(sdp) => {
                        if let Err(e) = inner.bus.send_offer(&partner, sdp).await {
                            warn!("failed to send offer: {e}");
                        }
                    }
                    Err(e) => inner.events.emit_error(VchatError::from(e)),
                }
            });
        }

        self.start_connection_timeout(&inner, &session.room_id);
        self.start_heartbeat(&inner, &session.room_id, partner);
    }

    /// Spec §4.4/§5 connection timeout: if no remote media/connected state
    /// arrives within `config.connection_timeout`, treat it as a failure.
    /// Cancelled implicitly — the check below no-ops once the session has
    /// moved past `Connecting` (connected, swiped away, or torn down).
    fn start_connection_timeout(&self, inner: &Rc<Inner<T, C, B>>, room_id: &str) {
        let weak = Weak::clone(&self.inner);
        let timeout = inner.config.connection_timeout;
        let room_id = room_id.to_owned();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(timeout).await;
            let Some(inner) = weak.upgrade() else { return };
            let still_connecting = inner.session.borrow().as_ref().is_some_and(|s| s.room_id == room_id)
                && inner.outer_state.get() == OuterState::Connecting;
            if !still_connecting {
                return;
            }
            warn!("connection timed out waiting for remote media in room {room_id}");
            inner
                .events
                .emit_error(VchatError::from(crate::error::TimeoutError::ConnectionTimeout));
            let handle = SessionCoordinatorHandle { inner: weak };
            handle.fall_back_to_video(&inner).await;
        });
    }

    /// Spec §4.5/§5 "video fallback": on connection timeout or an
    /// unresponsive partner, tear the live session down and request a
    /// video match instead of rejoining the matchmaking queue outright.
    /// If the fallback `/swipe` call itself fails, one more `/swipe` is
    /// attempted before settling back to polling.
    async fn fall_back_to_video(&self, inner: &Rc<Inner<T, C, B>>) {
        self.perform_swipe_cleanup(inner).await;
        inner.outer_state.set(OuterState::Swiping);

        match self.try_swipe(inner).await {
            SwipeOutcome::Matched => {}
            SwipeOutcome::Queued => {
                inner.outer_state.set(OuterState::Queued);
                self.start_polling(inner);
            }
            SwipeOutcome::Failed => {
                warn!("video fallback swipe failed, retrying once");
                if !matches!(self.try_swipe(inner).await, SwipeOutcome::Matched) {
                    inner.outer_state.set(OuterState::Queued);
                    self.start_polling(inner);
                }
            }
        }
    }

    /// One `/swipe` attempt; a match is handled in place before returning.
    async fn try_swipe(&self, inner: &Rc<Inner<T, C, B>>) -> SwipeOutcome {
        match inner.backend.swipe().await {
            Ok(descriptor) if descriptor.is_matched() => {
                self.handle_match(inner, descriptor).await;
                SwipeOutcome::Matched
            }
            Ok(_) => SwipeOutcome::Queued,
            Err(e) => {
                warn!("swipe failed: {e}");
                inner.events.emit_error(VchatError::from(e));
                SwipeOutcome::Failed
            }
        }
    }

    /// Spec §4.4 heartbeat: sends periodic `health` signals to the partner
    /// and watches for their replies, raising
    /// [`crate::error::TimeoutError::HeartbeatTimeout`] and tearing the
    /// session down if none arrive for two full intervals. Both loops exit
    /// once this room is no longer the active session.
    fn start_heartbeat(&self, inner: &Rc<Inner<T, C, B>>, room_id: &str, partner: String) {
        inner.last_health_at.set(Some(Instant::now()));

        let weak_sender = Weak::clone(&self.inner);
        let interval = inner.config.heartbeat_interval;
        let room_id_sender = room_id.to_owned();
        tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(inner) = weak_sender.upgrade() else { break };
                if !inner.session.borrow().as_ref().is_some_and(|s| s.room_id == room_id_sender) {
                    break;
                }
                if let Err(e) = inner.bus.send_health(&partner).await {
                    warn!("failed to send heartbeat: {e}");
                }
            }
        });

        let weak_watchdog = Weak::clone(&self.inner);
        let room_id_watchdog = room_id.to_owned();
        tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(inner) = weak_watchdog.upgrade() else { break };
                if !inner.session.borrow().as_ref().is_some_and(|s| s.room_id == room_id_watchdog) {
                    break;
                }
                let stale = match inner.last_health_at.get() {
                    Some(t) => t.elapsed() > interval * 2,
                    None => true,
                };
                if stale {
                    warn!("heartbeat timed out in room {room_id_watchdog}");
                    inner
                        .events
                        .emit_error(VchatError::from(crate::error::TimeoutError::HeartbeatTimeout));
                    let handle = SessionCoordinatorHandle { inner: Weak::clone(&weak_watchdog) };
                    let _ = handle.handle_connection_failure().await;
                    break;
                }
            }
        });
    }

    /// Dispatches one already-filtered incoming [`Signal`] (spec §4.1's
    /// receive filter has already run by the time this fires) against the
    /// peer connection, the event dispatcher, or the backend, per spec
    /// §4.4's ready/offer/answer/ice/bye protocol.
    fn dispatch_incoming_signal(weak: Weak<Inner<T, C, B>>, partner: String, signal: Signal, from: String) {
        tokio::task::spawn_local(async move {
            let Some(inner) = weak.upgrade() else { return };
            match signal {
                Signal::Ready => {
                    debug!("ready received from {from}");
                }
                Signal::Offer { sdp } => {
                    let Some(peer) = inner.peer.borrow().as_ref().cloned() else { return };
                    // Spec §4.4 "Edge-case policy" / §8 property #4: an
                    // offer arriving while the peer is not in {fresh,
                    // have-remote-offer} is only recoverable by resetting
                    // the connection and re-running accept_offer against
                    // the same sdp.
                    let result = match peer.accept_offer(sdp.clone()).await {
                        Err(PeerError::InvalidPeerState { .. }) => {
                            warn!("offer arrived outside a legal phase, resetting peer connection");
                            match peer.reset().await {
                                Ok(()) => peer.accept_offer(sdp).await,
                                Err(e) => Err(e),
                            }
                        }
                        other => other,
                    };
                    match result {
                        Ok(answer_sdp) => {
                            if let Err(e) = inner.bus.send_answer(&partner, answer_sdp).await {
                                warn!("failed to send answer: {e}");
                            }
                        }
                        Err(e) => inner.events.emit_error(VchatError::from(e)),
                    }
                }
                Signal::Answer { sdp } => {
                    let Some(peer) = inner.peer.borrow().as_ref().cloned() else { return };
                    if let Err(e) = peer.accept_answer(sdp).await {
                        inner.events.emit_error(VchatError::from(e));
                    }
                }
                Signal::Ice { candidate } => {
                    let init = RTCIceCandidateInit {
                        candidate: candidate.candidate,
                        sdp_mid: candidate.sdp_mid,
                        sdp_mline_index: candidate.sdp_mline_index,
                        ..Default::default()
                    };
                    let Some(peer) = inner.peer.borrow().as_ref().cloned() else { return };
                    if let Err(e) = peer.add_remote_ice(init).await {
                        warn!("failed to add remote ice candidate from {from}: {e}");
                    }
                }
                Signal::Bye => {
                    info!("partner {from} left the session");
                    let handle = SessionCoordinatorHandle { inner: Weak::clone(&weak) };
                    let _ = handle.handle_connection_failure().await;
                }
                Signal::Health => {
                    inner.last_health_at.set(Some(Instant::now()));
                    let room_id = inner.session.borrow().as_ref().map(|s| s.room_id.clone());
                    if let Some(room_id) = room_id {
                        let _ = inner.backend.clear_waiting_room(&room_id, &inner.user_id).await;
                    }
                }
                Signal::Chat { text, id } => {
                    inner.events.message_received.call_deferred(ChatMessage {
                        from: Partner { id: from },
                        text,
                        id,
                    });
                }
            }
        });
    }

    /// Spec §4.5 `swipe_next`: debounced for live sessions, immediate for
    /// video; strict teardown-before-bye ordering.
    pub async fn swipe_next(&self) -> Result<(), DetachedError> {
        let inner = upgrade!(self.inner);

        let was_live = inner
            .session
            .borrow()
            .as_ref()
            .is_some_and(|s| s.match_kind != MatchKind::Video);

        if was_live {
            if let Some(last) = inner.last_swipe_at.get() {
                if last.elapsed() < inner.config.swipe_debounce {
                    debug!("swipe rejected: debounce window active");
                    return Ok(());
                }
            }
            inner.last_swipe_at.set(Some(Instant::now()));
        }

        let partner = inner.session.borrow().as_ref().and_then(|s| s.partner_id.clone());

        inner.events.emit_partner_left();
        self.perform_swipe_cleanup(&inner).await;

        if was_live {
            if let Some(partner) = partner {
                let _ = inner.bus.send_bye(&partner).await;
            }
        }

        inner.outer_state.set(OuterState::Swiping);
        match inner.backend.swipe().await {
            Ok(descriptor) if descriptor.is_matched() => {
                self.handle_match(&inner, descriptor).await;
            }
            Ok(_) => {
                inner.outer_state.set(OuterState::Queued);
                self.start_polling(&inner);
            }
            Err(e) => {
                warn!("swipe failed: {e}");
                inner.events.emit_error(VchatError::from(e));
                inner.outer_state.set(OuterState::Queued);
                self.start_polling(&inner);
            }
        }
        Ok(())
    }

    /// Cleanup ordering is the critical invariant of spec §4.5: remote
    /// stream reference cleared first (already true since we never cache
    /// it outside the event callback), then peer closed, then channel
    /// left, then timers cancelled, then per-session identifiers reset.
    /// Event callbacks themselves are never cleared here — only on total
    /// shutdown.
    async fn perform_swipe_cleanup(&self, inner: &Rc<Inner<T, C, B>>) {
        let peer = inner.peer.borrow_mut().take();
        if let Some(peer) = peer {
            peer.close().await;
        }
        inner.bus.leave().await;
        inner.poller.stop();
        *inner.session.borrow_mut() = None;
        inner.remote_track_seen.set(false);
        debug!("swipe cleanup complete");
    }

    /// Spec §4.5 `leave_chat`: best-effort `/leave`, full cleanup
    /// including local media release.
    pub async fn leave_chat(&self) -> Result<(), DetachedError> {
        let inner = upgrade!(self.inner);
        self.perform_swipe_cleanup(&inner).await;
        let _ = inner.backend.leave().await;
        inner.media.release().await;
        inner.outer_state.set(OuterState::Idle);
        Ok(())
    }

    /// Spec §4.5 "Failure routing": reset peer state, notify the UI, and
    /// rejoin the queue after a small jittered delay.
    pub async fn handle_connection_failure(&self) -> Result<(), DetachedError> {
        let inner = upgrade!(self.inner);
        self.perform_swipe_cleanup(&inner).await;
        inner.events.emit_partner_left();

        let weak = Weak::clone(&self.inner);
        tokio::task::spawn_local(async move {
            let Some(_inner) = weak.upgrade() else { return };
            let handle = SessionCoordinatorHandle { inner: weak };
            handle.rejoin_with_retry(0).await;
        });
        Ok(())
    }

    /// Bounded, jittered retry of the rejoin attempted by
    /// [`SessionCoordinatorHandle::handle_connection_failure`]. A plain
    /// enum/match loop works just as well; this recurses instead,
    /// mirroring `jason`'s own `#[async_recursion(?Send)]` rollback-retry
    /// shape (`Room::set_local_media_settings`) rather than hand-rolling
    /// a `loop`.
    #[async_recursion(?Send)]
    async fn rejoin_with_retry(&self, attempt: u32) {
        const MAX_ATTEMPTS: u32 = 3;

        let Some(inner) = self.inner.upgrade() else { return };
        let (lo, hi) = inner.config.rejoin_jitter;
        tokio::time::sleep(jitter(lo, hi)).await;

        if let Err(e) = inner.media.ensure_local_stream().await {
            inner.events.emit_error(VchatError::from(e));
            return;
        }

        inner.outer_state.set(OuterState::Queued);
        match inner.backend.join().await {
            Ok(descriptor) if descriptor.is_matched() => {
                self.handle_match(&inner, descriptor).await;
            }
            Ok(_) => {
                self.start_polling(&inner);
            }
            Err(e) if attempt + 1 < MAX_ATTEMPTS => {
                warn!("rejoin attempt {attempt} failed: {e}, retrying");
                self.rejoin_with_retry(attempt + 1).await;
            }
            Err(e) => {
                warn!("rejoin failed after {MAX_ATTEMPTS} attempts: {e}");
                inner.events.emit_error(VchatError::from(e));
            }
        }
    }

    /// Total shutdown: releases every resource including the process-wide
    /// local media handle and clears every event subscriber.
    pub async fn dispose(&self) -> Result<(), DetachedError> {
        let inner = upgrade!(self.inner);
        self.perform_swipe_cleanup(&inner).await;
        inner.bus.reset().await;
        inner.media.release().await;
        inner.events.remote_stream.clear();
        inner.events.local_stream.clear();
        inner.events.connection_state.clear();
        inner.events.partner_left.clear();
        inner.events.message_received.clear();
        inner.events.video_match.clear();
        inner.events.error.clear();
        inner.outer_state.set(OuterState::Idle);
        info!("session coordinator disposed");
        Ok(())
    }
}
