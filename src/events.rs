//! C8 — Event Dispatcher.
//!
//! Single-subscriber slots for every UI-facing event (spec §6.4),
//! delivered deferred-one-tick via [`crate::utils::Callback`] so a
//! synchronous UI reaction cannot reenter the state machines that raised
//! the event. Grounded on `jason/src/connection.rs`'s
//! `platform::Callback<api::ConnectionHandle>` field usage, generalized
//! to every event kind this spec names.

use std::rc::Rc;
use std::sync::Arc;

use webrtc::track::track_remote::TrackRemote;

use crate::backend::Partner;
use crate::utils::Callback;

/// Match/session kind, mirrored from [`crate::backend::MatchType`] but
/// scoped to what the UI needs to know about an active connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionKind {
    Video,
    RealUser,
    Staff,
}

/// Coarse connection lifecycle state surfaced to the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Failed,
    Disconnected,
    Closed,
}

/// A received chat message, forwarded regardless of signaling phase
/// (spec §4.4).
#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub from: Partner,
    pub text: String,
    pub id: String,
}

/// Registry of the seven UI-facing event slots (spec §6.4). Owned by
/// [`crate::coordinator::SessionCoordinator`] for the lifetime of the
/// application; unlike per-session state, these survive swipes and are
/// cleared only on total shutdown.
pub struct EventDispatcher<S> {
    /// First remote track of the live session (spec §4.3 "Remote track
    /// policy"); the raw `webrtc` handle rather than `S`, since it never
    /// passes through [`crate::media::MediaCapture`].
    pub remote_stream: Rc<Callback<Arc<TrackRemote>>>,
    pub local_stream: Rc<Callback<S>>,
    pub connection_state: Rc<Callback<(ConnectionState, ConnectionKind)>>,
    pub partner_left: Rc<Callback<()>>,
    pub message_received: Rc<Callback<ChatMessage>>,
    pub video_match: Rc<Callback<(String, String, String)>>,
    pub error: Rc<Callback<crate::error::VchatError>>,
}

impl<S: 'static> Default for EventDispatcher<S> {
    fn default() -> Self {
        Self {
            remote_stream: Rc::new(Callback::new()),
            local_stream: Rc::new(Callback::new()),
            connection_state: Rc::new(Callback::new()),
            partner_left: Rc::new(Callback::new()),
            message_received: Rc::new(Callback::new()),
            video_match: Rc::new(Callback::new()),
            error: Rc::new(Callback::new()),
        }
    }
}

impl<S: 'static> EventDispatcher<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_connection_state(&self, state: ConnectionState, kind: ConnectionKind) {
        self.connection_state.call_deferred((state, kind));
    }

    pub fn emit_partner_left(&self) {
        self.partner_left.call_deferred(());
    }

    pub fn emit_video_match(&self, video_id: String, video_url: String, video_name: String) {
        self.video_match.call_deferred((video_id, video_url, video_name));
    }

    pub fn emit_error(&self, err: crate::error::VchatError) {
        self.error.call_deferred(err);
    }

    pub fn emit_local_stream(&self, stream: S) {
        self.local_stream.call_deferred(stream);
    }

    pub fn emit_remote_stream(&self, track: Arc<TrackRemote>) {
        self.remote_stream.call_deferred(track);
    }
}
