//! Error taxonomy for the whole crate.
//!
//! Every fallible public operation returns `VchatError` (or a `Result`
//! wrapping one of the leaf kinds below, convertible via `From`). No
//! stringly-typed errors: callers branch on the enum, not on a message.

use thiserror::Error;

/// Media-acquisition failures (C2).
#[derive(Clone, Debug, Error)]
pub enum MediaError {
    #[error("camera/microphone permission denied")]
    PermissionDenied,
    #[error("camera/microphone permission blocked by browser policy")]
    PermissionBlocked,
    #[error("media capture not supported on this platform")]
    NotSupported,
    #[error("no active local media handle")]
    NoActiveStream,
    #[error("platform media error: {0}")]
    Platform(String),
}

/// Pub/sub transport failures (C1).
#[derive(Clone, Debug, Error)]
pub enum SignalError {
    #[error("not joined to any signaling channel")]
    NotJoined,
    #[error("failed to join channel {channel}: {reason}")]
    JoinFailed { channel: String, reason: String },
    #[error("failed to publish signal: {0}")]
    PublishFailed(String),
    #[error("malformed signal payload: {0}")]
    Malformed(String),
}

/// Peer-connection / signaling-state failures (C3/C4).
#[derive(Clone, Debug, Error)]
pub enum PeerError {
    #[error("illegal signaling operation in phase {phase}: {op}")]
    InvalidPeerState { phase: String, op: &'static str },
    #[error("ICE candidate rejected: {0}")]
    IceRejected(String),
    #[error("underlying peer connection error: {0}")]
    Platform(String),
    #[error("peer connection already closed")]
    AlreadyClosed,
}

/// Backend HTTP failures (C7).
#[derive(Clone, Debug, Error)]
pub enum BackendError {
    #[error("network error calling {endpoint}: {reason}")]
    Network { endpoint: &'static str, reason: String },
    #[error("backend returned unexpected status for {endpoint}: {status}")]
    UnexpectedStatus { endpoint: &'static str, status: u16 },
    #[error("failed to decode backend response: {0}")]
    Decode(String),
}

/// Authentication / authorization failures.
#[derive(Clone, Debug, Error)]
pub enum AuthError {
    #[error("bearer token missing or expired")]
    TokenExpired,
    #[error("not authorized")]
    Unauthorized,
}

/// A connection or liveness deadline fired without progress.
#[derive(Clone, Debug, Error)]
pub enum TimeoutError {
    #[error("no remote media within connection deadline")]
    ConnectionTimeout,
    #[error("partner unresponsive past heartbeat deadline")]
    HeartbeatTimeout,
}

/// Top-level error surfaced to the embedding application via `on_error`.
#[derive(Clone, Debug, Error)]
pub enum VchatError {
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Signal(#[from] SignalError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
    /// Anything unexpected that escaped a transition; always triggers a
    /// reset of the subtree that raised it.
    #[error("internal error: {0}")]
    FatalInternal(String),
}

impl VchatError {
    pub fn fatal(msg: impl Into<String>) -> Self {
        VchatError::FatalInternal(msg.into())
    }

    /// Whether this error must trigger a peer-connection / session reset
    /// rather than a retry, per spec §7.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VchatError::Peer(_) | VchatError::FatalInternal(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = VchatError> = std::result::Result<T, E>;

/// Logs a leaf error at the point it is raised before it is converted and
/// bubbled up, mirroring the teacher's traced-error idiom.
pub fn trace<E: std::fmt::Display>(context: &'static str, err: E) -> E {
    log::error!("{context}: {err}");
    err
}
