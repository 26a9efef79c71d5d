//! The capture seam: abstracts the actual audio/video acquisition so
//! [`crate::media::manager::MediaResourceManager`]'s refresh/permission/
//! lifecycle logic is testable without a real camera or microphone.

use async_trait::async_trait;

use crate::error::MediaError;

/// Current permission state for camera + microphone, as reported by
/// [`MediaCapture::check_permission`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    Blocked,
    NotSupported,
}

/// An opaque handle to an acquired local audio+video stream. Cloning is
/// cheap (reference to the same underlying capture); dropping all clones
/// does not stop the tracks — only [`MediaCapture::stop`] does.
pub trait LocalStream: Clone + 'static {
    /// Whether every track in the stream is still live (spec §4.2:
    /// `ensure_local_stream` re-acquires when this is false).
    fn all_tracks_live(&self) -> bool;
}

/// Acquires and releases local media. Grounded on spec §4.2 directly;
/// the teacher's own `jason/src/media/manager.rs` predates async/await
/// and binds to `web_sys::MediaStream`, so only its singleton-ownership
/// idea (not its code) carries over.
#[async_trait(?Send)]
#[cfg_attr(feature = "mockable", mockall::automock(type Stream = MockLocalStream;))]
pub trait MediaCapture {
    type Stream: LocalStream;

    /// Acquires a fresh audio+video stream with default constraints.
    async fn acquire(&self) -> Result<Self::Stream, MediaError>;

    /// Probes permission state, optionally by acquiring-then-releasing a
    /// throwaway stream when the platform exposes no direct permission
    /// query API.
    async fn check_permission(&self) -> Result<PermissionState, MediaError>;

    /// Stops every track in `stream`.
    async fn stop(&self, stream: &Self::Stream);
}

#[cfg(feature = "mockable")]
#[derive(Clone)]
pub struct MockLocalStream {
    pub live: bool,
}

#[cfg(feature = "mockable")]
impl LocalStream for MockLocalStream {
    fn all_tracks_live(&self) -> bool {
        self.live
    }
}
