//! C2 — Media Resource Manager.
//!
//! Owns the single process-wide Local Media Handle (spec §3). Swipe/
//! session cleanup never touches it; only [`MediaResourceManager::release`]
//! does, called exactly once on total shutdown.
//!
//! Grounded on `jason/src/jason.rs`'s `Inner { media_manager: Rc<MediaManager>, .. }`
//! field: a single long-lived object shared by every session rather than
//! recreated per session.

use std::cell::RefCell;

use log::{debug, info};

use crate::error::MediaError;
use crate::media::capture::{LocalStream, MediaCapture, PermissionState};

pub struct MediaResourceManager<C: MediaCapture> {
    capture: C,
    stream: RefCell<Option<C::Stream>>,
}

impl<C: MediaCapture> MediaResourceManager<C> {
    pub fn new(capture: C) -> Self {
        Self { capture, stream: RefCell::new(None) }
    }

    /// Ensures a live local stream exists, acquiring one if absent or if
    /// every current track has died.
    ///
    /// Returns a clone of the (possibly freshly acquired) stream; callers
    /// use this to add tracks to a new peer connection.
    pub async fn ensure_local_stream(&self) -> Result<C::Stream, MediaError> {
        let needs_new = match self.stream.borrow().as_ref() {
            Some(s) => !s.all_tracks_live(),
            None => true,
        };
        if needs_new {
            let fresh = self.capture.acquire().await?;
            *self.stream.borrow_mut() = Some(fresh.clone());
            info!("acquired local media stream");
            Ok(fresh)
        } else {
            Ok(self.stream.borrow().as_ref().cloned().expect("checked above"))
        }
    }

    pub async fn check_permission(&self) -> Result<PermissionState, MediaError> {
        self.capture.check_permission().await
    }

    /// Stops and re-acquires the local stream unconditionally.
    pub async fn force_refresh(&self) -> Result<C::Stream, MediaError> {
        if let Some(old) = self.stream.borrow_mut().take() {
            self.capture.stop(&old).await;
        }
        let fresh = self.capture.acquire().await?;
        *self.stream.borrow_mut() = Some(fresh.clone());
        debug!("force-refreshed local media stream");
        Ok(fresh)
    }

    /// Returns the current stream without acquiring, if any.
    pub fn current(&self) -> Option<C::Stream> {
        self.stream.borrow().as_ref().cloned()
    }

    /// Stops and drops the local stream. Only called on total shutdown
    /// (spec §4.2 invariant: never on per-session cleanup).
    pub async fn release(&self) {
        if let Some(stream) = self.stream.borrow_mut().take() {
            self.capture.stop(&stream).await;
            info!("released local media stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::capture::MockLocalStream;
    use async_trait::async_trait;
    use std::cell::Cell;

    struct FakeCapture {
        acquisitions: Cell<u32>,
        fail: bool,
    }

    #[async_trait(?Send)]
    impl MediaCapture for FakeCapture {
        type Stream = MockLocalStream;

        async fn acquire(&self) -> Result<Self::Stream, MediaError> {
            if self.fail {
                return Err(MediaError::PermissionDenied);
            }
            self.acquisitions.set(self.acquisitions.get() + 1);
            Ok(MockLocalStream { live: true })
        }

        async fn check_permission(&self) -> Result<PermissionState, MediaError> {
            Ok(PermissionState::Granted)
        }

        async fn stop(&self, _stream: &Self::Stream) {}
    }

    #[tokio::test]
    async fn ensure_local_stream_acquires_once_then_reuses() {
        let mgr = MediaResourceManager::new(FakeCapture { acquisitions: Cell::new(0), fail: false });
        mgr.ensure_local_stream().await.unwrap();
        mgr.ensure_local_stream().await.unwrap();
        assert_eq!(mgr.capture.acquisitions.get(), 1);
    }

    #[tokio::test]
    async fn ensure_local_stream_reacquires_when_dead() {
        let mgr = MediaResourceManager::new(FakeCapture { acquisitions: Cell::new(0), fail: false });
        mgr.ensure_local_stream().await.unwrap();
        mgr.stream.borrow_mut().as_mut().unwrap().live = false;
        mgr.ensure_local_stream().await.unwrap();
        assert_eq!(mgr.capture.acquisitions.get(), 2);
    }

    #[tokio::test]
    async fn permission_denied_surfaces_error() {
        let mgr = MediaResourceManager::new(FakeCapture { acquisitions: Cell::new(0), fail: true });
        assert!(matches!(mgr.ensure_local_stream().await, Err(MediaError::PermissionDenied)));
    }
}
