//! C6 — Match Poller.
//!
//! A single repeating timer calling `GET /status` after queueing;
//! stops itself on match or on a 401. Grounded on the spawned-watcher
//! shape of `jason/src/rpc/rpc_session.rs`'s `spawn_connection_loss_watcher`
//! (a loop with an early-exit condition, driven by `Weak` upgrade),
//! adapted to a fixed-cadence poll instead of a reconnect probe.

use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{debug, warn};

use crate::backend::{BackendClient, MatchDescriptor};
use crate::error::BackendError;

/// Outcome of one poll tick, handed to the caller's callback.
pub enum PollOutcome {
    Matched(MatchDescriptor),
    StillWaiting,
    Unauthorized,
}

/// Owns the single repeating status-poll timer. Spec §3 invariant: at
/// most one poller is ever active; [`MatchPoller::start`] cancels any
/// previously running loop before starting a new one.
pub struct MatchPoller {
    handle: std::cell::RefCell<Option<tokio::task::JoinHandle<()>>>,
}

impl Default for MatchPoller {
    fn default() -> Self {
        Self { handle: std::cell::RefCell::new(None) }
    }
}

impl MatchPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts polling `backend.status()` every `interval` until it
    /// reports a match, an unauthorized response, or [`MatchPoller::stop`]
    /// is called. `on_outcome` runs on the same local task set as the
    /// poller; it should not block.
    pub fn start<B, F>(self: &Rc<Self>, backend: Rc<B>, interval: Duration, on_outcome: F)
    where
        B: BackendClient + 'static,
        F: Fn(PollOutcome) + 'static,
    {
        self.stop();

        let weak_self: Weak<MatchPoller> = Rc::downgrade(self);
        let task = tokio::task::spawn_local(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(this) = weak_self.upgrade() else { break };
                drop(this);

                match backend.status().await {
                    Ok(descriptor) if descriptor.is_matched() => {
                        debug!("match poller: matched, stopping");
                        on_outcome(PollOutcome::Matched(descriptor));
                        break;
                    }
                    Ok(_) => {
                        on_outcome(PollOutcome::StillWaiting);
                    }
                    Err(BackendError::UnexpectedStatus { status: 401, .. }) => {
                        warn!("match poller: unauthorized, stopping permanently");
                        on_outcome(PollOutcome::Unauthorized);
                        break;
                    }
                    Err(e) => {
                        warn!("match poller: status check failed: {e}");
                    }
                }
            }
        });
        *self.handle.borrow_mut() = Some(task);
    }

    /// Cancels the currently running poll loop, if any.
    pub fn stop(&self) {
        if let Some(task) = self.handle.borrow_mut().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.borrow().as_ref().is_some_and(|t| !t.is_finished())
    }
}
