//! C1 — Signal Bus Adapter.
//!
//! Joins/leaves a per-room channel, publishes typed signals, and filters
//! the receive path per spec §4.1: self-echo, malformed, stale session
//! version, then duplicate correlation id, in that order.
//!
//! Grounded on `jason/src/rpc/rpc_session.rs`'s `RpcSession` lifecycle
//! (join/leave/reset over a `SessionState`) and its spawned-watcher
//! pattern; the dedup/self-echo filtering is specific to this spec.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::error::SignalError;
use crate::signal::dedup::DedupSet;
use crate::signal::message::{IceCandidateData, Signal, SignalEnvelope};
use crate::signal::transport::SignalTransport;
use crate::utils::ids::CorrelationId;
use crate::utils::time::now_ms;

/// What the bus currently believes about its own membership; used to
/// make `join`/`leave`/`reset` idempotent.
struct Joined {
    channel: String,
    session_version: String,
    user_id: String,
}

struct Inner<T: SignalTransport> {
    transport: T,
    joined: RefCell<Option<Joined>>,
    dedup: RefCell<DedupSet>,
    on_message: RefCell<Option<Rc<dyn Fn(Signal, String)>>>,
}

/// Owns the current signaling channel for one session. Constructed fresh
/// (or rejoined) per [`crate::coordinator::SessionCoordinator`] session.
pub struct SignalBus<T: SignalTransport> {
    inner: Rc<Inner<T>>,
}

impl<T: SignalTransport> Clone for SignalBus<T> {
    fn clone(&self) -> Self {
        Self { inner: Rc::clone(&self.inner) }
    }
}

impl<T: SignalTransport + 'static> SignalBus<T> {
    pub fn new(transport: T, dedup_capacity: usize) -> Self {
        Self {
            inner: Rc::new(Inner {
                transport,
                joined: RefCell::new(None),
                dedup: RefCell::new(DedupSet::new(dedup_capacity)),
                on_message: RefCell::new(None),
            }),
        }
    }

    /// Subscribes to `vc.<room>`. If already joined to a different
    /// channel, fully leaves it first so a late message from the old
    /// channel cannot be mistaken for one on the new channel.
    pub async fn join(
        &self,
        room: &str,
        session_version: &str,
        user_id: &str,
        on_message: impl Fn(Signal, String) + 'static,
    ) -> Result<(), SignalError> {
        let channel = format!("vc.{room}");
        if let Some(current) = self.inner.joined.borrow().as_ref() {
            if current.channel != channel {
                self.leave().await;
            }
        }

        self.inner.dedup.borrow_mut().clear();
        *self.inner.on_message.borrow_mut() = Some(Rc::new(on_message));

        // Channel subscription can fail transiently (a momentary
        // transport hiccup right after a swipe); retry a few times with
        // exponential backoff before surfacing a `JoinFailed`, mirroring
        // `jason`'s own RPC-reconnect use of `BackoffDelayer`.
        let delayer = crate::utils::BackoffDelayer::new(
            std::time::Duration::from_millis(100),
            2.0,
            std::time::Duration::from_secs(2),
            Some(std::time::Duration::from_secs(5)),
        );
        let inner_for_retry = Rc::clone(&self.inner);
        let user_id_for_retry = user_id.to_owned();
        let channel_for_retry = channel.clone();
        delayer
            .retry(move || {
                let inner_for_call = Rc::clone(&inner_for_retry);
                let inner_for_dispatch = Rc::clone(&inner_for_retry);
                let user_id_owned = user_id_for_retry.clone();
                let channel = channel_for_retry.clone();
                async move {
                    inner_for_call
                        .transport
                        .subscribe(
                            &channel,
                            Box::new(move |envelope| {
                                dispatch_received(&inner_for_dispatch, &user_id_owned, envelope);
                            }),
                        )
                        .await
                        .map_err(backoff::Error::Transient)
                }
            })
            .await
            .map_err(|e| SignalError::JoinFailed {
                channel: channel.clone(),
                reason: e.to_string(),
            })?;

        *self.inner.joined.borrow_mut() = Some(Joined {
            channel: channel.clone(),
            session_version: session_version.to_owned(),
            user_id: user_id.to_owned(),
        });
        debug!("signal bus joined {channel}");
        Ok(())
    }

    /// Unsubscribes from the current channel, if any. Idempotent.
    pub async fn leave(&self) {
        let channel = self.inner.joined.borrow_mut().take().map(|j| j.channel);
        if let Some(channel) = channel {
            if let Err(e) = self.inner.transport.unsubscribe(&channel).await {
                warn!("failed to unsubscribe from {channel}: {e}");
            }
            debug!("signal bus left {channel}");
        }
        *self.inner.on_message.borrow_mut() = None;
    }

    /// Full reset for total shutdown: leaves the current channel and
    /// tells the transport to drop every subscription it may still hold.
    pub async fn reset(&self) {
        self.leave().await;
        if let Err(e) = self.inner.transport.unsubscribe_all().await {
            warn!("failed to unsubscribe_all: {e}");
        }
    }

    async fn send(&self, body: Signal, to: &str) -> Result<(), SignalError> {
        let joined = self.inner.joined.borrow();
        let joined = joined.as_ref().ok_or(SignalError::NotJoined)?;
        let envelope = SignalEnvelope {
            from: joined.user_id.clone(),
            to: to.to_owned(),
            session_version: joined.session_version.clone(),
            correlation_id: CorrelationId::new(),
            ts: now_ms(),
            body,
        };
        let channel = joined.channel.clone();
        drop(joined);
        trace!("publishing {channel}: {envelope:?}");
        self.inner
            .transport
            .publish(&channel, envelope)
            .await
            .map_err(|e| SignalError::PublishFailed(e.to_string()))
    }

    pub async fn send_ready(&self, to: &str) -> Result<(), SignalError> {
        self.send(Signal::Ready, to).await
    }

    pub async fn send_offer(&self, to: &str, sdp: String) -> Result<(), SignalError> {
        self.send(Signal::Offer { sdp }, to).await
    }

    pub async fn send_answer(&self, to: &str, sdp: String) -> Result<(), SignalError> {
        self.send(Signal::Answer { sdp }, to).await
    }

    pub async fn send_ice(&self, to: &str, candidate: IceCandidateData) -> Result<(), SignalError> {
        self.send(Signal::Ice { candidate }, to).await
    }

    pub async fn send_bye(&self, to: &str) -> Result<(), SignalError> {
        self.send(Signal::Bye, to).await
    }

    pub async fn send_health(&self, to: &str) -> Result<(), SignalError> {
        self.send(Signal::Health, to).await
    }

    pub async fn send_chat(&self, to: &str, text: String, id: String) -> Result<(), SignalError> {
        self.send(Signal::Chat { text, id }, to).await
    }
}

/// Applies the five-stage receive filter of spec §4.1, in order:
/// self-echo, malformed (handled upstream by deserialization), stale
/// session version, duplicate correlation id, then delivery.
fn dispatch_received<T: SignalTransport>(
    inner: &Rc<Inner<T>>,
    my_user_id: &str,
    envelope: SignalEnvelope,
) {
    if envelope.from == my_user_id {
        trace!("dropping self-echo signal {}", envelope.correlation_id);
        return;
    }

    let expected_version = match inner.joined.borrow().as_ref() {
        Some(j) => j.session_version.clone(),
        None => {
            trace!("dropping signal received while not joined");
            return;
        }
    };
    if envelope.session_version != expected_version {
        trace!(
            "dropping stale signal: expected version {expected_version}, got {}",
            envelope.session_version
        );
        return;
    }

    if inner.dedup.borrow_mut().check_and_insert(envelope.correlation_id) {
        trace!("dropping duplicate signal {}", envelope.correlation_id);
        return;
    }

    if let Some(handler) = inner.on_message.borrow().as_ref() {
        handler(envelope.body, envelope.from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::cell::RefCell as StdRefCell;

    /// Hands every `subscribe` callback straight to the test so it can
    /// simulate an inbound message by calling it directly, without a
    /// real pub/sub round trip.
    #[derive(Default)]
    struct LoopbackTransport {
        sink: StdRefCell<Option<Box<dyn Fn(SignalEnvelope)>>>,
    }

    #[async_trait(?Send)]
    impl SignalTransport for LoopbackTransport {
        async fn subscribe(
            &self,
            _channel: &str,
            on_message: Box<dyn Fn(SignalEnvelope) + 'static>,
        ) -> Result<(), SignalError> {
            *self.sink.borrow_mut() = Some(on_message);
            Ok(())
        }

        async fn unsubscribe(&self, _channel: &str) -> Result<(), SignalError> {
            *self.sink.borrow_mut() = None;
            Ok(())
        }

        async fn publish(&self, _channel: &str, _envelope: SignalEnvelope) -> Result<(), SignalError> {
            Ok(())
        }

        async fn unsubscribe_all(&self) -> Result<(), SignalError> {
            *self.sink.borrow_mut() = None;
            Ok(())
        }
    }

    fn envelope(from: &str, session_version: &str, correlation_id: CorrelationId) -> SignalEnvelope {
        SignalEnvelope {
            from: from.to_owned(),
            to: "them".to_owned(),
            session_version: session_version.to_owned(),
            correlation_id,
            ts: 0,
            body: Signal::Health,
        }
    }

    fn deliver(bus: &SignalBus<LoopbackTransport>, env: SignalEnvelope) {
        let sink = bus.inner.transport.sink.borrow();
        (sink.as_ref().expect("joined"))(env);
    }

    #[tokio::test]
    async fn self_echo_is_dropped() {
        let bus = SignalBus::new(LoopbackTransport::default(), 16);
        let received = Rc::new(RefCell::new(Vec::new()));
        let received2 = Rc::clone(&received);
        bus.join("r1", "v1", "me", move |s, from| received2.borrow_mut().push((from, s)))
            .await
            .unwrap();

        deliver(&bus, envelope("me", "v1", CorrelationId::new()));
        assert!(received.borrow().is_empty());
    }

    #[tokio::test]
    async fn stale_session_version_is_dropped() {
        let bus = SignalBus::new(LoopbackTransport::default(), 16);
        let received = Rc::new(RefCell::new(Vec::new()));
        let received2 = Rc::clone(&received);
        bus.join("r1", "v2", "me", move |s, from| received2.borrow_mut().push((from, s)))
            .await
            .unwrap();

        deliver(&bus, envelope("partner", "v1", CorrelationId::new()));
        assert!(received.borrow().is_empty());
    }

    #[tokio::test]
    async fn duplicate_correlation_id_is_dropped() {
        let bus = SignalBus::new(LoopbackTransport::default(), 16);
        let received = Rc::new(RefCell::new(Vec::new()));
        let received2 = Rc::clone(&received);
        bus.join("r1", "v1", "me", move |s, from| received2.borrow_mut().push((from, s)))
            .await
            .unwrap();

        let id = CorrelationId::new();
        deliver(&bus, envelope("partner", "v1", id));
        deliver(&bus, envelope("partner", "v1", id));
        assert_eq!(received.borrow().len(), 1);
    }

    #[tokio::test]
    async fn valid_signal_is_delivered() {
        let bus = SignalBus::new(LoopbackTransport::default(), 16);
        let received = Rc::new(RefCell::new(Vec::new()));
        let received2 = Rc::clone(&received);
        bus.join("r1", "v1", "me", move |s, from| received2.borrow_mut().push((from, s)))
            .await
            .unwrap();

        deliver(&bus, envelope("partner", "v1", CorrelationId::new()));
        assert_eq!(received.borrow().len(), 1);
        assert_eq!(received.borrow()[0].0, "partner");
    }
}
