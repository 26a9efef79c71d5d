//! Transport-agnostic seam the bus is driven through, so the production
//! pub/sub client and a deterministic in-memory transport (tests) are
//! interchangeable. Grounded on the `#[async_trait(?Send)]` +
//! `#[cfg_attr(feature = "mockable", mockall::automock)]` shape of the
//! teacher's `RpcSession` trait.

use async_trait::async_trait;

use crate::error::SignalError;
use crate::signal::message::SignalEnvelope;

/// Minimal pub/sub surface the bus needs from any transport.
#[async_trait(?Send)]
#[cfg_attr(feature = "mockable", mockall::automock)]
pub trait SignalTransport {
    /// Subscribes to `channel`, invoking `on_message` for every payload
    /// received on it until [`SignalTransport::unsubscribe`] is called.
    async fn subscribe(
        &self,
        channel: &str,
        on_message: Box<dyn Fn(SignalEnvelope) + 'static>,
    ) -> Result<(), SignalError>;

    /// Unsubscribes from `channel`, if currently subscribed.
    async fn unsubscribe(&self, channel: &str) -> Result<(), SignalError>;

    /// Publishes `envelope` on `channel`.
    async fn publish(&self, channel: &str, envelope: SignalEnvelope) -> Result<(), SignalError>;

    /// Unsubscribes from every channel, used by [`crate::signal::bus::SignalBus::reset`]
    /// on total shutdown.
    async fn unsubscribe_all(&self) -> Result<(), SignalError>;
}
