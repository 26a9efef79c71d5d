//! C1 — Signal Bus Adapter: pub/sub channel membership, typed signal
//! publish/receive, and the receive-path filtering of spec §4.1.

pub mod bus;
pub mod dedup;
pub mod message;
pub mod transport;

pub use bus::SignalBus;
pub use message::{IceCandidateData, Signal, SignalEnvelope};
pub use transport::SignalTransport;

#[cfg(feature = "mockable")]
pub use transport::MockSignalTransport;
