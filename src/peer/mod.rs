//! C3 — Peer Connection Controller and C4 — Signaling State Machine.

pub mod controller;
pub mod signaling;

pub use controller::{IceServer, PeerConnectionController};
pub use signaling::PeerPhase;
