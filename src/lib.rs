//! A client-side peer-to-peer video chat session controller: a match/
//! session state machine, a WebRTC signaling protocol, and a resource/
//! lifecycle manager, exposed as a single embeddable library.
//!
//! The top-level entry point is [`coordinator::SessionCoordinator`]; the
//! embedding application holds one for the lifetime of the tab/process
//! and drives it through [`coordinator::SessionCoordinatorHandle`].

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod media;
pub mod peer;
pub mod poller;
pub mod signal;
pub mod utils;

pub use config::Config;
pub use coordinator::{SessionCoordinator, SessionCoordinatorHandle};
pub use error::VchatError;
