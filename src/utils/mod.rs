//! Small shared helpers used across components, mirroring the teacher's
//! `utils` module: id/timestamp generation and the callback dispatch
//! primitive backing the event surface (C8).

pub mod backoff_delayer;
pub mod callback;
pub mod ids;
pub mod time;

pub use backoff_delayer::BackoffDelayer;
pub use callback::Callback;
