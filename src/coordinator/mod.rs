//! C5 — Session Coordinator: the top-level orchestrator tying together
//! every other component.

pub mod session;
pub mod state;

pub use session::{DetachedError, SessionCoordinator, SessionCoordinatorHandle};
pub use state::{MatchKind, OuterState, SessionDescriptor};
