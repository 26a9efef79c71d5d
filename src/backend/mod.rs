//! C7 — Backend Client: typed HTTP wrappers over `/video_chat/*`.

pub mod client;
pub mod model;

pub use client::{BackendClient, HttpBackendClient, TokenProvider};
pub use model::{MatchDescriptor, MatchType, Partner, StatusAck, SwipeDeduction, UpdatedUserInfo};

#[cfg(feature = "mockable")]
pub use client::MockBackendClient;
