//! C2 — Media Resource Manager: the single process-wide local media
//! handle, shared by every session.

pub mod capture;
pub mod manager;

pub use capture::{LocalStream, MediaCapture, PermissionState};
pub use manager::MediaResourceManager;

#[cfg(feature = "mockable")]
pub use capture::{MockLocalStream, MockMediaCapture};
