//! Id generation helpers, mirroring the teacher's pervasive use of
//! `uuid`-derived identifiers for rooms/peers/connections.

use uuid::Uuid;

/// Opaque correlation id stamped on every outbound signal (spec §3) so
/// the receive-side dedup set can recognise transport-level retries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub(crate) fn from_uuid(u: Uuid) -> Self {
        Self(u)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates a locally-unique request id for an outbound HTTP call, used
/// only for log correlation (the backend does not require it).
pub fn request_id() -> String {
    Uuid::new_v4().to_string()
}
