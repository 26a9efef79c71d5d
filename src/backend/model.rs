//! Wire models for the five backend endpoints (spec §6.1).

use serde::{Deserialize, Serialize};

/// Partner descriptor inside a match response. For video matches the id
/// is a sentinel the coordinator never dereferences as a real peer.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Partner {
    pub id: String,
}

/// Backend-authoritative classification of a match, before the
/// coordinator's own cross-validation (spec §4.5 step 6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Video,
    Staff,
    RealUser,
}

/// Per-swipe credit/balance bookkeeping, surfaced verbatim to the
/// embedder (spec §9 Open Question: the coordinator does not interpret
/// `error` vs `success=false`).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SwipeDeduction {
    pub success: bool,
    pub deducted: Option<u32>,
    pub new_balance: Option<u32>,
    pub error: Option<String>,
}

/// Incremental user-facing counters the backend may attach to a swipe
/// response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UpdatedUserInfo {
    pub pool_id: Option<String>,
    pub sequence_id: Option<String>,
    pub videos_watched_in_current_sequence: Option<u32>,
    pub sequence_total_videos: Option<u32>,
}

/// The response shape shared by `/join`, `/swipe`, and `/status` (spec
/// §6.1's "Match descriptor").
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchDescriptor {
    pub status: String,
    pub room_id: Option<String>,
    pub match_type: Option<MatchType>,
    pub actual_match_type: Option<MatchType>,
    pub partner: Option<Partner>,
    pub is_initiator: Option<bool>,
    pub session_version: Option<String>,
    pub video_id: Option<String>,
    pub video_url: Option<String>,
    pub video_name: Option<String>,
    pub updated_user_info: Option<UpdatedUserInfo>,
    pub swipe_deduction: Option<SwipeDeduction>,
}

impl MatchDescriptor {
    pub fn is_matched(&self) -> bool {
        self.status == "matched"
    }
}

/// Generic `{status}` acknowledgement returned by `/leave`,
/// `/end_session`, `/clear_waiting_room`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct StatusAck {
    pub status: String,
}
