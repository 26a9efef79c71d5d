//! The outer match/session state machine (spec §4.5), observed via
//! `medea_reactive::ObservableCell` the same way the teacher observes
//! `SessionState` in `jason/src/rpc/rpc_session.rs`.

use medea_reactive::ObservableCell;

use crate::backend::{MatchDescriptor, MatchType};

/// What kind of session is currently active, after cross-validation
/// (spec §4.5 step 6) — never taken from the backend verbatim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    Video,
    LiveReal,
    LiveStaff,
}

/// The immutable, validated descriptor of the current session (spec §3
/// "Session Descriptor").
#[derive(Clone, Debug)]
pub struct SessionDescriptor {
    pub room_id: String,
    pub session_version: String,
    pub match_kind: MatchKind,
    pub is_initiator: bool,
    pub partner_id: Option<String>,
    pub video_id: Option<String>,
    pub video_url: Option<String>,
    pub video_name: Option<String>,
}

impl SessionDescriptor {
    /// Cross-validates and, if inconsistent, downgrades a raw backend
    /// match descriptor into a [`SessionDescriptor`] per spec §4.5 step 6:
    /// a "video" label with missing URLs downgrades to live using
    /// `match_type`; a "live" label with a missing/self partner
    /// downgrades to video.
    pub fn from_match_descriptor(d: &MatchDescriptor, self_id: &str) -> Option<Self> {
        let room_id = d.room_id.clone()?;
        let session_version = d.session_version.clone().unwrap_or_default();
        let claimed = d.actual_match_type.or(d.match_type)?;

        let has_video_fields = d.video_id.is_some() && d.video_url.is_some();
        let has_real_partner = d
            .partner
            .as_ref()
            .is_some_and(|p| !p.id.is_empty() && p.id != self_id);

        let resolved_kind = match claimed {
            MatchType::Video if has_video_fields => MatchKind::Video,
            MatchType::Video => {
                if has_real_partner {
                    MatchKind::LiveReal
                } else {
                    return None;
                }
            }
            MatchType::RealUser if has_real_partner => MatchKind::LiveReal,
            MatchType::Staff if has_real_partner => MatchKind::LiveStaff,
            MatchType::RealUser | MatchType::Staff => {
                if has_video_fields {
                    MatchKind::Video
                } else {
                    return None;
                }
            }
        };

        Some(Self {
            room_id,
            session_version,
            match_kind: resolved_kind,
            is_initiator: d.is_initiator.unwrap_or(false),
            partner_id: d.partner.as_ref().map(|p| p.id.clone()),
            video_id: d.video_id.clone(),
            video_url: d.video_url.clone(),
            video_name: d.video_name.clone(),
        })
    }
}

/// Outer state machine (spec §4.5 diagram).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OuterState {
    Idle,
    Queued,
    Matched,
    Playing,
    Connecting,
    Connected,
    Swiping,
}

/// Wraps [`OuterState`] for observation, mirroring
/// `jason/src/rpc/rpc_session.rs`'s `ObservableCell<SessionState>`.
pub struct OuterStateCell(ObservableCell<OuterState>);

impl Default for OuterStateCell {
    fn default() -> Self {
        Self(ObservableCell::new(OuterState::Idle))
    }
}

impl OuterStateCell {
    pub fn get(&self) -> OuterState {
        self.0.get()
    }

    pub fn set(&self, state: OuterState) {
        self.0.set(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Partner;

    fn base_descriptor() -> MatchDescriptor {
        MatchDescriptor {
            status: "matched".into(),
            room_id: Some("r1".into()),
            match_type: None,
            actual_match_type: None,
            partner: None,
            is_initiator: None,
            session_version: Some("v1".into()),
            video_id: None,
            video_url: None,
            video_name: None,
            updated_user_info: None,
            swipe_deduction: None,
        }
    }

    #[test]
    fn video_label_with_fields_stays_video() {
        let mut d = base_descriptor();
        d.actual_match_type = Some(MatchType::Video);
        d.video_id = Some("42".into());
        d.video_url = Some("u".into());
        let sd = SessionDescriptor::from_match_descriptor(&d, "me").unwrap();
        assert_eq!(sd.match_kind, MatchKind::Video);
    }

    #[test]
    fn video_label_missing_fields_downgrades_to_live() {
        let mut d = base_descriptor();
        d.actual_match_type = Some(MatchType::Video);
        d.partner = Some(Partner { id: "partner-1".into() });
        let sd = SessionDescriptor::from_match_descriptor(&d, "me").unwrap();
        assert_eq!(sd.match_kind, MatchKind::LiveReal);
    }

    #[test]
    fn live_label_with_self_partner_downgrades_to_video() {
        let mut d = base_descriptor();
        d.actual_match_type = Some(MatchType::RealUser);
        d.partner = Some(Partner { id: "me".into() });
        d.video_id = Some("42".into());
        d.video_url = Some("u".into());
        let sd = SessionDescriptor::from_match_descriptor(&d, "me").unwrap();
        assert_eq!(sd.match_kind, MatchKind::Video);
    }

    #[test]
    fn inconsistent_descriptor_with_no_fallback_is_rejected() {
        let mut d = base_descriptor();
        d.actual_match_type = Some(MatchType::RealUser);
        d.partner = Some(Partner { id: "me".into() });
        assert!(SessionDescriptor::from_match_descriptor(&d, "me").is_none());
    }
}
