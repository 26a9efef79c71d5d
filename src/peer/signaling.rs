//! C4 — Signaling State Machine: the ready → offer → answer → ice →
//! connected protocol layered above C1/C3 (spec §4.4).
//!
//! This is a plain enum + explicit transition methods rather than the
//! teacher's `#[dispatchable]`/`Component`-macro machinery
//! (`medea-macro`): that macro is workspace-local to `medea` and not
//! independently reusable, so its pattern is hand-rolled here the way
//! jason's own pre-`Component` code (`rpc_session.rs`) drives its
//! `SessionState` — a plain enum guarded by explicit match arms.

use derive_more::Display;

use crate::error::PeerError;

/// Per-session signaling phase (spec §3 `Peer Context.signaling_phase`).
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum PeerPhase {
    #[display(fmt = "fresh")]
    Fresh,
    #[display(fmt = "have-local-offer")]
    HaveLocalOffer,
    #[display(fmt = "have-remote-offer")]
    HaveRemoteOffer,
    #[display(fmt = "stable")]
    Stable,
    #[display(fmt = "closed")]
    Closed,
}

impl PeerPhase {
    /// Validates (without mutating) that `op` is legal from the current
    /// phase, per spec §4.3/§4.4's precondition list. Returns the error
    /// to raise (which the caller turns into a full reset) if not.
    pub fn check(self, op: &'static str) -> Result<(), PeerError> {
        use PeerPhase::*;
        let ok = match op {
            "make_offer" => matches!(self, Fresh),
            "accept_offer" => matches!(self, Fresh | HaveRemoteOffer),
            "accept_answer" => matches!(self, HaveLocalOffer),
            "add_remote_ice" => !matches!(self, Closed),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(PeerError::InvalidPeerState { phase: self.to_string(), op })
        }
    }

    pub fn after(self, op: &'static str) -> Self {
        match (self, op) {
            (PeerPhase::Fresh, "make_offer") => PeerPhase::HaveLocalOffer,
            (_, "accept_offer") => PeerPhase::Stable,
            (PeerPhase::HaveLocalOffer, "accept_answer") => PeerPhase::Stable,
            (phase, _) => phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_offer_only_legal_from_fresh() {
        assert!(PeerPhase::Fresh.check("make_offer").is_ok());
        assert!(PeerPhase::Stable.check("make_offer").is_err());
    }

    #[test]
    fn accept_answer_only_legal_after_local_offer() {
        assert!(PeerPhase::HaveLocalOffer.check("accept_answer").is_ok());
        assert!(PeerPhase::Fresh.check("accept_answer").is_err());
    }

    #[test]
    fn add_remote_ice_illegal_once_closed() {
        assert!(PeerPhase::Stable.check("add_remote_ice").is_ok());
        assert!(PeerPhase::Closed.check("add_remote_ice").is_err());
    }

    #[test]
    fn transitions_advance_phase_as_expected() {
        assert_eq!(PeerPhase::Fresh.after("make_offer"), PeerPhase::HaveLocalOffer);
        assert_eq!(PeerPhase::Fresh.after("accept_offer"), PeerPhase::Stable);
        assert_eq!(
            PeerPhase::HaveLocalOffer.after("accept_answer"),
            PeerPhase::Stable
        );
    }
}
