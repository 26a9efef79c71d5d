//! Wire envelope and variants for signals carried over the pub/sub bus
//! (spec §3, §6.2).

use serde::{Deserialize, Serialize};

use crate::utils::ids::CorrelationId;

/// Session-scoped match/connection descriptor kind a live session was
/// negotiated for. Carried in the envelope only for logging; the
/// fencing check itself is purely on `session_version`.
pub type SessionVersion = String;

/// One message exchanged over `vc.<room_id>` (spec §4.1/§6.2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub from: String,
    pub to: String,
    pub session_version: SessionVersion,
    #[serde(with = "correlation_id_serde")]
    pub correlation_id: CorrelationId,
    pub ts: u64,
    #[serde(flatten)]
    pub body: Signal,
}

/// The typed payload of a signal, tagged by `type`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    Ready,
    Offer { sdp: String },
    Answer { sdp: String },
    Ice { candidate: IceCandidateData },
    Bye,
    Health,
    Chat { text: String, id: String },
}

/// Wire-shape ICE candidate, mirroring `RTCIceCandidateInit`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IceCandidateData {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

mod correlation_id_serde {
    use super::CorrelationId;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(id: &CorrelationId, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<CorrelationId, D::Error> {
        let s = String::deserialize(de)?;
        uuid::Uuid::from_str(&s)
            .map(CorrelationId::from_uuid)
            .map_err(serde::de::Error::custom)
    }
}
