use serde::Deserialize;

use crate::model::DeviceId;

/// One element of `GET /users/{user}/clients`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEntry {
    pub id: DeviceId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPrekey {
    pub id: u16,
    pub key: String,
}

/// `GET /users/{user}/prekeys/{device}`. The backend wraps the key as
/// `{"client": .., "prekey": {..}}`; a bare `{id, key}` is accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PrekeyReply {
    Bare(RawPrekey),
    Wrapped {
        client: DeviceId,
        prekey: Option<RawPrekey>,
    },
}

impl PrekeyReply {
    pub fn into_prekey(self) -> Option<RawPrekey> {
        match self {
            PrekeyReply::Bare(prekey) => Some(prekey),
            PrekeyReply::Wrapped { prekey, .. } => prekey,
        }
    }
}
