mod assemble;

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use assemble::{Assembled, Assembler, Skipped};

use crate::model::{DeviceId, UserId};

/// Opaque per-device ciphertext, base64 on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext(pub Vec<u8>);

impl Serialize for Ciphertext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Ciphertext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Ciphertext)
            .map_err(serde::de::Error::custom)
    }
}

pub type Recipients = BTreeMap<UserId, BTreeMap<DeviceId, Ciphertext>>;

/// What gets posted for one message: a ciphertext per recipient device.
/// Never holds plaintext, never holds the sending device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: DeviceId,
    pub transient: bool,
    pub recipients: Recipients,
}

impl Envelope {
    pub fn new(sender: DeviceId, transient: bool) -> Self {
        Self {
            sender,
            transient,
            recipients: Recipients::new(),
        }
    }

    pub(crate) fn insert(&mut self, user: UserId, device: DeviceId, ciphertext: Vec<u8>) {
        self.recipients
            .entry(user)
            .or_default()
            .insert(device, Ciphertext(ciphertext));
    }

    /// Number of device entries across all users.
    pub fn device_count(&self) -> usize {
        self.recipients.values().map(BTreeMap::len).sum()
    }

    pub fn get(&self, user: &UserId, device: &DeviceId) -> Option<&Ciphertext> {
        self.recipients.get(user)?.get(device)
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let mut envelope = Envelope::new("a1".into(), false);
        envelope.insert("bob".into(), "b1".into(), vec![1, 2, 3]);
        envelope.insert("bob".into(), "b2".into(), vec![4]);

        let json = envelope.to_json().unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sender": "a1",
                "transient": false,
                "recipients": { "bob": { "b1": "AQID", "b2": "BA==" } }
            })
        );
        assert_eq!(envelope.device_count(), 2);

        let back: Envelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn bad_base64_is_rejected() {
        let json = serde_json::json!({
            "sender": "a1",
            "transient": true,
            "recipients": { "bob": { "b1": "***" } }
        });
        assert!(serde_json::from_value::<Envelope>(json).is_err());
    }
}
