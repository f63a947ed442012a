use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{prekey_path, schema::PrekeyReply, Backend, Transport};
use crate::error::{FanoutError, FanoutResult};
use crate::model::{DeviceId, UserId};

/// Id the backend uses for the key it hands out once the one-time keys of
/// a device are gone. It is never consumed.
pub const LAST_RESORT_PREKEY_ID: u16 = u16::MAX;

/// A claimed prekey. Good for establishing exactly one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrekeyBundle {
    pub device: DeviceId,
    pub id: u16,
    pub key: [u8; 32],
}

impl PrekeyBundle {
    pub fn is_last_resort(&self) -> bool {
        self.id == LAST_RESORT_PREKEY_ID
    }

    /// The `{id, key}` object as published to the backend.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "key": STANDARD.encode(self.key),
        })
    }
}

/// Claims one prekey of `device`. Call at most once per device per envelope;
/// every call uses up a key on the server.
pub async fn fetch_prekey<T: Transport>(
    backend: &Backend<T>,
    user: &UserId,
    device: &DeviceId,
) -> FanoutResult<PrekeyBundle> {
    let reply = backend.get(&prekey_path(user, device)).await?;
    let exhausted = || FanoutError::NoPrekeyAvailable {
        user: user.clone(),
        device: device.clone(),
    };

    match reply.status {
        200 => {}
        404 => return Err(exhausted()),
        status => {
            return Err(FanoutError::Unavailable(format!(
                "prekey of {user}/{device} returned {status}"
            )));
        }
    }

    let Some(raw) = reply.json::<PrekeyReply>()?.into_prekey() else {
        return Err(exhausted());
    };

    let key: [u8; 32] = STANDARD
        .decode(&raw.key)?
        .try_into()
        .map_err(|b: Vec<u8>| {
            FanoutError::MalformedResponse(format!(
                "prekey {} of {user}/{device} is {} bytes, expected 32",
                raw.id,
                b.len()
            ))
        })?;

    let bundle = PrekeyBundle {
        device: device.clone(),
        id: raw.id,
        key,
    };
    if bundle.is_last_resort() {
        debug!(%user, %device, "using last resort prekey");
    } else {
        debug!(%user, %device, id = bundle.id, "claimed prekey");
    }

    Ok(bundle)
}
