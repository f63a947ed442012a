use tracing::debug;

use crate::api::{clients_path, schema::ClientEntry, Backend, Transport};
use crate::error::{FanoutError, FanoutResult};
use crate::model::{DeviceId, UserId};

/// Fresh snapshot of a user's active devices, in the order the backend
/// lists them. Nothing is cached so revoked devices drop out immediately.
pub async fn list_devices<T: Transport>(backend: &Backend<T>, user: &UserId) -> FanoutResult<Vec<DeviceId>> {
    let reply = backend.get(&clients_path(user)).await?;

    match reply.status {
        200 => {}
        404 => return Err(FanoutError::NotFound(format!("user {user}"))),
        status => {
            return Err(FanoutError::Unavailable(format!(
                "listing devices of {user} returned {status}"
            )));
        }
    }

    let entries: Vec<ClientEntry> = reply.json()?;
    let mut devices: Vec<DeviceId> = Vec::with_capacity(entries.len());
    for ClientEntry { id } in entries {
        if !devices.contains(&id) {
            devices.push(id);
        }
    }

    debug!(%user, count = devices.len(), "listed devices");
    Ok(devices)
}
