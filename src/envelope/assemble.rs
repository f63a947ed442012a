use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::api::{Backend, Transport};
use crate::cipher::Cipher;
use crate::context::SessionContext;
use crate::devices::list_devices;
use crate::envelope::Envelope;
use crate::error::{FanoutError, FanoutResult};
use crate::model::{DeviceId, UserId};
use crate::prekeys::fetch_prekey;

/// A user or device left out of an envelope, and why. `device` is `None`
/// when the whole user was skipped because its devices couldn't be listed.
#[derive(Debug)]
pub struct Skipped {
    pub user: UserId,
    pub device: Option<DeviceId>,
    pub error: FanoutError,
}

#[derive(Debug)]
pub struct Assembled {
    pub envelope: Envelope,
    pub skipped: Vec<Skipped>,
}

type Sealed = Result<(UserId, DeviceId, Vec<u8>), Skipped>;

/// Builds one envelope: lists every member's devices, claims a prekey and
/// encrypts for each device except the sender's own. A user or device that
/// fails is skipped; everyone reachable still gets the message.
///
/// A prekey is claimed for every target device on every envelope, including
/// devices we already hold a session with. The cipher ignores the claimed
/// key in that case, so each send uses up one one-time key per device.
pub struct Assembler<'a, T> {
    backend: &'a Backend<T>,
    cipher: &'a Cipher,
    context: &'a SessionContext,
    transient: bool,
}

impl<'a, T: Transport> Assembler<'a, T> {
    pub fn new(backend: &'a Backend<T>, cipher: &'a Cipher, context: &'a SessionContext, transient: bool) -> Self {
        Self {
            backend,
            cipher,
            context,
            transient,
        }
    }

    pub async fn assemble(&self, members: &[UserId], plaintext: &[u8]) -> Assembled {
        let mut unique: Vec<&UserId> = Vec::with_capacity(members.len());
        for member in members {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }

        let per_user = join_all(unique.into_iter().map(|user| self.for_user(user, plaintext))).await;

        let mut envelope = Envelope::new(self.context.device.clone(), self.transient);
        let mut skipped = Vec::new();
        for sealed in per_user.into_iter().flatten() {
            match sealed {
                Ok((user, device, ciphertext)) => envelope.insert(user, device, ciphertext),
                Err(skip) => skipped.push(skip),
            }
        }

        debug!(
            devices = envelope.device_count(),
            skipped = skipped.len(),
            "assembled envelope"
        );
        Assembled { envelope, skipped }
    }

    async fn for_user(&self, user: &UserId, plaintext: &[u8]) -> Vec<Sealed> {
        let devices = match list_devices(self.backend, user).await {
            Ok(devices) => devices,
            Err(error) => {
                warn!(%user, %error, "skipping user, devices not listed");
                return vec![Err(Skipped {
                    user: user.clone(),
                    device: None,
                    error,
                })];
            }
        };

        let targets = devices
            .into_iter()
            .filter(|device| !self.context.is_self(user, device));

        join_all(targets.map(|device| self.for_device(user, device, plaintext))).await
    }

    async fn for_device(&self, user: &UserId, device: DeviceId, plaintext: &[u8]) -> Sealed {
        match self.seal(user, &device, plaintext).await {
            Ok(ciphertext) => Ok((user.clone(), device, ciphertext)),
            Err(error) => {
                warn!(%user, %device, %error, "skipping device");
                Err(Skipped {
                    user: user.clone(),
                    device: Some(device),
                    error,
                })
            }
        }
    }

    async fn seal(&self, user: &UserId, device: &DeviceId, plaintext: &[u8]) -> FanoutResult<Vec<u8>> {
        let prekey = fetch_prekey(self.backend, user, device).await?;
        Ok(self.cipher.encrypt(self.context, user, device, &prekey, plaintext).await?)
    }
}
