//! Per-device encryption.
//!
//! A session is set up from a claimed prekey: both DH(identity, prekey) and
//! DH(base, prekey) go through HKDF-SHA256 into a chain key, where `base` is
//! a key pair made fresh for the session. Each message steps the chain once
//! and is sealed with XChaCha20-Poly1305 under a random nonce, so two frames
//! never match even for the same text and device.

mod device;
mod frame;
mod keys;
mod session;

use thiserror::Error;
use tracing::debug;

pub use device::LocalDevice;
pub use keys::KeyPair;
pub use session::{SessionKey, SessionStore};

use crate::context::SessionContext;
use crate::model::{DeviceId, UserId};
use crate::prekeys::PrekeyBundle;
use session::Session;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid public key")]
    InvalidKey,

    #[error("key derivation failed")]
    Kdf,

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed: wrong key or tampered frame")]
    Decryption,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unknown prekey {0}")]
    UnknownPrekey(u16),

    #[error("frame {counter} already seen, expected {expected} or later")]
    StaleCounter { counter: u32, expected: u32 },

    #[error("frame {counter} skips too far ahead of {expected}")]
    TooFarAhead { counter: u32, expected: u32 },

    #[error("session counter exhausted")]
    CounterExhausted,
}

/// Encrypts for other devices on behalf of one sending identity.
pub struct Cipher {
    identity: KeyPair,
    sessions: SessionStore,
}

impl Cipher {
    pub fn new(identity: KeyPair) -> Self {
        Self {
            identity,
            sessions: SessionStore::default(),
        }
    }

    pub fn identity_public(&self) -> [u8; 32] {
        self.identity.public()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Encrypts `plaintext` for one device. The prekey is used only when no
    /// session with that device exists yet; otherwise the existing session
    /// advances. Concurrent calls for the same device are serialized.
    pub async fn encrypt(
        &self,
        context: &SessionContext,
        user: &UserId,
        device: &DeviceId,
        prekey: &PrekeyBundle,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CipherError> {
        let key = SessionKey::new(context, user, device);
        let slot = self.sessions.slot(key.clone()).await;
        let mut slot = slot.lock().await;

        let session = match &mut *slot {
            Some(session) => session,
            empty => {
                debug!(%user, %device, prekey = prekey.id, "establishing session");
                match Session::establish(&self.identity, prekey) {
                    Ok(session) => empty.insert(session),
                    Err(error) => {
                        drop(slot);
                        self.sessions.discard_empty(&key).await;
                        return Err(error);
                    }
                }
            }
        };

        session.seal(&self.identity.public(), plaintext)
    }
}
