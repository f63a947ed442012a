use std::{collections::HashMap, sync::Arc};

use tokio::sync::Mutex;

use crate::cipher::frame::{self, Header};
use crate::cipher::keys::{session_info, ChainKey, KeyPair};
use crate::cipher::CipherError;
use crate::context::SessionContext;
use crate::model::{Device, DeviceId, UserId};
use crate::prekeys::PrekeyBundle;

/// Outbound session identity: which of our devices talks to which of theirs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub local: DeviceId,
    pub peer: Device,
}

impl SessionKey {
    pub fn new(context: &SessionContext, user: &UserId, device: &DeviceId) -> Self {
        Self {
            local: context.device.clone(),
            peer: Device::new(user.clone(), device.clone()),
        }
    }
}

/// Sending half of a session with one device.
pub(crate) struct Session {
    prekey_id: u16,
    base_key: [u8; 32],
    chain: ChainKey,
    counter: u32,
}

impl Session {
    pub(crate) fn establish(identity: &KeyPair, prekey: &PrekeyBundle) -> Result<Self, CipherError> {
        let base = KeyPair::generate();
        let identity_dh = identity.agree(&prekey.key)?;
        let base_dh = base.agree(&prekey.key)?;
        let base_key = base.public();

        let info = session_info(&identity.public(), &base_key, &prekey.key);
        Ok(Session {
            prekey_id: prekey.id,
            base_key,
            chain: ChainKey::root(&identity_dh, &base_dh, &info)?,
            counter: 0,
        })
    }

    /// Every frame repeats the setup header so the peer can build the session
    /// from whichever frame reaches it first.
    pub(crate) fn seal(&mut self, identity: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let next_counter = self.counter.checked_add(1).ok_or(CipherError::CounterExhausted)?;
        let (next, message_key) = self.chain.step()?;

        let header = Header {
            prekey_id: self.prekey_id,
            identity: *identity,
            base_key: self.base_key,
            counter: self.counter,
        };
        let sealed = frame::seal(&header, &message_key, plaintext)?;

        self.chain = next;
        self.counter = next_counter;
        Ok(sealed)
    }

    pub(crate) fn counter(&self) -> u32 {
        self.counter
    }
}

type Slot = Arc<Mutex<Option<Session>>>;

/// Outbound sessions, one lock per device. Holding one device's lock never
/// blocks work on another device.
#[derive(Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<SessionKey, Slot>>,
}

impl SessionStore {
    pub(crate) async fn slot(&self, key: SessionKey) -> Slot {
        self.slots.lock().await.entry(key).or_default().clone()
    }

    /// Removes the slot for `key` if no session got established in it.
    pub(crate) async fn discard_empty(&self, key: &SessionKey) {
        let mut slots = self.slots.lock().await;
        let empty = match slots.get(key) {
            Some(slot) => slot.lock().await.is_none(),
            None => false,
        };
        if empty {
            slots.remove(key);
        }
    }

    /// Number of devices with a tracked slot.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    async fn existing(&self, key: &SessionKey) -> Option<Slot> {
        self.slots.lock().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &SessionKey) -> bool {
        match self.existing(key).await {
            Some(slot) => slot.lock().await.is_some(),
            None => false,
        }
    }

    /// Number of frames sent on the session so far.
    pub async fn sent(&self, key: &SessionKey) -> Option<u32> {
        let slot = self.existing(key).await?;
        let session = slot.lock().await;
        session.as_ref().map(Session::counter)
    }

    /// Drops the session so the next message starts over from a new prekey.
    pub async fn forget(&self, key: &SessionKey) {
        self.slots.lock().await.remove(key);
    }
}
