use std::collections::{HashMap, VecDeque};

use crate::cipher::frame::Frame;
use crate::cipher::keys::{session_info, ChainKey, KeyPair, MessageKey};
use crate::cipher::CipherError;
use crate::model::DeviceId;
use crate::prekeys::{PrekeyBundle, LAST_RESORT_PREKEY_ID};

/// Frames further ahead than this are refused rather than ratcheted to.
/// Also the number of skipped message keys a device keeps around.
pub const MAX_SKIP: u32 = 1000;

/// Session base key plus frame counter.
type FrameSlot = ([u8; 32], u32);

struct Inbound {
    chain: ChainKey,
    next: u32,
}

/// The receiving side of one device: its identity, the prekeys it has
/// published and the sessions other devices opened with it.
pub struct LocalDevice {
    id: DeviceId,
    identity: KeyPair,
    prekeys: HashMap<u16, KeyPair>,
    last_resort: KeyPair,
    next_prekey_id: u16,
    inbound: HashMap<[u8; 32], Inbound>,
    skipped: HashMap<FrameSlot, MessageKey>,
    skipped_order: VecDeque<FrameSlot>,
}

impl LocalDevice {
    pub fn new(id: impl Into<DeviceId>) -> Self {
        Self {
            id: id.into(),
            identity: KeyPair::generate(),
            prekeys: HashMap::new(),
            last_resort: KeyPair::generate(),
            next_prekey_id: 0,
            inbound: HashMap::new(),
            skipped: HashMap::new(),
            skipped_order: VecDeque::new(),
        }
    }

    pub fn id(&self) -> DeviceId {
        self.id.clone()
    }

    pub fn identity_public(&self) -> [u8; 32] {
        self.identity.public()
    }

    /// Mints `count` one-time prekeys and returns their public halves.
    pub fn generate_prekeys(&mut self, count: u16) -> Vec<PrekeyBundle> {
        let mut bundles = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = self.next_prekey_id;
            self.next_prekey_id = (self.next_prekey_id + 1) % LAST_RESORT_PREKEY_ID;

            let pair = KeyPair::generate();
            bundles.push(PrekeyBundle {
                device: self.id.clone(),
                id,
                key: pair.public(),
            });
            self.prekeys.insert(id, pair);
        }
        bundles
    }

    pub fn last_resort(&self) -> PrekeyBundle {
        PrekeyBundle {
            device: self.id.clone(),
            id: LAST_RESORT_PREKEY_ID,
            key: self.last_resort.public(),
        }
    }

    pub fn remaining_prekeys(&self) -> usize {
        self.prekeys.len()
    }

    /// Opens a frame, setting up the inbound session on first contact.
    /// One-time prekeys are consumed only once a frame decrypts. Keys for
    /// frames jumped over are kept so late arrivals still open; a frame
    /// already opened is refused as stale.
    pub fn decrypt(&mut self, bytes: &[u8]) -> Result<Vec<u8>, CipherError> {
        let frame = Frame::parse(bytes)?;
        let header = &frame.header;
        let slot = (header.base_key, header.counter);

        let (chain, next, fresh) = match self.inbound.get(&header.base_key) {
            Some(inbound) if header.counter < inbound.next => {
                let Some(key) = self.skipped.get(&slot) else {
                    return Err(CipherError::StaleCounter {
                        counter: header.counter,
                        expected: inbound.next,
                    });
                };
                let plaintext = frame.open(key)?;
                self.skipped.remove(&slot);
                return Ok(plaintext);
            }
            Some(inbound) => (inbound.chain.clone(), inbound.next, false),
            None => {
                let prekey = if header.prekey_id == LAST_RESORT_PREKEY_ID {
                    &self.last_resort
                } else {
                    self.prekeys
                        .get(&header.prekey_id)
                        .ok_or(CipherError::UnknownPrekey(header.prekey_id))?
                };
                let identity_dh = prekey.agree(&header.identity)?;
                let base_dh = prekey.agree(&header.base_key)?;
                let info = session_info(&header.identity, &header.base_key, &prekey.public());
                (ChainKey::root(&identity_dh, &base_dh, &info)?, 0, true)
            }
        };

        if header.counter - next > MAX_SKIP {
            return Err(CipherError::TooFarAhead {
                counter: header.counter,
                expected: next,
            });
        }

        let mut chain = chain;
        let mut jumped = Vec::new();
        for counter in next..header.counter {
            let (following, key) = chain.step()?;
            jumped.push((counter, key));
            chain = following;
        }
        let (chain, message_key) = chain.step()?;
        let plaintext = frame.open(&message_key)?;
        let next = header.counter.checked_add(1).ok_or(CipherError::CounterExhausted)?;

        if fresh && header.prekey_id != LAST_RESORT_PREKEY_ID {
            self.prekeys.remove(&header.prekey_id);
        }
        for (counter, key) in jumped {
            self.remember_skipped((header.base_key, counter), key);
        }
        self.inbound.insert(header.base_key, Inbound { chain, next });

        Ok(plaintext)
    }

    /// Oldest keys go first once more than `MAX_SKIP` are held.
    fn remember_skipped(&mut self, slot: FrameSlot, key: MessageKey) {
        self.skipped.insert(slot, key);
        self.skipped_order.push_back(slot);
        while self.skipped_order.len() > MAX_SKIP as usize {
            if let Some(oldest) = self.skipped_order.pop_front() {
                self.skipped.remove(&oldest);
            }
        }
    }
}
