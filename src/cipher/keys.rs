use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::CipherError;

const ROOT_SALT: &[u8] = b"otrfanout-root-v1";
const CHAIN_INFO: &[u8] = b"otrfanout-chain-v1";

pub(crate) fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// X25519 key pair. The secret is wiped on drop.
pub struct KeyPair {
    secret: StaticSecret,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_secret(random_bytes())
    }

    pub fn from_secret(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    pub fn public(&self) -> [u8; 32] {
        PublicKey::from(&self.secret).to_bytes()
    }

    /// Rejects peers whose key would force an all-zero shared secret.
    pub fn agree(&self, peer: &[u8; 32]) -> Result<[u8; 32], CipherError> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*peer));
        if !shared.was_contributory() {
            return Err(CipherError::InvalidKey);
        }
        Ok(shared.to_bytes())
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair([REDACTED])")
    }
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct ChainKey([u8; 32]);

#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct MessageKey(pub(crate) [u8; 32]);

impl ChainKey {
    /// Root of a fresh session: HKDF over DH(identity, prekey) || DH(base, prekey),
    /// bound to the public keys involved through `info`.
    pub(crate) fn root(identity_dh: &[u8; 32], base_dh: &[u8; 32], info: &[u8]) -> Result<Self, CipherError> {
        let mut ikm = [0u8; 64];
        ikm[..32].copy_from_slice(identity_dh);
        ikm[32..].copy_from_slice(base_dh);

        let mut okm = [0u8; 32];
        let result = Hkdf::<Sha256>::new(Some(ROOT_SALT), &ikm)
            .expand(info, &mut okm)
            .map_err(|_| CipherError::Kdf);
        ikm.zeroize();
        result?;

        Ok(Self(okm))
    }

    /// One step of the symmetric ratchet.
    pub(crate) fn step(&self) -> Result<(ChainKey, MessageKey), CipherError> {
        let mut okm = [0u8; 64];
        Hkdf::<Sha256>::new(None, &self.0)
            .expand(CHAIN_INFO, &mut okm)
            .map_err(|_| CipherError::Kdf)?;

        let mut next = [0u8; 32];
        let mut message = [0u8; 32];
        next.copy_from_slice(&okm[..32]);
        message.copy_from_slice(&okm[32..]);
        okm.zeroize();

        Ok((ChainKey(next), MessageKey(message)))
    }
}

pub(crate) fn session_info(identity: &[u8; 32], base: &[u8; 32], prekey: &[u8; 32]) -> [u8; 96] {
    let mut info = [0u8; 96];
    info[..32].copy_from_slice(identity);
    info[32..64].copy_from_slice(base);
    info[64..].copy_from_slice(prekey);
    info
}
