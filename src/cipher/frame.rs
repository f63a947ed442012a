use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};

use crate::cipher::keys::{random_bytes, MessageKey};
use crate::cipher::CipherError;

pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 1 + 2 + 32 + 32 + 4;
pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

/// Everything the receiving device needs to find or build the session.
/// Authenticated as AAD, sent in the clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub prekey_id: u16,
    pub identity: [u8; 32],
    pub base_key: [u8; 32],
    pub counter: u32,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = VERSION;
        out[1..3].copy_from_slice(&self.prekey_id.to_be_bytes());
        out[3..35].copy_from_slice(&self.identity);
        out[35..67].copy_from_slice(&self.base_key);
        out[67..71].copy_from_slice(&self.counter.to_be_bytes());
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, CipherError> {
        if bytes.len() != HEADER_LEN {
            return Err(CipherError::MalformedFrame(format!("header is {} bytes", bytes.len())));
        }
        if bytes[0] != VERSION {
            return Err(CipherError::MalformedFrame(format!("unknown version {}", bytes[0])));
        }

        let mut identity = [0u8; 32];
        let mut base_key = [0u8; 32];
        identity.copy_from_slice(&bytes[3..35]);
        base_key.copy_from_slice(&bytes[35..67]);

        Ok(Header {
            prekey_id: u16::from_be_bytes([bytes[1], bytes[2]]),
            identity,
            base_key,
            counter: u32::from_be_bytes([bytes[67], bytes[68], bytes[69], bytes[70]]),
        })
    }
}

/// `header || nonce || ciphertext+tag`, nonce fresh per call.
pub(crate) fn seal(header: &Header, key: &MessageKey, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let header_bytes = header.encode();
    let nonce: [u8; NONCE_LEN] = random_bytes();

    let ciphertext = XChaCha20Poly1305::new(Key::from_slice(&key.0))
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &header_bytes,
            },
        )
        .map_err(|_| CipherError::Encryption)?;

    let mut out = Vec::with_capacity(HEADER_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) struct Frame<'a> {
    pub header: Header,
    header_bytes: &'a [u8],
    nonce: &'a [u8],
    ciphertext: &'a [u8],
}

impl<'a> Frame<'a> {
    pub(crate) fn parse(bytes: &'a [u8]) -> Result<Self, CipherError> {
        if bytes.len() < HEADER_LEN + NONCE_LEN + TAG_LEN {
            return Err(CipherError::MalformedFrame(format!("frame is only {} bytes", bytes.len())));
        }
        let (header_bytes, rest) = bytes.split_at(HEADER_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

        Ok(Frame {
            header: Header::decode(header_bytes)?,
            header_bytes,
            nonce,
            ciphertext,
        })
    }

    pub(crate) fn open(&self, key: &MessageKey) -> Result<Vec<u8>, CipherError> {
        XChaCha20Poly1305::new(Key::from_slice(&key.0))
            .decrypt(
                XNonce::from_slice(self.nonce),
                Payload {
                    msg: self.ciphertext,
                    aad: self.header_bytes,
                },
            )
            .map_err(|_| CipherError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header {
            prekey_id: 7,
            identity: [1u8; 32],
            base_key: [2u8; 32],
            counter: 42,
        }
    }

    #[test]
    fn sealed_frame_opens_with_same_key() {
        let key = MessageKey([9u8; 32]);
        let sealed = seal(&header(), &key, b"hello").unwrap();
        let frame = Frame::parse(&sealed).unwrap();
        assert_eq!(frame.header, header());
        assert_eq!(frame.open(&key).unwrap(), b"hello");
    }

    #[test]
    fn tampered_header_fails_authentication() {
        let key = MessageKey([9u8; 32]);
        let mut sealed = seal(&header(), &key, b"hello").unwrap();
        sealed[70] ^= 1;
        let frame = Frame::parse(&sealed).unwrap();
        assert!(matches!(frame.open(&key), Err(CipherError::Decryption)));
    }

    #[test]
    fn short_or_foreign_frames_are_malformed() {
        assert!(matches!(Frame::parse(&[1u8; 10]), Err(CipherError::MalformedFrame(_))));

        let key = MessageKey([9u8; 32]);
        let mut sealed = seal(&header(), &key, b"x").unwrap();
        sealed[0] = 9;
        assert!(matches!(Frame::parse(&sealed), Err(CipherError::MalformedFrame(_))));
    }
}
