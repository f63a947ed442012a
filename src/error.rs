use thiserror::Error;

use crate::cipher::CipherError;
use crate::model::{DeviceId, UserId};

pub type FanoutResult<T> = Result<T, FanoutError>;

#[derive(Debug, Error)]
pub enum FanoutError {
    /// Transport failure or timeout talking to the backend.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The device has no prekey left to hand out.
    #[error("no prekey available for {user}/{device}")]
    NoPrekeyAvailable { user: UserId, device: DeviceId },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Our own payload or envelope could not be serialized.
    #[error("could not encode outgoing message: {0}")]
    Encode(String),

    #[error("message rejected with status {status}")]
    DispatchRejected { status: u16 },

    #[error(transparent)]
    Cipher(#[from] CipherError),
}

impl FanoutError {
    pub(crate) fn encode(err: serde_json::Error) -> Self {
        FanoutError::Encode(err.to_string())
    }
}

/// Conversions for errors raised while reading collaborator responses.
macro_rules! fanout_err_impl {
    ($E:ty, $variant:ident) => {
        impl From<$E> for FanoutError {
            fn from(err: $E) -> Self {
                FanoutError::$variant(err.to_string())
            }
        }
    };
}

fanout_err_impl!(reqwest::Error, Unavailable);
fanout_err_impl!(serde_json::Error, MalformedResponse);
fanout_err_impl!(base64::DecodeError, MalformedResponse);
