use std::time::Duration;

use anyhow::{anyhow, Context};
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::context::SessionContext;

pub const DEFAULT_BACKEND_URL: &str = "https://prod-nginz-https.wire.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Clone)]
pub struct Config {
    pub backend_url: String,
    pub access_token: String,
    pub context: SessionContext,
    pub request_timeout: Duration,
    pub transient: bool,
    pub identity_key: Option<[u8; 32]>,
}

impl Config {
    /// Reads `OTR_*` variables, loading a `.env` file first if there is one.
    pub fn from_env() -> anyhow::Result<Config> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let required = |key: &str| lookup(key).ok_or(anyhow!("{key} is not set"));

        let backend_url = lookup("OTR_BACKEND_URL")
            .unwrap_or(DEFAULT_BACKEND_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let access_token = required("OTR_ACCESS_TOKEN")?;
        let context = SessionContext::new(required("OTR_USER_ID")?, required("OTR_CLIENT_ID")?);

        let request_timeout = match lookup("OTR_REQUEST_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("OTR_REQUEST_TIMEOUT_SECS={secs} is not a number"))?,
            ),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let transient = match lookup("OTR_TRANSIENT").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => return Err(anyhow!("OTR_TRANSIENT={other} is not a boolean")),
        };

        let identity_key = match lookup("OTR_IDENTITY_KEY") {
            Some(encoded) => {
                let bytes = STANDARD
                    .decode(encoded.trim())
                    .context("OTR_IDENTITY_KEY is not base64")?;
                let key: [u8; 32] = bytes
                    .try_into()
                    .map_err(|b: Vec<u8>| anyhow!("OTR_IDENTITY_KEY must be 32 bytes, got {}", b.len()))?;
                Some(key)
            }
            None => None,
        };

        Ok(Config {
            backend_url,
            access_token,
            context,
            request_timeout,
            transient,
            identity_key,
        })
    }
}
