use std::{fmt, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(UserId);
string_id!(DeviceId);
string_id!(ConversationId);

/// One encryption endpoint of a user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Device {
    pub user: UserId,
    pub device: DeviceId,
}

impl Device {
    pub fn new(user: impl Into<UserId>, device: impl Into<DeviceId>) -> Self {
        Self {
            user: user.into(),
            device: device.into(),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.device)
    }
}

/// A message as kept in the local conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub timestamp: OffsetDateTime,
    pub sender: UserId,
    pub self_destruct: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: ConversationId,
    pub members: Vec<UserId>,
    messages: Vec<Message>,
}

impl Conversation {
    /// Duplicate members are dropped, first occurrence wins.
    pub fn new(id: impl Into<ConversationId>, members: impl IntoIterator<Item = UserId>) -> Self {
        let mut unique: Vec<UserId> = Vec::new();
        for member in members {
            if !unique.contains(&member) {
                unique.push(member);
            }
        }

        Self {
            id: id.into(),
            members: unique,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// One half of a file send. The preview goes out first so receivers can
/// show a placeholder, then the asset with the contents; both carry the
/// same message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilePart {
    Preview {
        name: String,
        mime_type: String,
        size: u64,
    },
    Asset {
        name: String,
        mime_type: String,
        size: u64,
        /// base64 SHA-256 of `data` before encoding.
        sha256: String,
        /// base64 file contents.
        data: String,
    },
}

/// The payload that actually gets encrypted for every device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericMessage {
    pub message_id: Uuid,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_after_millis: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FilePart>,
}

impl GenericMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            text: text.into(),
            expire_after_millis: None,
            file: None,
        }
    }

    pub fn file_preview(message_id: Uuid, name: &str, mime_type: &str, contents: &[u8]) -> Self {
        Self::file(
            message_id,
            FilePart::Preview {
                name: name.to_owned(),
                mime_type: mime_type.to_owned(),
                size: contents.len() as u64,
            },
        )
    }

    pub fn file_asset(message_id: Uuid, name: &str, mime_type: &str, contents: &[u8]) -> Self {
        Self::file(
            message_id,
            FilePart::Asset {
                name: name.to_owned(),
                mime_type: mime_type.to_owned(),
                size: contents.len() as u64,
                sha256: STANDARD.encode(Sha256::digest(contents)),
                data: STANDARD.encode(contents),
            },
        )
    }

    fn file(message_id: Uuid, part: FilePart) -> Self {
        Self {
            message_id,
            text: String::new(),
            expire_after_millis: None,
            file: Some(part),
        }
    }

    pub fn timed(text: impl Into<String>, after: Duration) -> Self {
        Self {
            expire_after_millis: Some(u64::try_from(after.as_millis()).unwrap_or(u64::MAX)),
            ..Self::text(text)
        }
    }

    pub fn self_destruct(&self) -> Option<Duration> {
        self.expire_after_millis.map(Duration::from_millis)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
