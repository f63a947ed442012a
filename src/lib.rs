pub mod api;
pub mod cipher;
pub mod config;
pub mod context;
pub mod devices;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod model;
pub mod prekeys;
pub mod store;

pub use api::{Backend, HttpTransport, Reply, Transport};
pub use cipher::{Cipher, KeyPair, LocalDevice};
pub use config::Config;
pub use context::SessionContext;
pub use dispatch::{Delivery, Dispatcher};
pub use envelope::{Assembled, Assembler, Envelope, Skipped};
pub use error::{FanoutError, FanoutResult};
pub use model::{Conversation, ConversationId, Device, DeviceId, FilePart, GenericMessage, Message, UserId};
pub use prekeys::PrekeyBundle;
pub use store::{ConversationStore, MemoryConversations};
