use std::time::Duration;

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{messages_path, Backend, Transport};
use crate::cipher::Cipher;
use crate::context::SessionContext;
use crate::envelope::{Assembled, Assembler, Skipped};
use crate::error::{FanoutError, FanoutResult};
use crate::model::{ConversationId, GenericMessage, Message, UserId};
use crate::store::ConversationStore;

/// Outcome of a send the backend accepted.
#[derive(Debug)]
pub struct Delivery {
    pub message: Message,
    /// Devices that got a ciphertext.
    pub devices: usize,
    pub skipped: Vec<Skipped>,
    /// False when the local log could not take the message.
    pub recorded: bool,
}

/// Runs one send end to end: members, envelope, post, local log.
///
/// The local log is touched only after the backend accepted the envelope.
/// Nothing is retried here, and a delivered message is never reported as
/// failed.
pub struct Dispatcher<T, S> {
    context: SessionContext,
    backend: Backend<T>,
    cipher: Cipher,
    store: S,
    transient: bool,
}

impl<T: Transport, S: ConversationStore> Dispatcher<T, S> {
    pub fn new(context: SessionContext, backend: Backend<T>, cipher: Cipher, store: S, transient: bool) -> Self {
        Self {
            context,
            backend,
            cipher,
            store,
            transient,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn backend(&self) -> &Backend<T> {
        &self.backend
    }

    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn send_text(&self, conversation: &ConversationId, text: &str) -> FanoutResult<Delivery> {
        self.send(conversation, GenericMessage::text(text)).await
    }

    /// Like [`Dispatcher::send_text`], but receivers drop the message after `after`.
    pub async fn send_timed_text(
        &self,
        conversation: &ConversationId,
        text: &str,
        after: Duration,
    ) -> FanoutResult<Delivery> {
        self.send(conversation, GenericMessage::timed(text, after)).await
    }

    /// Sends a file as a preview followed by the asset, both under one
    /// message id. Succeeds only when the backend accepted both; a single
    /// entry is logged for the pair.
    pub async fn send_file(
        &self,
        conversation: &ConversationId,
        name: &str,
        mime_type: &str,
        contents: &[u8],
    ) -> FanoutResult<Delivery> {
        let members = self.store.members(conversation).await?;
        let id = Uuid::now_v7();

        let preview = GenericMessage::file_preview(id, name, mime_type, contents);
        let (_, mut skipped) = self.deliver(conversation, &members, &preview).await?;

        let asset = GenericMessage::file_asset(id, name, mime_type, contents);
        let (devices, asset_skipped) = self.deliver(conversation, &members, &asset).await?;
        skipped.extend(asset_skipped);

        let message = Message {
            id,
            text: format!("FILE {name}"),
            timestamp: OffsetDateTime::now_utc(),
            sender: self.context.user.clone(),
            self_destruct: None,
        };
        Ok(self.record(conversation, message, devices, skipped).await)
    }

    pub async fn send(&self, conversation: &ConversationId, payload: GenericMessage) -> FanoutResult<Delivery> {
        let members = self.store.members(conversation).await?;
        let (devices, skipped) = self.deliver(conversation, &members, &payload).await?;

        let message = Message {
            id: payload.message_id,
            timestamp: OffsetDateTime::now_utc(),
            sender: self.context.user.clone(),
            self_destruct: payload.self_destruct(),
            text: payload.text,
        };
        Ok(self.record(conversation, message, devices, skipped).await)
    }

    /// Assembles and posts one envelope. Returns how many devices got a copy.
    async fn deliver(
        &self,
        conversation: &ConversationId,
        members: &[UserId],
        payload: &GenericMessage,
    ) -> FanoutResult<(usize, Vec<Skipped>)> {
        let plaintext = payload.to_bytes().map_err(FanoutError::encode)?;

        let Assembled { envelope, skipped } = Assembler::new(&self.backend, &self.cipher, &self.context, self.transient)
            .assemble(members, &plaintext)
            .await;
        let body = envelope.to_json().map_err(FanoutError::encode)?;

        let reply = match self.backend.post(&messages_path(conversation), &body).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(%conversation, %error, "message not delivered");
                return Err(error);
            }
        };
        if !matches!(reply.status, 201 | 202) {
            warn!(%conversation, status = reply.status, "message not delivered");
            return Err(FanoutError::DispatchRejected { status: reply.status });
        }

        Ok((envelope.device_count(), skipped))
    }

    /// A store failure here is logged and shows up as `recorded: false`.
    async fn record(
        &self,
        conversation: &ConversationId,
        message: Message,
        devices: usize,
        skipped: Vec<Skipped>,
    ) -> Delivery {
        let recorded = match self.store.append(conversation, message.clone()).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%conversation, %error, "message delivered but not recorded");
                false
            }
        };

        info!(%conversation, devices, skipped = skipped.len(), "message delivered");
        Delivery {
            message,
            devices,
            skipped,
            recorded,
        }
    }
}
