use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use otrfanout::{
    Backend, Cipher, Config, Conversation, ConversationId, Dispatcher, HttpTransport, KeyPair, MemoryConversations,
    UserId,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "otrfanout", version, about = "Send end-to-end encrypted messages to every device of a conversation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encrypt and send one text message.
    Send {
        #[arg(short, long)]
        conversation: String,

        /// Conversation member, repeat for each. Include yourself to reach your other devices.
        #[arg(short, long = "member", required = true)]
        members: Vec<String>,

        /// Self-destruct after this many seconds.
        #[arg(long)]
        ttl: Option<u64>,

        text: String,
    },
    /// Send a file as a preview followed by its contents.
    SendFile {
        #[arg(short, long)]
        conversation: String,

        #[arg(short, long = "member", required = true)]
        members: Vec<String>,

        #[arg(long, default_value = "application/octet-stream")]
        mime_type: String,

        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let identity = match config.identity_key {
        Some(secret) => KeyPair::from_secret(secret),
        None => {
            warn!("OTR_IDENTITY_KEY not set, using a throwaway identity");
            KeyPair::generate()
        }
    };

    let transport = HttpTransport::new(&config.backend_url, &config.access_token, config.request_timeout)
        .context("building http client")?;
    let backend = Backend::new(transport, config.request_timeout);

    let cipher = Cipher::new(identity);
    let delivery = match cli.command {
        Command::Send { conversation, members, ttl, text } => {
            let (dispatcher, id) = dispatcher(&config, backend, cipher, conversation, members).await;
            match ttl {
                Some(secs) => dispatcher.send_timed_text(&id, &text, Duration::from_secs(secs)).await,
                None => dispatcher.send_text(&id, &text).await,
            }
            .with_context(|| format!("sending to {id}"))?
        }
        Command::SendFile { conversation, members, mime_type, path } => {
            let contents = tokio::fs::read(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let (dispatcher, id) = dispatcher(&config, backend, cipher, conversation, members).await;
            dispatcher
                .send_file(&id, &name, &mime_type, &contents)
                .await
                .with_context(|| format!("sending {name} to {id}"))?
        }
    };

    for skip in &delivery.skipped {
        match &skip.device {
            Some(device) => warn!(user = %skip.user, %device, error = %skip.error, "not reached"),
            None => warn!(user = %skip.user, error = %skip.error, "not reached"),
        }
    }
    info!(id = %delivery.message.id, devices = delivery.devices, "sent");

    Ok(())
}

async fn dispatcher(
    config: &Config,
    backend: Backend<HttpTransport>,
    cipher: Cipher,
    conversation: String,
    members: Vec<String>,
) -> (Dispatcher<HttpTransport, MemoryConversations>, ConversationId) {
    let store = MemoryConversations::default();
    let conversation = Conversation::new(conversation, members.into_iter().map(UserId::from));
    let id = conversation.id.clone();
    store.insert(conversation).await;

    let dispatcher = Dispatcher::new(config.context.clone(), backend, cipher, store, config.transient);
    (dispatcher, id)
}
