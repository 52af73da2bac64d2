//! Chat transport abstraction.
//!
//! A channel surfaces inbound events as a stream and executes the sends the
//! engine asks for. Channels carry no conversation logic.

pub mod cli;
pub mod telegram;

pub use cli::CliChannel;
pub use telegram::TelegramChannel;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::engine::Keyboard;
use crate::error::ChannelError;

/// An inbound event surfaced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A plain text message from a chat.
    Text { identity: String, text: String },
    /// An inline-button click. `callback_id` must be acknowledged back to
    /// the transport so the client stops its progress spinner.
    Click {
        identity: String,
        callback_id: String,
        token: String,
    },
}

impl ChannelEvent {
    pub fn identity(&self) -> &str {
        match self {
            Self::Text { identity, .. } | Self::Click { identity, .. } => identity,
        }
    }
}

/// Stream of inbound events produced by a channel.
pub type EventStream = Pin<Box<dyn Stream<Item = ChannelEvent> + Send>>;

/// A chat transport.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Start listening and return the inbound event stream.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Send a text message, optionally with an inline keyboard.
    async fn send_text(
        &self,
        identity: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError>;

    /// Send an image with an optional caption and keyboard. Transports
    /// without image support send the caption as plain text.
    async fn send_image(
        &self,
        identity: &str,
        image_url: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError>;

    /// Acknowledge a button click.
    async fn ack_click(&self, callback_id: &str) -> Result<(), ChannelError>;

    /// Verify the transport is reachable before entering the event loop.
    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError>;
}
