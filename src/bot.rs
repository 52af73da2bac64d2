//! The dispatcher — wires transport, engine, and persistence together.
//!
//! One loop, one event at a time: acknowledge the click, decode, run the
//! engine transition, execute whatever actions came out. Send failures are
//! best-effort and never roll back a transition that already happened.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use crate::channels::{Channel, ChannelEvent};
use crate::engine::{Action, ConversationEngine, Event};
use crate::error::Error;
use crate::persist::PersistenceGateway;
use crate::session::SessionStore;

const CONFIRMATION: &str = "🎉 Thanks! Your answers were saved.";
const SAVE_FAILED: &str =
    "⚠️ Sorry, your answers could not be saved. Send /start to try again.";

/// The running bot.
pub struct SurveyBot {
    engine: Arc<ConversationEngine>,
    channel: Arc<dyn Channel>,
    gateway: Arc<dyn PersistenceGateway>,
    store: Arc<SessionStore>,
    session_idle: Duration,
}

impl SurveyBot {
    pub fn new(
        engine: Arc<ConversationEngine>,
        channel: Arc<dyn Channel>,
        gateway: Arc<dyn PersistenceGateway>,
        store: Arc<SessionStore>,
        session_idle: Duration,
    ) -> Self {
        Self {
            engine,
            channel,
            gateway,
            store,
            session_idle,
        }
    }

    /// Run the event loop until Ctrl-C or the transport stream ends.
    pub async fn run(self) -> Result<(), Error> {
        self.channel.health_check().await?;
        let mut events = self.channel.start().await?;

        // Sweep idle sessions in the background.
        let store = Arc::clone(&self.store);
        let idle = self.session_idle;
        let pruning_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(600));
            interval.tick().await; // Skip immediate first tick
            loop {
                interval.tick().await;
                let pruned = store.prune_idle(idle).await;
                if pruned > 0 {
                    tracing::debug!(pruned, "Pruned idle sessions");
                }
            }
        });

        tracing::info!(channel = self.channel.name(), "Survey bot ready and listening");

        loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                event = events.next() => {
                    match event {
                        Some(e) => e,
                        None => {
                            tracing::info!("Event stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            self.handle_event(event).await;
        }

        pruning_handle.abort();
        self.channel.shutdown().await?;
        Ok(())
    }

    /// Process one inbound event end to end.
    pub async fn handle_event(&self, event: ChannelEvent) {
        let identity = event.identity().to_string();

        let decoded = match &event {
            ChannelEvent::Text { text, .. } => Event::from_text(text),
            ChannelEvent::Click {
                callback_id, token, ..
            } => {
                // Ack first so the client's spinner stops even when the
                // token turns out to be stale.
                if !callback_id.is_empty() {
                    if let Err(e) = self.channel.ack_click(callback_id).await {
                        tracing::warn!(%identity, error = %e, "Failed to ack callback");
                    }
                }
                Event::from_token(token)
            }
        };

        let actions = self.engine.handle(&identity, decoded).await;
        for action in actions {
            if let Err(e) = self.execute(&identity, action).await {
                tracing::warn!(%identity, error = %e, "Failed to execute outbound action");
            }
        }
    }

    async fn execute(&self, identity: &str, action: Action) -> Result<(), Error> {
        match action {
            Action::SendText { text, keyboard } => {
                self.channel
                    .send_text(identity, &text, keyboard.as_ref())
                    .await?;
            }
            Action::SendImage {
                image_url,
                caption,
                keyboard,
            } => {
                self.channel
                    .send_image(identity, &image_url, caption.as_deref(), keyboard.as_ref())
                    .await?;
            }
            Action::Append { record } => {
                // The session is already gone; whatever happens here, the
                // conversation is over.
                match self.gateway.append_record(&record).await {
                    Ok(()) => {
                        self.channel.send_text(identity, CONFIRMATION, None).await?;
                    }
                    Err(e) => {
                        tracing::error!(identity, error = %e, "Failed to persist survey record");
                        self.channel.send_text(identity, SAVE_FAILED, None).await?;
                    }
                }
            }
        }
        Ok(())
    }
}
