//! Telegram channel — long-polls the Bot API for updates.
//!
//! Covers exactly what the survey flow needs: text messages, callback
//! queries from inline keyboards, sendMessage/sendPhoto, and callback
//! acknowledgment.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::{Channel, ChannelEvent, EventStream};
use crate::engine::Keyboard;
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the channel at a different API host (tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    async fn post(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ChannelError> {
        self.client
            .post(self.api_url(method))
            .timeout(std::time::Duration::from_secs(30))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })
    }

    async fn post_expecting_ok(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<(), ChannelError> {
        let resp = self.post(method, body).await?;
        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let detail = resp.text().await.unwrap_or_default();
        Err(ChannelError::SendFailed {
            name: "telegram".into(),
            reason: format!("{method} returned {status}: {detail}"),
        })
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let poll_url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&poll_url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
                    for update in results {
                        if let Some(uid) =
                            update.get("update_id").and_then(serde_json::Value::as_i64)
                        {
                            offset = uid + 1;
                        }

                        let Some(event) = parse_update(update) else {
                            continue;
                        };

                        if tx.send(event).is_err() {
                            tracing::info!("Telegram listener channel closed");
                            return;
                        }
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send_text(
        &self,
        identity: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len() - 1;
        for (index, chunk) in chunks.iter().enumerate() {
            let mut body = serde_json::json!({
                "chat_id": identity,
                "text": chunk,
            });
            // The keyboard belongs on the last chunk, next to the question.
            if index == last {
                if let Some(keyboard) = keyboard {
                    body["reply_markup"] = keyboard_markup(keyboard);
                }
            }
            self.post_expecting_ok("sendMessage", &body).await?;
        }
        Ok(())
    }

    async fn send_image(
        &self,
        identity: &str,
        image_url: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": identity,
            "photo": image_url,
        });
        if let Some(caption) = caption {
            body["caption"] = serde_json::Value::String(caption.to_string());
        }
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard_markup(keyboard);
        }

        match self.post_expecting_ok("sendPhoto", &body).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // The image is decoration; fall back to the caption as text.
                tracing::warn!("Telegram sendPhoto failed ({e}); sending caption as text");
                self.send_text(identity, caption.unwrap_or_default(), keyboard)
                    .await
            }
        }
    }

    async fn ack_click(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.post_expecting_ok(
            "answerCallbackQuery",
            &serde_json::json!({ "callback_query_id": callback_id }),
        )
        .await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Decode one getUpdates entry into a channel event.
///
/// Messages need `text` and `chat.id`; callback queries need `id`, `data`,
/// and the originating chat. Everything else is skipped.
fn parse_update(update: &serde_json::Value) -> Option<ChannelEvent> {
    if let Some(message) = update.get("message") {
        let text = message.get("text")?.as_str()?;
        let chat_id = message.get("chat")?.get("id")?.as_i64()?;
        return Some(ChannelEvent::Text {
            identity: chat_id.to_string(),
            text: text.to_string(),
        });
    }

    if let Some(query) = update.get("callback_query") {
        let callback_id = query.get("id")?.as_str()?;
        let token = query.get("data")?.as_str()?;
        let chat_id = query
            .get("message")?
            .get("chat")?
            .get("id")?
            .as_i64()?;
        return Some(ChannelEvent::Click {
            identity: chat_id.to_string(),
            callback_id: callback_id.to_string(),
            token: token.to_string(),
        });
    }

    None
}

/// Render a keyboard as Telegram `reply_markup`.
fn keyboard_markup(keyboard: &Keyboard) -> serde_json::Value {
    let rows: Vec<Vec<serde_json::Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| {
                    serde_json::json!({
                        "text": button.label,
                        "callback_data": button.token,
                    })
                })
                .collect()
        })
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let chunk = &remaining[..max_len];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(max_len);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { max_len } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
