//! CLI channel — stdin/stdout REPL for exercising the survey locally.
//!
//! Button clicks are simulated by typing the callback token prefixed with
//! a colon, e.g. `:type_travel` or `:ans_Window`.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, ChannelEvent, EventStream};
use crate::engine::Keyboard;
use crate::error::ChannelError;

const LOCAL_IDENTITY: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one input line into a channel event.
fn parse_line(line: &str) -> Option<ChannelEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(token) = line.strip_prefix(':') {
        return Some(ChannelEvent::Click {
            identity: LOCAL_IDENTITY.to_string(),
            callback_id: String::new(),
            token: token.to_string(),
        });
    }
    Some(ChannelEvent::Text {
        identity: LOCAL_IDENTITY.to_string(),
        text: line.to_string(),
    })
}

fn print_keyboard(keyboard: &Keyboard) {
    for row in &keyboard.rows {
        for button in row {
            println!("  [:{}]  {}", button.token, button.label);
        }
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(event) = parse_line(&line) else {
                            eprint!("> ");
                            continue;
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send_text(
        &self,
        _identity: &str,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        println!("\n{text}\n");
        if let Some(keyboard) = keyboard {
            print_keyboard(keyboard);
        }
        eprint!("> ");
        Ok(())
    }

    async fn send_image(
        &self,
        identity: &str,
        image_url: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        println!("🖼  {image_url}");
        self.send_text(identity, caption.unwrap_or_default(), keyboard)
            .await
    }

    async fn ack_click(&self, _callback_id: &str) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
